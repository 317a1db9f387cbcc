#![forbid(unsafe_code)]

//! Tracing instrumentation of the model.
//!
//! Installs a capturing layer and checks that writes, evaluations and array
//! mutations emit their structured events and spans.

use std::sync::{Arc, Mutex};

use databind_model::{Model, json};
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

#[derive(Default)]
struct ModelTraceState {
    messages: Vec<String>,
    saw_evaluate_span: bool,
    dependency_count: Option<u64>,
}

struct ModelTraceCapture {
    state: Arc<Mutex<ModelTraceState>>,
}

impl<S> Layer<S> for ModelTraceCapture
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::Id,
        _ctx: Context<'_, S>,
    ) {
        if attrs.metadata().name() == "model.computed.evaluate" {
            self.state.lock().expect("model trace lock").saw_evaluate_span = true;
        }
    }

    fn on_record(
        &self,
        id: &tracing::Id,
        values: &tracing::span::Record<'_>,
        ctx: Context<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        if span.metadata().name() != "model.computed.evaluate" {
            return;
        }
        struct Count {
            value: Option<u64>,
        }
        impl tracing::field::Visit for Count {
            fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
                if field.name() == "dependency_count" {
                    self.value = Some(value);
                }
            }

            fn record_debug(&mut self, _field: &tracing::field::Field, _value: &dyn std::fmt::Debug) {
            }
        }
        let mut count = Count { value: None };
        values.record(&mut count);
        if let Some(value) = count.value {
            self.state.lock().expect("model trace lock").dependency_count = Some(value);
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        struct Msg {
            message: Option<String>,
        }
        impl tracing::field::Visit for Msg {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    self.message = Some(value.to_string());
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.message = Some(format!("{value:?}").trim_matches('"').to_string());
                }
            }
        }
        let mut msg = Msg { message: None };
        event.record(&mut msg);
        if let Some(message) = msg.message {
            self.state
                .lock()
                .expect("model trace lock")
                .messages
                .push(message);
        }
    }
}

#[test]
fn model_emits_structured_events_and_evaluation_span() {
    let state = Arc::new(Mutex::new(ModelTraceState::default()));
    let subscriber = tracing_subscriber::registry().with(ModelTraceCapture {
        state: Arc::clone(&state),
    });
    let _guard = tracing::subscriber::set_default(subscriber);

    let model = Model::new("traced");
    model.attr("a", 1).unwrap();
    model.attr("list", json!([])).unwrap();
    model
        .computed("sum", |m, _| {
            let a = m.get("a")?.as_i64().unwrap_or_default();
            let len = m.array("list")?.len()? as i64;
            Ok(json!(a + len))
        })
        .unwrap();
    assert_eq!(model.get("sum").unwrap(), json!(1));
    model.array("list").unwrap().push(0).unwrap();

    let snapshot = state.lock().expect("model trace lock");
    for expected in [
        "model.attr",
        "model.computed.register",
        "model.array.mutate",
        "model.propagate",
    ] {
        assert!(
            snapshot.messages.iter().any(|m| m == expected),
            "expected {expected} event, saw {:?}",
            snapshot.messages
        );
    }
    assert!(snapshot.saw_evaluate_span, "expected model.computed.evaluate span");
    assert_eq!(snapshot.dependency_count, Some(2));
}

#[test]
fn failed_evaluation_is_logged() {
    let state = Arc::new(Mutex::new(ModelTraceState::default()));
    let subscriber = tracing_subscriber::registry().with(ModelTraceCapture {
        state: Arc::clone(&state),
    });
    let _guard = tracing::subscriber::set_default(subscriber);

    let model = Model::new("traced");
    model
        .computed("broken", |m, _| m.get("missing"))
        .unwrap();
    assert!(model.get("broken").is_err());

    let snapshot = state.lock().expect("model trace lock");
    assert!(snapshot.messages.iter().any(|m| m == "model.computed.failed"));
}
