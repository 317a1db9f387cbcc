#![forbid(unsafe_code)]

//! End-to-end model scenarios.
//!
//! Validates that:
//! 1. Writes through dotted and indexed paths update the graph and notify
//!    the exact path written.
//! 2. Pushing to an observable array notifies the array path and every
//!    ancestor.
//! 3. Reads dig through objects, arrays, dynamic indices and computed
//!    properties.
//! 4. A write reaches transitively dependent computed properties.
//! 5. Call syntax passes current argument values to the evaluator.
//! 6. A form-like model stays consistent across a sequence of edits.

use std::cell::RefCell;
use std::rc::Rc;

use databind_model::{Model, ModelError, Value, json};

// ============================================================================
// Helpers
// ============================================================================

struct Spy {
    calls: Rc<RefCell<Vec<String>>>,
}

impl Spy {
    fn install(model: &Model) -> Self {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        model.set_value_changed(move |path| sink.borrow_mut().push(path.to_string()));
        Self { calls }
    }

    fn called_with(&self, path: &str) -> bool {
        self.calls.borrow().iter().any(|p| p == path)
    }

    fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    fn reset(&self) {
        self.calls.borrow_mut().clear();
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

fn model() -> Model {
    Model::new("my scope")
}

// ============================================================================
// Writes
// ============================================================================

#[test]
fn model_keeps_its_scope() {
    assert_eq!(model().scope(), "my scope");
}

#[test]
fn attr_with_array_index_updates_value_in_array() {
    let model = model();
    let spy = Spy::install(&model);
    model.attr("items", json!([0])).unwrap();

    model.attr("items[0]", 5).unwrap();
    assert_eq!(model.get("items[0]").unwrap(), json!(5));
    assert!(spy.called_with("items[0]"));
}

#[test]
fn attr_with_dot_property_updates_object() {
    let model = model();
    let spy = Spy::install(&model);
    model.attr("object", json!({"firstName": ""})).unwrap();

    model.attr("object.firstName", "john").unwrap();
    assert_eq!(model.get("object.firstName").unwrap(), json!("john"));
    assert!(spy.called_with("object.firstName"));
}

#[test]
fn attr_through_nested_objects_and_arrays() {
    let model = model();
    let spy = Spy::install(&model);
    model
        .attr("object", json!({"items": [{"firstName": ""}]}))
        .unwrap();

    model.attr("object.items[0].firstName", "john").unwrap();
    assert_eq!(
        model.get("object.items[0].firstName").unwrap(),
        json!("john")
    );
    assert!(spy.called_with("object.items[0].firstName"));
}

// ============================================================================
// Observable arrays
// ============================================================================

#[test]
fn pushing_to_array_notifies_and_appends() {
    let model = model();
    let spy = Spy::install(&model);
    model.attr("arr", json!([0])).unwrap();
    model.array("arr").unwrap().push(1).unwrap();

    assert!(spy.called_with("arr"));
    assert_eq!(spy.call_count(), 2);
    assert_eq!(
        model.array("arr").unwrap().value().unwrap(),
        [json!(0), json!(1)]
    );
}

#[test]
fn pushing_to_inner_array_notifies_owner_and_parent() {
    let model = model();
    let spy = Spy::install(&model);
    model.attr("arr", json!({"inner": [1]})).unwrap();
    spy.reset();

    model.array("arr.inner").unwrap().push(2).unwrap();
    assert!(spy.called_with("arr.inner"));
    assert!(spy.called_with("arr"));
    assert_eq!(
        model.array("arr.inner").unwrap().value().unwrap(),
        [json!(1), json!(2)]
    );
}

// ============================================================================
// Reads
// ============================================================================

#[test]
fn get_digs_into_object_graph() {
    let model = model();
    model.attr("object", json!({"prop": "value"})).unwrap();
    assert_eq!(model.get("object.prop").unwrap(), json!("value"));

    model
        .attr("object", json!({"prop": {"prop2": "value"}}))
        .unwrap();
    assert_eq!(model.get("object.prop.prop2").unwrap(), json!("value"));
}

#[test]
fn get_handles_computed_property_in_object_graph() {
    let model = model();
    model
        .computed("computed", |_, _| Ok(json!({"computedProp": 4})))
        .unwrap();
    assert_eq!(model.get("computed.computedProp").unwrap(), json!(4));
}

#[test]
fn get_handles_array_access_at_beginning_and_middle() {
    let model = model();
    model
        .attr("items", json!([{"number": 0}, {"number": 1}]))
        .unwrap();
    assert_eq!(model.get("items[1].number").unwrap(), json!(1));

    model
        .attr("object", json!({"arr": [{"number": 0}, {"number": 1}]}))
        .unwrap();
    assert_eq!(model.get("object.arr[0].number").unwrap(), json!(0));
}

#[test]
fn get_handles_variable_array_access() {
    let model = model();
    model.attr("index", 1).unwrap();
    model.attr("items", json!([0, 1])).unwrap();
    assert_eq!(model.get("items[index]").unwrap(), json!(1));
}

#[test]
fn get_handles_nested_variable_indices() {
    let model = model();
    model.attr("order", json!([2, 0])).unwrap();
    model.attr("grid", json!([["a", "b"], ["c", "d"], ["e", "f"]])).unwrap();
    assert_eq!(model.get("grid[order[0]][1]").unwrap(), json!("f"));
}

// ============================================================================
// Computed properties
// ============================================================================

#[test]
fn write_notifies_transitive_dependents() {
    let model = model();
    model.attr("a", 1).unwrap();
    let spy = Spy::install(&model);
    model.computed("b", |m, _| m.get("a")).unwrap();
    model.computed("c", |m, _| m.get("b")).unwrap();

    model.attr("a", 2).unwrap();
    assert!(spy.called_with("a"));
    assert!(spy.called_with("b"));
    assert!(spy.called_with("c"));
    assert_eq!(model.get("c").unwrap(), json!(2));
}

#[test]
fn call_syntax_passes_parameters() {
    let model = model();
    let seen: Rc<RefCell<Option<Vec<Value>>>> = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&seen);
    model.attr("arg1", "value1").unwrap();
    model.attr("arg2", "value2").unwrap();
    model
        .computed("func", move |_, args| {
            *sink.borrow_mut() = Some(args.to_vec());
            Ok(Value::Null)
        })
        .unwrap();

    model.get("func(arg1, arg2)").unwrap();
    assert_eq!(
        seen.borrow().as_deref(),
        Some(&[json!("value1"), json!("value2")][..])
    );
}

// ============================================================================
// Realistic flow
// ============================================================================

#[test]
fn order_form_stays_consistent_across_edits() {
    let model = Model::new("order");
    model
        .attr(
            "order",
            json!({
                "lines": [
                    {"sku": "A-1", "qty": 2, "price": 5},
                    {"sku": "B-7", "qty": 1, "price": 12}
                ],
                "discount": 0
            }),
        )
        .unwrap();
    model
        .computed("subtotal", |m, _| {
            let lines = m.get("order.lines")?;
            let total: i64 = lines
                .as_array()
                .into_iter()
                .flatten()
                .map(|line| {
                    line["qty"].as_i64().unwrap_or_default()
                        * line["price"].as_i64().unwrap_or_default()
                })
                .sum();
            Ok(json!(total))
        })
        .unwrap();
    model
        .computed("total", |m, _| {
            let subtotal = m.get("subtotal")?.as_i64().unwrap_or_default();
            let discount = m.get("order.discount")?.as_i64().unwrap_or_default();
            Ok(json!(subtotal - discount))
        })
        .unwrap();
    assert_eq!(model.get("total").unwrap(), json!(22));

    let spy = Spy::install(&model);
    model.attr("order.lines[0].qty", 3).unwrap();
    assert_eq!(spy.calls(), ["order.lines[0].qty", "subtotal", "total"]);
    assert_eq!(model.get("total").unwrap(), json!(27));

    spy.reset();
    model.attr("order.discount", 7).unwrap();
    assert_eq!(spy.calls(), ["order.discount", "total"]);
    assert_eq!(model.is_dirty("subtotal"), Some(false));
    assert_eq!(model.get("total").unwrap(), json!(20));

    spy.reset();
    model
        .array("order.lines")
        .unwrap()
        .push(json!({"sku": "C-3", "qty": 1, "price": 1}))
        .unwrap();
    assert_eq!(
        spy.calls(),
        ["order.lines", "order", "subtotal", "total"]
    );
    assert_eq!(model.get("total").unwrap(), json!(21));
}

#[test]
fn errors_surface_without_side_effects() {
    let model = model();
    model.attr("items", json!([1, 2])).unwrap();
    let spy = Spy::install(&model);

    assert!(matches!(
        model.get("items[9]"),
        Err(ModelError::Path(_))
    ));
    assert!(model.attr("items[9]", 0).is_err());
    assert!(model.get("bad path!").is_err());
    assert_eq!(spy.call_count(), 0);
    assert_eq!(model.get("items").unwrap(), json!([1, 2]));
}
