use thiserror::Error;

use crate::path::PathError;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("computed `{name}` failed: {source}")]
    Evaluation {
        name: String,
        #[source]
        source: Box<ModelError>,
    },

    #[error("cyclic dependency: {}", .chain.join(" -> "))]
    CyclicDependency { chain: Vec<String> },

    #[error("computed evaluation nested deeper than {depth} levels")]
    EvaluationDepthExceeded { depth: usize },

    #[error("`{name}` is not a valid attribute name")]
    InvalidName { name: String },

    #[error("`{path}` is not writable")]
    NotWritable { path: String },

    #[error("`{path}` does not hold an array")]
    NotAnArray { path: String },

    #[error("{0}")]
    Failed(String),
}

impl ModelError {
    /// Error raised by evaluator code.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Wrap an evaluator failure for computed `name`.
    ///
    /// Failures that already describe an evaluation problem pass through
    /// unchanged, so a chain `c -> b` that fails in `b` reports `b`.
    #[must_use]
    pub fn evaluation(name: &str, source: ModelError) -> Self {
        match source {
            Self::Evaluation { .. }
            | Self::CyclicDependency { .. }
            | Self::EvaluationDepthExceeded { .. } => source,
            other => Self::Evaluation {
                name: name.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying path error, looking through evaluation wrappers.
    #[must_use]
    pub fn path_error(&self) -> Option<&PathError> {
        match self {
            Self::Path(err) => Some(err),
            Self::Evaluation { source, .. } => source.path_error(),
            _ => None,
        }
    }
}
