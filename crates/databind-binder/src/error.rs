use databind_model::ModelError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BindError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("no element matches scope selector `{selector}`")]
    ScopeNotFound { scope: String, selector: String },

    #[error("binding `{path}` failed: {source}")]
    Model {
        path: String,
        #[source]
        source: ModelError,
    },
}
