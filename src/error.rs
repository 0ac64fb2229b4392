use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level failures. Numeric and format anomalies never reach this
/// type — absent or malformed fields resolve to zero at the record layer.
/// Only data-retrieval problems surface, and a fetch failure always names
/// the collection it came from so the caller can render a whole-dashboard
/// error state instead of a partially blank one.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("could not fetch '{collection}': {detail}")]
    Fetch { collection: String, detail: String },

    #[error("{0}")]
    Dependency(String),
}

impl EngineError {
    pub fn fetch(collection: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Fetch {
            collection: collection.into(),
            detail: detail.into(),
        }
    }

    /// The collection a fetch failure originated from, if any.
    pub fn collection(&self) -> Option<&str> {
        match self {
            Self::Fetch { collection, .. } => Some(collection),
            _ => None,
        }
    }
}
