use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

impl DbError {
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed(message.into())
    }
}
