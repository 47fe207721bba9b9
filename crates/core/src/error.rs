use serde::{Deserialize, Serialize};

/// Errors surfaced by the Steve client crates.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum SteveError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("conflict on {}", .paths.join(", "))]
    Conflict { paths: Vec<String> },
    #[error("unknown link: {0}")]
    UnknownLink(String),
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("unknown schema: {0}")]
    UnknownSchema(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("decode: {0}")]
    Decode(String),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("internal: {0}")]
    Internal(String),
}

impl SteveError {
    /// HTTP status carried by the error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            SteveError::Http { status, .. } => Some(*status),
            SteveError::Unauthenticated => Some(401),
            _ => None,
        }
    }

    pub fn is_conflict_status(&self) -> bool { self.status() == Some(409) }
}

impl From<serde_json::Error> for SteveError {
    fn from(e: serde_json::Error) -> Self { SteveError::Decode(e.to_string()) }
}

pub type SteveResult<T> = Result<T, SteveError>;
