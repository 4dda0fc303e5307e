use crate::validate::ValidationError;
use thiserror::Error;

/// Every way a check request can fail.
///
/// `Display` carries the detail for logs; `public_message` is what the
/// client sees.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Bad content type: {0:?}")]
    BadContentType(Option<String>),

    #[error("Content-Length is missing")]
    ContentLengthMissing,

    #[error("Content-Length is not a number: {0:?}")]
    ContentLengthInvalid(String),

    #[error("Content-Length is <= zero: {0}")]
    ContentLengthNotPositive(i64),

    #[error("Content-Length {length} exceeds limit {limit}")]
    PayloadTooLarge { length: usize, limit: usize },

    #[error("Incomplete read of request body: expected {expected}, got {got}")]
    IncompleteRead { expected: usize, got: usize },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Internal: {0}")]
    Internal(String),
}

impl CheckError {
    /// Map to HTTP status code.
    pub fn status_code(&self) -> u16 {
        match self {
            CheckError::MethodNotAllowed(_) => 405,
            CheckError::BadContentType(_)
            | CheckError::ContentLengthMissing
            | CheckError::ContentLengthInvalid(_)
            | CheckError::ContentLengthNotPositive(_)
            | CheckError::IncompleteRead { .. }
            | CheckError::Validation(_) => 400,
            CheckError::PayloadTooLarge { .. } => 413,
            CheckError::Io(_) | CheckError::Serde(_) | CheckError::Internal(_) => 500,
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self {
            CheckError::MethodNotAllowed(_) => "Method Not Allowed",
            CheckError::BadContentType(_) => "Bad Content Type",
            CheckError::ContentLengthMissing => "Bad Request: Content-Length is missing.",
            CheckError::ContentLengthInvalid(_) => "Bad Request: invalid Content-Length",
            CheckError::ContentLengthNotPositive(_) => "Bad Request: Content-Length is <= zero.",
            CheckError::PayloadTooLarge { .. } => "Payload Too Large",
            CheckError::IncompleteRead { .. } => "Incomplete read",
            CheckError::Validation(e) => e.public_message(),
            CheckError::Io(_) | CheckError::Serde(_) | CheckError::Internal(_) => {
                "Internal Server Error"
            }
        }
    }

    /// True for faults on our side rather than in the request.
    pub fn is_internal(&self) -> bool {
        self.status_code() >= 500
    }

    /// JSON error body.
    pub fn to_json_body(&self) -> Vec<u8> {
        serde_json::json!({ "error": self.public_message() })
            .to_string()
            .into_bytes()
    }
}
