//! Engine and structure errors
//!
//! Every variant is a contract violation by the caller. There is no I/O in
//! the engine and therefore no transient failure: errors are surfaced
//! immediately and never retried.

use thiserror::Error;

/// Result type for persistence operations
pub type PersistResult<T> = Result<T, PersistError>;

/// Persistence errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistError {
    #[error("Unknown field: {tag}")]
    UnknownField { tag: String },

    #[error("Not a pointer field: {tag}")]
    InvalidPointerField { tag: String },

    #[error("Not a data field: {tag}")]
    InvalidDataField { tag: String },

    #[error("In-degree limit {limit} exceeded on field {tag}")]
    InDegreeExceeded { tag: String, limit: usize },

    #[error("Unknown node: {node}")]
    UnknownNode { node: u32 },

    #[error("Node {node} was replaced by {successor} and is read-only")]
    SupersededNode { node: u32, successor: u32 },

    #[error("Arena exhausted: at most {limit} nodes")]
    ArenaExhausted { limit: u64 },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl PersistError {
    /// Create a precondition violation
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionViolation(msg.into())
    }

    /// Create an invalid schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::InvalidSchema(msg.into())
    }

    /// Create an invalid config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Stable error code for logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownField { .. } => "TIMELINK_UNKNOWN_FIELD",
            Self::InvalidPointerField { .. } => "TIMELINK_INVALID_POINTER_FIELD",
            Self::InvalidDataField { .. } => "TIMELINK_INVALID_DATA_FIELD",
            Self::InDegreeExceeded { .. } => "TIMELINK_IN_DEGREE_EXCEEDED",
            Self::UnknownNode { .. } => "TIMELINK_UNKNOWN_NODE",
            Self::SupersededNode { .. } => "TIMELINK_SUPERSEDED_NODE",
            Self::ArenaExhausted { .. } => "TIMELINK_ARENA_EXHAUSTED",
            Self::InvalidSchema(_) => "TIMELINK_INVALID_SCHEMA",
            Self::PreconditionViolation(_) => "TIMELINK_PRECONDITION_VIOLATION",
            Self::IndexOutOfRange { .. } => "TIMELINK_INDEX_OUT_OF_RANGE",
            Self::InvalidConfig(_) => "TIMELINK_INVALID_CONFIG",
        }
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}

impl From<std::io::Error> for PersistError {
    fn from(e: std::io::Error) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            PersistError::UnknownField { tag: "x".into() },
            PersistError::InvalidPointerField { tag: "x".into() },
            PersistError::InvalidDataField { tag: "x".into() },
            PersistError::InDegreeExceeded {
                tag: "x".into(),
                limit: 1,
            },
            PersistError::UnknownNode { node: 3 },
            PersistError::SupersededNode {
                node: 1,
                successor: 2,
            },
            PersistError::ArenaExhausted { limit: 8 },
            PersistError::schema("s"),
            PersistError::precondition("p"),
            PersistError::IndexOutOfRange { index: 4, len: 2 },
            PersistError::config("c"),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_display() {
        let err = PersistError::IndexOutOfRange { index: 9, len: 3 };
        assert_eq!(err.to_string(), "Index 9 out of range for length 3");
        assert_eq!(
            PersistError::precondition("root cannot be deleted").to_string(),
            "Precondition violated: root cannot be deleted"
        );
    }

    #[test]
    fn test_from_serde_json() {
        let err: PersistError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(err.code(), "TIMELINK_INVALID_CONFIG");
    }
}
