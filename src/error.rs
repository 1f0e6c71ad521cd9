//! Error taxonomy shared by the resolver, the mutators and the router.

/// Result type for synchronization operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while resolving identity or applying a mutation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("not found: {0}")]
    NotFound(String),

    /// More than one game claims the player; never resolved silently
    #[error("ambiguous: {0}")]
    Ambiguous(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl SyncError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Short machine-readable code, used in logs and HTTP error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Ambiguous(_) => "AMBIGUOUS",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Malformed(_) => "MALFORMED",
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_maps_to_malformed() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: SyncError = err.into();
        assert_eq!(err.code(), "MALFORMED");
    }

    #[test]
    fn test_display() {
        let err = SyncError::not_found("game abc");
        assert_eq!(err.to_string(), "not found: game abc");
    }
}
