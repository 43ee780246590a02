use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChunkVaultError>;

#[derive(Debug, Error)]
pub enum ChunkVaultError {
    #[error("object not found: '{0}'")]
    NotFound(String),

    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("invalid content hash '{0}'")]
    InvalidHash(String),

    #[error("invalid byte range {start}..={end} on '{key}'")]
    InvalidRange { key: String, start: u64, end: u64 },

    #[error("short read on '{key}': expected {expected} bytes, got {actual}")]
    ShortRead {
        key: String,
        expected: u64,
        actual: u64,
    },

    #[error("failed to decode chunk payload: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("nothing could be retrieved: {0}")]
    NothingRetrieved(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl ChunkVaultError {
    /// Whether the error is worth retrying against the same backend.
    pub fn is_transient(&self) -> bool {
        match self {
            ChunkVaultError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
            ),
            ChunkVaultError::Backend(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_io_kinds() {
        for kind in [
            std::io::ErrorKind::ConnectionReset,
            std::io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted,
        ] {
            let err = ChunkVaultError::Io(std::io::Error::new(kind, "test"));
            assert!(err.is_transient(), "{kind:?} should be transient");
        }
    }

    #[test]
    fn permanent_errors_are_not_transient() {
        assert!(!ChunkVaultError::NotFound("k".into()).is_transient());
        assert!(!ChunkVaultError::InvalidKey("../x".into()).is_transient());
        let io = ChunkVaultError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "test",
        ));
        assert!(!io.is_transient());
    }
}
