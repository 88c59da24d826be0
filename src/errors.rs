//! Typed error hierarchy for floop.
//!
//! Two top-level enums cover the two subsystems that can fail:
//! - `StoreError`: work-order file I/O and screenshot decoding
//! - `WatchError`: the agent watcher loop and subprocess invocation
//!
//! A work order that is simply absent is not an error: the store's
//! transition operations report it as `Ok(false)`.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the work-order store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid screenshot payload: {0}")]
    InvalidScreenshot(String),

    #[error("Failed to encode {section} as JSON: {source}")]
    Json {
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store task panicked: {0}")]
    TaskPanicked(String),
}

impl StoreError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Errors from the agent watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Agent CLI '{0}' not found on PATH")]
    AgentNotFound(String),

    #[error("Failed to spawn agent process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Failed to read agent output: {0}")]
    Output(#[source] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_io_carries_path_and_kind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = StoreError::io("write", "/feedback/pending/a.md", io_err);
        match &err {
            StoreError::Io { action, path, source } => {
                assert_eq!(*action, "write");
                assert_eq!(path, &PathBuf::from("/feedback/pending/a.md"));
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            _ => panic!("Expected Io variant"),
        }
        assert!(err.to_string().contains("Failed to write /feedback/pending/a.md"));
    }

    #[test]
    fn watch_error_converts_from_store_error() {
        let inner = StoreError::InvalidScreenshot("bad base64".to_string());
        let err: WatchError = inner.into();
        match &err {
            WatchError::Store(StoreError::InvalidScreenshot(msg)) => assert_eq!(msg, "bad base64"),
            _ => panic!("Expected WatchError::Store(InvalidScreenshot(..))"),
        }
    }

    #[test]
    fn agent_not_found_names_the_command() {
        let err = WatchError::AgentNotFound("claude".into());
        assert!(err.to_string().contains("'claude'"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&StoreError::TaskPanicked("x".into()));
        assert_std_error(&WatchError::AgentNotFound("claude".into()));
    }
}
