use std::path::PathBuf;
use thiserror::Error;

/// A specialized `Result` type for viewer operations.
pub type ViewerResult<T> = Result<T, ViewerError>;

/// The error type for the capture, matching and playback pipeline.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("Camera access denied: {reason}. Allow camera permissions and retry.")]
    PermissionDenied { reason: String },

    #[error("No video input device available: {description}")]
    DeviceNotFound { description: String },

    #[error("Failed to load template image {path:?}: {description}")]
    TemplateLoadFailure { path: PathBuf, description: String },

    #[error("Template image not ready")]
    TemplateNotReady,

    #[error("Frame capture failed on frame #{index}: {description}")]
    FrameCaptureTransientFailure { index: u64, description: String },

    #[error("Template matching failed: {description}")]
    MatchComputationError { description: String },

    #[error("Failed to play overlay {path:?}: {description}")]
    PlaybackLoadFailure { path: PathBuf, description: String },

    #[error("Invalid configuration: {description}")]
    InvalidConfig { description: String },

    #[error("Background task failed: {source}")]
    TaskFailed {
        #[from]
        source: tokio::task::JoinError,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl ViewerError {
    /// Errors that belong to a single tick and must never stop the loop
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ViewerError::FrameCaptureTransientFailure { .. }
                | ViewerError::MatchComputationError { .. }
        )
    }

    /// Errors raised while bringing the camera screen up; these are the only
    /// ones that change what the user sees
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            ViewerError::PermissionDenied { .. }
                | ViewerError::DeviceNotFound { .. }
                | ViewerError::TemplateLoadFailure { .. }
                | ViewerError::TemplateNotReady
        )
    }

    pub fn capture(index: u64, description: impl Into<String>) -> Self {
        ViewerError::FrameCaptureTransientFailure {
            index,
            description: description.into(),
        }
    }

    pub fn matching(description: impl Into<String>) -> Self {
        ViewerError::MatchComputationError {
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_tick_errors_are_transient() {
        assert!(ViewerError::capture(3, "black frame").is_transient());
        assert!(ViewerError::matching("nan in score map").is_transient());
        assert!(!ViewerError::TemplateNotReady.is_transient());
    }

    #[test]
    fn test_startup_failures() {
        let denied = ViewerError::PermissionDenied {
            reason: "user refused".to_string(),
        };
        assert!(denied.is_startup_failure());
        assert!(!denied.is_transient());
        assert!(
            !ViewerError::InvalidConfig {
                description: "bad threshold".to_string()
            }
            .is_startup_failure()
        );
    }

    #[tokio::test]
    async fn test_panicked_task_is_a_task_failure() {
        let handle: tokio::task::JoinHandle<()> = tokio::spawn(async { panic!("event watcher") });
        let err = ViewerError::from(handle.await.unwrap_err());
        assert!(matches!(err, ViewerError::TaskFailed { .. }));
        assert!(!err.is_transient());
        assert!(!err.is_startup_failure());
    }
}
