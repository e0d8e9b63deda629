//! Error types for SongBridge
//!
//! `NavError` is the request-path taxonomy. Variants split by whether any
//! input reached the game window before the failure:
//! - nothing sent: `InvalidQuery`, `SongNotFound`, `WindowNotFound`, `Busy`, `Catalog`
//! - partial input: `DispatchAborted`, `Cancelled`

use crate::plan::InputStep;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Request-path error.
#[derive(Debug, Error)]
pub enum NavError {
    #[error("Query must include a non-empty id or title")]
    InvalidQuery,

    #[error("Song not found: {query}")]
    SongNotFound { query: String },

    #[error("Target window not found after {attempts} attempt(s) (candidates: {candidates})")]
    WindowNotFound { attempts: u32, candidates: String },

    #[error("Another navigation is already in progress")]
    Busy,

    #[error(
        "Dispatch aborted after {completed_steps} step(s), {keys_sent} key(s) sent: {reason}"
    )]
    DispatchAborted {
        completed_steps: usize,
        keys_sent: usize,
        last_step: Option<InputStep>,
        reason: String,
    },

    #[error("Dispatch cancelled after {completed_steps} step(s), {keys_sent} key(s) sent")]
    Cancelled {
        completed_steps: usize,
        keys_sent: usize,
    },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Dispatch worker unavailable: {0}")]
    WorkerUnavailable(String),
}

impl NavError {
    /// Stable machine-readable code used in HTTP payloads and logs.
    pub fn code(&self) -> &'static str {
        match self {
            NavError::InvalidQuery => "invalid_query",
            NavError::SongNotFound { .. } => "song_not_found",
            NavError::WindowNotFound { .. } => "window_not_found",
            NavError::Busy => "busy",
            NavError::DispatchAborted { .. } => "dispatch_aborted",
            NavError::Cancelled { .. } => "cancelled",
            NavError::Catalog(_) => "catalog",
            NavError::WorkerUnavailable(_) => "worker_unavailable",
        }
    }

    /// True when the failure happened before any key reached the window,
    /// so the same request can be retried as-is.
    pub fn is_retry_safe(&self) -> bool {
        !self.sent_input()
    }

    /// True when some input may have reached the window.
    ///
    /// Callers must re-plan instead of retrying; dispatch is not idempotent.
    pub fn sent_input(&self) -> bool {
        match self {
            NavError::DispatchAborted { keys_sent, .. } | NavError::Cancelled { keys_sent, .. } => {
                *keys_sent > 0
            }
            NavError::WorkerUnavailable(_) => true,
            _ => false,
        }
    }
}

/// Catalog loading errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Catalog contains no songs")]
    EmptyCatalog,

    #[error("Duplicate song id '{id}' ('{first}' and '{second}')")]
    DuplicateId {
        id: String,
        first: String,
        second: String,
    },
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid key name '{0}'")]
    InvalidKey(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Failures reported by an input backend.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Input injection is not supported on this platform: {0}")]
    Unsupported(String),

    #[error("OS call failed: {0}")]
    Os(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(NavError::InvalidQuery.is_retry_safe());
        assert!(NavError::Busy.is_retry_safe());
        assert!(NavError::WindowNotFound {
            attempts: 3,
            candidates: "DJMAX".into()
        }
        .is_retry_safe());

        let aborted = NavError::DispatchAborted {
            completed_steps: 1,
            keys_sent: 2,
            last_step: None,
            reason: "send failed".into(),
        };
        assert!(aborted.sent_input());
        assert!(!aborted.is_retry_safe());

        let cancelled_early = NavError::Cancelled {
            completed_steps: 0,
            keys_sent: 0,
        };
        assert!(cancelled_early.is_retry_safe());
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(NavError::Busy.code(), "busy");
        assert_eq!(
            NavError::SongNotFound {
                query: "x".into()
            }
            .code(),
            "song_not_found"
        );
    }
}
