//! Input backends: the only code that talks to the OS.

use crate::error::BackendError;
use crate::keys::KeyCode;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// A top-level window found by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowHandle {
    /// Native handle value (`HWND` on Windows, 0 for dry-run).
    pub raw: isize,
    pub title: String,
}

/// Key-sender capability used by the dispatcher.
///
/// Implementations must not retry or reorder sends; every `send_key` call is
/// exactly one key press (down + up) or an error.
pub trait InputBackend: Send {
    fn name(&self) -> &'static str;

    /// True when key sends reach a real window.
    fn injects_input(&self) -> bool {
        true
    }

    /// Find the first visible window whose title contains one of `candidates`
    /// (case-insensitive). `Ok(None)` when nothing matches yet.
    fn find_window(&mut self, candidates: &[String]) -> Result<Option<WindowHandle>, BackendError>;

    fn focus_window(&mut self, window: &WindowHandle) -> Result<(), BackendError>;

    fn send_key(&mut self, key: KeyCode) -> Result<(), BackendError>;
}

/// Case-insensitive substring match of a window title against candidates.
pub fn title_matches(title: &str, candidates: &[String]) -> bool {
    let title = title.to_lowercase();
    candidates
        .iter()
        .map(|c| c.trim().to_lowercase())
        .any(|c| !c.is_empty() && title.contains(&c))
}

/// Records keys instead of injecting them.
///
/// Focus always succeeds against a synthetic window named after the first
/// candidate. Clones share the recorded key list.
#[derive(Debug, Clone, Default)]
pub struct DryRunBackend {
    sent: Arc<Mutex<Vec<KeyCode>>>,
}

impl DryRunBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys "sent" so far, in order.
    pub fn sent(&self) -> Vec<KeyCode> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl InputBackend for DryRunBackend {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    fn injects_input(&self) -> bool {
        false
    }

    fn find_window(&mut self, candidates: &[String]) -> Result<Option<WindowHandle>, BackendError> {
        let title = candidates
            .first()
            .cloned()
            .unwrap_or_else(|| "dry-run".to_string());
        Ok(Some(WindowHandle { raw: 0, title }))
    }

    fn focus_window(&mut self, window: &WindowHandle) -> Result<(), BackendError> {
        debug!("[dry-run] focus '{}'", window.title);
        Ok(())
    }

    fn send_key(&mut self, key: KeyCode) -> Result<(), BackendError> {
        debug!("[dry-run] key {}", key);
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key);
        Ok(())
    }
}

/// The platform's real input backend.
#[cfg(windows)]
pub fn native_backend() -> Result<Box<dyn InputBackend>, BackendError> {
    Ok(Box::new(super::win32::WindowsBackend::new()))
}

/// The platform's real input backend.
#[cfg(not(windows))]
pub fn native_backend() -> Result<Box<dyn InputBackend>, BackendError> {
    Err(BackendError::Unsupported(std::env::consts::OS.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_matching_is_case_insensitive_substring() {
        let candidates = vec!["DJMAX RESPECT V".to_string(), "  ".to_string()];
        assert!(title_matches("DJMAX RESPECT V", &candidates));
        assert!(title_matches("djmax respect v - Steam", &candidates));
        assert!(!title_matches("Notepad", &candidates));
        assert!(!title_matches("anything", &["".to_string()]));
    }

    #[test]
    fn test_dry_run_records_keys() {
        let mut backend = DryRunBackend::new();
        let observer = backend.clone();
        let window = backend
            .find_window(&["Game".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(window.title, "Game");
        backend.focus_window(&window).unwrap();
        backend.send_key(KeyCode::Char('b')).unwrap();
        backend.send_key(KeyCode::Down).unwrap();
        assert_eq!(observer.sent(), vec![KeyCode::Char('b'), KeyCode::Down]);
        assert!(!backend.injects_input());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_native_backend_unsupported_off_windows() {
        assert!(matches!(native_backend(), Err(BackendError::Unsupported(_))));
    }
}
