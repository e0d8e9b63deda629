//! Input Dispatcher
//!
//! Executes a [`NavigationPlan`] against the game window:
//!
//! ```text
//! Idle -> AcquiringFocus -> Dispatching -> Completed | Aborted | Cancelled
//! ```
//!
//! - AcquiringFocus: find a window whose title contains one of the configured
//!   candidates, focus it, retry with bounded exponential backoff. Exhaustion
//!   is `WindowNotFound` and nothing is sent.
//! - Dispatching: one key per press, strictly in plan order, sleeping the
//!   step's `delay_after` after every press. The cancellation token is checked
//!   before every press.
//!
//! Suspension points are the inter-key delays and the focus backoff; those are
//! the only places cancellation is observed. A failed send aborts the rest of
//! the plan and the outcome reports how far the cursor likely moved.

mod backend;
#[cfg(windows)]
mod win32;
mod worker;

pub use backend::{native_backend, title_matches, DryRunBackend, InputBackend, WindowHandle};
#[cfg(windows)]
pub use win32::WindowsBackend;
pub use worker::{DispatchHandle, DispatchWorker};

use crate::cancel::CancellationToken;
use crate::error::NavError;
use crate::keys::KeyCode;
use crate::plan::{InputAction, InputStep, NavigationPlan};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Bounded retry schedule for focus acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Pause after a successful focus so the OS finishes switching windows.
    pub settle: Duration,
}

impl Default for FocusPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(800),
            settle: Duration::from_millis(300),
        }
    }
}

impl FocusPolicy {
    /// Backoff after failed attempt `attempt` (1-based): doubles each time,
    /// capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Worst-case time spent acquiring focus.
    pub fn budget(&self) -> Duration {
        (1..self.attempts.max(1))
            .map(|a| self.backoff(a))
            .fold(self.settle, Duration::saturating_add)
    }
}

/// Maps plan actions to physical keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBindings {
    pub up: KeyCode,
    pub down: KeyCode,
    pub confirm: KeyCode,
    pub quick_jump_nonlatin: KeyCode,
    pub quick_jump_symbol: KeyCode,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            up: KeyCode::Up,
            down: KeyCode::Down,
            confirm: KeyCode::Enter,
            quick_jump_nonlatin: KeyCode::PageDown,
            quick_jump_symbol: KeyCode::PageUp,
        }
    }
}

impl KeyBindings {
    pub fn key_for(&self, action: InputAction) -> KeyCode {
        match action {
            InputAction::PressLetter(c) => KeyCode::Char(c.to_ascii_lowercase()),
            InputAction::QuickJumpNonlatin => self.quick_jump_nonlatin,
            InputAction::QuickJumpSymbol => self.quick_jump_symbol,
            InputAction::MoveUp => self.up,
            InputAction::MoveDown => self.down,
            InputAction::Confirm => self.confirm,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Window title candidates, matched as case-insensitive substrings.
    pub window_titles: Vec<String>,
    pub focus: FocusPolicy,
    pub bindings: KeyBindings,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            window_titles: vec!["DJMAX RESPECT V".to_string()],
            focus: FocusPolicy::default(),
            bindings: KeyBindings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Completed,
    Aborted,
    Cancelled,
}

/// One key press as executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentKey {
    pub key: KeyCode,
    #[serde(rename = "delayAfterMs", with = "crate::millis")]
    pub delay_after: Duration,
}

/// Result of one dispatch attempt. Returned to the caller, never retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub status: DispatchStatus,
    /// Steps whose every press was sent.
    pub completed_steps: usize,
    pub total_steps: usize,
    /// Discrete key presses sent; the best estimate of cursor movement.
    pub keys_sent: usize,
    /// Step being executed when dispatch stopped (or the final step).
    pub last_step: Option<InputStep>,
    pub error: Option<String>,
    pub dry_run: bool,
    pub backend: String,
    pub window: Option<WindowHandle>,
    pub sent: Vec<SentKey>,
    #[serde(rename = "elapsedMs", with = "crate::millis")]
    pub elapsed: Duration,
}

impl DispatchOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == DispatchStatus::Completed
    }

    /// Turn `Aborted` / `Cancelled` outcomes into the matching [`NavError`].
    pub fn into_result(self) -> Result<DispatchOutcome, NavError> {
        match self.status {
            DispatchStatus::Completed => Ok(self),
            DispatchStatus::Aborted => Err(NavError::DispatchAborted {
                completed_steps: self.completed_steps,
                keys_sent: self.keys_sent,
                last_step: self.last_step,
                reason: self.error.unwrap_or_else(|| "unknown".to_string()),
            }),
            DispatchStatus::Cancelled => Err(NavError::Cancelled {
                completed_steps: self.completed_steps,
                keys_sent: self.keys_sent,
            }),
        }
    }
}

enum Focus {
    Acquired(WindowHandle),
    Cancelled,
    Exhausted,
}

/// Tracks progress through a plan while dispatching.
struct Progress {
    started: Instant,
    completed_steps: usize,
    keys_sent: usize,
    last_step: Option<InputStep>,
    sent: Vec<SentKey>,
}

pub struct InputDispatcher {
    backend: Box<dyn InputBackend>,
    config: DispatcherConfig,
}

impl InputDispatcher {
    pub fn new(backend: Box<dyn InputBackend>, config: DispatcherConfig) -> Self {
        Self { backend, config }
    }

    /// Dispatcher over a fresh [`DryRunBackend`].
    pub fn dry_run(config: DispatcherConfig) -> Self {
        Self::new(Box::new(DryRunBackend::new()), config)
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Execute `plan`. `WindowNotFound` is the only error; partial execution is
    /// reported through the outcome's status.
    pub fn dispatch(
        &mut self,
        plan: &NavigationPlan,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome, NavError> {
        let mut progress = Progress {
            started: Instant::now(),
            completed_steps: 0,
            keys_sent: 0,
            last_step: None,
            sent: Vec::with_capacity(plan.total_key_presses() as usize),
        };

        debug!("Dispatch state: AcquiringFocus ({})", self.backend.name());
        let window = match self.acquire_focus(cancel) {
            Focus::Acquired(window) => window,
            Focus::Cancelled => {
                info!("Dispatch cancelled while acquiring focus");
                return Ok(self.outcome(plan, progress, DispatchStatus::Cancelled, None, None));
            }
            Focus::Exhausted => {
                warn!(
                    "No window matching {:?} after {} attempt(s)",
                    self.config.window_titles, self.config.focus.attempts
                );
                return Err(NavError::WindowNotFound {
                    attempts: self.config.focus.attempts.max(1),
                    candidates: self.config.window_titles.join(", "),
                });
            }
        };

        debug!("Dispatch state: Dispatching to '{}'", window.title);
        for step in &plan.steps {
            progress.last_step = Some(*step);
            let key = self.config.bindings.key_for(step.action);

            for _ in 0..step.repeat {
                if cancel.is_cancelled() {
                    info!(
                        "Dispatch cancelled after {} key(s) for '{}'",
                        progress.keys_sent, plan.song.title
                    );
                    return Ok(self.outcome(
                        plan,
                        progress,
                        DispatchStatus::Cancelled,
                        None,
                        Some(window),
                    ));
                }

                if let Err(e) = self.backend.send_key(key) {
                    error!(
                        "Key {} failed after {} key(s) for '{}': {}",
                        key, progress.keys_sent, plan.song.title, e
                    );
                    return Ok(self.outcome(
                        plan,
                        progress,
                        DispatchStatus::Aborted,
                        Some(e.to_string()),
                        Some(window),
                    ));
                }
                progress.keys_sent += 1;
                progress.sent.push(SentKey {
                    key,
                    delay_after: step.delay_after,
                });
                debug!("Sent {} ({})", key, step.action);

                // Wakes early on cancel; the next press observes it.
                cancel.sleep(step.delay_after);
            }
            progress.completed_steps += 1;
        }

        let outcome = self.outcome(plan, progress, DispatchStatus::Completed, None, Some(window));
        info!(
            "Dispatch completed for '{}': {} key(s) in {}ms",
            plan.song.title,
            outcome.keys_sent,
            outcome.elapsed.as_millis()
        );
        Ok(outcome)
    }

    fn acquire_focus(&mut self, cancel: &CancellationToken) -> Focus {
        let policy = self.config.focus.clone();
        let attempts = policy.attempts.max(1);

        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                return Focus::Cancelled;
            }

            match self.backend.find_window(&self.config.window_titles) {
                Ok(Some(window)) => match self.backend.focus_window(&window) {
                    Ok(()) => {
                        if cancel.sleep(policy.settle) {
                            return Focus::Cancelled;
                        }
                        return Focus::Acquired(window);
                    }
                    Err(e) => warn!("Focus attempt {}/{} failed: {}", attempt, attempts, e),
                },
                Ok(None) => debug!("Focus attempt {}/{}: no matching window", attempt, attempts),
                Err(e) => warn!("Window search {}/{} failed: {}", attempt, attempts, e),
            }

            if attempt < attempts && cancel.sleep(policy.backoff(attempt)) {
                return Focus::Cancelled;
            }
        }
        Focus::Exhausted
    }

    fn outcome(
        &self,
        plan: &NavigationPlan,
        progress: Progress,
        status: DispatchStatus,
        error: Option<String>,
        window: Option<WindowHandle>,
    ) -> DispatchOutcome {
        DispatchOutcome {
            status,
            completed_steps: progress.completed_steps,
            total_steps: plan.steps.len(),
            keys_sent: progress.keys_sent,
            last_step: progress.last_step,
            error,
            dry_run: !self.backend.injects_input(),
            backend: self.backend.name().to_string(),
            window,
            sent: progress.sent,
            elapsed: progress.started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SongCatalog, SongRecord};
    use crate::error::BackendError;
    use crate::planner::{NavigationPlanner, PlannerConfig};
    use crate::query::NavigationQuery;
    use std::sync::{Arc, Mutex};

    /// Scripted backend: finds the window after `hidden_for` searches and
    /// fails the send numbered `fail_at` (1-based).
    #[derive(Clone, Default)]
    struct Scripted {
        hidden_for: u32,
        fail_at: Option<usize>,
        searches: Arc<Mutex<u32>>,
        sent: Arc<Mutex<Vec<KeyCode>>>,
    }

    impl InputBackend for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn find_window(&mut self, _: &[String]) -> Result<Option<WindowHandle>, BackendError> {
            let mut searches = self.searches.lock().unwrap();
            *searches += 1;
            if *searches > self.hidden_for {
                Ok(Some(WindowHandle {
                    raw: 42,
                    title: "Game".into(),
                }))
            } else {
                Ok(None)
            }
        }

        fn focus_window(&mut self, _: &WindowHandle) -> Result<(), BackendError> {
            Ok(())
        }

        fn send_key(&mut self, key: KeyCode) -> Result<(), BackendError> {
            let mut sent = self.sent.lock().unwrap();
            if self.fail_at == Some(sent.len() + 1) {
                return Err(BackendError::Os("SendInput blocked".into()));
            }
            sent.push(key);
            Ok(())
        }
    }

    fn fast_config() -> DispatcherConfig {
        DispatcherConfig {
            window_titles: vec!["Game".into()],
            focus: FocusPolicy {
                attempts: 3,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
                settle: Duration::ZERO,
            },
            bindings: KeyBindings::default(),
        }
    }

    fn plan_for(title: &str) -> NavigationPlan {
        let catalog = SongCatalog::load(
            ["Airwave", "B1", "B2", "B3", "아리랑"]
                .iter()
                .map(|t| SongRecord::titled(t)),
        )
        .unwrap();
        let config = PlannerConfig {
            entry_delay: Duration::from_millis(1),
            move_delay: Duration::from_millis(1),
            ..PlannerConfig::default()
        };
        NavigationPlanner::new(Arc::new(catalog), config)
            .compute_plan(&NavigationQuery::by_title(title))
            .unwrap()
    }

    #[test]
    fn test_focus_backoff_is_bounded() {
        let policy = FocusPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(10), Duration::from_millis(800));
        // 100 + 200 + 400 + 800 + settle 300
        assert_eq!(policy.budget(), Duration::from_millis(1800));
    }

    #[test]
    fn test_completed_dispatch_sends_plan_in_order() {
        let backend = Scripted::default();
        let sent = backend.sent.clone();
        let mut dispatcher = InputDispatcher::new(Box::new(backend), fast_config());

        let outcome = dispatcher
            .dispatch(&plan_for("B3"), &CancellationToken::new())
            .unwrap();
        assert_eq!(outcome.status, DispatchStatus::Completed);
        assert_eq!(outcome.completed_steps, 2);
        assert_eq!(outcome.keys_sent, 3);
        assert!(!outcome.dry_run);
        assert_eq!(
            *sent.lock().unwrap(),
            vec![KeyCode::Char('b'), KeyCode::Down, KeyCode::Down]
        );
    }

    #[test]
    fn test_nonlatin_uses_quick_jump_binding() {
        let mut dispatcher = InputDispatcher::dry_run(fast_config());
        let outcome = dispatcher
            .dispatch(&plan_for("아리랑"), &CancellationToken::new())
            .unwrap();
        let keys: Vec<KeyCode> = outcome.sent.iter().map(|s| s.key).collect();
        assert_eq!(keys, vec![KeyCode::Char('a'), KeyCode::PageDown]);
        assert!(outcome.dry_run);
    }

    #[test]
    fn test_window_found_after_retries() {
        let backend = Scripted {
            hidden_for: 2,
            ..Scripted::default()
        };
        let mut dispatcher = InputDispatcher::new(Box::new(backend), fast_config());
        let outcome = dispatcher
            .dispatch(&plan_for("Airwave"), &CancellationToken::new())
            .unwrap();
        assert!(outcome.is_completed());
        assert_eq!(outcome.window.map(|w| w.raw), Some(42));
    }

    #[test]
    fn test_window_not_found_sends_nothing() {
        let backend = Scripted {
            hidden_for: u32::MAX,
            ..Scripted::default()
        };
        let searches = backend.searches.clone();
        let sent = backend.sent.clone();
        let mut dispatcher = InputDispatcher::new(Box::new(backend), fast_config());

        let err = dispatcher
            .dispatch(&plan_for("B3"), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, NavError::WindowNotFound { attempts: 3, .. }));
        assert!(err.is_retry_safe());
        assert_eq!(*searches.lock().unwrap(), 3);
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_send_failure_aborts_with_progress() {
        let backend = Scripted {
            fail_at: Some(3),
            ..Scripted::default()
        };
        let mut dispatcher = InputDispatcher::new(Box::new(backend), fast_config());

        let outcome = dispatcher
            .dispatch(&plan_for("B3"), &CancellationToken::new())
            .unwrap();
        assert_eq!(outcome.status, DispatchStatus::Aborted);
        assert_eq!(outcome.keys_sent, 2);
        assert_eq!(outcome.completed_steps, 1);
        assert_eq!(outcome.last_step.map(|s| s.action), Some(InputAction::MoveDown));
        assert!(outcome.error.as_deref().unwrap().contains("SendInput blocked"));

        let err = outcome.into_result().unwrap_err();
        assert!(matches!(
            err,
            NavError::DispatchAborted {
                completed_steps: 1,
                keys_sent: 2,
                ..
            }
        ));
        assert!(!err.is_retry_safe());
    }

    #[test]
    fn test_cancel_before_dispatch() {
        let token = CancellationToken::new();
        token.cancel();
        let mut dispatcher = InputDispatcher::dry_run(fast_config());
        let outcome = dispatcher.dispatch(&plan_for("B3"), &token).unwrap();
        assert_eq!(outcome.status, DispatchStatus::Cancelled);
        assert_eq!(outcome.keys_sent, 0);
        assert!(outcome.into_result().unwrap_err().is_retry_safe());
    }

    #[test]
    fn test_cancel_mid_plan_stops_between_keys() {
        let catalog = SongCatalog::load(
            (0..20).map(|i| SongRecord::titled(&format!("Song {}", i))),
        )
        .unwrap();
        let config = PlannerConfig {
            entry_delay: Duration::from_millis(5),
            move_delay: Duration::from_millis(50),
            ..PlannerConfig::default()
        };
        let plan = NavigationPlanner::new(Arc::new(catalog), config)
            .compute_plan(&NavigationQuery::by_title("Song 19"))
            .unwrap();

        let token = CancellationToken::new();
        let remote = token.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(80));
            remote.cancel();
        });

        let mut dispatcher = InputDispatcher::dry_run(fast_config());
        let outcome = dispatcher.dispatch(&plan, &token).unwrap();
        canceller.join().unwrap();

        assert_eq!(outcome.status, DispatchStatus::Cancelled);
        assert!(outcome.keys_sent >= 1);
        assert!(outcome.keys_sent < 20);
        assert_eq!(outcome.sent.len(), outcome.keys_sent);
    }
}
