//! Request Gate
//!
//! Single-writer admission around the game window. At most one permit exists
//! at a time; dropping it returns the gate to idle or hands it to the oldest
//! waiter.
//!
//! # Lock Invariant
//!
//! `state` is held only for slot/queue bookkeeping, never while a plan is
//! being dispatched. Waiters block on `turn`, not on the mutex.

use crate::error::NavError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// What happens to a request that arrives while another is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AdmissionPolicy {
    /// Fail with `Busy` immediately.
    #[default]
    Reject,
    /// Wait in FIFO order; `Busy` once `depth` requests are already waiting.
    Queue { depth: usize },
}

#[derive(Debug, Default)]
struct GateState {
    active: bool,
    waiting: VecDeque<u64>,
    next_ticket: u64,
}

#[derive(Debug)]
struct GateInner {
    policy: AdmissionPolicy,
    state: Mutex<GateState>,
    turn: Condvar,
}

impl GateInner {
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
pub struct RequestGate {
    inner: Arc<GateInner>,
}

impl RequestGate {
    pub fn new(policy: AdmissionPolicy) -> Self {
        Self {
            inner: Arc::new(GateInner {
                policy,
                state: Mutex::new(GateState::default()),
                turn: Condvar::new(),
            }),
        }
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.inner.policy
    }

    /// Admit one request. Blocks only under [`AdmissionPolicy::Queue`].
    pub fn admit(&self) -> Result<GatePermit, NavError> {
        let mut state = self.inner.lock();

        if !state.active && state.waiting.is_empty() {
            state.active = true;
            return Ok(self.permit());
        }

        let depth = match self.inner.policy {
            AdmissionPolicy::Reject => {
                debug!("Gate busy, rejecting request");
                return Err(NavError::Busy);
            }
            AdmissionPolicy::Queue { depth } => depth,
        };
        if state.waiting.len() >= depth {
            debug!("Gate queue full ({} waiting), rejecting request", depth);
            return Err(NavError::Busy);
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.waiting.push_back(ticket);
        debug!("Request queued behind active dispatch (ticket {})", ticket);

        let mut state = self
            .inner
            .turn
            .wait_while(state, |s| s.active || s.waiting.front() != Some(&ticket))
            .unwrap_or_else(PoisonError::into_inner);
        state.waiting.pop_front();
        state.active = true;
        Ok(self.permit())
    }

    /// Non-blocking admission regardless of policy.
    pub fn try_admit(&self) -> Result<GatePermit, NavError> {
        let mut state = self.inner.lock();
        if state.active || !state.waiting.is_empty() {
            return Err(NavError::Busy);
        }
        state.active = true;
        Ok(self.permit())
    }

    pub fn is_busy(&self) -> bool {
        self.inner.lock().active
    }

    /// Requests queued behind the active one.
    pub fn waiting(&self) -> usize {
        self.inner.lock().waiting.len()
    }

    fn permit(&self) -> GatePermit {
        GatePermit {
            inner: self.inner.clone(),
        }
    }
}

/// Proof of admission. Dropping it releases the gate.
#[derive(Debug)]
#[must_use = "the gate is released as soon as the permit is dropped"]
pub struct GatePermit {
    inner: Arc<GateInner>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        let mut state = self.inner.lock();
        state.active = false;
        drop(state);
        self.inner.turn.notify_all();
    }
}
