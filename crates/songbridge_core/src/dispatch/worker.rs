//! Dispatch Worker - dedicated thread that owns the real input backend.
//!
//! Jobs arrive over a std channel and run one at a time, so steps of two
//! plans can never interleave even if the gate were bypassed. Each job carries
//! its gate permit; the permit is released as soon as the backend is done,
//! before the caller is answered.

use super::{DispatchOutcome, InputDispatcher};
use crate::cancel::CancellationToken;
use crate::error::NavError;
use crate::gate::GatePermit;
use crate::plan::NavigationPlan;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

type DispatchReply = Result<DispatchOutcome, NavError>;

struct DispatchJob {
    plan: NavigationPlan,
    cancel: CancellationToken,
    permit: GatePermit,
    respond: Sender<DispatchReply>,
}

/// Cloneable handle for submitting plans to the worker.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: Sender<DispatchJob>,
}

impl DispatchHandle {
    /// Queue `plan` for execution. The returned receiver yields exactly one reply.
    pub fn submit(
        &self,
        plan: NavigationPlan,
        cancel: CancellationToken,
        permit: GatePermit,
    ) -> Result<Receiver<DispatchReply>, NavError> {
        let (respond, reply) = mpsc::channel();
        self.tx
            .send(DispatchJob {
                plan,
                cancel,
                permit,
                respond,
            })
            .map_err(|_| NavError::WorkerUnavailable("dispatch worker has stopped".into()))?;
        Ok(reply)
    }

    /// Submit and block until the worker replies.
    pub fn dispatch(
        &self,
        plan: NavigationPlan,
        cancel: CancellationToken,
        permit: GatePermit,
    ) -> DispatchReply {
        self.submit(plan, cancel, permit)?.recv().map_err(|_| {
            NavError::WorkerUnavailable("dispatch worker stopped before replying".into())
        })?
    }
}

impl std::fmt::Debug for DispatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchHandle")
            .field("channel", &"<std::sync::mpsc::Sender>")
            .finish()
    }
}

pub struct DispatchWorker {
    rx: Receiver<DispatchJob>,
    dispatcher: InputDispatcher,
}

impl DispatchWorker {
    /// Start the worker on a thread named `input-dispatch`.
    ///
    /// The thread exits once every [`DispatchHandle`] has been dropped.
    pub fn spawn(dispatcher: InputDispatcher) -> Result<(DispatchHandle, JoinHandle<()>), NavError> {
        let (tx, rx) = mpsc::channel();
        let worker = Self { rx, dispatcher };
        let join = thread::Builder::new()
            .name("input-dispatch".to_string())
            .spawn(move || worker.run_loop())
            .map_err(|e| NavError::WorkerUnavailable(format!("failed to spawn worker: {}", e)))?;
        Ok((DispatchHandle { tx }, join))
    }

    fn run_loop(mut self) {
        info!(
            "Dispatch worker started (backend: {})",
            self.dispatcher.backend_name()
        );
        while let Ok(job) = self.rx.recv() {
            self.execute(job);
        }
        info!("Dispatch worker stopped (channel closed)");
    }

    fn execute(&mut self, job: DispatchJob) {
        let DispatchJob {
            plan,
            cancel,
            permit,
            respond,
        } = job;

        debug!("Worker picked up plan for '{}'", plan.song.title);
        let result = self.dispatcher.dispatch(&plan, &cancel);
        drop(permit);

        if respond.send(result).is_err() {
            debug!("Caller went away before the dispatch reply for '{}'", plan.song.title);
        }
    }
}
