//! Navigation Bridge - call-and-result facade over catalog, planner, gate and
//! dispatcher.
//!
//! Transports (HTTP, CLI) only ever talk to [`NavigationBridge`]:
//!
//! ```text
//! navigate(query) = gate.admit -> planner.compute_plan -> worker.dispatch
//! ```
//!
//! Real dispatches run on the `input-dispatch` worker thread; the calling
//! thread blocks until the reply arrives. Dry runs skip the gate and the
//! worker and execute on the calling thread against a fresh dry-run backend.

use crate::cancel::CancellationToken;
use crate::catalog::{load_csv, Song, SongCatalog};
use crate::dispatch::{
    DispatchHandle, DispatchOutcome, DispatchWorker, DispatcherConfig, InputBackend,
    InputDispatcher,
};
use crate::error::NavError;
use crate::gate::{AdmissionPolicy, GatePermit, RequestGate};
use crate::plan::{InputStep, NavigationPlan, PlanTrace};
use crate::planner::{NavigationPlanner, PlannerConfig};
use crate::query::NavigationQuery;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Runtime settings, usually built from [`crate::BridgeConfig::settings`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeSettings {
    pub planner: PlannerConfig,
    pub dispatcher: DispatcherConfig,
    pub admission: AdmissionPolicy,
    /// Default for requests that don't say whether they are dry runs.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// `None` falls back to [`BridgeSettings::dry_run`].
    pub dry_run: Option<bool>,
    /// Token the caller keeps to cancel this dispatch.
    pub cancel: Option<CancellationToken>,
}

impl DispatchOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: Some(true),
            cancel: None,
        }
    }

    pub fn live() -> Self {
        Self {
            dry_run: Some(false),
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Result object returned to transports.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationReport {
    pub song: Song,
    pub steps: Vec<InputStep>,
    pub trace: PlanTrace,
    pub outcome: DispatchOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStatus {
    pub song_count: usize,
    /// Non-empty groups in the catalog.
    pub groups: usize,
    pub dry_run: bool,
    pub busy: bool,
    pub waiting: usize,
    pub backend: String,
}

pub struct NavigationBridge {
    catalog: RwLock<Arc<SongCatalog>>,
    settings: BridgeSettings,
    gate: RequestGate,
    worker: DispatchHandle,
    backend: &'static str,
    /// Token of the dispatch currently on the worker, for `cancel_active`.
    active: Mutex<Option<CancellationToken>>,
}

impl NavigationBridge {
    /// Build the bridge and start the dispatch worker over `backend`.
    pub fn start(
        catalog: SongCatalog,
        settings: BridgeSettings,
        backend: Box<dyn InputBackend>,
    ) -> Result<Self, NavError> {
        let backend_name = backend.name();
        let dispatcher = InputDispatcher::new(backend, settings.dispatcher.clone());
        let (worker, _join) = DispatchWorker::spawn(dispatcher)?;

        info!(
            "Navigation bridge ready: {} songs, backend {}, gate {:?}",
            catalog.len(),
            backend_name,
            settings.admission
        );

        Ok(Self {
            catalog: RwLock::new(Arc::new(catalog)),
            gate: RequestGate::new(settings.admission),
            settings,
            worker,
            backend: backend_name,
            active: Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    /// Snapshot of the current catalog.
    pub fn catalog(&self) -> Arc<SongCatalog> {
        self.catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn planner(&self) -> NavigationPlanner {
        NavigationPlanner::new(self.catalog(), self.settings.planner.clone())
    }

    pub fn resolve(&self, query: &NavigationQuery) -> Result<Song, NavError> {
        self.catalog().resolve(query).cloned()
    }

    pub fn plan(&self, song: &Song) -> NavigationPlan {
        self.planner().plan(song)
    }

    pub fn plan_query(&self, query: &NavigationQuery) -> Result<NavigationPlan, NavError> {
        self.planner().compute_plan(query)
    }

    /// Execute an already computed plan.
    ///
    /// Real dispatches pass through the gate; `Aborted` and `Cancelled`
    /// outcomes come back as `DispatchAborted` / `Cancelled` errors.
    pub fn dispatch(
        &self,
        plan: NavigationPlan,
        options: DispatchOptions,
    ) -> Result<DispatchOutcome, NavError> {
        let dry_run = options.dry_run.unwrap_or(self.settings.dry_run);
        let cancel = options.cancel.unwrap_or_default();
        if dry_run {
            return self.dispatch_dry(&plan, &cancel);
        }
        let permit = self.gate.admit()?;
        self.dispatch_admitted(plan, cancel, permit)
    }

    /// Resolve, plan and dispatch one query.
    ///
    /// Admission happens first, so a busy bridge answers `Busy` without
    /// looking at the query.
    pub fn navigate(
        &self,
        query: &NavigationQuery,
        options: DispatchOptions,
    ) -> Result<NavigationReport, NavError> {
        let dry_run = options.dry_run.unwrap_or(self.settings.dry_run);
        let cancel = options.cancel.unwrap_or_default();
        info!("Navigate request: {} (dry_run: {})", query, dry_run);

        let (plan, outcome) = if dry_run {
            let plan = self.plan_query(query)?;
            let outcome = self.dispatch_dry(&plan, &cancel)?;
            (plan, outcome)
        } else {
            let permit = self.gate.admit()?;
            let plan = self.plan_query(query)?;
            let outcome = self.dispatch_admitted(plan.clone(), cancel, permit)?;
            (plan, outcome)
        };

        Ok(NavigationReport {
            song: plan.song,
            steps: plan.steps,
            trace: plan.trace,
            outcome,
        })
    }

    /// Swap in a new catalog. In-flight plans keep the old one.
    pub fn reload(&self, catalog: SongCatalog) -> usize {
        let count = catalog.len();
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(catalog);
        info!("Catalog reloaded: {} songs", count);
        count
    }

    /// Re-read the catalog CSV. The current catalog stays on failure.
    pub fn reload_csv(&self, path: &Path) -> Result<usize, NavError> {
        match load_csv(path) {
            Ok(catalog) => Ok(self.reload(catalog)),
            Err(e) => {
                warn!("Catalog reload from {} failed: {}", path.display(), e);
                Err(e.into())
            }
        }
    }

    /// Request cancellation of the dispatch running on the worker.
    /// Returns false when nothing is running.
    pub fn cancel_active(&self) -> bool {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.as_ref() {
            Some(token) => {
                token.cancel();
                info!("Cancellation requested for active dispatch");
                true
            }
            None => {
                debug!("No active dispatch to cancel");
                false
            }
        }
    }

    pub fn status(&self) -> BridgeStatus {
        let catalog = self.catalog();
        BridgeStatus {
            song_count: catalog.len(),
            groups: catalog.groups().count(),
            dry_run: self.settings.dry_run,
            busy: self.gate.is_busy(),
            waiting: self.gate.waiting(),
            backend: self.backend.to_string(),
        }
    }

    fn dispatch_dry(
        &self,
        plan: &NavigationPlan,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome, NavError> {
        debug!("Dry-run dispatch for '{}'", plan.song.title);
        InputDispatcher::dry_run(self.settings.dispatcher.clone())
            .dispatch(plan, cancel)?
            .into_result()
    }

    fn dispatch_admitted(
        &self,
        plan: NavigationPlan,
        cancel: CancellationToken,
        permit: GatePermit,
    ) -> Result<DispatchOutcome, NavError> {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancel.clone());

        let result = self.worker.dispatch(plan, cancel.clone(), permit);

        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().map_or(false, |t| t.same_as(&cancel)) {
            *active = None;
        }
        drop(active);

        result?.into_result()
    }
}
