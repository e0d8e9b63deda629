//! SongBridge core
//!
//! Turns a song selection coming from the browser into keyboard input for an
//! already-running game window:
//!
//! - [`catalog`]: ordinal song list, group classification and lookups
//! - [`planner`]: deterministic input plans computed from catalog data only
//! - [`dispatch`]: executes a plan against a window (focus, timing, cancel, dry-run)
//! - [`gate`]: single-writer admission around the shared game cursor
//! - [`bridge`]: the call-and-result facade used by the HTTP server and CLI
//!
//! The game's cursor is never read back. Every guarantee comes from planning
//! deterministically and letting only one dispatch touch the window at a time.

pub mod bridge;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod keys;
pub mod plan;
pub mod planner;
pub mod query;
pub mod text;

mod millis;

pub use bridge::{BridgeSettings, BridgeStatus, DispatchOptions, NavigationBridge, NavigationReport};
pub use cancel::CancellationToken;
pub use catalog::{Song, SongCatalog, SongRecord};
pub use config::BridgeConfig;
pub use dispatch::{
    DispatchOutcome, DispatchStatus, DispatcherConfig, DryRunBackend, FocusPolicy, InputBackend,
    InputDispatcher, KeyBindings, WindowHandle,
};
pub use error::{BackendError, CatalogError, ConfigError, NavError};
pub use gate::{AdmissionPolicy, GatePermit, RequestGate};
pub use keys::KeyCode;
pub use plan::{InputAction, InputStep, NavigationPlan, PlanTrace};
pub use planner::{NavigationPlanner, PlannerConfig};
pub use query::NavigationQuery;
pub use text::GroupKey;

/// Result alias for request-path operations.
pub type Result<T> = std::result::Result<T, NavError>;
