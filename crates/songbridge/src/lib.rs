//! SongBridge binary support: CLI definitions, bridge bootstrap and the HTTP
//! server the browser page talks to.

pub mod cli;
pub mod server;

use anyhow::{Context, Result};
use songbridge_core::catalog::load_csv;
use songbridge_core::dispatch::native_backend;
use songbridge_core::{BridgeConfig, DryRunBackend, InputBackend, NavigationBridge, SongCatalog};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Config file looked up in the SongBridge home when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "songbridge.toml";

/// Load the config file (explicit path, else `<home>/songbridge.toml` when it
/// exists, else defaults).
pub fn load_config(explicit: Option<&Path>) -> Result<BridgeConfig> {
    if let Some(path) = explicit {
        return BridgeConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    let default_path = default_config_path();
    if default_path.exists() {
        info!("Using config {}", default_path.display());
        return BridgeConfig::load(&default_path)
            .with_context(|| format!("Failed to load config {}", default_path.display()));
    }
    Ok(BridgeConfig::default())
}

pub fn default_config_path() -> PathBuf {
    songbridge_logging::songbridge_home().join(DEFAULT_CONFIG_FILE)
}

pub fn load_catalog(config: &BridgeConfig) -> Result<SongCatalog> {
    load_csv(&config.catalog_path).with_context(|| {
        format!(
            "Failed to load song catalog {}",
            config.catalog_path.display()
        )
    })
}

/// Load the catalog, pick the input backend and start the bridge.
///
/// Falls back to dry-run when the platform cannot inject input.
pub fn start_bridge(config: &BridgeConfig) -> Result<NavigationBridge> {
    let mut settings = config.settings().context("Invalid configuration")?;
    let catalog = load_catalog(config)?;

    let backend: Box<dyn InputBackend> = if settings.dry_run {
        Box::new(DryRunBackend::new())
    } else {
        match native_backend() {
            Ok(backend) => backend,
            Err(e) => {
                warn!("{}; running in dry-run mode", e);
                settings.dry_run = true;
                Box::new(DryRunBackend::new())
            }
        }
    };

    NavigationBridge::start(catalog, settings, backend).context("Failed to start navigation bridge")
}
