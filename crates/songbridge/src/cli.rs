//! Command-line interface.

use crate::server::{self, AppState};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use songbridge_core::{BridgeConfig, DispatchOptions, GroupKey, NavigationPlanner, NavigationQuery};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "songbridge",
    version,
    about = "Move the game's song cursor to a song picked in the browser"
)]
pub struct Cli {
    /// Config file (TOML). Defaults to ~/.songbridge/songbridge.toml when present
    #[arg(long, global = true, env = "SONGBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Song list CSV, overrides `catalog_path` from the config
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Log key presses instead of sending them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only warnings and errors on stderr
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP bridge for the browser page
    Serve {
        /// Bind address, overrides `server.host`
        #[arg(long)]
        host: Option<String>,

        /// Port, overrides `server.port`
        #[arg(long)]
        port: Option<u16>,
    },

    /// List the catalog with group assignments
    List {
        /// Only this group: a letter, `non-latin` or `symbol`
        #[arg(long)]
        group: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Show the key plan for a song without sending anything
    Plan(QueryArgs),

    /// Navigate to a song once
    Go(QueryArgs),

    /// Print the effective configuration
    Config {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Song title (normalized exact match, then substring)
    pub title: Option<String>,

    /// Song id from the catalog; wins over the title when it resolves
    #[arg(long)]
    pub id: Option<String>,

    /// Tile text such as "001. Binary Star", tried after id and title
    #[arg(long)]
    pub text: Option<String>,

    #[arg(long)]
    pub json: bool,
}

impl QueryArgs {
    fn query(&self) -> NavigationQuery {
        NavigationQuery {
            id: self.id.clone(),
            title: self.title.clone(),
            text: self.text.clone(),
        }
    }
}

impl Cli {
    /// Config file merged with command-line overrides.
    pub fn effective_config(&self) -> Result<BridgeConfig> {
        let mut config = crate::load_config(self.config.as_deref())?;
        if let Some(catalog) = &self.catalog {
            config.catalog_path = catalog.clone();
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if let Command::Serve { host, port } = &self.command {
            if let Some(host) = host {
                config.server.host = host.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
        }
        Ok(config)
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let config = cli.effective_config()?;
    match &cli.command {
        Command::Serve { .. } => run_serve(config),
        Command::List { group, json } => run_list(&config, group.as_deref(), *json),
        Command::Plan(args) => run_plan(&config, args),
        Command::Go(args) => run_go(&config, args),
        Command::Config { json } => run_config(&config, *json),
    }
}

fn run_serve(config: BridgeConfig) -> Result<()> {
    let bridge = crate::start_bridge(&config)?;
    let state = AppState {
        bridge: Arc::new(bridge),
        catalog_path: config.catalog_path.clone(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("songbridge-http")
        .build()
        .context("Failed to build tokio runtime")?;
    runtime.block_on(server::serve(state, &config.server))
}

fn run_list(config: &BridgeConfig, group: Option<&str>, json: bool) -> Result<()> {
    let catalog = crate::load_catalog(config)?;
    let filter = group.map(parse_group).transpose()?;
    let songs: Vec<_> = catalog
        .songs()
        .iter()
        .filter(|song| filter.map_or(true, |key| song.group_key == key))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&songs)?);
        return Ok(());
    }

    println!("{:>5}  {:<9} {:>4}  {:<8} TITLE", "POS", "GROUP", "IDX", "ID");
    for song in &songs {
        println!(
            "{:>5}  {:<9} {:>4}  {:<8} {}",
            song.position,
            song.group_key.as_label(),
            song.sequence_index,
            song.id.as_deref().unwrap_or("-"),
            song.title
        );
    }
    println!("{} song(s)", songs.len());
    Ok(())
}

fn run_plan(config: &BridgeConfig, args: &QueryArgs) -> Result<()> {
    let settings = config.settings().context("Invalid configuration")?;
    let planner = NavigationPlanner::new(Arc::new(crate::load_catalog(config)?), settings.planner);
    let plan = planner.compute_plan(&args.query())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("{}", plan.song.label());
    for (index, step) in plan.steps.iter().enumerate() {
        println!(
            "  {:>2}. {:<22} x{:<3} then {}ms",
            index + 1,
            step.action.to_string(),
            step.repeat,
            step.delay_after.as_millis()
        );
    }
    println!("{}", plan.trace);
    Ok(())
}

fn run_go(config: &BridgeConfig, args: &QueryArgs) -> Result<()> {
    let bridge = crate::start_bridge(config)?;
    let report = bridge.navigate(&args.query(), DispatchOptions::default())?;
    info!(
        "Moved to '{}' with {} key(s)",
        report.song.title, report.outcome.keys_sent
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let mode = if report.outcome.dry_run { " (dry run)" } else { "" };
        println!(
            "{} -> {} key(s) in {}ms{}",
            report.song.label(),
            report.outcome.keys_sent,
            report.outcome.elapsed.as_millis(),
            mode
        );
    }
    Ok(())
}

fn run_config(config: &BridgeConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!("{}", config.to_toml_string()?);
    }
    Ok(())
}

/// Parse a group name as printed by `list`.
pub fn parse_group(value: &str) -> Result<GroupKey> {
    let value = value.trim().to_lowercase();
    match value.as_str() {
        "non-latin" | "nonlatin" => Ok(GroupKey::NonLatin),
        "symbol" | "digit" | "symbol-digit" => Ok(GroupKey::SymbolDigit),
        _ => {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_lowercase() => Ok(GroupKey::Letter(c)),
                _ => bail!("Unknown group '{}': expected a-z, non-latin or symbol", value),
            }
        }
    }
}
