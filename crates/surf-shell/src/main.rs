//! Surf: browser shell core
//!
//! Headless entry point for the settings store and the request filter.
//! Initializes the global allocator, sets up logging, and runs one
//! command against the per-user data directory.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use surf_config::{default_data_dir, rule_cache_file, ConfigStore, SettingValue, DATA_DIR_ENV};
use surf_network::{
    default_tracking_domains, FilterCoordinator, FilterState, InterceptAction, InterceptedRequest, ProfileKind,
    RuleListCache, RuleListFetcher, RuleSet, TelemetrySink,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

// Use mimalloc as the global allocator for reduced memory fragmentation
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "surf", version, about = "Browser shell settings and request filtering")]
struct Cli {
    /// Data directory (settings, filter list cache)
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Settings management
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Run URLs through the request filter
    Check(CheckArgs),
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print one setting
    Get { key: String },

    /// Change a setting (value parsed as JSON, else taken as a string)
    Set { key: String, value: String },

    /// Print the whole settings tree
    Show,

    /// Write all settings to a file
    Export { file: PathBuf },

    /// Merge settings from a file and save
    Import { file: PathBuf },

    /// Restore defaults and save
    Reset,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Request URLs
    #[arg(required = true)]
    urls: Vec<String>,

    /// Engine resource-type code (0 = document, 3 = script, 12 = xhr, ...)
    #[arg(short, long, default_value_t = 3)]
    kind: i32,

    /// URL of the page issuing the requests
    #[arg(short, long)]
    first_party: Option<String>,

    /// Local filter list instead of the configured ones
    #[arg(short, long, conflicts_with = "builtin")]
    list: Option<PathBuf>,

    /// Use the built-in tracker domains
    #[arg(long)]
    builtin: bool,

    /// Run as the private profile
    #[arg(long)]
    private: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (stderr, so command output stays clean)
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    info!("Using data directory {}", data_dir.display());

    let config = Arc::new(ConfigStore::open(&data_dir));

    match cli.command {
        Command::Settings { action } => settings(&config, action),
        Command::Check(args) => check(config, &data_dir, args).await,
    }
}

fn settings(config: &ConfigStore, action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Get { key } => {
            let value = config
                .get(&key)
                .with_context(|| format!("Unknown setting: {}", key))?;
            println!("{}", value);
        }
        SettingsAction::Set { key, value } => {
            let parsed = serde_json::from_str::<serde_json::Value>(&value)
                .ok()
                .and_then(|json| SettingValue::from_json(&json))
                .unwrap_or(SettingValue::Str(value));
            config
                .set(&key, parsed)
                .with_context(|| format!("Rejected value for {}", key))?;
            config.save().context("Failed to save settings")?;
            if let Some(stored) = config.get(&key) {
                println!("{} = {}", key, stored);
            }
        }
        SettingsAction::Show => {
            let tree = config.snapshot();
            println!("{}", serde_json::to_string_pretty(&*tree)?);
        }
        SettingsAction::Export { file } => {
            config
                .export_to(&file)
                .with_context(|| format!("Failed to export settings to {}", file.display()))?;
            info!("Settings exported to {}", file.display());
        }
        SettingsAction::Import { file } => {
            config
                .import_from(&file)
                .with_context(|| format!("Failed to import settings from {}", file.display()))?;
            info!("Settings imported from {}", file.display());
        }
        SettingsAction::Reset => {
            config.reset_to_defaults().context("Failed to reset settings")?;
            info!("Settings reset to defaults");
        }
    }
    Ok(())
}

async fn check(config: Arc<ConfigStore>, data_dir: &std::path::Path, args: CheckArgs) -> Result<()> {
    let max_age = config.get_int("adblock_cache_max_age").unwrap_or(86_400).max(0) as u64;
    let capacity = config.get_int("network_log_capacity").unwrap_or(5_000).max(1) as usize;

    let fetcher = RuleListFetcher::with_defaults()
        .with_cache(RuleListCache::new(rule_cache_file(data_dir), Duration::from_secs(max_age)));
    let profile = if args.private { ProfileKind::Private } else { ProfileKind::Standard };
    let coordinator = FilterCoordinator::new(
        profile,
        Arc::clone(&config),
        Arc::new(fetcher),
        Arc::new(TelemetrySink::with_capacity(capacity)),
    );

    if let Some(list) = &args.list {
        let file = std::fs::File::open(list)
            .with_context(|| format!("Failed to open filter list {}", list.display()))?;
        let set = RuleSet::from_reader(&list.display().to_string(), file)
            .with_context(|| format!("Failed to compile filter list {}", list.display()))?;
        coordinator.install(set);
    } else if args.builtin {
        let lines: Vec<String> = default_tracking_domains()
            .into_iter()
            .map(|domain| format!("||{}^", domain))
            .collect();
        coordinator.install(RuleSet::compile("built-in", lines)?);
    } else if let Err(e) = coordinator.refresh().await {
        warn!("Filter lists unavailable: {}", e);
    }

    if let FilterState::Disabled(reason) = coordinator.state() {
        warn!("Filtering disabled ({}), every request is allowed", reason);
    }

    let mut blocked = 0;
    for url in &args.urls {
        let mut request = InterceptedRequest::new(url.as_str(), args.kind);
        if let Some(first_party) = &args.first_party {
            request = request.with_first_party(first_party.as_str());
        }

        let decision = coordinator.decide(&request);
        let action = coordinator.intercept(&request);
        if action == InterceptAction::Block {
            blocked += 1;
        }
        println!("{:<5} {} ({}, reason: {:?})", format!("{:?}", action), url, request.kind(), decision.reason);
    }

    let records = coordinator.telemetry().snapshot();
    println!("{}", serde_json::to_string_pretty(&records)?);

    let (total, _, check_ns) = coordinator.stats().totals();
    info!("{} of {} requests blocked ({} ns spent deciding)", blocked, total, check_ns);
    Ok(())
}
