//! `tessera`: drive one zone from the terminal.
//!
//! Commands for a single entity are read from stdin, one per line, and the
//! messages that entity hears are printed to stdout. Logs go to stderr.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tessera_core::config::{StorageBackend, ZoneConfig};
use tessera_core::persistence::{SqliteSnapshotStore, open_store};
use tessera_core::{EntityId, Zone};
use tessera_content::{Admin, default_registry, world};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Tessera zone runner
#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Run a tessera zone from the terminal", long_about = None)]
#[command(version)]
struct Cli {
    /// Zone configuration file (TOML)
    #[arg(short, long, global = true, env = "TESSERA_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "TESSERA_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Restore (or seed) the zone and play as one entity
    Run {
        /// Entity to control; defaults to the first admin
        #[arg(short, long)]
        entity: Option<u64>,
    },
    /// Validate the configuration, the stock registry and the store
    Check,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ZoneConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ZoneConfig::default(),
    };
    init_tracing(&config.general.log_level, cli.json);

    match cli.command {
        Commands::Run { entity } => run(config, entity.map(EntityId)),
        Commands::Check => check(&config),
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_level.into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

fn run(config: ZoneConfig, entity: Option<EntityId>) -> anyhow::Result<()> {
    let registry = default_registry()?;
    let store = open_store(&config.persistence)?;
    let (mut zone, handle) = Zone::new(registry, config);

    if let Some(store) = &store {
        if let Some(report) = zone.load_from(store.as_ref())? {
            for skipped in &report.errors {
                warn!(
                    index = skipped.index,
                    entity = ?skipped.entity,
                    error = %skipped.error,
                    "Entity not restored"
                );
            }
        }
    }
    if zone.is_empty() {
        world::seed(&mut zone)?;
    }

    let entity = entity
        .or_else(|| zone.with_kind(Admin::KIND).first().copied())
        .context("no entity to control; pass --entity")?;
    anyhow::ensure!(zone.contains(entity), "entity {entity} does not exist");
    info!(zone = %zone.name(), entity = %entity, "Controlling entity");

    let stop = Arc::new(AtomicBool::new(false));

    // stdin → inbound queue. Not joined: it may be blocked on a read.
    {
        let inbound = handle.inbound.clone();
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            for line in std::io::stdin().lock().lines().map_while(Result::ok) {
                let line = line.trim();
                if line == "quit" {
                    break;
                }
                if !line.is_empty() && !inbound.push(entity, line) {
                    warn!(entity = %entity, "Inbound queue full; command dropped");
                }
            }
            stop.store(true, Ordering::Relaxed);
        });
    }

    // outbound channel → stdout. Ends once the zone drops its sender.
    let printer = {
        let outbound = handle.outbound.clone();
        thread::spawn(move || {
            for message in outbound.iter().filter(|m| m.entity == entity) {
                let text = serde_json::from_str::<String>(&message.payload)
                    .unwrap_or(message.payload);
                println!("{text}");
            }
        })
    };

    zone.perform(entity, "look");
    zone.run_until(&stop, store.as_deref())?;
    if let Some(store) = &store {
        store.checkpoint()?;
    }
    info!(counters = %zone.counters().snapshot().summary(), "Zone closed");

    drop(zone);
    if printer.join().is_err() {
        warn!("Output thread panicked");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

fn check(config: &ZoneConfig) -> anyhow::Result<()> {
    let registry = default_registry()?;
    println!(
        "registry: {} kinds, {} actions",
        registry.kinds().len(),
        registry.actions().count()
    );

    match config.persistence.backend {
        StorageBackend::Sqlite => {
            let store = SqliteSnapshotStore::open(&config.persistence.path, &config.persistence)?;
            anyhow::ensure!(
                store.integrity_check()?,
                "integrity check failed for {}",
                store.db_path().display()
            );
            println!("storage: {} ok", store.db_path().display());
        }
        StorageBackend::Json => {
            open_store(&config.persistence)?;
            println!("storage: {} ok", config.persistence.path.display());
        }
        StorageBackend::None => println!("storage: disabled"),
    }
    Ok(())
}
