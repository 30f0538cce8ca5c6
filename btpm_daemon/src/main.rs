//! # btpm Daemon
//!
//! Hosts one profile manager per configured Bluetooth profile (Phone Book
//! Access, Hands-Free) over the simulated lower layers, registers the
//! configured inbound servers, and serves until a shutdown signal arrives.
//!
//! # Usage
//!
//! ```bash
//! # Run with the default config path
//! btpmd
//!
//! # Explicit config, verbose logging
//! btpmd --config config/btpm.toml -v
//!
//! # JSON log output
//! btpmd --config config/btpm.toml --json
//! ```

use btpm_common::config::{ConfigLoader, DaemonConfig, ProfileServerConfig};
use btpm_core::manager::ProfileManager;
use btpm_core::mailbox::{Mailbox, WorkItem};
use btpm_core::sim::{SimDevice, SimEngine, SimTransport};
use btpm_hfp::{HfpManager, HfpRole};
use btpm_pbap::PbapServer;
use clap::Parser;
use crossbeam_channel::unbounded;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// btpm daemon - Bluetooth profile connection manager
#[derive(Parser, Debug)]
#[command(name = "btpmd")]
#[command(version)]
#[command(about = "Bluetooth profile connection manager daemon")]
#[command(long_about = None)]
struct Args {
    /// Path to the daemon configuration file (btpm.toml).
    #[arg(short, long, default_value = "/etc/btpm/btpm.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

/// One hosted profile: its manager and the worker draining its queue.
struct HostedProfile {
    manager: Arc<ProfileManager>,
    mailbox: Mailbox,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("daemon startup failed: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("btpm daemon v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = DaemonConfig::load(&args.config)?;
    config.validate()?;
    info!(service = %config.shared.service_name, "configuration loaded");

    let mut profiles = Vec::new();
    let mut pbap_server = None;

    if let Some(pbap_config) = &config.pbap {
        let profile = host_profile("pbap")?;
        pbap_server = Some(register_pbap(&profile.manager, pbap_config)?);
        profiles.push(profile);
    }
    if let Some(hfp_config) = &config.hfp {
        let profile = host_profile("hfp")?;
        register_hfp(&profile.manager, hfp_config)?;
        profiles.push(profile);
    }
    if profiles.is_empty() {
        return Err("no profiles configured".into());
    }

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        running_handler.store(false, Ordering::SeqCst);
    })?;

    info!(profiles = profiles.len(), "btpm daemon running");
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    if let Some(server) = pbap_server {
        if let Err(e) = server.unregister() {
            error!("phonebook server unregistration failed: {e}");
        }
    }
    for profile in profiles {
        profile.manager.shutdown();
        profile.mailbox.shutdown();
    }
    info!("btpm daemon shutdown complete");
    Ok(())
}

/// Bring up one profile manager over the simulated lower layers.
fn host_profile(name: &'static str) -> Result<HostedProfile, Box<dyn std::error::Error>> {
    let (tx, rx) = unbounded::<WorkItem>();
    let engine = SimEngine::new(tx.clone(), 4096);
    let manager = Arc::new(ProfileManager::new(
        name,
        Box::new(engine),
        Box::new(SimDevice::new()),
        Arc::new(SimTransport::new()) as _,
    ));
    let mailbox = Mailbox::spawn(Arc::clone(&manager), tx.clone(), rx)?;
    manager.initialize(tx)?;
    info!(profile = name, "profile manager hosted");
    Ok(HostedProfile { manager, mailbox })
}

fn register_pbap(
    manager: &Arc<ProfileManager>,
    config: &ProfileServerConfig,
) -> Result<PbapServer, Box<dyn std::error::Error>> {
    let server = PbapServer::register(
        Arc::clone(manager),
        config.server_port,
        btpm_pbap::types::CAPABILITY_DOWNLOAD | btpm_pbap::types::CAPABILITY_BROWSING,
        config.incoming_policy(),
        &config.service_name,
        Arc::new(|event| info!(kind = event.kind(), "pbap server event")),
    )?;
    info!(port = config.server_port, "phonebook server ready");
    Ok(server)
}

fn register_hfp(
    manager: &Arc<ProfileManager>,
    config: &ProfileServerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let hfp = HfpManager::new(Arc::clone(manager), HfpRole::AudioGateway);
    hfp.register_event_callback(
        true,
        Arc::new(|event| info!(kind = event.kind(), "hfp event")),
    )?;
    hfp.register_server(
        config.server_port,
        0,
        config.incoming_policy(),
        &config.service_name,
    )?;
    info!(port = config.server_port, "hands-free server ready");
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
