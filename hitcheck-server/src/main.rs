// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  hitcheck: area hit-check form endpoint
//
//  Architecture: monoio thread-per-core, one shared result log
//  Config:       standalone YAML + HITCHECK_* env overrides
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use clap::Parser;
use hitcheck_core::config::HitcheckConfig;
use hitcheck_core::history::ResultLog;
use hitcheck_http::worker::{self, SharedState};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Global shutdown flag, set by the signal handler.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[derive(Parser, Debug)]
#[command(name = "hitcheck", version, about = "hitcheck — area hit-check form endpoint")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/hitcheck/hitcheck.yaml")]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Override the listen address from the config file
    #[arg(long)]
    listen: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Tracing ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "hitcheck starting");

    // ── Config ──
    // A missing file still picks up HITCHECK_* env overrides.
    if cli.config.exists() {
        info!(path = %cli.config.display(), "Loading config file");
    } else {
        info!(path = %cli.config.display(), "No config file found, using defaults");
    }
    let mut config = HitcheckConfig::load(&cli.config)?;
    if let Some(addr) = cli.listen {
        config.server.listen_addr = addr;
    }

    let num_workers = config.effective_workers();
    info!(
        workers = num_workers,
        quarter_disk = config.area.quarter_disk.as_str(),
        max_body_bytes = config.server.max_body_bytes,
        "Effective config"
    );

    // ── Shared state ──
    let listen_addr = config.server.listen_addr.clone();
    let shared = SharedState::new(Arc::new(ResultLog::new()), config);

    // ── Spawn monoio worker threads ──
    let worker_handles = worker::spawn_workers(Arc::clone(&shared), num_workers)?;

    info!(workers = num_workers, addr = %listen_addr, "hitcheck is ready");

    // ── Graceful shutdown: wait for SIGTERM/SIGINT ──
    setup_signal_handler();

    while !SHUTDOWN.load(Ordering::Relaxed) {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    info!(results = shared.log.len(), "Shutdown signal received, stopping...");

    // Workers run an infinite accept loop; the OS reclaims them on exit.
    drop(worker_handles);

    info!("hitcheck stopped");
    Ok(())
}

fn setup_signal_handler() {
    // SIGTERM (docker stop) + SIGINT (Ctrl+C)
    for sig in [libc::SIGTERM, libc::SIGINT] {
        unsafe {
            libc::signal(sig, signal_handler as libc::sighandler_t);
        }
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}
