//! tether-probe: connects to the local display and audio servers and reports
//! what was negotiated.
//!
//! # What happens at startup
//!
//! 1. CLI arguments are parsed with `clap`.
//! 2. The configuration file is loaded (defaults when it does not exist).
//! 3. Logging is initialised; `RUST_LOG` overrides the configured level.
//! 4. Each server that is not skipped is connected to, its session
//!    parameters are logged, and the connection is closed.
//! 5. With `--watch`, display events are printed until Ctrl+C.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tether_client::config::{config_file_path, load_config, save_config, ClientConfig};
use tether_client::{AudioConnection, DisplayConnection};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Display and audio server probe.
#[derive(Debug, Parser)]
#[command(
    name = "tether-probe",
    about = "Connects to the local display and audio servers and reports the session",
    version
)]
struct Cli {
    /// Configuration file; defaults to `$XDG_CONFIG_HOME/tether/config.toml`.
    #[arg(long, env = "TETHER_CONFIG")]
    config: Option<PathBuf>,

    /// Display name such as `:0`, overriding the config and `DISPLAY`.
    #[arg(long)]
    display: Option<String>,

    /// Audio server socket, overriding the config and `PULSE_SERVER`.
    #[arg(long)]
    audio_server: Option<String>,

    #[arg(long)]
    skip_display: bool,

    #[arg(long)]
    skip_audio: bool,

    /// After connecting, print display events until Ctrl+C.
    #[arg(long)]
    watch: bool,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    write_default_config: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref()).context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    if cli.write_default_config {
        let path = match cli.config.clone() {
            Some(p) => p,
            None => config_file_path()?,
        };
        save_config(&config, &path)
            .with_context(|| format!("writing configuration to {}", path.display()))?;
        info!(path = %path.display(), "configuration written");
        return Ok(());
    }

    if cli.display.is_some() {
        config.display.name = cli.display.clone();
    }
    if cli.audio_server.is_some() {
        config.audio.server = cli.audio_server.clone();
    }

    if !cli.skip_display {
        if let Err(e) = probe_display(&config, cli.watch).await {
            warn!(error = %e, "display probe failed");
        }
    }
    if !cli.skip_audio {
        if let Err(e) = probe_audio(&config).await {
            warn!(error = %e, "audio probe failed");
        }
    }
    Ok(())
}

async fn probe_display(config: &ClientConfig, watch: bool) -> anyhow::Result<()> {
    let conn = DisplayConnection::connect(&config.display).await?;
    let setup = conn.setup();
    let screen = conn.screen();
    info!(
        vendor = %setup.vendor,
        release = setup.release_number,
        root = screen.root,
        width = screen.width_in_pixels,
        height = screen.height_in_pixels,
        depth = screen.root_depth,
        "display connected"
    );
    match conn.shm_capability() {
        Some(cap) => info!(
            version = ?cap.version,
            shared_pixmaps = cap.shared_pixmaps,
            "MIT-SHM available"
        ),
        None => info!("MIT-SHM unavailable, images go through the socket"),
    }
    let atom = conn.intern_atom("WM_PROTOCOLS", true).await?;
    info!(atom, "WM_PROTOCOLS");

    if watch {
        let mut events = conn
            .start_event_pump(config.events.queue_capacity)
            .await?;
        info!("watching display events, Ctrl+C to stop");
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = events.next() => match event {
                    Some(frame) => info!(?frame, "display event"),
                    None => {
                        warn!("display connection ended");
                        break;
                    }
                },
            }
        }
        if events.dropped() > 0 {
            warn!(dropped = events.dropped(), "events dropped while the queue was full");
        }
    }

    conn.close().await;
    Ok(())
}

async fn probe_audio(config: &ClientConfig) -> anyhow::Result<()> {
    let conn = AudioConnection::connect(&config.audio).await?;
    info!(
        version = conn.protocol_version(),
        client_index = ?conn.client_index(),
        "audio connected"
    );
    conn.close().await;
    Ok(())
}
