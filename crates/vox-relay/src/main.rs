//! # vox-relay
//!
//! Relay binary: loads settings, opens the credential store, and either runs
//! the broker server or administers worker keys.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use vox_auth::{CredentialStore, SqliteCredentialStore, generate_api_key};
use vox_broker::Broker;
use vox_core::GroupName;
use vox_core::logging::init_subscriber;
use vox_server::config::broker_config;
use vox_server::shutdown::DEFAULT_SHUTDOWN_TIMEOUT;
use vox_server::{ServerConfig, VoxServer};
use vox_settings::RelaySettings;

/// Real-time transcription relay.
#[derive(Parser, Debug)]
#[command(name = "vox-relay", about = "Real-time transcription relay")]
struct Cli {
    /// Settings file (default `~/.vox/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Credential database path (overrides settings).
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port to bind (overrides settings).
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Run the relay server (default).
    Serve,
    /// Mint a worker key for a group and print it.
    IssueKey {
        /// Worker group: whisper, wave2vec or store.
        #[arg(long)]
        group: GroupName,
    },
    /// Deactivate a worker key.
    RevokeKey {
        /// The key to revoke.
        #[arg(long)]
        key: String,
    },
}

impl Cli {
    fn load_settings(&self) -> Result<RelaySettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(vox_settings::settings_path);
        let mut settings = vox_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        Ok(settings)
    }

    fn db_path(&self, settings: &RelaySettings) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| settings.auth.resolved_db_path(&vox_settings::data_dir()))
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn open_store(path: &Path) -> Result<SqliteCredentialStore> {
    ensure_parent_dir(path)?;
    SqliteCredentialStore::open(path)
        .with_context(|| format!("Failed to open credential store at {}", path.display()))
}

async fn serve(settings: &RelaySettings, store: SqliteCredentialStore) -> Result<()> {
    let broker = Arc::new(Broker::new(broker_config(settings), Arc::new(store)));
    let metrics = vox_server::metrics::install_recorder().context("Failed to install metrics")?;
    let server =
        VoxServer::new(ServerConfig::from_settings(settings), broker).with_metrics(metrics);
    let handle = server.start().await.context("Failed to start server")?;
    info!(addr = %handle.addr(), "ready for connections");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("shutdown signal received");
    handle.shutdown(DEFAULT_SHUTDOWN_TIMEOUT).await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;
    init_subscriber(&settings.logging.level, settings.logging.format);

    let store = open_store(&cli.db_path(&settings))?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&settings, store).await,
        Command::IssueKey { group } => {
            let key = generate_api_key();
            store
                .issue(&key, group)
                .await
                .context("Failed to store new key")?;
            println!("{key}");
            Ok(())
        }
        Command::RevokeKey { key } => {
            if store.revoke(&key).await.context("Failed to revoke key")? {
                info!("key revoked");
                Ok(())
            } else {
                bail!("no such key")
            }
        }
    }
}
