use anyhow::{Context, Result};
use clap::Parser;
use hc_session::{CredentialsPrompt, SessionController, SessionExit};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

mod config;
mod prompt;
mod view;

use crate::config::{HcConfig, ServerFileConfig};
use crate::prompt::TerminalPrompt;
use crate::view::ConsoleView;

const CODENAME: &str = "Kraken";

#[derive(Parser)]
#[command(name = "hc")]
#[command(about = "Teamserver client: log in and follow the event stream", version)]
struct Cli {
    /// Custom data directory (defaults to ~/.hc)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Profile name shown for this connection
    #[arg(long)]
    name: Option<String>,

    /// Teamserver host
    #[arg(long)]
    host: Option<String>,

    /// Teamserver port
    #[arg(short, long)]
    port: Option<u16>,

    /// Operator username
    #[arg(short, long)]
    user: Option<String>,

    /// Use http/ws instead of https/wss
    #[arg(long)]
    plain: bool,

    /// Verify the teamserver certificate against the web PKI roots
    #[arg(long)]
    verify_certs: bool,
}

impl Cli {
    fn server_overrides(&self) -> ServerFileConfig {
        ServerFileConfig {
            name: self.name.clone(),
            host: self.host.clone(),
            port: self.port,
            username: self.user.clone(),
            password: None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_directive = if cli.debug {
        "hc=debug,hc_session=debug,info"
    } else {
        "hc=info,hc_session=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        codename = CODENAME,
        "Starting hc teamserver client"
    );

    let config = HcConfig::new(cli.data_dir.clone())?;
    let file = config.load()?;

    let mut options = file.session_options();
    if cli.plain {
        options.transport.secure = false;
    }
    if cli.verify_certs {
        options.transport.accept_invalid_certs = false;
    }

    let prefill = cli.server_overrides().or(file.server.clone());
    let credentials = tokio::task::spawn_blocking(move || TerminalPrompt::stdio(prefill).prompt())
        .await
        .context("Credentials prompt panicked")?;

    let exit = match credentials {
        None => {
            info!("no credentials given, exiting");
            SessionExit::Cancelled
        }
        Some(credentials) => {
            let session = SessionController::new(options, ConsoleView::stdout(), ConsoleView::stdout());

            let shutdown = session.shutdown_token();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Received shutdown signal, closing session...");
                        shutdown.cancel();
                    }
                    Err(e) => warn!(error = %e, "failed to install Ctrl+C handler"),
                }
            });

            let report = session.run(credentials).await;
            info!(
                listeners = report.dispatcher.listeners().len(),
                "session ended"
            );
            report.exit
        }
    };

    std::process::exit(exit.code());
}
