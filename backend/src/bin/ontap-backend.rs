use anyhow::Context;
use clap::Parser;
use ontap_backend::{AppState, BackendConfig, Completer, OpenAiClient};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "ontap-backend", about = "Command API for the Ontap palette")]
struct Args {
    /// Address to listen on; defaults to 127.0.0.1 and $PORT
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Env file to load before reading settings
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    /// Log filter, e.g. "info" or "ontap_backend=debug"
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match dotenvy::from_path(&args.env_file) {
        Ok(()) => info!("Loaded environment from {}", args.env_file.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Failed to read {}", args.env_file.display()),
    }

    let config = BackendConfig::from_env().context("Configuration error")?;

    let completer: Option<Arc<dyn Completer>> = match &config.openai_api_key {
        Some(key) => {
            info!(model = %config.openai_model, "Initialized completion client");
            Some(Arc::new(OpenAiClient::new(
                key.clone(),
                config.openai_model.clone(),
                config.openai_base_url.clone(),
            )))
        }
        None => {
            warn!("OPENAI_API_KEY is not set; /api/commands will fail until it is");
            None
        }
    };

    let addr = args
        .addr
        .unwrap_or_else(|| SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), config.port));

    ontap_backend::run_server(AppState::new(config, completer), addr).await?;

    info!("ontap-backend shutting down");
    Ok(())
}
