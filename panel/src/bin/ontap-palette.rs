use anyhow::{Context, Result};
use clap::Parser;
use ontap_core::{detect_tag, OntapConfig, Role};
use ontap_panel::{
    ContentScriptInjector, FileStorage, InMemoryStorage, KeyChord, Panel, PanelSettings,
    SessionContext, StorageRef, SubmitOutcome, Visibility,
};
use ontap_relay::{handle_toggle, spawn_background, BackgroundRelay, TabId, TabRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// The single tab this host simulates
const HOST_TAB: TabId = TabId(1);

#[derive(Parser, Debug)]
#[command(name = "ontap-palette", about = "Terminal host for the Ontap command palette")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the command API
    #[arg(long)]
    api_base: Option<String>,

    /// Directory for persisted sessions (in-memory when omitted)
    #[arg(long)]
    session_dir: Option<PathBuf>,

    /// Ignore any cached session and start a new one
    #[arg(long)]
    new_session: bool,

    /// Tone hint forwarded with rephrase requests
    #[arg(long)]
    tone: Option<String>,

    /// Page URL forwarded with commands
    #[arg(long)]
    url: Option<String>,

    /// Seconds before an unanswered relay call fails
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Log filter, e.g. "info" or "ontap_relay=debug"
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn load_config(args: &Args) -> Result<OntapConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = OntapConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            let _ = dotenvy::dotenv();
            config.apply_overrides(|key| std::env::var(key).ok())?;
            config
        }
        None => OntapConfig::load().context("Failed to load config")?,
    };

    if let Some(api_base) = &args.api_base {
        config.api_base = api_base.clone();
    }
    if let Some(dir) = &args.session_dir {
        config.session_dir = Some(dir.clone());
    }
    if let Some(tone) = &args.tone {
        config.tone = Some(tone.clone());
    }
    if let Some(secs) = args.timeout_secs {
        config.relay_timeout_secs = secs;
    }
    Ok(config)
}

fn print_thread(panel: &Panel) {
    if panel.thread().is_empty() {
        println!("(empty thread)");
    }
    for message in panel.thread().iter() {
        let who = match message.role {
            Role::User => "you",
            Role::Assistant => "ontap",
        };
        println!("{:>6}: {}", who, message.content);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = load_config(&args)?;
    info!(api_base = %config.api_base(), "Starting ontap-palette");

    let storage: StorageRef = match &config.session_dir {
        Some(dir) => Arc::new(FileStorage::new(dir)),
        None => Arc::new(InMemoryStorage::new()),
    };
    let session = if args.new_session {
        SessionContext::new()
    } else {
        SessionContext::resume_or_create(storage.as_ref())
            .await
            .context("Failed to resolve session")?
    };

    let (relay, _background) = spawn_background(BackgroundRelay::from_config(&config), &config);

    let visibility = Visibility::new(true);
    let settings = PanelSettings::from_config(&config, args.url.clone());
    let mut panel = Panel::open(session, storage, relay, settings, visibility.clone()).await;

    // The panel's page listener is mounted lazily, on the first :toggle
    let injector = Arc::new(ContentScriptInjector::new(config.relay_timeout()));
    injector.adopt(HOST_TAB, visibility).await;
    let tabs = TabRegistry::new(injector);
    tabs.open_tab(HOST_TAB).await;
    tabs.activate(HOST_TAB).await;

    println!("ontap session {}", panel.session());
    println!("Type a question, /explain: ..., /rewrite: ..., or :toggle, :key <chord>, :thread, :quit");
    print_thread(&panel);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            ":quit" | ":q" => break,
            ":thread" => print_thread(&panel),
            ":toggle" => match handle_toggle(&tabs).await {
                Ok(outcome) => println!("[{:?}] panel open: {}", outcome, panel.is_open()),
                Err(e) => println!("toggle failed: {}", e),
            },
            _ if line.starts_with(":key ") => match KeyChord::parse(&line[5..]) {
                Some(chord) => {
                    panel.handle_key(&chord);
                    println!("panel open: {}", panel.is_open());
                }
                None => println!("unrecognized key chord"),
            },
            _ => {
                if !panel.is_open() {
                    println!("panel is closed; use :toggle or :key ctrl+k");
                    continue;
                }
                panel.select_command(detect_tag(line));
                panel.set_query(line);
                match panel.submit().await {
                    SubmitOutcome::Answered(reply) => println!("{}", reply.content),
                    SubmitOutcome::Failed(e) => {
                        error!(error = %e, "Submission failed");
                        println!("{}", e);
                    }
                    SubmitOutcome::Skipped => {}
                }
            }
        }
    }

    info!("ontap-palette shutting down");
    Ok(())
}
