//! TSUMITATE — fixed-budget DCA buyer for bitbank.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the exchange clients and notifier, and executes one scheduled
//! run. Scheduling itself lives outside the process (cron or a systemd
//! timer); one invocation is one run.

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use tsumitate::config::AppConfig;
use tsumitate::engine::reporter;
use tsumitate::engine::runner::RunCoordinator;
use tsumitate::exchange::bitbank_private::BitbankPrivateClient;
use tsumitate::exchange::bitbank_public::BitbankPublicClient;
use tsumitate::notify::line::LineNotifier;
use tsumitate::notify::NotifierPort;
use tsumitate::specs::SpecRegistry;

const BANNER: &str = r#"
 _____ ____  _   _ __  __ ___ _____  _  _____ _____
|_   _/ ___|| | | |  \/  |_ _|_   _|/ \|_   _| ____|
  | | \___ \| | | | |\/| || |  | | / _ \ | | |  _|
  | |  ___) | |_| | |  | || |  | |/ ___ \| | | |___
  |_| |____/ \___/|_|  |_|___| |_/_/   \_\_| |_____|

  Fixed-budget DCA buyer for bitbank
  v0.1.0
"#;

#[derive(Debug, Parser)]
#[command(name = "tsumitate", about = "Fixed-budget DCA buyer for bitbank")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Plan and report without placing orders.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    let cfg = AppConfig::load(&cli.config)?;

    init_logging();

    println!("{BANNER}");
    info!(
        config = %cli.config,
        total_jpy = cfg.budget.total_jpy,
        pairs = cfg.pairs.len(),
        live = cfg.trading.live,
        dry_run = cli.dry_run,
        "TSUMITATE starting up"
    );

    // -- Wire collaborators ----------------------------------------------

    let market = BitbankPublicClient::new()?;

    let api_key = AppConfig::resolve_env(&cfg.exchange.api_key_env)?;
    let api_secret = AppConfig::resolve_env(&cfg.exchange.api_secret_env)?;
    let trade = BitbankPrivateClient::new(api_key, api_secret)?;

    let line = build_notifier(&cfg);
    if line.is_none() {
        warn!("LINE credentials not configured, running without notifications");
    }
    let notifier = line.as_ref().map(|n| n as &dyn NotifierPort);

    let specs = SpecRegistry::with_defaults();

    // -- One scheduled run -------------------------------------------------

    let coordinator =
        RunCoordinator::new(&cfg, &specs, &market, &trade, notifier, cli.dry_run);
    let report = coordinator.run().await?;

    let stats = reporter::summarize(&report.outcomes);
    info!(
        filled = stats.filled,
        skipped = stats.skipped,
        errors = stats.errors,
        balance_jpy = report.balance_after_jpy,
        "TSUMITATE done."
    );

    Ok(())
}

/// Build the LINE notifier when both credential env vars resolve.
fn build_notifier(cfg: &AppConfig) -> Option<LineNotifier> {
    let token_env = cfg.notify.channel_token_env.as_deref()?;
    let user_env = cfg.notify.to_user_id_env.as_deref()?;
    let token = std::env::var(token_env).ok()?;
    let user = std::env::var(user_env).ok()?;
    LineNotifier::new(token, user).ok()
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tsumitate=info"));

    let json_logging = std::env::var("TSUMITATE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
