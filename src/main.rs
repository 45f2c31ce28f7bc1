//! Scheduled transaction dispatcher: one short-lived invocation.
//!
//! Meant to be triggered externally (cron, systemd timer) every few minutes.
//! Each run samples UTC wall-clock time once, submits whatever is due and
//! exits. Overlapping invocations are not supported.
//!
//! Author: AI-Generated
//! Created: 2026-10-14

use anyhow::{Context, Result};
use clap::Parser;
use inj_scheduler::config::{apply_env_overrides, load_private_key, ScheduleFile};
use inj_scheduler::{AlloyChainClient, ChainClient, Dispatcher, NonceSequencer};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Injective scheduled transaction dispatcher
#[derive(Parser)]
#[command(name = "inj-scheduler")]
struct Args {
    /// Template table (TOML)
    #[arg(short, long, env = "SCHEDULE_FILE", default_value = "config/schedule.toml")]
    config: PathBuf,

    /// Swap chain state file (overrides [dispatch].state_file)
    #[arg(long, env = "STATE_FILE")]
    state_file: Option<PathBuf>,

    /// Run every template regardless of the clock (TEST_MODE accepts 1/yes/true)
    #[arg(long, env = "TEST_MODE", value_parser = clap::builder::FalseyValueParser::new())]
    test_mode: bool,

    /// JSON-RPC endpoint (overrides [network].rpc_url)
    #[arg(long, env = "RPC_URL")]
    rpc_url: Option<String>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);
    if json {
        fmt().json().with_env_filter(filter).with_target(false).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env before clap so env fallbacks see it
    dotenv::dotenv().ok();
    init_logging();

    let args = Args::parse();

    let schedule = ScheduleFile::load(&args.config)?;
    let mut config = schedule.bot_config(args.test_mode)?;
    apply_env_overrides(&mut config)?;
    if let Some(path) = args.state_file {
        config.state_file = path;
    }
    if let Some(url) = args.rpc_url {
        config.rpc_url = url;
    }

    let private_key = load_private_key()?;
    let client = AlloyChainClient::connect(
        &config.rpc_url,
        &private_key,
        config.chain_id,
        config.gas_price_wei,
        Duration::from_secs(config.receipt_timeout_secs),
    )?;
    let account = client.account();
    info!("Account: {:?}", account);

    let templates = schedule.resolve_templates(account)?;
    info!(
        "{} templates loaded from {} | chain {} | state {}",
        templates.len(),
        args.config.display(),
        config.chain_id,
        config.state_file.display()
    );

    let nonce = NonceSequencer::from_chain(&client)
        .await
        .context("Startup nonce lookup failed")?;

    let mut dispatcher = Dispatcher::new(&client, &templates, &config, nonce);
    let summary = dispatcher.run(chrono::Utc::now()).await;

    info!("Run complete: {}", summary);
    Ok(())
}
