use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentinel_core::traits::AlertChannel;
use sentinel_core::{ConfigLoader, SentinelConfig};
use sentinel_data::{Scenario, SimulatedBrokerAccount, StaticNewsCalendar, SyntheticDataFeed};
use sentinel_execution::{AlertWorker, ConfirmationGate, ConsoleChannel, ResponseHandle, WebhookChannel};
use sentinel_orchestrator::TickEngine;
use sentinel_risk::{DailyRiskLedger, LossHistory, RiskSizer};
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "roro-sentinel")]
#[command(about = "Risk-on/risk-off CFD advisory sentinel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the advisory tick loop against the synthetic paper feed
    Run {
        /// Config file path
        #[arg(short, long, default_value = "config/Sentinel.toml")]
        config: String,
        /// Paper account equity
        #[arg(long, default_value = "100000")]
        capital: String,
        /// Synthetic market scenario: normal, crash, rally, chop
        #[arg(long, default_value = "normal")]
        scenario: String,
    },
    /// Load and print the effective configuration
    CheckConfig {
        /// Config file path
        #[arg(short, long, default_value = "config/Sentinel.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            capital,
            scenario,
        } => {
            let config = ConfigLoader::load(&config)?;
            let capital =
                Decimal::from_str(&capital).context("invalid --capital value")?;
            let scenario = parse_scenario(&scenario)?;
            run(config, capital, scenario).await
        }
        Commands::CheckConfig { config } => {
            let config = ConfigLoader::load(&config)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn parse_scenario(name: &str) -> Result<Scenario> {
    match name {
        "normal" => Ok(Scenario::Normal),
        "crash" => Ok(Scenario::Crash),
        "rally" => Ok(Scenario::Rally),
        "chop" => Ok(Scenario::Chop),
        other => anyhow::bail!("unknown scenario '{other}'"),
    }
}

async fn run(config: SentinelConfig, capital: Decimal, scenario: Scenario) -> Result<()> {
    tracing::info!(
        tick_secs = config.system.tick_interval_secs,
        %capital,
        "starting roro-sentinel (advisory only, no orders are placed)"
    );

    let mut channels: Vec<Arc<dyn AlertChannel>> = vec![Arc::new(ConsoleChannel)];
    if let Some(url) = &config.execution.webhook_url {
        channels.push(Arc::new(WebhookChannel::new(url.clone())));
    }
    let (publisher, worker) = AlertWorker::new(&config.execution, channels);
    worker.spawn();

    let feed = Arc::new(SyntheticDataFeed::new(scenario, config.system.feed_seed));
    let broker = Arc::new(SimulatedBrokerAccount::new(capital));
    let calendar = Arc::new(StaticNewsCalendar::quiet());

    let sizer = Arc::new(RiskSizer::new(&config, DailyRiskLedger::new(Utc::now())));
    let gate = Arc::new(ConfirmationGate::new(
        &config,
        publisher.clone(),
        LossHistory::new(Utc::now()),
    ));

    spawn_console_responder(gate.response_handle());

    let engine = TickEngine::new(
        config,
        feed,
        broker,
        calendar,
        sizer,
        Arc::clone(&gate),
        publisher,
    );

    tokio::select! {
        result = engine.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
            Ok(())
        }
    }
}

/// Reads confirmations from stdin: `yes <proposal-id>` or `no <proposal-id>`.
fn spawn_console_responder(handle: ResponseHandle) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut parts = line.split_whitespace();
            let (verdict, id) = match (parts.next(), parts.next()) {
                (Some("yes"), Some(id)) => (true, id),
                (Some("no"), Some(id)) => (false, id),
                _ => {
                    tracing::warn!("expected 'yes <proposal-id>' or 'no <proposal-id>'");
                    continue;
                }
            };
            if handle.respond(id, verdict) {
                tracing::info!(proposal = id, approved = verdict, "response recorded");
            } else {
                tracing::warn!(proposal = id, "no pending proposal with that id");
            }
        }
    });
}
