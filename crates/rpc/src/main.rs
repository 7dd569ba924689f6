//! RiskBank CLI - Main entry point

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use riskbank_bus::spawn_subscriber;
use riskbank_rpc::{commands, feed, AppConfig, AppContext, EventLogger};
use riskbank_settlement::SettlementConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "riskbank")]
#[command(about = "RiskBank - Credit Risk & Settlement Reconciliation Engine", long_about = None)]
struct Cli {
    /// JSON config file; defaults apply to anything it leaves out
    #[arg(short, long, env = "RISKBANK_CONFIG")]
    config: Option<PathBuf>,

    /// Audit journal directory (overrides the config file)
    #[arg(long)]
    journal: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the risk monitor and reconciliation sweep until Ctrl-C
    Serve {
        /// Feed to load on startup
        #[arg(long)]
        feed: Option<PathBuf>,
        /// Seconds between status log lines
        #[arg(long, default_value = "60")]
        status_every: u64,
    },

    /// Replay a feed against mock collaborators and print the end state
    Simulate {
        /// Line-delimited JSON feed
        feed: PathBuf,
        /// Also process T+1 settlements instead of leaving them pending
        #[arg(long)]
        process_all: bool,
        /// Use the configured confirmation timings instead of the fast ones
        #[arg(long)]
        realtime: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,

    /// Print the audit journal
    Audit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    if let Some(journal) = cli.journal {
        config.journal_dir = journal;
    }

    match cli.command {
        Commands::Serve { feed, status_every } => {
            let (ctx, _mocks) = AppContext::with_mocks(config)?;
            let logger = spawn_subscriber(&ctx.bus, EventLogger);

            if let Some(path) = feed {
                let records = feed::read_feed(&path)?;
                let count = records.len();
                for record in records {
                    if let Err(e) = feed::apply_record(&ctx, record).await {
                        tracing::warn!(kind = e.kind(), error = %e, "Feed record rejected");
                    }
                }
                tracing::info!(records = count, path = %path.display(), "Startup feed loaded");
            }

            let tasks = ctx.start_background();
            let mut status = tokio::time::interval(Duration::from_secs(status_every.max(1)));
            loop {
                tokio::select! {
                    _ = status.tick() => {
                        match commands::status_line(&ctx).await {
                            Ok(line) => tracing::info!("{}", line),
                            Err(e) => tracing::error!(error = %e, "Status query failed"),
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }

            tracing::info!("Shutting down");
            ctx.shutdown(tasks).await;
            logger.abort();
        }

        Commands::Simulate {
            feed,
            process_all,
            realtime,
            json,
        } => {
            if !realtime {
                config.settlement = SettlementConfig {
                    fiat_assets: config.settlement.fiat_assets.clone(),
                    wallets: config.settlement.wallets.clone(),
                    default_wallet: config.settlement.default_wallet.clone(),
                    bank: config.settlement.bank.clone(),
                    ..SettlementConfig::accelerated()
                };
            }
            let records = feed::read_feed(&feed)?;
            let (ctx, _mocks) = AppContext::with_mocks(config)?;
            let logger = spawn_subscriber(&ctx.bus, EventLogger);

            let report = commands::simulate(&ctx, records, process_all).await?;
            logger.abort();

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                commands::print_report(&report)?;
            }
        }

        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        Commands::Audit => {
            let (ctx, _mocks) = AppContext::with_mocks(config)?;
            commands::audit(&ctx)?;
        }
    }

    Ok(())
}
