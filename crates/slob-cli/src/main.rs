//! slob-cli: thin batch/offline wrappers around the library crates.
//!
//! Deliberately NOT a run-lifecycle driver: `slob-daemon` already owns
//! arm/disarm/halt/status over HTTP for a live run. This binary covers the
//! offline surfaces spec §6 names: backtest, fetch-historical, migrate,
//! train (feature export), and the shadow-mode analyzer.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "slob")]
#[command(about = "5/1 SLOB intraday futures trading system CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> engine -> risk -> stress...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Deterministic replay of historical bars through the pattern engine
    Backtest {
        #[command(subcommand)]
        cmd: BacktestCmd,
    },

    /// Ingest historical bars into the `bars` table
    FetchHistorical {
        #[command(subcommand)]
        cmd: FetchHistoricalCmd,
    },

    /// Offline training-data export
    Train {
        #[command(subcommand)]
        cmd: TrainCmd,
    },

    /// Shadow-mode ML/rule agreement analyzer
    Shadow {
        #[command(subcommand)]
        cmd: ShadowCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Print connectivity + schema status
    Status {
        #[arg(long, default_value = "slob.sqlite3")]
        db: String,
    },
    /// Apply pending migrations
    Migrate {
        #[arg(long, default_value = "slob.sqlite3")]
        db: String,
    },
}

#[derive(Subcommand)]
enum BacktestCmd {
    /// Replay bars loaded from a CSV file
    Csv {
        #[arg(long)]
        bars: String,
        #[arg(long)]
        out: Option<String>,
    },
    /// Replay bars loaded from the `bars` table
    Db {
        #[arg(long, default_value = "slob.sqlite3")]
        db: String,
        #[arg(long)]
        symbols: String,
        #[arg(long, default_value = "1m")]
        timeframe: String,
        #[arg(long)]
        out: Option<String>,
    },
}

#[derive(Subcommand)]
enum FetchHistoricalCmd {
    /// Ingest a local CSV file
    Csv {
        #[arg(long, default_value = "slob.sqlite3")]
        db: String,
        #[arg(long)]
        path: String,
        #[arg(long, default_value = "1m")]
        timeframe: String,
        #[arg(long, default_value = "csv")]
        source: String,
    },
    /// Fetch bars from a historical-data provider
    Provider {
        #[arg(long, default_value = "slob.sqlite3")]
        db: String,
        #[arg(long, default_value = "twelvedata")]
        source: String,
        #[arg(long)]
        symbols: String,
        #[arg(long, default_value = "1m")]
        timeframe: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
}

#[derive(Subcommand)]
enum TrainCmd {
    /// Export a labeled feature-vector dataset from persisted trades/setups
    ExportFeatures {
        #[arg(long, default_value = "slob.sqlite3")]
        db: String,
        #[arg(long)]
        out: String,
        #[arg(long, default_value = "1m")]
        timeframe: String,
    },
}

#[derive(Subcommand)]
enum ShadowCmd {
    /// Report ML/rule agreement rate over a trailing window
    Analyze {
        #[arg(long, default_value = "slob.sqlite3")]
        db: String,
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => match cmd {
            DbCmd::Status { db } => {
                let pool = slob_db::connect(&commands::db_url(&db)).await?;
                let s = slob_db::status(&pool).await?;
                println!("db_ok={} has_active_setups_table={}", s.ok, s.has_active_setups_table);
            }
            DbCmd::Migrate { db } => {
                let pool = slob_db::connect(&commands::db_url(&db)).await?;
                slob_db::migrate(&pool).await?;
                println!("migrations_applied=true");
            }
        },

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = slob_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Backtest { cmd } => match cmd {
            BacktestCmd::Csv { bars, out } => commands::backtest::run_backtest_csv(bars, out).await?,
            BacktestCmd::Db { db, symbols, timeframe, out } => {
                commands::backtest::run_backtest_db(db, symbols, timeframe, out).await?
            }
        },

        Commands::FetchHistorical { cmd } => match cmd {
            FetchHistoricalCmd::Csv { db, path, timeframe, source } => {
                commands::md::ingest_csv(db, path, timeframe, source).await?
            }
            FetchHistoricalCmd::Provider { db, source, symbols, timeframe, start, end } => {
                commands::md::ingest_provider(db, source, symbols, timeframe, start, end).await?
            }
        },

        Commands::Train { cmd } => match cmd {
            TrainCmd::ExportFeatures { db, out, timeframe } => {
                commands::train::export_features(db, out, timeframe).await?
            }
        },

        Commands::Shadow { cmd } => match cmd {
            ShadowCmd::Analyze { db, days } => commands::shadow::analyze(db, days).await?,
        },
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
