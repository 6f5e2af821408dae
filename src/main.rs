use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{fmt, EnvFilter};

mod accounts;
mod config;
mod emotion;
mod error;
mod history;
mod models;
mod pipeline;
mod report;
mod routes;
mod scoring;
mod server;
mod state;
mod storage;
mod token;

use accounts::AccountDirectory;
use config::Config;

#[derive(Parser)]
#[command(name = "emotional-diary")]
#[command(about = "Emotional diary backend: entry analysis, history and accounts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve,
    /// Create or upgrade the Postgres history schema
    InitDb,
    /// Replace plaintext passwords with hashes
    MigratePasswords,
    /// Generate a markdown report
    Report {
        #[arg(long)]
        aluno_id: Option<models::SubjectId>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export the history as CSV
    Export {
        #[arg(long)]
        csv: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Serve => {
            server::start_server(&config).await?;
        }
        Commands::InitDb => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set to a Postgres instance")?;
            let pool = PgPoolOptions::new()
                .max_connections(1)
                .connect(database_url)
                .await
                .context("failed to connect to Postgres")?;
            history::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::MigratePasswords => {
            let accounts = AccountDirectory::new(config.users_path());
            let migrated = accounts.migrate_passwords().await?;
            let total = accounts.list().await?.len();
            println!("Hashed {migrated} plaintext passwords across {total} accounts.");
        }
        Commands::Report { aluno_id, out } => {
            let history = state::open_history(&config).await?;
            let records = match aluno_id {
                Some(subject) => history.list_for(subject).await?,
                None => history.list().await?,
            };
            let report = report::build_report(aluno_id, Utc::now(), &records);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { csv } => {
            let history = state::open_history(&config).await?;
            let records = history.list().await?;
            let written = history::export_csv(&records, &csv)?;
            println!("Exported {written} records to {}.", csv.display());
        }
    }

    Ok(())
}
