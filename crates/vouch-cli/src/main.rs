//! vouch: document verification server and utilities.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vouch_core::{expires_at, BirthEntities, Reconciler};
use vouch_runtime::RuntimeConfig;

mod server;
mod services;

#[derive(Parser, Debug)]
#[command(
    name = "vouch",
    version,
    about = "Adaptive document verification",
    long_about = "Verify age and employment from uploaded documents.\n\n\
                  Employment checks issue a token the employer confirms or denies\n\
                  within three business days."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Runtime configuration (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Serve documents from a YAML fixture file instead of the document service
        #[arg(long)]
        fixtures: Option<PathBuf>,

        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8000")]
        bind: SocketAddr,
    },

    /// Print when a verification link issued at CREATED_AT expires
    Expiry {
        /// RFC 3339 timestamp, e.g. 2024-03-14T09:30:00Z
        created_at: String,
    },

    /// Compute an age from birth certificate fields
    Age {
        /// Day of month, e.g. "15" or "15th"
        #[arg(long)]
        day: String,

        /// Month name, e.g. "March"
        #[arg(long)]
        month: String,

        #[arg(long)]
        year: String,

        /// Date to compute the age on (defaults to today)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            config,
            fixtures,
            bind,
        } => serve(config, fixtures, bind).await,
        Command::Expiry { created_at } => {
            let created: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_at)
                .with_context(|| format!("Invalid timestamp: {created_at}"))?
                .with_timezone(&Utc);
            println!("{}", expires_at(created).to_rfc3339());
            Ok(())
        }
        Command::Age {
            day,
            month,
            year,
            today,
        } => {
            let entities = BirthEntities {
                birth_date: Some(day),
                birth_month: Some(month),
                birth_year: Some(year),
                birth_state: None,
                birth_country: None,
            };
            let today = today.unwrap_or_else(|| Utc::now().date_naive());
            let evidence = Reconciler::new().reconcile_birth(entities, today);
            println!("{}", serde_json::to_string_pretty(&evidence)?);
            Ok(())
        }
    }
}

async fn serve(config: Option<PathBuf>, fixtures: Option<PathBuf>, bind: SocketAddr) -> Result<()> {
    let config = match &config {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    }
    .with_env();
    config.validate().context("Invalid configuration")?;

    let state = services::build_state(&config, fixtures.as_deref())?;
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    tracing::info!(%bind, base_url = config.base_url(), "Listening");
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
