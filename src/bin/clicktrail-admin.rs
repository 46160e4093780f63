use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use clicktrail::analytics::{AnalyticsEngine, LinkScope, ReportPeriod};
use clicktrail::config::{Config, DatabaseBackend};
use clicktrail::logging;
use clicktrail::storage::{PostgresStorage, SqliteStorage, Storage};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "clicktrail-admin")]
#[command(about = "Clicktrail link and analytics management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a user's short links
    Links {
        /// User ID (sub claim from JWT)
        #[arg(long)]
        user: String,
    },
    /// Print the analytics report for a user as JSON
    Report {
        /// User ID (sub claim from JWT)
        #[arg(long)]
        user: String,
        /// Window in days (1, 7, 30 or 90)
        #[arg(long, default_value_t = 30)]
        period: u32,
        /// Restrict the report to one link id
        #[arg(long)]
        link: Option<String>,
    },
    /// Show the most recent click records of one of a user's links
    Clicks {
        /// User ID (sub claim from JWT)
        #[arg(long)]
        user: String,
        /// Numeric link id
        link_id: i64,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Delete one of a user's links and its click records
    Delete {
        /// User ID (sub claim from JWT)
        #[arg(long)]
        user: String,
        /// Numeric link id
        link_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => Arc::new(
            SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
        DatabaseBackend::Postgres => Arc::new(
            PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
    };

    // Ensure database is initialized
    storage.init().await?;

    match cli.command {
        Commands::Links { user } => {
            let links = storage.list_links(&user).await?;
            if links.is_empty() {
                println!("No links found for user '{}'.", user);
            } else {
                println!("{:<8} {:<10} {:>8}  {}", "ID", "Short ID", "Clicks", "Target");
                println!("{}", "-".repeat(80));
                for link in links {
                    println!(
                        "{:<8} {:<10} {:>8}  {}",
                        link.id, link.short_id, link.clicks, link.original_url
                    );
                }
            }
        }
        Commands::Report { user, period, link } => {
            let Some(period) = ReportPeriod::from_days(period) else {
                bail!("period must be one of 1, 7, 30 or 90 days");
            };
            let engine = AnalyticsEngine::new(Arc::clone(&storage));
            let report = engine
                .report(
                    &user,
                    period,
                    LinkScope::parse(link.as_deref()),
                    chrono::Utc::now().timestamp(),
                )
                .await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report")?
            );
        }
        Commands::Clicks {
            user,
            link_id,
            limit,
        } => {
            if storage.get_owned_link(link_id, &user).await?.is_none() {
                bail!("link {} not found for user '{}'", link_id, user);
            }
            let clicks = storage.recent_clicks(link_id, limit.max(1)).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&clicks).context("failed to serialize clicks")?
            );
        }
        Commands::Delete { user, link_id } => {
            if storage.get_owned_link(link_id, &user).await?.is_none() {
                println!("⚠ Link {} not found for user '{}'", link_id, user);
            } else if storage.delete_link(link_id).await? {
                println!("✓ Deleted link {} and its click records", link_id);
            } else {
                println!("⚠ Link {} was already gone", link_id);
            }
        }
    }

    Ok(())
}
