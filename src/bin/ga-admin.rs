use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::Path;
use std::time::Duration;

use ga_extract::api;
use ga_extract::cache::{accounts_key, analytics_key, DiskCache};
use ga_extract::config::Config;
use ga_extract::fetch::{fetch_accounts_and_properties, run_report};
use ga_extract::models::{DateRange, Property};
use ga_extract::runner;

#[derive(Parser)]
#[command(name = "ga-admin")]
#[command(about = "Google Analytics extraction admin CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List reachable accounts and their properties (bypasses the cache)
    Accounts,
    /// Run the usage report for one property and print the rows
    Report {
        /// Property id, with or without the `properties/` prefix
        property_id: String,
        /// First day of the report (YYYY-MM-DD); defaults to the reference date
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day of the report (YYYY-MM-DD); defaults to the reference date
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Inspect or clear cache artifacts
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// List every cache file under the cache root
    List,
    /// Remove the artifacts written by the run for a reference date
    Purge {
        /// Reference date (YYYY-MM-DD)
        date: NaiveDate,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Accounts => {
            let http = api::http_client(Duration::from_secs(config.api.timeout_secs))?;
            let admin = runner::admin_client(&config, http)?;
            let accounts = fetch_accounts_and_properties(&admin).await?;

            if accounts.is_empty() {
                println!("No accounts reachable with these credentials.");
            }
            for account in accounts {
                println!(
                    "{} {} ({}, created {})",
                    account.id, account.name, account.region_code, account.create_time
                );
                for property in &account.properties {
                    println!(
                        "    {:<12} {:<40} {:<24} {} {}",
                        property.id,
                        property.name,
                        property.property_type,
                        property.time_zone,
                        property.currency_code
                    );
                }
            }
        }
        Commands::Report {
            property_id,
            start,
            end,
        } => {
            let range = DateRange::new(
                start.unwrap_or(config.date_range.start_date),
                end.unwrap_or(config.date_range.end_date),
            )?;
            let http = api::http_client(Duration::from_secs(config.api.timeout_secs))?;
            let data = runner::data_client(&config, http)?;

            let property = Property {
                id: property_id,
                account_id: String::new(),
                name: String::new(),
                property_type: String::new(),
                industry_category: String::new(),
                time_zone: String::new(),
                currency_code: String::new(),
                create_time: String::new(),
                update_time: String::new(),
            }
            .normalized();

            let rows = run_report(&data, &property, &range, config.api.report_page_size)
                .await
                .map_err(|failure| anyhow::anyhow!(failure.message))
                .with_context(|| format!("report for property {} failed", property.id))?;

            println!("Report for properties/{} over {range}", property.id);
            println!(
                "{:<10} {:<20} {:<10} {:<16} {:<4} {:>8} {:>8} {:>8} {:>7} {:>10}",
                "date",
                "city",
                "cityId",
                "country",
                "cc",
                "sessions",
                "new",
                "users",
                "bounce",
                "engaged"
            );
            println!("{}", "-".repeat(112));
            for row in &rows {
                println!(
                    "{:<10} {:<20} {:<10} {:<16} {:<4} {:>8} {:>8} {:>8} {:>7.3} {:>10}",
                    row.date,
                    row.city,
                    row.city_id,
                    row.country,
                    row.country_code,
                    row.sessions,
                    row.new_users,
                    row.total_users,
                    row.bounce_rate,
                    row.user_engagement_duration
                );
            }
            println!("{} rows", rows.len());
        }
        Commands::Cache {
            command: CacheCommands::List,
        } => {
            let mut files = Vec::new();
            collect_files(&config.cache.root, &mut files)?;
            files.sort();

            if files.is_empty() {
                println!("No cache files under '{}'.", config.cache.root.display());
            }
            for (path, size) in files {
                println!("{:>10}  {}", size, path);
            }
        }
        Commands::Cache {
            command: CacheCommands::Purge { date },
        } => {
            let cache = DiskCache::open(config.cache_dir_for(date)).await?;
            for key in [accounts_key(date), analytics_key(&DateRange::single(date))] {
                if cache.remove(&key).await? {
                    println!("✓ Removed '{}'", cache.path(&key).display());
                } else {
                    println!("⚠ '{}' did not exist", cache.path(&key).display());
                }
            }
        }
    }

    Ok(())
}

fn collect_files(dir: &Path, files: &mut Vec<(String, u64)>) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    let entries =
        std::fs::read_dir(dir).with_context(|| format!("cannot read '{}'", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push((path.display().to_string(), metadata.len()));
        }
    }

    Ok(())
}
