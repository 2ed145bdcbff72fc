use chrono::Local;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ga_extract::config::{Config, NotificationConfig};
use ga_extract::{notify, runner};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let notifier = notify::from_config(&NotificationConfig::from_env());

    let job = async {
        let config = Config::from_env()?;
        info!("Loaded configuration");
        let summary = runner::run(config, Local::now().date_naive()).await?;
        anyhow::Ok(summary)
    };

    match runner::run_guarded(notifier.as_ref(), job).await {
        Ok(summary) => {
            info!(
                "Extracted {} rows from {} properties",
                summary.rows, summary.properties
            );
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::FAILURE,
    }
}
