//! CLI entry point replaying a recorded load cycle.

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = paintscope::config::CliArgs::parse();
    let config = paintscope::config::AppConfig::load(cli.clone()).await?;

    match paintscope::run(config).await {
        Ok(report) => {
            print!("{report}");
            Ok(())
        }
        Err(error) => {
            tracing::error!(error = %error, "replay failed");
            Err(error.into())
        }
    }
}
