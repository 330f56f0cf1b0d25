use std::time::Duration;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ndi_tc_relay::cli::AppConfig;
use ndi_tc_relay::discover;
use ndi_tc_relay::pipeline;

fn main() -> anyhow::Result<()> {
    let config = AppConfig::parse();

    let filter = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if config.discover {
        let sources = discover::discover_ndi_sources(Duration::from_secs(3))?;
        if sources.is_empty() {
            tracing::info!("no NDI sources found on the network");
        }
        for (i, source) in sources.iter().enumerate() {
            tracing::info!(
                index = i + 1,
                name = %source.display_name,
                class = %source.device_class,
                ndi_name = ?source.ndi_name,
                url = ?source.url_address,
                "discovered NDI source"
            );
        }
        return Ok(());
    }

    pipeline::run(config)
}
