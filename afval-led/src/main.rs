//! Daemon that polls the waste collection calendar and lights one LED per container:
//! solid for a pickup today, blinking for a pickup tomorrow.

mod clock;
mod config;
mod link;
mod pins;

use afval_core::{
    Heartbeat, LedDriver, ProviderConfig, Scheduler, SchedulerSettings, WasteProvider,
    establish_link,
};
use afval_provider_rd4 as rd4;
use afval_provider_twente as twente;
use anyhow::{Context, Result};
use reqwest::Client;

use crate::clock::SntpClock;
use crate::config::Config;
use crate::link::HostLink;

const USER_AGENT: &str = concat!("afval-led/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
async fn main() -> Result<()> {
    let path = config::config_path();
    let config = Config::load(&path)?;

    env_logger::Builder::new()
        .filter_level(config.log_level())
        .parse_default_env()
        .init();
    log::info!("Loaded {} for {}", path.display(), config.provider.kind());

    // fast heartbeat while booting
    let board = pins::board(config.platform, &config.pins).await?;
    let heartbeat = Heartbeat::start(board.status);
    let leds = LedDriver::new(board.channels);

    let link = HostLink::new(config.probe.clone());
    let credentials = config.credentials();
    establish_link(&link, &credentials)
        .await
        .context("network connection failed")?;

    let client = Client::builder().user_agent(USER_AGENT).build()?;
    let provider = provider(client, &config.provider);

    let settings = SchedulerSettings {
        time_host: config.time.host.clone(),
        credentials,
    };
    let mut scheduler = Scheduler::new(
        provider,
        Box::new(SntpClock::new()),
        Box::new(link),
        leds,
        heartbeat,
        settings,
    );

    scheduler.run().await;
    Ok(())
}

fn provider(client: Client, config: &ProviderConfig) -> Box<dyn WasteProvider> {
    match config {
        ProviderConfig::Twente {
            company_code,
            address_id,
        } => twente::provider(client, company_code.as_str(), address_id.as_str()),
        ProviderConfig::Rd4 {
            postal_code,
            house_number,
            house_number_extension,
        } => rd4::provider(
            client,
            postal_code.as_str(),
            house_number.as_str(),
            house_number_extension.as_str(),
        ),
    }
}
