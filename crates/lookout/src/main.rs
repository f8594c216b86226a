use anyhow::{Context, Result};
use lookout::config::Config;
use lookout::fetch::HttpFetcher;
use lookout::monitor::Monitor;
use lookout::snapshot::SnapshotStore;
use lookout::webhook::DiscordWebhook;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env().context("cannot resolve configuration")?;

    tracing::info!(
        url = %config.url_to_monitor,
        path = ?config.storage_file,
        interval = ?config.sleep_interval,
        "monitoring continuously"
    );

    let monitor = Monitor::new(
        config.url_to_monitor.clone(),
        SnapshotStore::new(&config.storage_file),
        HttpFetcher,
        DiscordWebhook::new(config.discord_webhook_url.clone()),
    );

    monitor.run_forever(config.sleep_interval)
}
