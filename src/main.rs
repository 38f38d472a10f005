//! Watch-list table viewer
//!
//! Backfills the records of one configured view from the REST API, runs them
//! through the view's table controller and prints the first page as JSON.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use dotenv::dotenv;
use log::info;
use redis::Client;

use watchlist_table::config::load_config;
use watchlist_table::core::{PreferenceStore, RedisStore, TableController};
use watchlist_table::source::{backfill, endpoint_url, BackfillOptions, HttpPageSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    info!("Starting watch-list table viewer...");

    let config = load_config().context("Failed to load configuration")?;
    let view = config
        .views
        .get(&config.active_view)
        .ok_or_else(|| anyhow!("View '{}' is not configured", config.active_view))?;

    let redis_client = Client::open(config.redis.url.as_str()).context("Failed to create Redis client")?;
    let store: Arc<dyn PreferenceStore> = Arc::new(RedisStore::with_timeout(
        redis_client,
        config.redis.key_prefix.clone(),
        Duration::from_millis(config.redis.timeout_ms),
    ));

    let source = HttpPageSource::new(config.source.api_token.clone());
    let options = BackfillOptions {
        delay: Duration::from_millis(config.source.page_delay_ms),
        max_pages: config.source.max_pages,
        id_field: view.table.id_field.clone(),
    };
    let url = endpoint_url(&config.source.base_url, &view.endpoint);
    let list = backfill(&source, &url, &options)
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;

    let mut table = TableController::new(view.table.clone(), store).with_records(list.records);
    if let Some(search) = &config.search {
        table.set_search(search.clone());
    }

    println!("{}", serde_json::to_string_pretty(&table.view())?);
    Ok(())
}
