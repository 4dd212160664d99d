//! One-shot: walk the whole item collection and print the aggregate snapshot as JSON.

use std::time::Instant;

use auction_monitor::client::{fetch_all_items, HttpCollectionSource};
use auction_monitor::config::MonitorConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = MonitorConfig::load()?;
    let source = HttpCollectionSource::new(cfg.api_base_url.clone(), cfg.request_timeout())?;

    let t0 = Instant::now();
    let items = fetch_all_items(&source, cfg.items_page_size(), cfg.max_item_pages).await?;
    tracing::info!(
        items = items.len(),
        ms = t0.elapsed().as_millis() as u64,
        "collection fetched"
    );

    let snap = auction_monitor::aggregate(&items);
    println!("{}", serde_json::to_string_pretty(&snap)?);
    Ok(())
}
