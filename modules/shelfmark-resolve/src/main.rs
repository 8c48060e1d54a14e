use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use catalog_client::CatalogClient;
use shelfmark_common::{Config, RawMention, ShelfmarkError};
use shelfmark_resolve::{MetadataCache, Pipeline, Resolver};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("shelfmark_resolve=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let mentions_path: PathBuf = args
        .next()
        .context("usage: shelfmark-resolve <mentions.json> [output-dir]")?
        .into();
    let output_dir: PathBuf = args.next().unwrap_or_else(|| "output".to_string()).into();

    let config = Config::from_env();

    let raw = std::fs::read_to_string(&mentions_path)
        .with_context(|| format!("reading {}", mentions_path.display()))?;
    let mentions: Vec<RawMention> =
        serde_json::from_str(&raw).context("parsing mentions file")?;
    info!(mentions = mentions.len(), "Loaded mentions");

    let cache = MetadataCache::open(&config.cache_dir)?;
    let catalog = CatalogClient::new(
        &config.catalog_api_url,
        &config.citation_api_url,
        config.catalog_api_key.as_deref(),
    );
    let resolver = Resolver::with_interval(
        Arc::new(catalog),
        cache,
        Duration::from_millis(config.lookup_interval_ms),
    );

    let report = Pipeline::new(resolver).run(&mentions).await;

    // Output persistence is the one fatal path: a partial write would
    // corrupt downstream consumers, so any failure aborts the run.
    std::fs::create_dir_all(&output_dir)
        .map_err(|e| ShelfmarkError::Output(format!("creating {}: {e}", output_dir.display())))?;
    let accepted_path = output_dir.join("accepted.json");
    let quarantined_path = output_dir.join("quarantined.json");
    std::fs::write(&accepted_path, serde_json::to_string_pretty(&report.accepted)?)
        .map_err(|e| ShelfmarkError::Output(format!("writing {}: {e}", accepted_path.display())))?;
    std::fs::write(
        &quarantined_path,
        serde_json::to_string_pretty(&report.quarantined)?,
    )
    .map_err(|e| {
        ShelfmarkError::Output(format!("writing {}: {e}", quarantined_path.display()))
    })?;

    info!(
        run_id = %report.run_id,
        accepted = report.accepted.len(),
        quarantined = report.quarantined.len(),
        "Outputs written"
    );
    println!("{}", report.stats);
    Ok(())
}
