use alloy_provider::ProviderBuilder;
use anyhow::Result;
use std::time::Duration;
use tokio::{signal, sync::broadcast, time::Instant};
use tracing::{error, info};
use tracing_subscriber::{self, EnvFilter};
use url::Url;

use ethvercel_indexer::indexer::{self, IndexerSettings};
use ethvercel_indexer::metrics::Metrics;
use ethvercel_indexer::models::common::{IndexingTotals, format_kind_counts};
use ethvercel_indexer::storage;
use ethvercel_indexer::utils::{config_path, load_config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    println!();
    info!("=========================== INITIALIZING ===========================");

    let config = match load_config(config_path()) {
        Ok(config) => {
            info!("Config loaded successfully");
            config
        }
        Err(e) => {
            error!("Failed to load config: {:#}", e);
            return Err(e);
        }
    };

    let settings = IndexerSettings::from(&config);
    let poll_interval = Duration::from_millis(config.poll_interval_ms);

    // Initialize optional metrics
    let metrics = if config.metrics.enabled {
        let metrics = Metrics::new(config.chain_name.clone())?;
        metrics
            .start_metrics_server(&config.metrics.address, config.metrics.port)
            .await?;
        Some(metrics)
    } else {
        info!("Metrics are disabled");
        None
    };

    let store = storage::open_store(&config.storage)?;

    // Resume after the checkpoint if there is one
    let checkpoint = store.last_processed_block()?;
    if let Some(last) = checkpoint {
        info!("Resuming after checkpointed block {}", last);
    }
    let mut next_block = indexer::resume_block(config.start_block, checkpoint);
    info!("Starting block number: {}", next_block);

    let rpc_url: Url = config.rpc_url.parse()?;
    info!("RPC URL: {}", rpc_url);
    let provider = ProviderBuilder::new().connect_http(rpc_url);

    let chain_id = indexer::get_chain_id(&provider, &config.retry, metrics.as_ref()).await?;
    info!("Chain ID: {}", chain_id);
    info!("Contract: {}", config.contract_address);
    info!("Replay policy: {:?}", config.replay_policy);

    // The in-flight range always finishes and checkpoints before exiting
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
    tokio::spawn(async move {
        if let Ok(()) = signal::ctrl_c().await {
            info!("Received Ctrl+C signal, initiating shutdown...");
            let _ = shutdown_tx.send(());
        }
    });

    println!();
    info!("========================= STARTING INDEXER =========================");

    let mut totals = IndexingTotals::default();

    loop {
        if shutdown_rx.try_recv().is_ok() {
            info!("Shutting down main processing loop...");
            break;
        }

        if config.end_block.is_some_and(|end| next_block > end) {
            info!("Reached end block {:?}, stopping", config.end_block);
            break;
        }

        let latest_block =
            indexer::get_latest_block_number(&provider, &config.retry, metrics.as_ref()).await?;

        let Some((from_block, to_block)) = indexer::plan_range(
            next_block,
            latest_block,
            config.chain_tip_buffer,
            config.block_range,
            config.end_block,
        ) else {
            info!(
                "Waiting for block {} to be {} blocks behind tip {} - sleeping for {}ms",
                next_block, config.chain_tip_buffer, latest_block, config.poll_interval_ms
            );
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = shutdown_rx.recv() => {
                    info!("Shutting down main processing loop...");
                    break;
                }
            }
            continue;
        };

        let range_start_time = Instant::now();
        let summary = indexer::process_range(
            &provider,
            store.as_ref(),
            &settings,
            from_block,
            to_block,
            metrics.as_ref(),
        )
        .await?;

        info!(
            "Processed blocks {}-{}: {} logs, {} entities ({}) in {:.2}s",
            summary.from_block,
            summary.to_block,
            summary.logs_fetched,
            summary.events_mapped(),
            format_kind_counts(&summary.events_by_kind),
            range_start_time.elapsed().as_secs_f64()
        );

        totals.record(&summary);
        if summary.events_mapped() > 0 {
            info!(
                "Totals this run: {} blocks, {} entities ({})",
                totals.blocks,
                totals.events(),
                format_kind_counts(&totals.events_by_kind)
            );
        }

        if let Some(metrics) = &metrics {
            metrics.record_range(&summary, latest_block);
        }

        next_block = to_block + 1;
    }

    info!("Indexer stopped at block {}", next_block.saturating_sub(1));
    Ok(())
}
