pub mod rpc;
pub mod transformations;

use alloy_eips::BlockNumberOrTag;
use alloy_primitives::Address;
use alloy_provider::Provider;
use alloy_rpc_types_eth::{Filter, Log};
use anyhow::{Context, Result, anyhow};
use futures::future::try_join_all;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::time::Instant;
use tracing::{debug, warn};

use crate::indexer::rpc::logs::LogParser;
use crate::indexer::transformations::events::EventMapper;
use crate::metrics::Metrics;
use crate::models::common::{Config, RangeSummary, ReplayPolicy};
use crate::models::contract::EVENT_SIGNATURES;
use crate::models::datasets::entities::EntityKind;
use crate::models::datasets::events::DecodedEvent;
use crate::storage::EntityStore;
use crate::utils::retry::{RetryConfig, retry};

/// What `process_range` needs from the config.
#[derive(Debug, Clone, Copy)]
pub struct IndexerSettings {
    pub contract_address: Address,
    pub replay_policy: ReplayPolicy,
    pub retry: RetryConfig,
}

impl From<&Config> for IndexerSettings {
    fn from(config: &Config) -> Self {
        Self {
            contract_address: config.contract_address,
            replay_policy: config.replay_policy,
            retry: config.retry,
        }
    }
}

/// Run one RPC call with retries, recording request count, latency and errors.
async fn rpc_call<T, E, F, Fut>(
    method: &'static str,
    retry_config: &RetryConfig,
    metrics: Option<&Metrics>,
    call: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Debug + std::fmt::Display,
{
    let call = &call;
    retry(
        move || async move {
            let start = Instant::now();
            if let Some(metrics) = metrics {
                metrics.record_rpc_request(method);
            }

            let result = call().await;

            if let Some(metrics) = metrics {
                metrics.record_rpc_result(method, start.elapsed().as_secs_f64(), result.is_err());
            }

            result.map_err(|e| {
                warn!("RPC call {} failed. Error details:\n{:#?}", method, e);
                anyhow!("RPC error: {}", e)
            })
        },
        retry_config,
        method,
    )
    .await
}

pub async fn get_chain_id<P: Provider>(
    provider: &P,
    retry_config: &RetryConfig,
    metrics: Option<&Metrics>,
) -> Result<u64> {
    rpc_call("get_chain_id", retry_config, metrics, move || async move {
        provider.get_chain_id().await
    })
    .await
}

pub async fn get_latest_block_number<P: Provider>(
    provider: &P,
    retry_config: &RetryConfig,
    metrics: Option<&Metrics>,
) -> Result<u64> {
    rpc_call("get_latest_block_number", retry_config, metrics, move || async move {
        provider.get_block_number().await
    })
    .await
}

/// All logs emitted by `address` for the mapped event signatures in `[from_block, to_block]`.
pub async fn get_contract_logs<P: Provider>(
    provider: &P,
    address: Address,
    from_block: u64,
    to_block: u64,
    retry_config: &RetryConfig,
    metrics: Option<&Metrics>,
) -> Result<Vec<Log>> {
    let filter = Filter::new()
        .address(address)
        .event_signature(EVENT_SIGNATURES.to_vec())
        .from_block(from_block)
        .to_block(to_block);
    let filter = &filter;

    rpc_call("get_logs", retry_config, metrics, move || async move {
        provider.get_logs(filter).await
    })
    .await
}

/// Header timestamps for the given blocks, fetched concurrently.
pub async fn get_block_timestamps<P: Provider>(
    provider: &P,
    block_numbers: &BTreeSet<u64>,
    retry_config: &RetryConfig,
    metrics: Option<&Metrics>,
) -> Result<HashMap<u64, u64>> {
    let requests = block_numbers.iter().map(|&block_number| async move {
        let block = rpc_call("get_block_by_number", retry_config, metrics, move || async move {
            provider
                .get_block_by_number(BlockNumberOrTag::Number(block_number))
                .await
        })
        .await?
        .ok_or_else(|| anyhow!("Provider returned no block {}", block_number))?;
        Ok::<_, anyhow::Error>((block_number, block.header.timestamp))
    });

    Ok(try_join_all(requests).await?.into_iter().collect())
}

/// First block to index: just past the checkpoint, but never before `start_block`.
pub fn resume_block(start_block: u64, checkpoint: Option<u64>) -> u64 {
    match checkpoint {
        Some(last) => start_block.max(last.saturating_add(1)),
        None => start_block,
    }
}

/// Next inclusive block range to index, or `None` if nothing is safely
/// available yet (or `end_block` has been passed).
pub fn plan_range(
    next_block: u64,
    latest_block: u64,
    chain_tip_buffer: u64,
    block_range: u64,
    end_block: Option<u64>,
) -> Option<(u64, u64)> {
    let safe_tip = latest_block.checked_sub(chain_tip_buffer)?;
    let upper = end_block.map_or(safe_tip, |end| end.min(safe_tip));
    if next_block > upper {
        return None;
    }
    let to_block = next_block
        .saturating_add(block_range.max(1) - 1)
        .min(upper);
    Some((next_block, to_block))
}

/// Map decoded events in order, returning how many of each kind were handled.
pub fn apply_events(
    store: &dyn EntityStore,
    policy: ReplayPolicy,
    events: Vec<DecodedEvent>,
) -> Result<BTreeMap<EntityKind, usize>> {
    let mapper = EventMapper::new(store, policy);
    let mut events_by_kind = BTreeMap::new();

    for event in events {
        let kind = event.kind();
        let context = *event.context();
        mapper.handle(event).with_context(|| {
            format!(
                "Failed to map {} event at block {} (tx {}, log {})",
                kind, context.block_number, context.transaction_hash, context.log_index
            )
        })?;
        *events_by_kind.entry(kind).or_insert(0) += 1;
    }

    Ok(events_by_kind)
}

/// Fetch, decode and map every contract event in `[from_block, to_block]`,
/// then checkpoint `to_block`.
pub async fn process_range<P: Provider>(
    provider: &P,
    store: &dyn EntityStore,
    settings: &IndexerSettings,
    from_block: u64,
    to_block: u64,
    metrics: Option<&Metrics>,
) -> Result<RangeSummary> {
    let logs = get_contract_logs(
        provider,
        settings.contract_address,
        from_block,
        to_block,
        &settings.retry,
        metrics,
    )
    .await?;
    let logs_fetched = logs.len();

    // Not every node fills in blockTimestamp on logs
    let missing_times: BTreeSet<u64> = logs
        .iter()
        .filter(|log| log.block_timestamp.is_none())
        .filter_map(|log| log.block_number)
        .collect();
    let block_times = if missing_times.is_empty() {
        HashMap::new()
    } else {
        debug!(
            "Fetching {} block headers for log timestamps",
            missing_times.len()
        );
        get_block_timestamps(provider, &missing_times, &settings.retry, metrics).await?
    };

    let events = logs.parse_events(&block_times)?;
    let events_by_kind = apply_events(store, settings.replay_policy, events)?;

    store
        .set_last_processed_block(to_block)
        .context("Failed to save checkpoint")?;

    Ok(RangeSummary {
        from_block,
        to_block,
        logs_fetched,
        events_by_kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_range_respects_block_range() {
        assert_eq!(plan_range(0, 10_000, 0, 500, None), Some((0, 499)));
        assert_eq!(plan_range(500, 10_000, 0, 500, None), Some((500, 999)));
    }

    #[test]
    fn plan_range_stops_at_tip_buffer() {
        assert_eq!(plan_range(90, 100, 12, 500, None), None);
        assert_eq!(plan_range(80, 100, 12, 500, None), Some((80, 88)));
        assert_eq!(plan_range(0, 5, 12, 500, None), None);
    }

    #[test]
    fn plan_range_stops_at_end_block() {
        assert_eq!(plan_range(0, 10_000, 0, 500, Some(120)), Some((0, 120)));
        assert_eq!(plan_range(121, 10_000, 0, 500, Some(120)), None);
    }

    #[test]
    fn resume_starts_after_checkpoint() {
        assert_eq!(resume_block(0, None), 0);
        assert_eq!(resume_block(500, None), 500);
        assert_eq!(resume_block(0, Some(99)), 100);
        assert_eq!(resume_block(500, Some(99)), 500);
        assert_eq!(resume_block(0, Some(u64::MAX)), u64::MAX);
    }

    #[test]
    fn plan_range_single_block() {
        assert_eq!(plan_range(7, 7, 0, 1, None), Some((7, 7)));
        assert_eq!(plan_range(7, 7, 0, 0, None), Some((7, 7)));
    }
}
