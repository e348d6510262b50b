use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::models::datasets::entities::EntityKind;
use crate::models::errors::ConfigError;
use crate::utils::retry::RetryConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    #[serde(default = "default_metrics_address")]
    pub address: String,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: default_metrics_address(),
            port: default_metrics_port(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    pub path: Option<PathBuf>,
}

/// What to do when an event is delivered again for an id that is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayPolicy {
    /// Upsert. Redelivery rewrites the identical record.
    #[default]
    Overwrite,
    /// Keep the first write and ignore redeliveries.
    SkipExisting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub chain_name: String,
    pub rpc_url: String,
    pub contract_address: Address,
    #[serde(default)]
    pub start_block: u64,
    pub end_block: Option<u64>,
    #[serde(default = "default_block_range")]
    pub block_range: u64,
    #[serde(default)]
    pub chain_tip_buffer: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub replay_policy: ReplayPolicy,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_range == 0 {
            return Err(ConfigError::EmptyBlockRange);
        }
        if let Some(end_block) = self.end_block {
            if end_block < self.start_block {
                return Err(ConfigError::InvertedBlockWindow {
                    start_block: self.start_block,
                    end_block,
                });
            }
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::NoRetryAttempts);
        }
        if self.storage.backend == StorageBackend::Json && self.storage.path.is_none() {
            return Err(ConfigError::MissingStoragePath);
        }
        Ok(())
    }
}

fn default_block_range() -> u64 {
    500
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_metrics_address() -> String {
    "0.0.0.0".to_string()
}

fn default_metrics_port() -> u16 {
    9100
}

/// Result of processing one inclusive block range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeSummary {
    pub from_block: u64,
    pub to_block: u64,
    pub logs_fetched: usize,
    pub events_by_kind: BTreeMap<EntityKind, usize>,
}

impl RangeSummary {
    pub fn events_mapped(&self) -> usize {
        self.events_by_kind.values().sum()
    }

    pub fn blocks_scanned(&self) -> u64 {
        self.to_block.saturating_sub(self.from_block) + 1
    }
}

/// Counts accumulated over every range processed since startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexingTotals {
    pub ranges: u64,
    pub blocks: u64,
    pub events_by_kind: BTreeMap<EntityKind, usize>,
}

impl IndexingTotals {
    pub fn record(&mut self, summary: &RangeSummary) {
        self.ranges += 1;
        self.blocks += summary.blocks_scanned();
        for (kind, count) in &summary.events_by_kind {
            *self.events_by_kind.entry(*kind).or_insert(0) += count;
        }
    }

    pub fn events(&self) -> usize {
        self.events_by_kind.values().sum()
    }
}

/// `Kind=count` pairs for log lines, e.g. `Mint=2, Transfer=2`.
pub fn format_kind_counts(counts: &BTreeMap<EntityKind, usize>) -> String {
    if counts.is_empty() {
        return "none".to_string();
    }
    counts
        .iter()
        .map(|(kind, count)| format!("{kind}={count}"))
        .collect::<Vec<_>>()
        .join(", ")
}
