use alloy_primitives::B256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Missing required field in log: {field}")]
    MissingField { field: String },
    #[error("Log index {log_index} does not fit in 32 bits")]
    LogIndexOverflow { log_index: u64 },
    #[error("No block timestamp available for block {block_number}")]
    MissingBlockTimestamp { block_number: u64 },
    #[error("Failed to decode {event} log in transaction {tx_hash}: {reason}")]
    Decode {
        event: &'static str,
        tx_hash: B256,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to (de)serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage lock poisoned")]
    LockPoisoned,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("block_range must be at least 1")]
    EmptyBlockRange,
    #[error("end_block {end_block} is before start_block {start_block}")]
    InvertedBlockWindow { start_block: u64, end_block: u64 },
    #[error("retry.max_attempts must be at least 1")]
    NoRetryAttempts,
    #[error("The json storage backend requires storage.path")]
    MissingStoragePath,
}
