use alloy_primitives::B256;
use alloy_rpc_types_eth::Log;
use alloy_sol_types::SolEvent;
use anyhow::Result;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::models::contract::ETHVercel;
use crate::models::datasets::events::{ContractEvent, DecodedEvent, EventContext};
use crate::models::errors::LogError;

pub trait LogParser {
    /// Decode contract logs into typed events, in log order.
    ///
    /// `block_times` maps block number to header timestamp for nodes that do
    /// not attach `blockTimestamp` to logs.
    fn parse_events(self, block_times: &HashMap<u64, u64>) -> Result<Vec<DecodedEvent>>;
}

impl LogParser for Vec<Log> {
    fn parse_events(self, block_times: &HashMap<u64, u64>) -> Result<Vec<DecodedEvent>> {
        let mut events = Vec::with_capacity(self.len());

        for log in self {
            if log.removed {
                warn!(
                    "Skipping removed log {:?} in transaction {:?}",
                    log.log_index, log.transaction_hash
                );
                continue;
            }

            let Some(topic0) = log.inner.data.topics().first().copied() else {
                debug!("Skipping anonymous log from {}", log.inner.address);
                continue;
            };

            let context = event_context(&log, block_times)?;
            let event = match decode_event(topic0, &log, context)? {
                Some(event) => event,
                None => {
                    debug!("Skipping log with unknown topic0 {}", topic0);
                    continue;
                }
            };
            events.push(event);
        }

        Ok(events)
    }
}

fn event_context(log: &Log, block_times: &HashMap<u64, u64>) -> Result<EventContext, LogError> {
    let block_number = log.block_number.ok_or_else(|| LogError::MissingField {
        field: "blockNumber".to_string(),
    })?;
    let transaction_hash = log.transaction_hash.ok_or_else(|| LogError::MissingField {
        field: "transactionHash".to_string(),
    })?;
    let log_index = log.log_index.ok_or_else(|| LogError::MissingField {
        field: "logIndex".to_string(),
    })?;
    let log_index =
        u32::try_from(log_index).map_err(|_| LogError::LogIndexOverflow { log_index })?;
    let block_timestamp = log
        .block_timestamp
        .or_else(|| block_times.get(&block_number).copied())
        .ok_or(LogError::MissingBlockTimestamp { block_number })?;

    Ok(EventContext {
        block_number,
        block_timestamp,
        transaction_hash,
        log_index,
    })
}

fn decode_event(
    topic0: B256,
    log: &Log,
    context: EventContext,
) -> Result<Option<DecodedEvent>, LogError> {
    let event = if topic0 == ETHVercel::Approval::SIGNATURE_HASH {
        DecodedEvent::Approval(decode(log, context)?)
    } else if topic0 == ETHVercel::ApprovalForAll::SIGNATURE_HASH {
        DecodedEvent::ApprovalForAll(decode(log, context)?)
    } else if topic0 == ETHVercel::DeploymentMap::SIGNATURE_HASH {
        DecodedEvent::DeploymentMap(decode(log, context)?)
    } else if topic0 == ETHVercel::Mint::SIGNATURE_HASH {
        DecodedEvent::Mint(decode(log, context)?)
    } else if topic0 == ETHVercel::OwnershipTransferred::SIGNATURE_HASH {
        DecodedEvent::OwnershipTransferred(decode(log, context)?)
    } else if topic0 == ETHVercel::PerformUpkeep::SIGNATURE_HASH {
        DecodedEvent::PerformUpkeep(decode(log, context)?)
    } else if topic0 == ETHVercel::Transfer::SIGNATURE_HASH {
        DecodedEvent::Transfer(decode(log, context)?)
    } else if topic0 == ETHVercel::UpkeepCheck::SIGNATURE_HASH {
        DecodedEvent::UpkeepCheck(decode(log, context)?)
    } else {
        return Ok(None);
    };
    Ok(Some(event))
}

fn decode<E: SolEvent>(log: &Log, context: EventContext) -> Result<ContractEvent<E>, LogError> {
    E::decode_log_data(&log.inner.data)
        .map(|params| ContractEvent::new(params, context))
        .map_err(|e| LogError::Decode {
            event: E::SIGNATURE,
            tx_hash: context.transaction_hash,
            reason: e.to_string(),
        })
}
