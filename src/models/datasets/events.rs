use alloy_primitives::B256;

use crate::models::contract::ETHVercel;
use crate::models::datasets::entities::EntityKind;

/// Where a log was emitted. Filled by the log parser from the RPC log and block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventContext {
    pub block_number: u64,
    pub block_timestamp: u64,
    pub transaction_hash: B256,
    pub log_index: u32,
}

/// A decoded contract event with its block/transaction context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractEvent<P> {
    pub params: P,
    pub context: EventContext,
}

impl<P> ContractEvent<P> {
    pub fn new(params: P, context: EventContext) -> Self {
        Self { params, context }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    Approval(ContractEvent<ETHVercel::Approval>),
    ApprovalForAll(ContractEvent<ETHVercel::ApprovalForAll>),
    DeploymentMap(ContractEvent<ETHVercel::DeploymentMap>),
    Mint(ContractEvent<ETHVercel::Mint>),
    OwnershipTransferred(ContractEvent<ETHVercel::OwnershipTransferred>),
    PerformUpkeep(ContractEvent<ETHVercel::PerformUpkeep>),
    Transfer(ContractEvent<ETHVercel::Transfer>),
    UpkeepCheck(ContractEvent<ETHVercel::UpkeepCheck>),
}

impl DecodedEvent {
    pub fn kind(&self) -> EntityKind {
        match self {
            DecodedEvent::Approval(_) => EntityKind::Approval,
            DecodedEvent::ApprovalForAll(_) => EntityKind::ApprovalForAll,
            DecodedEvent::DeploymentMap(_) => EntityKind::DeploymentMap,
            DecodedEvent::Mint(_) => EntityKind::Mint,
            DecodedEvent::OwnershipTransferred(_) => EntityKind::OwnershipTransferred,
            DecodedEvent::PerformUpkeep(_) => EntityKind::PerformUpkeep,
            DecodedEvent::Transfer(_) => EntityKind::Transfer,
            DecodedEvent::UpkeepCheck(_) => EntityKind::UpkeepCheck,
        }
    }

    pub fn context(&self) -> &EventContext {
        match self {
            DecodedEvent::Approval(e) => &e.context,
            DecodedEvent::ApprovalForAll(e) => &e.context,
            DecodedEvent::DeploymentMap(e) => &e.context,
            DecodedEvent::Mint(e) => &e.context,
            DecodedEvent::OwnershipTransferred(e) => &e.context,
            DecodedEvent::PerformUpkeep(e) => &e.context,
            DecodedEvent::Transfer(e) => &e.context,
            DecodedEvent::UpkeepCheck(e) => &e.context,
        }
    }
}
