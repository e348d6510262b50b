use anyhow::{Context, Result};
use tracing::debug;

use crate::models::common::ReplayPolicy;
use crate::models::contract::ETHVercel;
use crate::models::datasets::entities::{
    Approval, ApprovalForAll, DeploymentMap, Entity, EntityId, Mint, OwnershipTransferred,
    PerformUpkeep, Provenance, Transfer, UpkeepCheck,
};
use crate::models::datasets::events::{ContractEvent, DecodedEvent, EventContext};
use crate::storage::{EntityStore, save};

/// Maps decoded contract events to entities, one record per event.
///
/// Handlers are independent of each other and keep no state between calls;
/// the only side effect is the write into `store`.
pub struct EventMapper<'a> {
    store: &'a dyn EntityStore,
    policy: ReplayPolicy,
}

impl<'a> EventMapper<'a> {
    pub fn new(store: &'a dyn EntityStore, policy: ReplayPolicy) -> Self {
        Self { store, policy }
    }

    pub fn handle(&self, event: DecodedEvent) -> Result<()> {
        match event {
            DecodedEvent::Approval(e) => self.handle_approval(e),
            DecodedEvent::ApprovalForAll(e) => self.handle_approval_for_all(e),
            DecodedEvent::DeploymentMap(e) => self.handle_deployment_map(e),
            DecodedEvent::Mint(e) => self.handle_mint(e),
            DecodedEvent::OwnershipTransferred(e) => self.handle_ownership_transferred(e),
            DecodedEvent::PerformUpkeep(e) => self.handle_perform_upkeep(e),
            DecodedEvent::Transfer(e) => self.handle_transfer(e),
            DecodedEvent::UpkeepCheck(e) => self.handle_upkeep_check(e),
        }
    }

    pub fn handle_approval(&self, event: ContractEvent<ETHVercel::Approval>) -> Result<()> {
        let ContractEvent { params, context } = event;
        self.persist(Approval {
            id: entity_id(&context),
            owner: params.owner,
            approved: params.approved,
            token_id: params.tokenId,
            provenance: provenance(&context),
        })
    }

    pub fn handle_approval_for_all(
        &self,
        event: ContractEvent<ETHVercel::ApprovalForAll>,
    ) -> Result<()> {
        let ContractEvent { params, context } = event;
        self.persist(ApprovalForAll {
            id: entity_id(&context),
            owner: params.owner,
            operator: params.operator,
            approved: params.approved,
            provenance: provenance(&context),
        })
    }

    pub fn handle_deployment_map(
        &self,
        event: ContractEvent<ETHVercel::DeploymentMap>,
    ) -> Result<()> {
        let ContractEvent { params, context } = event;
        let ETHVercel::DeploymentRecord {
            repo_url,
            data,
            tokenuri,
            owner,
        } = params.record;

        self.persist(DeploymentMap {
            id: entity_id(&context),
            owner: params.owner,
            record_repo_url: repo_url,
            record_data: data,
            record_tokenuri: tokenuri,
            record_owner: owner,
            provenance: provenance(&context),
        })
    }

    pub fn handle_mint(&self, event: ContractEvent<ETHVercel::Mint>) -> Result<()> {
        let ContractEvent { params, context } = event;
        self.persist(Mint {
            id: entity_id(&context),
            to: params._to,
            uri: params.uri,
            provenance: provenance(&context),
        })
    }

    pub fn handle_ownership_transferred(
        &self,
        event: ContractEvent<ETHVercel::OwnershipTransferred>,
    ) -> Result<()> {
        let ContractEvent { params, context } = event;
        self.persist(OwnershipTransferred {
            id: entity_id(&context),
            previous_owner: params.previousOwner,
            new_owner: params.newOwner,
            provenance: provenance(&context),
        })
    }

    pub fn handle_perform_upkeep(
        &self,
        event: ContractEvent<ETHVercel::PerformUpkeep>,
    ) -> Result<()> {
        let ContractEvent { params, context } = event;
        self.persist(PerformUpkeep {
            id: entity_id(&context),
            timestamp: params._timestamp,
            counter: params._counter,
            provenance: provenance(&context),
        })
    }

    pub fn handle_transfer(&self, event: ContractEvent<ETHVercel::Transfer>) -> Result<()> {
        let ContractEvent { params, context } = event;
        self.persist(Transfer {
            id: entity_id(&context),
            from: params.from,
            to: params.to,
            token_id: params.tokenId,
            provenance: provenance(&context),
        })
    }

    pub fn handle_upkeep_check(&self, event: ContractEvent<ETHVercel::UpkeepCheck>) -> Result<()> {
        let ContractEvent { params, context } = event;
        self.persist(UpkeepCheck {
            id: entity_id(&context),
            timestamp: params._timestamp,
            provenance: provenance(&context),
        })
    }

    fn persist<E: Entity>(&self, entity: E) -> Result<()> {
        let id = entity.id();
        if self.policy == ReplayPolicy::SkipExisting
            && self
                .store
                .contains(E::KIND, &id)
                .with_context(|| format!("Failed to look up {} {}", E::KIND, id))?
        {
            debug!("{} {} already stored, skipping redelivery", E::KIND, id);
            return Ok(());
        }

        save(self.store, &entity).with_context(|| format!("Failed to save {} {}", E::KIND, id))?;
        debug!("Saved {} {}", E::KIND, id);
        Ok(())
    }
}

fn entity_id(context: &EventContext) -> EntityId {
    EntityId::from_log(context.transaction_hash, context.log_index)
}

fn provenance(context: &EventContext) -> Provenance {
    Provenance {
        block_number: context.block_number,
        block_timestamp: context.block_timestamp,
        transaction_hash: context.transaction_hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::datasets::entities::EntityKind;
    use crate::storage::load;
    use crate::storage::memory::MemoryStore;
    use alloy_primitives::{Address, B256, U256, address, b256};

    const T1: B256 = b256!("0x7100000000000000000000000000000000000000000000000000000000000001");

    fn context(log_index: u32) -> EventContext {
        EventContext {
            block_number: 100,
            block_timestamp: 1_700_000_000,
            transaction_hash: T1,
            log_index,
        }
    }

    fn transfer_event() -> ContractEvent<ETHVercel::Transfer> {
        ContractEvent::new(
            ETHVercel::Transfer {
                from: address!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa01"),
                to: address!("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb02"),
                tokenId: U256::from(42),
            },
            context(3),
        )
    }

    #[test]
    fn transfer_copies_params_and_provenance() {
        let store = MemoryStore::new();
        let mapper = EventMapper::new(&store, ReplayPolicy::Overwrite);

        mapper.handle_transfer(transfer_event()).unwrap();

        let id = EntityId::from_log(T1, 3);
        let transfer: Transfer = load(&store, &id).unwrap().unwrap();
        assert_eq!(
            transfer,
            Transfer {
                id,
                from: address!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa01"),
                to: address!("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb02"),
                token_id: U256::from(42),
                provenance: Provenance {
                    block_number: 100,
                    block_timestamp: 1_700_000_000,
                    transaction_hash: T1,
                },
            }
        );
    }

    #[test]
    fn replaying_an_event_is_idempotent() {
        let once = MemoryStore::new();
        EventMapper::new(&once, ReplayPolicy::Overwrite)
            .handle_transfer(transfer_event())
            .unwrap();

        let twice = MemoryStore::new();
        let mapper = EventMapper::new(&twice, ReplayPolicy::Overwrite);
        mapper.handle_transfer(transfer_event()).unwrap();
        mapper.handle_transfer(transfer_event()).unwrap();

        assert_eq!(twice.count(EntityKind::Transfer).unwrap(), 1);
        assert_eq!(
            once.scan(EntityKind::Transfer).unwrap(),
            twice.scan(EntityKind::Transfer).unwrap()
        );
    }

    #[test]
    fn skip_existing_keeps_first_write() {
        let store = MemoryStore::new();
        let mapper = EventMapper::new(&store, ReplayPolicy::SkipExisting);

        mapper
            .handle_mint(ContractEvent::new(
                ETHVercel::Mint {
                    _to: Address::ZERO,
                    uri: "ipfs://first".to_string(),
                },
                context(0),
            ))
            .unwrap();
        mapper
            .handle_mint(ContractEvent::new(
                ETHVercel::Mint {
                    _to: Address::ZERO,
                    uri: "ipfs://second".to_string(),
                },
                context(0),
            ))
            .unwrap();

        let mint: Mint = load(&store, &EntityId::from_log(T1, 0)).unwrap().unwrap();
        assert_eq!(mint.uri, "ipfs://first");
    }

    #[test]
    fn overwrite_replaces_record() {
        let store = MemoryStore::new();
        let mapper = EventMapper::new(&store, ReplayPolicy::Overwrite);

        for uri in ["ipfs://first", "ipfs://second"] {
            mapper
                .handle_mint(ContractEvent::new(
                    ETHVercel::Mint {
                        _to: Address::ZERO,
                        uri: uri.to_string(),
                    },
                    context(0),
                ))
                .unwrap();
        }

        let mint: Mint = load(&store, &EntityId::from_log(T1, 0)).unwrap().unwrap();
        assert_eq!(mint.uri, "ipfs://second");
    }

    #[test]
    fn mint_uri_is_stored_verbatim() {
        let store = MemoryStore::new();
        let mapper = EventMapper::new(&store, ReplayPolicy::Overwrite);
        let to = address!("0xcccccccccccccccccccccccccccccccccccccc03");

        for (index, uri) in ["ipfs://x", "  ipfs://padded  ", ""].into_iter().enumerate() {
            mapper
                .handle_mint(ContractEvent::new(
                    ETHVercel::Mint {
                        _to: to,
                        uri: uri.to_string(),
                    },
                    context(index as u32),
                ))
                .unwrap();

            let mint: Mint = load(&store, &EntityId::from_log(T1, index as u32))
                .unwrap()
                .unwrap();
            assert_eq!(mint.uri, uri);
            assert_eq!(mint.to, to);
        }
    }

    #[test]
    fn deployment_record_is_flattened() {
        let store = MemoryStore::new();
        let mapper = EventMapper::new(&store, ReplayPolicy::Overwrite);
        let sender = address!("0x1000000000000000000000000000000000000001");
        let record_owner = address!("0x2000000000000000000000000000000000000002");
        let payload = r#"{"framework":"vite","cid":"bafy..."}"#;

        mapper
            .handle_deployment_map(ContractEvent::new(
                ETHVercel::DeploymentMap {
                    owner: sender,
                    record: ETHVercel::DeploymentRecord {
                        repo_url: "https://github.com/acme/site".to_string(),
                        data: payload.to_string(),
                        tokenuri: "ipfs://token".to_string(),
                        owner: record_owner,
                    },
                },
                context(1),
            ))
            .unwrap();

        let id = EntityId::from_log(T1, 1);
        let record = store.fetch(EntityKind::DeploymentMap, &id).unwrap().unwrap();
        assert_eq!(record["record_repo_url"], "https://github.com/acme/site");
        assert_eq!(record["record_data"], payload);
        assert_eq!(record["record_tokenuri"], "ipfs://token");
        assert_eq!(record["record_owner"], serde_json::to_value(record_owner).unwrap());
        assert_eq!(record["owner"], serde_json::to_value(sender).unwrap());
        assert!(record.get("record").is_none());
    }

    #[test]
    fn kinds_never_overwrite_each_other() {
        let store = MemoryStore::new();
        let mapper = EventMapper::new(&store, ReplayPolicy::Overwrite);

        mapper.handle_transfer(transfer_event()).unwrap();
        mapper
            .handle_approval(ContractEvent::new(
                ETHVercel::Approval {
                    owner: Address::repeat_byte(1),
                    approved: Address::repeat_byte(2),
                    tokenId: U256::from(42),
                },
                context(3),
            ))
            .unwrap();
        mapper
            .handle_upkeep_check(ContractEvent::new(
                ETHVercel::UpkeepCheck {
                    _timestamp: U256::from(1_700_000_000u64),
                },
                context(3),
            ))
            .unwrap();

        for kind in [EntityKind::Transfer, EntityKind::Approval, EntityKind::UpkeepCheck] {
            assert_eq!(store.count(kind).unwrap(), 1, "{kind}");
        }
        let transfer: Transfer = load(&store, &EntityId::from_log(T1, 3)).unwrap().unwrap();
        assert_eq!(transfer.token_id, U256::from(42));
    }

    #[test]
    fn dispatch_routes_every_kind() {
        let store = MemoryStore::new();
        let mapper = EventMapper::new(&store, ReplayPolicy::Overwrite);
        let events = vec![
            DecodedEvent::Approval(ContractEvent::new(
                ETHVercel::Approval {
                    owner: Address::ZERO,
                    approved: Address::ZERO,
                    tokenId: U256::from(1),
                },
                context(0),
            )),
            DecodedEvent::ApprovalForAll(ContractEvent::new(
                ETHVercel::ApprovalForAll {
                    owner: Address::ZERO,
                    operator: Address::ZERO,
                    approved: true,
                },
                context(1),
            )),
            DecodedEvent::DeploymentMap(ContractEvent::new(
                ETHVercel::DeploymentMap {
                    owner: Address::ZERO,
                    record: ETHVercel::DeploymentRecord {
                        repo_url: String::new(),
                        data: String::new(),
                        tokenuri: String::new(),
                        owner: Address::ZERO,
                    },
                },
                context(2),
            )),
            DecodedEvent::Mint(ContractEvent::new(
                ETHVercel::Mint {
                    _to: Address::ZERO,
                    uri: String::new(),
                },
                context(3),
            )),
            DecodedEvent::OwnershipTransferred(ContractEvent::new(
                ETHVercel::OwnershipTransferred {
                    previousOwner: Address::ZERO,
                    newOwner: Address::repeat_byte(9),
                },
                context(4),
            )),
            DecodedEvent::PerformUpkeep(ContractEvent::new(
                ETHVercel::PerformUpkeep {
                    _timestamp: U256::from(1),
                    _counter: U256::from(2),
                },
                context(5),
            )),
            DecodedEvent::Transfer(transfer_event()),
            DecodedEvent::UpkeepCheck(ContractEvent::new(
                ETHVercel::UpkeepCheck {
                    _timestamp: U256::from(1),
                },
                context(7),
            )),
        ];

        for event in events {
            let kind = event.kind();
            mapper.handle(event).unwrap();
            assert_eq!(store.count(kind).unwrap(), 1, "{kind}");
        }

        let upkeep: PerformUpkeep = load(&store, &EntityId::from_log(T1, 5)).unwrap().unwrap();
        assert_eq!(upkeep.counter, U256::from(2));
        let ownership: OwnershipTransferred =
            load(&store, &EntityId::from_log(T1, 4)).unwrap().unwrap();
        assert_eq!(ownership.new_owner, Address::repeat_byte(9));
    }
}
