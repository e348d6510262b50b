use alloy_primitives::{Address, B256, FixedBytes, U256, hex};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

////////////////////////////////////// Identity //////////////////////////////////////

/// Entity key: the 32-byte transaction hash followed by the log index as a
/// little-endian i32 (same layout as `Bytes.concatI32` in graph-ts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(FixedBytes<36>);

impl EntityId {
    pub fn from_log(transaction_hash: B256, log_index: u32) -> Self {
        let mut bytes = [0u8; 36];
        bytes[..32].copy_from_slice(transaction_hash.as_slice());
        bytes[32..].copy_from_slice(&log_index.to_le_bytes());
        Self(FixedBytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn to_hex(&self) -> String {
        hex::encode_prefixed(self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Storage namespace. Each event kind is written to its own namespace so ids
/// shared across kinds never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Approval,
    ApprovalForAll,
    DeploymentMap,
    Mint,
    OwnershipTransferred,
    PerformUpkeep,
    Transfer,
    UpkeepCheck,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Approval,
        EntityKind::ApprovalForAll,
        EntityKind::DeploymentMap,
        EntityKind::Mint,
        EntityKind::OwnershipTransferred,
        EntityKind::PerformUpkeep,
        EntityKind::Transfer,
        EntityKind::UpkeepCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Approval => "Approval",
            EntityKind::ApprovalForAll => "ApprovalForAll",
            EntityKind::DeploymentMap => "DeploymentMap",
            EntityKind::Mint => "Mint",
            EntityKind::OwnershipTransferred => "OwnershipTransferred",
            EntityKind::PerformUpkeep => "PerformUpkeep",
            EntityKind::Transfer => "Transfer",
            EntityKind::UpkeepCheck => "UpkeepCheck",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Block and transaction the event was observed in. Copied verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    #[serde(with = "decimal")]
    pub block_number: u64,
    #[serde(with = "decimal")]
    pub block_timestamp: u64,
    pub transaction_hash: B256,
}

pub trait Entity: Serialize + DeserializeOwned {
    const KIND: EntityKind;

    fn id(&self) -> EntityId;

    fn provenance(&self) -> &Provenance;
}

/// Integers (uint256, block numbers, timestamps) are stored as decimal strings
/// so consumers never lose precision.
pub mod decimal {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(D::Error::custom(format!("expected a decimal integer, got {raw:?}")));
        }
        raw.parse().map_err(D::Error::custom)
    }
}

/////////////////////////////////////// Entities ///////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    pub id: EntityId,
    pub owner: Address,
    pub approved: Address,
    #[serde(with = "decimal")]
    pub token_id: U256,
    #[serde(flatten)]
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalForAll {
    pub id: EntityId,
    pub owner: Address,
    pub operator: Address,
    pub approved: bool,
    #[serde(flatten)]
    pub provenance: Provenance,
}

// `record` tuple flattened into prefixed top-level fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentMap {
    pub id: EntityId,
    pub owner: Address,
    pub record_repo_url: String,
    pub record_data: String,
    pub record_tokenuri: String,
    pub record_owner: Address,
    #[serde(flatten)]
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mint {
    pub id: EntityId,
    #[serde(rename = "_to", alias = "to")]
    pub to: Address,
    pub uri: String,
    #[serde(flatten)]
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipTransferred {
    pub id: EntityId,
    pub previous_owner: Address,
    pub new_owner: Address,
    #[serde(flatten)]
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformUpkeep {
    pub id: EntityId,
    #[serde(rename = "_timestamp", alias = "timestamp", with = "decimal")]
    pub timestamp: U256,
    #[serde(rename = "_counter", alias = "counter", with = "decimal")]
    pub counter: U256,
    #[serde(flatten)]
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: EntityId,
    pub from: Address,
    pub to: Address,
    #[serde(with = "decimal")]
    pub token_id: U256,
    #[serde(flatten)]
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpkeepCheck {
    pub id: EntityId,
    #[serde(rename = "_timestamp", alias = "timestamp", with = "decimal")]
    pub timestamp: U256,
    #[serde(flatten)]
    pub provenance: Provenance,
}

macro_rules! impl_entity {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Entity for $ty {
                const KIND: EntityKind = EntityKind::$ty;

                fn id(&self) -> EntityId {
                    self.id
                }

                fn provenance(&self) -> &Provenance {
                    &self.provenance
                }
            }
        )*
    };
}

impl_entity!(
    Approval,
    ApprovalForAll,
    DeploymentMap,
    Mint,
    OwnershipTransferred,
    PerformUpkeep,
    Transfer,
    UpkeepCheck,
);

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256};
    use std::collections::HashSet;

    const TX: B256 = b256!("0x1111111111111111111111111111111111111111111111111111111111111111");

    #[test]
    fn id_is_hash_followed_by_little_endian_index() {
        let id = EntityId::from_log(TX, 3);
        let bytes = id.as_bytes();
        assert_eq!(bytes.len(), 36);
        assert_eq!(&bytes[..32], TX.as_slice());
        assert_eq!(&bytes[32..], &[3, 0, 0, 0]);
    }

    #[test]
    fn id_is_deterministic() {
        assert_eq!(EntityId::from_log(TX, 7), EntityId::from_log(TX, 7));
    }

    #[test]
    fn ids_are_distinct_for_distinct_logs() {
        let other = b256!("0x2222222222222222222222222222222222222222222222222222222222222222");
        let mut seen = HashSet::new();
        for hash in [TX, other] {
            for index in [0u32, 1, 2, 255, 256, 65_536, u32::MAX] {
                assert!(seen.insert(EntityId::from_log(hash, index)));
            }
        }
    }

    #[test]
    fn id_renders_as_prefixed_hex() {
        let id = EntityId::from_log(TX, 1);
        let rendered = id.to_string();
        assert!(rendered.starts_with("0x"));
        assert_eq!(rendered.len(), 2 + 72);
        assert!(rendered.ends_with("01000000"));
    }

    #[test]
    fn wire_names_match_the_query_schema() {
        let mint = Mint {
            id: EntityId::from_log(TX, 0),
            to: address!("0xcccccccccccccccccccccccccccccccccccccc03"),
            uri: "ipfs://x".to_string(),
            provenance: Provenance {
                block_number: 100,
                block_timestamp: 1_700_000_000,
                transaction_hash: TX,
            },
        };
        let value = serde_json::to_value(&mint).unwrap();
        let object = value.as_object().unwrap();
        for field in ["id", "_to", "uri", "blockNumber", "blockTimestamp", "transactionHash"] {
            assert!(object.contains_key(field), "missing {field}");
        }
        assert_eq!(object.len(), 6);
    }

    #[test]
    fn uint256_serializes_as_decimal_string() {
        let transfer = Transfer {
            id: EntityId::from_log(TX, 0),
            from: Address::ZERO,
            to: Address::ZERO,
            token_id: U256::MAX,
            provenance: Provenance {
                block_number: 1,
                block_timestamp: 2,
                transaction_hash: TX,
            },
        };
        let value = serde_json::to_value(&transfer).unwrap();
        assert_eq!(value["tokenId"], U256::MAX.to_string());

        let back: Transfer = serde_json::from_value(value).unwrap();
        assert_eq!(back, transfer);
    }

    #[test]
    fn provenance_integers_serialize_as_decimal_strings() {
        let provenance = Provenance {
            block_number: u64::MAX,
            block_timestamp: 1_700_000_000,
            transaction_hash: TX,
        };
        let value = serde_json::to_value(&provenance).unwrap();
        assert_eq!(value["blockNumber"], "18446744073709551615");
        assert_eq!(value["blockTimestamp"], "1700000000");

        let back: Provenance = serde_json::from_value(value).unwrap();
        assert_eq!(back, provenance);

        let hex = serde_json::json!({
            "blockNumber": "0x10",
            "blockTimestamp": "1",
            "transactionHash": TX,
        });
        assert!(serde_json::from_value::<Provenance>(hex).is_err());
    }

    #[test]
    fn bare_upkeep_names_are_accepted_on_input() {
        let json = serde_json::json!({
            "id": EntityId::from_log(TX, 2),
            "timestamp": "1700000000",
            "counter": "9",
            "blockNumber": "5",
            "blockTimestamp": "1700000000",
            "transactionHash": TX,
        });
        let upkeep: PerformUpkeep = serde_json::from_value(json).unwrap();
        assert_eq!(upkeep.counter, U256::from(9));
        assert_eq!(upkeep.timestamp, U256::from(1_700_000_000u64));
    }
}
