use alloy_primitives::B256;
use alloy_sol_types::{SolEvent, sol};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    contract ETHVercel {
        struct DeploymentRecord {
            string repo_url;
            string data;
            string tokenuri;
            address owner;
        }

        event Approval(address indexed owner, address indexed approved, uint256 indexed tokenId);
        event ApprovalForAll(address indexed owner, address indexed operator, bool approved);
        event DeploymentMap(address owner, DeploymentRecord record);
        event Mint(address _to, string uri);
        event OwnershipTransferred(address indexed previousOwner, address indexed newOwner);
        event PerformUpkeep(uint256 _timestamp, uint256 _counter);
        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
        event UpkeepCheck(uint256 _timestamp);
    }
}

/// topic0 of every event the indexer maps. Used as the server-side log filter.
pub const EVENT_SIGNATURES: [B256; 8] = [
    ETHVercel::Approval::SIGNATURE_HASH,
    ETHVercel::ApprovalForAll::SIGNATURE_HASH,
    ETHVercel::DeploymentMap::SIGNATURE_HASH,
    ETHVercel::Mint::SIGNATURE_HASH,
    ETHVercel::OwnershipTransferred::SIGNATURE_HASH,
    ETHVercel::PerformUpkeep::SIGNATURE_HASH,
    ETHVercel::Transfer::SIGNATURE_HASH,
    ETHVercel::UpkeepCheck::SIGNATURE_HASH,
];
