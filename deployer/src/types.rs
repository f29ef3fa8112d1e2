//! Type definitions used throughout the deployer

use std::fmt::{self, Display};

use alloy::primitives::{Address, TxHash};
use serde::{Deserialize, Serialize};

// -----------------
// | Chain Results |
// -----------------

/// A contract creation broadcast by the chain client
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deployment {
    /// The address of the created contract
    pub address: Address,
    /// The hash of the creation transaction
    pub tx_hash: TxHash,
}

/// The parts of a transaction receipt the deployer cares about
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Receipt {
    /// The hash of the confirmed transaction
    pub tx_hash: TxHash,
    /// The block the transaction was included in
    pub block_number: u64,
}

impl From<Receipt> for DeployTx {
    fn from(receipt: Receipt) -> Self {
        DeployTx {
            hash: receipt.tx_hash,
            block_number: receipt.block_number,
        }
    }
}

// --------------------
// | Contract Handles |
// --------------------

/// A confirmed transaction that created the contract behind a handle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeployTx {
    /// The transaction hash
    pub hash: TxHash,
    /// The block the transaction was confirmed in
    pub block_number: u64,
}

/// Addresses describing a contract that lives behind an upgradeable proxy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpgradeableInfo {
    /// The proxy address, fixed for the lifetime of the contract
    pub proxy: Address,
    /// The implementation the proxy currently points at
    pub implementation: Address,
    /// The implementation the proxy pointed at before an upgrade
    pub old_implementation: Option<Address>,
    /// The proxy admin managing the proxy
    pub proxy_admin: Address,
}

/// The result of a deploy, link or upgrade operation
///
/// A handle is a plain value: it describes where a contract lives and how it
/// got there, and is never mutated once returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractHandle {
    /// The contract name, as known to the artifact store
    pub name: String,
    /// The address callers should talk to; the proxy for upgradeable contracts
    pub address: Address,
    /// Proxy details, set iff the contract is upgradeable
    pub upgradeable: Option<UpgradeableInfo>,
    /// The creation transaction, absent for linked contracts
    pub deploy_tx: Option<DeployTx>,
}

impl ContractHandle {
    /// A handle to an already deployed, non-upgradeable contract
    pub fn linked(name: &str, address: Address) -> Self {
        ContractHandle {
            name: name.to_string(),
            address,
            upgradeable: None,
            deploy_tx: None,
        }
    }

    /// A handle to a freshly deployed, non-upgradeable contract
    pub fn deployed(name: &str, address: Address, deploy_tx: DeployTx) -> Self {
        ContractHandle {
            name: name.to_string(),
            address,
            upgradeable: None,
            deploy_tx: Some(deploy_tx),
        }
    }

    /// A handle to a contract behind a proxy
    pub fn proxied(name: &str, info: UpgradeableInfo, deploy_tx: Option<DeployTx>) -> Self {
        ContractHandle {
            name: name.to_string(),
            address: info.proxy,
            upgradeable: Some(info),
            deploy_tx,
        }
    }

    /// The proxy address, if upgradeable
    pub fn proxy_address(&self) -> Option<Address> {
        self.upgradeable.map(|info| info.proxy)
    }

    /// The current implementation address, if upgradeable
    pub fn implementation_address(&self) -> Option<Address> {
        self.upgradeable.map(|info| info.implementation)
    }

    /// The pre-upgrade implementation address, if this handle came from an upgrade
    pub fn old_implementation_address(&self) -> Option<Address> {
        self.upgradeable.and_then(|info| info.old_implementation)
    }

    /// The proxy admin address, if upgradeable
    pub fn proxy_admin_address(&self) -> Option<Address> {
        self.upgradeable.map(|info| info.proxy_admin)
    }

    /// Whether the handle was produced by a confirmed creation transaction
    pub fn is_deployed(&self) -> bool {
        self.deploy_tx.is_some()
    }
}

// ------------
// | Branches |
// ------------

/// The decision taken by the orchestrator for a single operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Branch {
    /// Attach to an address recorded in `deployedContract`
    Link,
    /// Deploy a new plain contract
    Deploy,
    /// Register a `deployedUpgradeableContract` pair with the proxy admin
    AdoptDeployedPair,
    /// Deploy a new implementation and a new proxy
    DeployProxy,
    /// Deploy a new proxy in front of an existing implementation
    DeployProxyForImpl,
    /// Deploy a new implementation and retarget an existing proxy
    Upgrade,
    /// Retarget an existing proxy to an existing implementation
    UpgradeWithImpl,
}

impl Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Link => write!(f, "link"),
            Branch::Deploy => write!(f, "deploy"),
            Branch::AdoptDeployedPair => write!(f, "adopt-deployed-pair"),
            Branch::DeployProxy => write!(f, "deploy-proxy"),
            Branch::DeployProxyForImpl => write!(f, "deploy-proxy-for-impl"),
            Branch::Upgrade => write!(f, "upgrade"),
            Branch::UpgradeWithImpl => write!(f, "upgrade-with-impl"),
        }
    }
}
