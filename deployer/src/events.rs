//! Structured events emitted by the deployer
//!
//! The decision logic never prints; it reports what it did through an
//! [`EventSink`], and the caller decides how to surface it.

use std::path::PathBuf;

use alloy::primitives::{Address, TxHash, B256};
use tracing::{info, warn};

use crate::types::Branch;

/// Something the deployer did, or observed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeployEvent {
    /// The orchestrator picked a branch for an operation
    BranchSelected {
        /// The orchestrator operation
        operation: &'static str,
        /// The contract name
        name: String,
        /// The branch taken
        branch: Branch,
    },
    /// A proxy admin manager was created for an admin address
    ProxyAdminAttached {
        /// The proxy admin address
        proxy_admin: Address,
    },
    /// A contract creation transaction was confirmed
    Deployed {
        /// The contract name
        name: String,
        /// The created contract
        address: Address,
        /// The creation transaction
        tx_hash: TxHash,
    },
    /// An existing contract was attached to without sending a transaction
    Linked {
        /// The contract name
        name: String,
        /// The attached contract
        address: Address,
    },
    /// A proxy was deployed in front of an implementation
    ProxyDeployed {
        /// The contract name
        name: String,
        /// The new proxy
        proxy: Address,
        /// The implementation behind it
        implementation: Address,
    },
    /// A proxy admin was pointed at an implementation
    Upgraded {
        /// The contract name
        name: String,
        /// The proxy
        proxy: Address,
        /// The implementation before the call
        old_implementation: Option<Address>,
        /// The implementation after the call
        implementation: Address,
        /// The upgrade transaction
        tx_hash: TxHash,
    },
    /// A role or ownership transaction was confirmed
    RoleUpdated {
        /// The contract name
        name: String,
        /// The contract address
        address: Address,
        /// What was done, e.g. `grantRole`
        action: &'static str,
        /// The role, for role calls
        role: Option<B256>,
        /// The account the call targeted
        account: Address,
        /// The transaction
        tx_hash: TxHash,
    },
    /// A permission check found a mismatch
    PermissionMismatch {
        /// The contract name
        name: String,
        /// A description of the mismatch
        detail: String,
    },
    /// The run's record file was rewritten
    RecordsWritten {
        /// The record file
        path: PathBuf,
    },
}

/// Receives the events emitted by the deployer
pub trait EventSink: Send + Sync {
    /// Handle one event
    fn emit(&self, event: &DeployEvent);
}

/// An [`EventSink`] logging every event through `tracing`
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &DeployEvent) {
        match event {
            DeployEvent::BranchSelected {
                operation,
                name,
                branch,
            } => info!(operation, %name, %branch, "==========>"),
            DeployEvent::ProxyAdminAttached { proxy_admin } => {
                info!(%proxy_admin, "attached proxy admin")
            }
            DeployEvent::Deployed {
                name,
                address,
                tx_hash,
            } => info!(%name, %address, %tx_hash, "deployed"),
            DeployEvent::Linked { name, address } => info!(%name, %address, "linked"),
            DeployEvent::ProxyDeployed {
                name,
                proxy,
                implementation,
            } => info!(%name, %proxy, %implementation, "deployed over proxy"),
            DeployEvent::Upgraded {
                name,
                proxy,
                old_implementation,
                implementation,
                tx_hash,
            } => info!(
                %name,
                %proxy,
                old_implementation = ?old_implementation,
                %implementation,
                %tx_hash,
                "proxyAdmin.upgrade"
            ),
            DeployEvent::RoleUpdated {
                name,
                address,
                action,
                role,
                account,
                tx_hash,
            } => info!(%name, %address, action, role = ?role, %account, %tx_hash, "role updated"),
            DeployEvent::PermissionMismatch { name, detail } => {
                warn!(%name, %detail, "assertion failed")
            }
            DeployEvent::RecordsWritten { path } => {
                info!(path = %path.display(), "write to")
            }
        }
    }
}
