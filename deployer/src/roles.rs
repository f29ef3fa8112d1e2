//! A binding to an `Ownable` / `AccessControl` contract

use std::sync::Arc;

use alloy::primitives::{Address, B256};

use crate::{
    chain::{ChainClient, ChainClientExt},
    constants::NUM_DEPLOY_CONFIRMATIONS,
    errors::DeployError,
    events::{DeployEvent, EventSink},
    solidity::{grantRoleCall, hasRoleCall, ownerCall, revokeRoleCall, transferOwnershipCall},
    types::Receipt,
};

/// A live contract exposing ownership and role management
pub struct RoleBinding<C> {
    /// The contract name, for reporting
    name: String,
    /// The contract address
    address: Address,
    /// The chain client
    client: Arc<C>,
    /// Where to report confirmed transactions
    events: Arc<dyn EventSink>,
}

impl<C: ChainClient> RoleBinding<C> {
    /// Attach to the contract at the given address
    pub fn new(name: &str, address: Address, client: Arc<C>, events: Arc<dyn EventSink>) -> Self {
        RoleBinding {
            name: name.to_string(),
            address,
            client,
            events,
        }
    }

    /// The current owner
    pub async fn owner(&self) -> Result<Address, DeployError> {
        Ok(self.client.call_sol(self.address, ownerCall {}).await?.owner)
    }

    /// Whether `account` holds `role`
    pub async fn has_role(&self, role: B256, account: Address) -> Result<bool, DeployError> {
        let ret = self
            .client
            .call_sol(self.address, hasRoleCall { role, account })
            .await?;

        Ok(ret.granted)
    }

    /// Transfer ownership to `new_owner`
    pub async fn transfer_ownership(&self, new_owner: Address) -> Result<Receipt, DeployError> {
        let receipt = self
            .client
            .send_sol(
                self.address,
                transferOwnershipCall {
                    newOwner: new_owner,
                },
                NUM_DEPLOY_CONFIRMATIONS,
            )
            .await?;

        self.report("transferOwnership", None, new_owner, &receipt);
        Ok(receipt)
    }

    /// Grant `role` to `account`
    pub async fn grant_role(&self, role: B256, account: Address) -> Result<Receipt, DeployError> {
        let receipt = self
            .client
            .send_sol(
                self.address,
                grantRoleCall { role, account },
                NUM_DEPLOY_CONFIRMATIONS,
            )
            .await?;

        self.report("grantRole", Some(role), account, &receipt);
        Ok(receipt)
    }

    /// Revoke `role` from `account`
    pub async fn revoke_role(&self, role: B256, account: Address) -> Result<Receipt, DeployError> {
        let receipt = self
            .client
            .send_sol(
                self.address,
                revokeRoleCall { role, account },
                NUM_DEPLOY_CONFIRMATIONS,
            )
            .await?;

        self.report("revokeRole", Some(role), account, &receipt);
        Ok(receipt)
    }

    /// Emit a [`DeployEvent::RoleUpdated`] for a confirmed transaction
    fn report(&self, action: &'static str, role: Option<B256>, account: Address, receipt: &Receipt) {
        self.events.emit(&DeployEvent::RoleUpdated {
            name: self.name.clone(),
            address: self.address,
            action,
            role,
            account,
            tx_hash: receipt.tx_hash,
        });
    }
}
