//! Proxy lifecycle operations against one on-chain proxy admin
//!
//! Every operation except [`ProxyAdminManager::attach`] checks the contract
//! against the upgradeable allow-list before touching the chain.

use std::sync::Arc;

use alloy::{
    primitives::{Address, Bytes},
    sol_types::SolValue,
};

use crate::{
    artifacts::ArtifactStore,
    chain::{ChainClient, ChainClientExt},
    config::AllowList,
    constants::{INITIALIZER_FN, NUM_DEPLOY_CONFIRMATIONS},
    errors::DeployError,
    events::{DeployEvent, EventSink},
    solidity::{getProxyImplementationCall, upgradeCall},
    types::{ContractHandle, DeployTx, UpgradeableInfo},
};

/// Wraps one proxy admin contract instance
pub struct ProxyAdminManager<C, A> {
    /// The proxy admin address
    proxy_admin: Address,
    /// The name of the proxy contract artifact
    proxy_contract: String,
    /// The chain client
    client: Arc<C>,
    /// The artifact store
    artifacts: Arc<A>,
    /// The upgradeable contracts allow-list
    allow_list: Arc<AllowList>,
    /// Where to report what happened
    events: Arc<dyn EventSink>,
}

impl<C: ChainClient, A: ArtifactStore> ProxyAdminManager<C, A> {
    /// Constructor
    pub fn new(
        proxy_admin: Address,
        proxy_contract: &str,
        client: Arc<C>,
        artifacts: Arc<A>,
        allow_list: Arc<AllowList>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        ProxyAdminManager {
            proxy_admin,
            proxy_contract: proxy_contract.to_string(),
            client,
            artifacts,
            allow_list,
            events,
        }
    }

    /// The implementation the proxy admin reports for the given proxy
    pub async fn proxy_implementation(&self, proxy: Address) -> Result<Address, DeployError> {
        let ret = self
            .client
            .call_sol(self.proxy_admin, getProxyImplementationCall { proxy })
            .await?;

        Ok(ret.implementation)
    }

    /// Attach to an existing proxy, reading its current implementation
    ///
    /// Sends no transaction.
    pub async fn attach(&self, name: &str, proxy: Address) -> Result<ContractHandle, DeployError> {
        let implementation = self.proxy_implementation(proxy).await?;
        self.events.emit(&DeployEvent::Linked {
            name: name.to_string(),
            address: proxy,
        });

        Ok(ContractHandle::proxied(
            name,
            UpgradeableInfo {
                proxy,
                implementation,
                old_implementation: None,
                proxy_admin: self.proxy_admin,
            },
            None, /* deploy_tx */
        ))
    }

    /// Deploy a fresh implementation and a new proxy in front of it
    ///
    /// `init_args` are encoded as a call to `initialize`; without them the
    /// proxy is created with empty call data.
    pub async fn deploy_new_proxy(
        &self,
        name: &str,
        constructor_args: Option<&[String]>,
        init_args: Option<&[String]>,
    ) -> Result<ContractHandle, DeployError> {
        self.allow_list.ensure_upgradeable(name)?;

        let init_data = self.init_data(name, init_args)?;
        let constructor_args = constructor_args.unwrap_or_default();
        let implementation = self.deploy_implementation(name, constructor_args).await?;
        self.deploy_proxy(name, implementation, init_data).await
    }

    /// Deploy a new proxy in front of an implementation deployed earlier
    pub async fn deploy_new_proxy_for_deployed_impl(
        &self,
        name: &str,
        implementation: Address,
        init_args: Option<&[String]>,
    ) -> Result<ContractHandle, DeployError> {
        self.allow_list.ensure_upgradeable(name)?;

        let init_data = self.init_data(name, init_args)?;
        self.deploy_proxy(name, implementation, init_data).await
    }

    /// Register an out-of-band proxy / implementation pair with this proxy admin
    ///
    /// Issues a real `upgrade` call even though both contracts exist, since a
    /// proxy admin only manages proxies it has upgraded at least once.
    pub async fn adopt_deployed_pair(
        &self,
        name: &str,
        proxy: Address,
        implementation: Address,
    ) -> Result<ContractHandle, DeployError> {
        self.allow_list.ensure_upgradeable(name)?;
        self.retarget(name, proxy, implementation, None /* old_implementation */)
            .await?;

        Ok(ContractHandle::proxied(
            name,
            UpgradeableInfo {
                proxy,
                implementation,
                old_implementation: None,
                proxy_admin: self.proxy_admin,
            },
            None, /* deploy_tx */
        ))
    }

    /// Deploy a fresh implementation and retarget the proxy to it
    pub async fn upgrade(&self, proxy: Address, name: &str) -> Result<ContractHandle, DeployError> {
        self.allow_list.ensure_upgradeable(name)?;

        let old_implementation = self.proxy_implementation(proxy).await?;
        let implementation = self.deploy_implementation(name, &[]).await?;
        self.upgraded_handle(name, proxy, old_implementation, implementation)
            .await
    }

    /// Retarget the proxy to an implementation deployed earlier
    pub async fn upgrade_with_deployed_impl(
        &self,
        proxy: Address,
        name: &str,
        implementation: Address,
    ) -> Result<ContractHandle, DeployError> {
        self.allow_list.ensure_upgradeable(name)?;

        let old_implementation = self.proxy_implementation(proxy).await?;
        self.upgraded_handle(name, proxy, old_implementation, implementation)
            .await
    }

    // -----------
    // | Helpers |
    // -----------

    /// Retarget the proxy and build the resulting handle
    async fn upgraded_handle(
        &self,
        name: &str,
        proxy: Address,
        old_implementation: Address,
        implementation: Address,
    ) -> Result<ContractHandle, DeployError> {
        self.retarget(name, proxy, implementation, Some(old_implementation))
            .await?;

        Ok(ContractHandle::proxied(
            name,
            UpgradeableInfo {
                proxy,
                implementation,
                old_implementation: Some(old_implementation),
                proxy_admin: self.proxy_admin,
            },
            None, /* deploy_tx */
        ))
    }

    /// Call the proxy admin's `upgrade` entry point and wait for confirmation
    async fn retarget(
        &self,
        name: &str,
        proxy: Address,
        implementation: Address,
        old_implementation: Option<Address>,
    ) -> Result<(), DeployError> {
        let receipt = self
            .client
            .send_sol(
                self.proxy_admin,
                upgradeCall {
                    proxy,
                    implementation,
                },
                NUM_DEPLOY_CONFIRMATIONS,
            )
            .await?;

        self.events.emit(&DeployEvent::Upgraded {
            name: name.to_string(),
            proxy,
            old_implementation,
            implementation,
            tx_hash: receipt.tx_hash,
        });
        Ok(())
    }

    /// Deploy the implementation contract of the given name
    async fn deploy_implementation(
        &self,
        name: &str,
        constructor_args: &[String],
    ) -> Result<Address, DeployError> {
        let artifact = self.artifacts.resolve(name)?;
        let init_code = artifact.deploy_code(constructor_args)?;

        let deployment = self.client.deploy(init_code).await?;
        self.events.emit(&DeployEvent::Deployed {
            name: name.to_string(),
            address: deployment.address,
            tx_hash: deployment.tx_hash,
        });

        Ok(deployment.address)
    }

    /// Encode the `initialize` call run by the proxy constructor, empty
    /// without init args
    ///
    /// Called before any transaction is sent so bad arguments fail early.
    fn init_data(&self, name: &str, init_args: Option<&[String]>) -> Result<Bytes, DeployError> {
        match init_args {
            Some(args) => self.artifacts.resolve(name)?.encode_call(INITIALIZER_FN, args),
            None => Ok(Bytes::new()),
        }
    }

    /// Deploy a proxy bound to `{implementation, proxy admin, init data}`
    async fn deploy_proxy(
        &self,
        name: &str,
        implementation: Address,
        init_data: Bytes,
    ) -> Result<ContractHandle, DeployError> {
        let proxy_artifact = self.artifacts.resolve(&self.proxy_contract)?;
        let constructor_args = (implementation, self.proxy_admin, init_data).abi_encode_params();
        let init_code: Bytes = [proxy_artifact.bytecode.as_ref(), constructor_args.as_slice()]
            .concat()
            .into();

        let deployment = self.client.deploy(init_code).await?;
        let receipt = self
            .client
            .wait(deployment.tx_hash, NUM_DEPLOY_CONFIRMATIONS)
            .await?;
        self.events.emit(&DeployEvent::ProxyDeployed {
            name: name.to_string(),
            proxy: deployment.address,
            implementation,
        });

        Ok(ContractHandle::proxied(
            name,
            UpgradeableInfo {
                proxy: deployment.address,
                implementation,
                old_implementation: None,
                proxy_admin: self.proxy_admin,
            },
            Some(DeployTx::from(receipt)),
        ))
    }
}
