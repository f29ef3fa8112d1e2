//! The deployment orchestrator
//!
//! A [`Manager`] owns everything scoped to one run: the merged working
//! configuration, the proxy admin registry and the dictionary of handled
//! contracts. For each contract it picks a branch (link, adopt, deploy,
//! upgrade), delegates the chain work, and rewrites the environment's record
//! file after every call that handles a contract.

use std::{
    collections::{hash_map::Entry, BTreeMap, HashMap},
    path::PathBuf,
    sync::Arc,
};

use alloy::primitives::Address;

use crate::{
    artifacts::ArtifactStore,
    chain::ChainClient,
    config::{AllowList, ConfigFile, DeployedPair, EnvironmentConfig},
    constants::{
        ADMIN_ROLE, DEFAULT_ADMIN_ROLE, DEFAULT_PROXY_CONTRACT, NUM_DEPLOY_CONFIRMATIONS,
    },
    errors::DeployError,
    events::{DeployEvent, EventSink},
    proxy_admin::ProxyAdminManager,
    records::RecordStore,
    roles::RoleBinding,
    types::{Branch, ContractHandle, DeployTx},
};

/// What the working configuration already knows about an upgradeable contract
enum Configured {
    /// Listed in `deployedContract`
    Linked(Address),
    /// Listed in `deployedUpgradeableContract`
    Pair(DeployedPair),
}

/// Orchestrates the deployment run of one environment
pub struct Manager<C, A> {
    /// The environment name
    environment: String,
    /// The working configuration: static defaults overlaid by run overrides
    config: EnvironmentConfig,
    /// The upgradeable contracts allow-list
    allow_list: Arc<AllowList>,
    /// ABI names recorded in place of artifact names
    abi_aliases: BTreeMap<String, String>,
    /// The name of the proxy contract artifact
    proxy_contract: String,
    /// The chain client
    client: Arc<C>,
    /// The artifact store
    artifacts: Arc<A>,
    /// Where the handled contracts are persisted
    records: RecordStore,
    /// Where to report what happened
    events: Arc<dyn EventSink>,
    /// The contracts handled so far, keyed by name
    handles: BTreeMap<String, ContractHandle>,
    /// One proxy admin manager per proxy admin address, created on first use
    proxy_admins: HashMap<Address, ProxyAdminManager<C, A>>,
}

impl<C: ChainClient, A: ArtifactStore> Manager<C, A> {
    /// Set up a run against `environment`, overlaying `overrides` on the
    /// environment's static configuration
    ///
    /// Fails with [`DeployError::Config`] if the config file does not define
    /// the environment.
    pub fn new(
        environment: &str,
        config_file: &ConfigFile,
        overrides: &EnvironmentConfig,
        client: Arc<C>,
        artifacts: Arc<A>,
        records: RecordStore,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, DeployError> {
        let config = config_file.environment(environment)?.merge(overrides);

        Ok(Manager {
            environment: environment.to_string(),
            config,
            allow_list: Arc::new(config_file.allow_list()),
            abi_aliases: config_file.abi_aliases.clone(),
            proxy_contract: DEFAULT_PROXY_CONTRACT.to_string(),
            client,
            artifacts,
            records,
            events,
            handles: BTreeMap::new(),
            proxy_admins: HashMap::new(),
        })
    }

    /// Deploy proxies from the given artifact instead of the default one
    ///
    /// Applies to proxy admin managers created afterwards.
    pub fn with_proxy_contract(mut self, proxy_contract: &str) -> Self {
        self.proxy_contract = proxy_contract.to_string();
        self
    }

    /// The environment name
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// The working configuration
    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// Overlay more overrides on the working configuration
    pub fn increase_config(&mut self, overrides: &EnvironmentConfig) -> &EnvironmentConfig {
        self.config = self.config.merge(overrides);
        &self.config
    }

    /// The contracts handled so far, keyed by name
    pub fn handles(&self) -> &BTreeMap<String, ContractHandle> {
        &self.handles
    }

    /// The handle recorded for the given contract
    pub fn handle(&self, name: &str) -> Option<&ContractHandle> {
        self.handles.get(name)
    }

    /// The chain client
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// The manager of the given proxy admin, created on first reference
    pub fn add_proxy_admin(&mut self, proxy_admin: Address) -> &ProxyAdminManager<C, A> {
        match self.proxy_admins.entry(proxy_admin) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.events.emit(&DeployEvent::ProxyAdminAttached { proxy_admin });
                entry.insert(ProxyAdminManager::new(
                    proxy_admin,
                    &self.proxy_contract,
                    self.client.clone(),
                    self.artifacts.clone(),
                    self.allow_list.clone(),
                    self.events.clone(),
                ))
            }
        }
    }

    // ---------------------------
    // | Deploy / Link / Upgrade |
    // ---------------------------

    /// Link the contract listed in `deployedContract`, or deploy it with the
    /// given constructor arguments
    pub async fn deploy_or_link(
        &mut self,
        name: &str,
        constructor_args: &[String],
    ) -> Result<ContractHandle, DeployError> {
        self.ensure_recordable(name)?;

        let handle = match self.config.deployed_address(name) {
            Some(address) => {
                self.select("deploy_or_link", name, Branch::Link);
                self.events.emit(&DeployEvent::Linked {
                    name: name.to_string(),
                    address,
                });
                ContractHandle::linked(name, address)
            }
            None => {
                self.select("deploy_or_link", name, Branch::Deploy);
                self.deploy_plain(name, constructor_args).await?
            }
        };

        self.record(handle)
    }

    /// Link, adopt, or deploy an upgradeable contract behind a new proxy
    ///
    /// Branches in priority order: `deployedContract` attaches to the listed
    /// proxy, `deployedUpgradeableContract` registers the listed pair with the
    /// proxy admin, and otherwise a fresh implementation is deployed behind a
    /// new proxy initialized with `init_args`.
    pub async fn deploy_upgradeable_or_link(
        &mut self,
        name: &str,
        proxy_admin: Address,
        init_args: Option<&[String]>,
    ) -> Result<ContractHandle, DeployError> {
        self.allow_list.ensure_upgradeable(name)?;
        self.ensure_recordable(name)?;
        let operation = "deploy_upgradeable_or_link";

        let handle = match self.configured(name) {
            Some(configured) => {
                self.link_or_adopt(operation, name, proxy_admin, configured)
                    .await?
            }
            None => {
                self.select(operation, name, Branch::DeployProxy);
                self.add_proxy_admin(proxy_admin)
                    .deploy_new_proxy(name, None /* constructor_args */, init_args)
                    .await?
            }
        };

        self.record(handle)
    }

    /// As [`Manager::deploy_upgradeable_or_link`], but a fresh deploy puts the
    /// new proxy in front of `implementation` instead of deploying one
    pub async fn deploy_upgradeable_with_deployed_impl_or_link(
        &mut self,
        name: &str,
        proxy_admin: Address,
        implementation: Address,
        init_args: Option<&[String]>,
    ) -> Result<ContractHandle, DeployError> {
        self.allow_list.ensure_upgradeable(name)?;
        self.ensure_recordable(name)?;
        let operation = "deploy_upgradeable_with_deployed_impl_or_link";

        let handle = match self.configured(name) {
            Some(configured) => {
                self.link_or_adopt(operation, name, proxy_admin, configured)
                    .await?
            }
            None => {
                self.select(operation, name, Branch::DeployProxyForImpl);
                self.add_proxy_admin(proxy_admin)
                    .deploy_new_proxy_for_deployed_impl(name, implementation, init_args)
                    .await?
            }
        };

        self.record(handle)
    }

    /// Link the proxy listed in `deployedContract`, or deploy a fresh
    /// implementation and retarget `proxy` to it
    pub async fn upgrade_or_link(
        &mut self,
        name: &str,
        proxy_admin: Address,
        proxy: Address,
    ) -> Result<ContractHandle, DeployError> {
        self.allow_list.ensure_upgradeable(name)?;
        self.ensure_recordable(name)?;

        let handle = match self.config.deployed_address(name) {
            Some(linked) => {
                self.select("upgrade_or_link", name, Branch::Link);
                self.add_proxy_admin(proxy_admin).attach(name, linked).await?
            }
            None => {
                self.select("upgrade_or_link", name, Branch::Upgrade);
                self.add_proxy_admin(proxy_admin).upgrade(proxy, name).await?
            }
        };

        self.record(handle)
    }

    /// Retarget `proxy` to `implementation`, whatever the configuration says
    pub async fn upgrade_with_deployed_impl_or_link(
        &mut self,
        name: &str,
        proxy_admin: Address,
        proxy: Address,
        implementation: Address,
    ) -> Result<ContractHandle, DeployError> {
        self.allow_list.ensure_upgradeable(name)?;
        self.ensure_recordable(name)?;

        self.select("upgrade_with_deployed_impl_or_link", name, Branch::UpgradeWithImpl);
        let handle = self
            .add_proxy_admin(proxy_admin)
            .upgrade_with_deployed_impl(proxy, name, implementation)
            .await?;

        self.record(handle)
    }

    /// Rewrite the environment's record file with every handled contract
    ///
    /// Any failure is a [`DeployError::Io`]: by the time a handle is recorded
    /// its transactions are final.
    pub fn persist(&self) -> Result<PathBuf, DeployError> {
        let path = self
            .records
            .persist(
                &self.environment,
                &self.handles,
                self.artifacts.as_ref(),
                &self.abi_aliases,
            )
            .map_err(|e| match e {
                DeployError::Io(_) => e,
                other => DeployError::Io(format!("recording {}: {other}", self.environment)),
            })?;
        self.events.emit(&DeployEvent::RecordsWritten { path: path.clone() });

        Ok(path)
    }

    // ---------------------
    // | Roles / Ownership |
    // ---------------------

    /// Transfer ownership of the contract at `address` to `new_owner`
    pub async fn transfer_ownership(
        &self,
        name: &str,
        address: Address,
        new_owner: Address,
    ) -> Result<(), DeployError> {
        self.bind(name, address).transfer_ownership(new_owner).await?;
        Ok(())
    }

    /// As [`Manager::transfer_ownership`], on the `NewDeployedContract` address
    pub async fn transfer_ownership_with_new(
        &self,
        name: &str,
        new_owner: Address,
    ) -> Result<(), DeployError> {
        let address = self.config.new_deployed_address(name)?;
        self.transfer_ownership(name, address, new_owner).await
    }

    /// Grant the super admin role to `new_super_admin` and the admin role to
    /// each of `admin_wallets`
    pub async fn set_admin(
        &self,
        name: &str,
        address: Address,
        new_super_admin: Address,
        admin_wallets: &[Address],
    ) -> Result<(), DeployError> {
        let binding = self.bind(name, address);
        binding.grant_role(DEFAULT_ADMIN_ROLE, new_super_admin).await?;
        for wallet in admin_wallets {
            binding.grant_role(ADMIN_ROLE, *wallet).await?;
        }

        Ok(())
    }

    /// As [`Manager::set_admin`], on the `NewDeployedContract` address
    pub async fn set_admin_with_new(
        &self,
        name: &str,
        new_super_admin: Address,
        admin_wallets: &[Address],
    ) -> Result<(), DeployError> {
        let address = self.config.new_deployed_address(name)?;
        self.set_admin(name, address, new_super_admin, admin_wallets).await
    }

    /// Revoke the admin role from those of `admin_wallets` holding it
    pub async fn revoke_admin(
        &self,
        name: &str,
        address: Address,
        admin_wallets: &[Address],
    ) -> Result<(), DeployError> {
        let binding = self.bind(name, address);
        for wallet in admin_wallets {
            if binding.has_role(ADMIN_ROLE, *wallet).await? {
                binding.revoke_role(ADMIN_ROLE, *wallet).await?;
            }
        }

        Ok(())
    }

    /// Revoke the super admin role from the sender, handing over to
    /// `new_super_admin`
    ///
    /// `new_super_admin` must differ from the sender and already hold the
    /// super admin role; both are checked before the revocation is sent.
    pub async fn revoke_super_admin_from_self(
        &self,
        name: &str,
        address: Address,
        new_super_admin: Address,
    ) -> Result<(), DeployError> {
        let sender = self.client.sender();
        if new_super_admin == sender {
            return Err(DeployError::PrecheckFailed(format!(
                "{name}: new super admin {new_super_admin} is the sender"
            )));
        }

        let binding = self.bind(name, address);
        if !binding.has_role(DEFAULT_ADMIN_ROLE, new_super_admin).await? {
            return Err(DeployError::PrecheckFailed(format!(
                "{name}: {new_super_admin} is not a super admin"
            )));
        }

        binding.revoke_role(DEFAULT_ADMIN_ROLE, sender).await?;
        Ok(())
    }

    /// As [`Manager::revoke_super_admin_from_self`], on the
    /// `NewDeployedContract` address
    pub async fn revoke_super_admin_from_self_with_new(
        &self,
        name: &str,
        new_super_admin: Address,
    ) -> Result<(), DeployError> {
        let address = self.config.new_deployed_address(name)?;
        self.revoke_super_admin_from_self(name, address, new_super_admin)
            .await
    }

    /// Count the ways the contract's permissions differ from the expected ones
    ///
    /// The owner must be `owner`, the first of `wallets` must hold the super
    /// admin role and every further one the admin role. Mismatches are
    /// reported as events and counted, not raised.
    pub async fn check_permission(
        &self,
        name: &str,
        address: Address,
        owner: Address,
        wallets: &[Address],
    ) -> Result<usize, DeployError> {
        let binding = self.bind(name, address);
        let mut mismatches = Vec::new();

        let actual_owner = binding.owner().await?;
        if actual_owner != owner {
            mismatches.push(format!("owner is {actual_owner}, expected {owner}"));
        }

        for (i, wallet) in wallets.iter().enumerate() {
            let (role, label) = if i == 0 {
                (DEFAULT_ADMIN_ROLE, "super admin")
            } else {
                (ADMIN_ROLE, "admin")
            };

            if !binding.has_role(role, *wallet).await? {
                mismatches.push(format!("{wallet} is not {label}"));
            }
        }

        for detail in &mismatches {
            self.events.emit(&DeployEvent::PermissionMismatch {
                name: name.to_string(),
                detail: detail.clone(),
            });
        }
        Ok(mismatches.len())
    }

    // -----------
    // | Helpers |
    // -----------

    /// Fail before any chain call if the contract could not be recorded
    fn ensure_recordable(&self, name: &str) -> Result<(), DeployError> {
        self.artifacts.resolve(name).map(|_| ())
    }

    /// Look the contract up in the buckets consulted by upgradeable deploys
    fn configured(&self, name: &str) -> Option<Configured> {
        self.config
            .deployed_address(name)
            .map(Configured::Linked)
            .or_else(|| self.config.deployed_pair(name).map(Configured::Pair))
    }

    /// Attach to, or adopt, an upgradeable contract the configuration lists
    async fn link_or_adopt(
        &mut self,
        operation: &'static str,
        name: &str,
        proxy_admin: Address,
        configured: Configured,
    ) -> Result<ContractHandle, DeployError> {
        match configured {
            Configured::Linked(proxy) => {
                self.select(operation, name, Branch::Link);
                self.add_proxy_admin(proxy_admin).attach(name, proxy).await
            }
            Configured::Pair(pair) => {
                self.select(operation, name, Branch::AdoptDeployedPair);
                self.add_proxy_admin(proxy_admin)
                    .adopt_deployed_pair(name, pair.proxy, pair.implementation)
                    .await
            }
        }
    }

    /// Deploy a plain contract and wait for its receipt
    async fn deploy_plain(
        &self,
        name: &str,
        constructor_args: &[String],
    ) -> Result<ContractHandle, DeployError> {
        let init_code = self.artifacts.resolve(name)?.deploy_code(constructor_args)?;

        let deployment = self.client.deploy(init_code).await?;
        let receipt = self
            .client
            .wait(deployment.tx_hash, NUM_DEPLOY_CONFIRMATIONS)
            .await?;
        self.events.emit(&DeployEvent::Deployed {
            name: name.to_string(),
            address: deployment.address,
            tx_hash: deployment.tx_hash,
        });

        Ok(ContractHandle::deployed(name, deployment.address, DeployTx::from(receipt)))
    }

    /// Register the handle under its name and persist every handle
    fn record(&mut self, handle: ContractHandle) -> Result<ContractHandle, DeployError> {
        self.handles.insert(handle.name.clone(), handle.clone());
        self.persist()?;

        Ok(handle)
    }

    /// A role binding to the contract at `address`
    fn bind(&self, name: &str, address: Address) -> RoleBinding<C> {
        RoleBinding::new(name, address, self.client.clone(), self.events.clone())
    }

    /// Report the branch taken for an operation
    fn select(&self, operation: &'static str, name: &str, branch: Branch) {
        self.events.emit(&DeployEvent::BranchSelected {
            operation,
            name: name.to_string(),
            branch,
        });
    }
}
