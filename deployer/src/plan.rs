//! Deployment plans: an ordered list of orchestrator steps run by one
//! [`Manager`], so that the whole run lands in a single record file
//!
//! Step arguments are plain strings. A `$path` argument is looked up in the
//! working configuration (dotted paths allowed), an `@Name` argument is the
//! address of the contract handled as `Name` earlier in the run (`@Name.implementation`
//! for its implementation), and anything else is taken literally.

use std::{fs, path::Path, str::FromStr};

use alloy::primitives::Address;
use serde::Deserialize;
use tracing::info;

use crate::{
    artifacts::ArtifactStore,
    chain::ChainClient,
    config::EnvironmentConfig,
    constants::{CONFIG_ARG_PREFIX, HANDLE_ARG_PREFIX},
    errors::DeployError,
    manager::Manager,
};

/// The handle field selected by `@Name.implementation`
const IMPLEMENTATION_FIELD: &str = "implementation";
/// The handle field selected by `@Name.proxyAdmin`
const PROXY_ADMIN_FIELD: &str = "proxyAdmin";

/// One step of a plan
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Step {
    /// [`Manager::increase_config`]
    IncreaseConfig {
        /// The overrides to overlay
        config: EnvironmentConfig,
    },
    /// [`Manager::deploy_or_link`]
    DeployOrLink {
        /// The contract name
        name: String,
        /// Constructor arguments
        #[serde(default)]
        args: Vec<String>,
    },
    /// [`Manager::deploy_upgradeable_or_link`]
    DeployUpgradeableOrLink {
        /// The contract name
        name: String,
        /// The proxy admin
        #[serde(rename = "proxyAdmin")]
        proxy_admin: String,
        /// Initializer arguments
        #[serde(rename = "initArgs", default)]
        init_args: Option<Vec<String>>,
    },
    /// [`Manager::deploy_upgradeable_with_deployed_impl_or_link`]
    DeployUpgradeableWithDeployedImplOrLink {
        /// The contract name
        name: String,
        /// The proxy admin
        #[serde(rename = "proxyAdmin")]
        proxy_admin: String,
        /// The implementation to put the proxy in front of
        implementation: String,
        /// Initializer arguments
        #[serde(rename = "initArgs", default)]
        init_args: Option<Vec<String>>,
    },
    /// [`Manager::upgrade_or_link`]
    UpgradeOrLink {
        /// The contract name
        name: String,
        /// The proxy admin
        #[serde(rename = "proxyAdmin")]
        proxy_admin: String,
        /// The proxy to retarget
        proxy: String,
    },
    /// [`Manager::upgrade_with_deployed_impl_or_link`]
    UpgradeWithDeployedImplOrLink {
        /// The contract name
        name: String,
        /// The proxy admin
        #[serde(rename = "proxyAdmin")]
        proxy_admin: String,
        /// The proxy to retarget
        proxy: String,
        /// The implementation to retarget to
        implementation: String,
    },
    /// [`Manager::transfer_ownership`]; without an address, the
    /// `NewDeployedContract` variant
    TransferOwnership {
        /// The contract name
        name: String,
        /// The contract address
        #[serde(default)]
        address: Option<String>,
        /// The new owner
        #[serde(rename = "newOwner")]
        new_owner: String,
    },
    /// [`Manager::set_admin`]; without an address, the `NewDeployedContract` variant
    SetAdmin {
        /// The contract name
        name: String,
        /// The contract address
        #[serde(default)]
        address: Option<String>,
        /// The new super admin
        #[serde(rename = "newSuperAdmin")]
        new_super_admin: String,
        /// Wallets to grant the admin role
        #[serde(default)]
        admins: Vec<String>,
    },
    /// [`Manager::revoke_admin`]
    RevokeAdmin {
        /// The contract name
        name: String,
        /// The contract address
        address: String,
        /// Wallets to revoke the admin role from
        admins: Vec<String>,
    },
    /// [`Manager::revoke_super_admin_from_self`]; without an address, the
    /// `NewDeployedContract` variant
    RevokeSuperAdminFromSelf {
        /// The contract name
        name: String,
        /// The contract address
        #[serde(default)]
        address: Option<String>,
        /// The super admin taking over
        #[serde(rename = "newSuperAdmin")]
        new_super_admin: String,
    },
    /// [`Manager::check_permission`]
    CheckPermission {
        /// The contract name
        name: String,
        /// The contract address
        address: String,
        /// The expected owner
        owner: String,
        /// The expected super admin, followed by the expected admins
        #[serde(default)]
        wallets: Vec<String>,
    },
}

impl Step {
    /// The name of the orchestrator operation run by the step
    pub fn operation(&self) -> &'static str {
        match self {
            Step::IncreaseConfig { .. } => "increaseConfig",
            Step::DeployOrLink { .. } => "deployOrLink",
            Step::DeployUpgradeableOrLink { .. } => "deployUpgradeableOrLink",
            Step::DeployUpgradeableWithDeployedImplOrLink { .. } => {
                "deployUpgradeableWithDeployedImplOrLink"
            }
            Step::UpgradeOrLink { .. } => "upgradeOrLink",
            Step::UpgradeWithDeployedImplOrLink { .. } => "upgradeWithDeployedImplOrLink",
            Step::TransferOwnership { .. } => "transferOwnership",
            Step::SetAdmin { .. } => "setAdmin",
            Step::RevokeAdmin { .. } => "revokeAdmin",
            Step::RevokeSuperAdminFromSelf { .. } => "revokeSuperAdminFromSelf",
            Step::CheckPermission { .. } => "checkPermission",
        }
    }

    /// Run the step, returning the number of permission mismatches found
    pub async fn execute<C: ChainClient, A: ArtifactStore>(
        &self,
        manager: &mut Manager<C, A>,
    ) -> Result<usize, DeployError> {
        match self {
            Step::IncreaseConfig { config } => {
                manager.increase_config(config);
            }
            Step::DeployOrLink { name, args } => {
                let args = resolve_args(manager, args)?;
                manager.deploy_or_link(name, &args).await?;
            }
            Step::DeployUpgradeableOrLink {
                name,
                proxy_admin,
                init_args,
            } => {
                let proxy_admin = resolve_address(manager, proxy_admin)?;
                let init_args = resolve_optional_args(manager, init_args.as_deref())?;
                manager
                    .deploy_upgradeable_or_link(name, proxy_admin, init_args.as_deref())
                    .await?;
            }
            Step::DeployUpgradeableWithDeployedImplOrLink {
                name,
                proxy_admin,
                implementation,
                init_args,
            } => {
                let proxy_admin = resolve_address(manager, proxy_admin)?;
                let implementation = resolve_address(manager, implementation)?;
                let init_args = resolve_optional_args(manager, init_args.as_deref())?;
                manager
                    .deploy_upgradeable_with_deployed_impl_or_link(
                        name,
                        proxy_admin,
                        implementation,
                        init_args.as_deref(),
                    )
                    .await?;
            }
            Step::UpgradeOrLink {
                name,
                proxy_admin,
                proxy,
            } => {
                let proxy_admin = resolve_address(manager, proxy_admin)?;
                let proxy = resolve_address(manager, proxy)?;
                manager.upgrade_or_link(name, proxy_admin, proxy).await?;
            }
            Step::UpgradeWithDeployedImplOrLink {
                name,
                proxy_admin,
                proxy,
                implementation,
            } => {
                let proxy_admin = resolve_address(manager, proxy_admin)?;
                let proxy = resolve_address(manager, proxy)?;
                let implementation = resolve_address(manager, implementation)?;
                manager
                    .upgrade_with_deployed_impl_or_link(name, proxy_admin, proxy, implementation)
                    .await?;
            }
            Step::TransferOwnership {
                name,
                address,
                new_owner,
            } => {
                let new_owner = resolve_address(manager, new_owner)?;
                match address {
                    Some(address) => {
                        let address = resolve_address(manager, address)?;
                        manager.transfer_ownership(name, address, new_owner).await?;
                    }
                    None => manager.transfer_ownership_with_new(name, new_owner).await?,
                }
            }
            Step::SetAdmin {
                name,
                address,
                new_super_admin,
                admins,
            } => {
                let new_super_admin = resolve_address(manager, new_super_admin)?;
                let admins = resolve_addresses(manager, admins)?;
                match address {
                    Some(address) => {
                        let address = resolve_address(manager, address)?;
                        manager
                            .set_admin(name, address, new_super_admin, &admins)
                            .await?;
                    }
                    None => {
                        manager
                            .set_admin_with_new(name, new_super_admin, &admins)
                            .await?
                    }
                }
            }
            Step::RevokeAdmin {
                name,
                address,
                admins,
            } => {
                let address = resolve_address(manager, address)?;
                let admins = resolve_addresses(manager, admins)?;
                manager.revoke_admin(name, address, &admins).await?;
            }
            Step::RevokeSuperAdminFromSelf {
                name,
                address,
                new_super_admin,
            } => {
                let new_super_admin = resolve_address(manager, new_super_admin)?;
                match address {
                    Some(address) => {
                        let address = resolve_address(manager, address)?;
                        manager
                            .revoke_super_admin_from_self(name, address, new_super_admin)
                            .await?;
                    }
                    None => {
                        manager
                            .revoke_super_admin_from_self_with_new(name, new_super_admin)
                            .await?
                    }
                }
            }
            Step::CheckPermission {
                name,
                address,
                owner,
                wallets,
            } => {
                let address = resolve_address(manager, address)?;
                let owner = resolve_address(manager, owner)?;
                let wallets = resolve_addresses(manager, wallets)?;
                return manager.check_permission(name, address, owner, &wallets).await;
            }
        }

        Ok(0)
    }
}

/// An ordered list of steps
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Plan {
    /// The steps, run in order
    pub steps: Vec<Step>,
}

/// What a plan run did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlanOutcome {
    /// The number of steps run
    pub steps: usize,
    /// The total number of permission mismatches found
    pub mismatches: usize,
}

impl Plan {
    /// Read a plan from disk
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| DeployError::Io(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| DeployError::Config(format!("{}: {e}", path.display())))
    }

    /// Run every step in order against the manager, stopping at the first error
    pub async fn run<C: ChainClient, A: ArtifactStore>(
        &self,
        manager: &mut Manager<C, A>,
    ) -> Result<PlanOutcome, DeployError> {
        let mut outcome = PlanOutcome::default();
        for (i, step) in self.steps.iter().enumerate() {
            info!(step = i + 1, total = self.steps.len(), operation = step.operation());
            outcome.mismatches += step.execute(manager).await?;
            outcome.steps += 1;
        }

        Ok(outcome)
    }
}

// -----------------------
// | Argument Resolution |
// -----------------------

/// Resolve one textual argument against the manager's config and handles
pub fn resolve_arg<C: ChainClient, A: ArtifactStore>(
    manager: &Manager<C, A>,
    arg: &str,
) -> Result<String, DeployError> {
    if let Some(path) = arg.strip_prefix(CONFIG_ARG_PREFIX) {
        return manager.config().lookup(path);
    }

    if let Some(reference) = arg.strip_prefix(HANDLE_ARG_PREFIX) {
        let (name, field) = match reference.split_once('.') {
            Some((name, field)) => (name, Some(field)),
            None => (reference, None),
        };
        let handle = manager
            .handle(name)
            .ok_or_else(|| DeployError::Config(format!("{arg}: {name} was not handled yet")))?;

        let address = match field {
            None => Some(handle.address),
            Some(IMPLEMENTATION_FIELD) => handle.implementation_address(),
            Some(PROXY_ADMIN_FIELD) => handle.proxy_admin_address(),
            Some(_) => None,
        };
        return address
            .map(|a| a.to_string())
            .ok_or_else(|| DeployError::Config(format!("{arg}: no such field")));
    }

    Ok(arg.to_string())
}

/// Resolve an argument and parse it as an address
pub fn resolve_address<C: ChainClient, A: ArtifactStore>(
    manager: &Manager<C, A>,
    arg: &str,
) -> Result<Address, DeployError> {
    let resolved = resolve_arg(manager, arg)?;
    Address::from_str(&resolved)
        .map_err(|e| DeployError::Config(format!("{arg} ({resolved}) is not an address: {e}")))
}

/// Resolve a list of arguments
fn resolve_args<C: ChainClient, A: ArtifactStore>(
    manager: &Manager<C, A>,
    args: &[String],
) -> Result<Vec<String>, DeployError> {
    args.iter().map(|arg| resolve_arg(manager, arg)).collect()
}

/// Resolve an optional list of arguments
fn resolve_optional_args<C: ChainClient, A: ArtifactStore>(
    manager: &Manager<C, A>,
    args: Option<&[String]>,
) -> Result<Option<Vec<String>>, DeployError> {
    args.map(|args| resolve_args(manager, args)).transpose()
}

/// Resolve a list of arguments as addresses
fn resolve_addresses<C: ChainClient, A: ArtifactStore>(
    manager: &Manager<C, A>,
    args: &[String],
) -> Result<Vec<Address>, DeployError> {
    args.iter().map(|arg| resolve_address(manager, arg)).collect()
}
