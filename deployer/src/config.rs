//! Layered, per-environment deployment configuration
//!
//! A config file holds the static defaults of every environment. A run picks
//! one environment and may overlay run-specific overrides on it; the overlay
//! is a shallow merge, see [`EnvironmentConfig::merge`].

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DeployError;

/// The config key of the `deployedContract` bucket
pub const DEPLOYED_CONTRACT_KEY: &str = "deployedContract";
/// The config key of the `deployedUpgradeableContract` bucket
pub const DEPLOYED_UPGRADEABLE_CONTRACT_KEY: &str = "deployedUpgradeableContract";
/// The config key of the `NewDeployedContract` bucket
pub const NEW_DEPLOYED_CONTRACT_KEY: &str = "NewDeployedContract";

/// A proxy / implementation pair that is already live on chain
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedPair {
    /// The proxy address
    pub proxy: Address,
    /// The implementation address
    pub implementation: Address,
}

/// The configuration of a single environment
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Contracts to link rather than deploy
    #[serde(rename = "deployedContract", default, skip_serializing_if = "Option::is_none")]
    pub deployed_contract: Option<BTreeMap<String, Address>>,
    /// Upgradeable contracts deployed out-of-band, to be adopted by a proxy admin
    #[serde(
        rename = "deployedUpgradeableContract",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub deployed_upgradeable_contract: Option<BTreeMap<String, DeployedPair>>,
    /// Addresses produced by an earlier run, targeted by the `*_with_new` role helpers
    #[serde(rename = "NewDeployedContract", default, skip_serializing_if = "Option::is_none")]
    pub new_deployed_contract: Option<BTreeMap<String, Address>>,
    /// Environment constants (token addresses, routers, ...)
    #[serde(flatten)]
    pub constants: BTreeMap<String, Value>,
}

impl EnvironmentConfig {
    /// Overlay `overrides` on top of `self`, returning the merged copy
    ///
    /// The merge is shallow: a bucket present in `overrides` replaces the
    /// whole bucket, and constants are replaced key by key.
    pub fn merge(&self, overrides: &EnvironmentConfig) -> EnvironmentConfig {
        let mut constants = self.constants.clone();
        constants.extend(overrides.constants.clone());

        EnvironmentConfig {
            deployed_contract: overrides
                .deployed_contract
                .clone()
                .or_else(|| self.deployed_contract.clone()),
            deployed_upgradeable_contract: overrides
                .deployed_upgradeable_contract
                .clone()
                .or_else(|| self.deployed_upgradeable_contract.clone()),
            new_deployed_contract: overrides
                .new_deployed_contract
                .clone()
                .or_else(|| self.new_deployed_contract.clone()),
            constants,
        }
    }

    /// The address recorded in `deployedContract` for the given contract
    pub fn deployed_address(&self, name: &str) -> Option<Address> {
        self.deployed_contract.as_ref()?.get(name).copied()
    }

    /// The pair recorded in `deployedUpgradeableContract` for the given contract
    pub fn deployed_pair(&self, name: &str) -> Option<DeployedPair> {
        self.deployed_upgradeable_contract.as_ref()?.get(name).copied()
    }

    /// The address recorded in `NewDeployedContract` for the given contract
    pub fn new_deployed_address(&self, name: &str) -> Result<Address, DeployError> {
        self.new_deployed_contract
            .as_ref()
            .and_then(|bucket| bucket.get(name).copied())
            .ok_or_else(|| {
                DeployError::Config(format!("{NEW_DEPLOYED_CONTRACT_KEY}.{name} is not configured"))
            })
    }

    /// Look up a value by dotted path, rendered as a string suitable for
    /// ABI argument coercion
    pub fn lookup(&self, path: &str) -> Result<String, DeployError> {
        let missing = || DeployError::Config(format!("{path} is not configured"));
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        let bucket = match head {
            DEPLOYED_CONTRACT_KEY => self.deployed_contract.as_ref(),
            NEW_DEPLOYED_CONTRACT_KEY => self.new_deployed_contract.as_ref(),
            DEPLOYED_UPGRADEABLE_CONTRACT_KEY => {
                let (name, field) = rest.and_then(|r| r.split_once('.')).ok_or_else(missing)?;
                let pair = self.deployed_pair(name).ok_or_else(missing)?;
                return match field {
                    "proxy" => Ok(pair.proxy.to_string()),
                    "implementation" => Ok(pair.implementation.to_string()),
                    _ => Err(missing()),
                };
            }
            _ => {
                let mut value = self.constants.get(head).ok_or_else(missing)?;
                for segment in rest.into_iter().flat_map(|r| r.split('.')) {
                    value = value.get(segment).ok_or_else(missing)?;
                }
                return Ok(value_to_arg(value));
            }
        };

        let name = rest.ok_or_else(missing)?;
        bucket
            .and_then(|b| b.get(name))
            .map(|addr| addr.to_string())
            .ok_or_else(missing)
    }
}

/// Render a JSON value in the textual form accepted by ABI coercion
fn value_to_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The set of contract names permitted to go through upgradeable flows
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllowList {
    /// The permitted names
    names: BTreeSet<String>,
}

impl AllowList {
    /// Whether the contract is upgradeable
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Fail with [`DeployError::NotUpgradeable`] unless the contract is upgradeable
    pub fn ensure_upgradeable(&self, name: &str) -> Result<(), DeployError> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(DeployError::NotUpgradeable(name.to_string()))
        }
    }

    /// Iterate over the permitted names
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for AllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        AllowList {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// The on-disk config file
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Names of the contracts that may be deployed behind a proxy
    #[serde(rename = "upgradeableContracts", default)]
    pub upgradeable_contracts: BTreeSet<String>,
    /// ABI names recorded in place of artifact names, e.g. interfaces
    /// exported for a contract
    #[serde(rename = "abiAliases", default)]
    pub abi_aliases: BTreeMap<String, String>,
    /// Static configuration per environment
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,
}

impl ConfigFile {
    /// Read a config file from disk
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| DeployError::Io(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| DeployError::Config(format!("{}: {e}", path.display())))
    }

    /// The static configuration of the given environment
    pub fn environment(&self, environment: &str) -> Result<&EnvironmentConfig, DeployError> {
        self.environments
            .get(environment)
            .ok_or_else(|| DeployError::Config(format!("unknown environment {environment}")))
    }

    /// The upgradeable contracts allow-list
    pub fn allow_list(&self) -> AllowList {
        self.upgradeable_contracts.iter().cloned().collect()
    }
}
