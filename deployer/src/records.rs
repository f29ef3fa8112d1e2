//! The per-environment JSON ledger of handled contracts
//!
//! The ledger is a cache of what a run did, not a source of truth: every
//! persist overwrites the whole file, and a crash between a confirmed
//! transaction and the next persist loses only the record.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

use crate::{
    artifacts::ArtifactStore,
    config::EnvironmentConfig,
    constants::{ABI_EXPORT_DIR, JSON_EXTENSION, LINKED_BLOCK, RECORD_FILE_SUFFIX},
    errors::DeployError,
    types::ContractHandle,
};

/// The indentation of written record files
const RECORD_INDENT: &[u8] = b"    ";

/// Where the exported ABI of a recorded contract lives
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMeta {
    /// The ABI name
    pub contract: String,
    /// The ABI file, relative to the records
    pub path: String,
}

/// The record of one contract
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    /// The address callers talk to
    pub address: Address,
    /// The block of the deploy transaction, `"0"` for linked contracts
    pub block: String,
    /// The proxy address, for upgradeable contracts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<Address>,
    /// The implementation address, for upgradeable contracts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<Address>,
    /// The proxy admin address, for upgradeable contracts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_admin: Option<Address>,
    /// The exported ABI
    pub meta: ContractMeta,
    /// Addresses the contract lived at before
    #[serde(default)]
    pub legacy_addresses: Vec<Address>,
}

/// The persisted document of one environment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// When the document was written
    pub update_time: DateTime<Utc>,
    /// Contracts created by a confirmed transaction during the run
    #[serde(default)]
    pub deployed: BTreeMap<String, ContractRecord>,
    /// Contracts attached to without a deploy transaction
    #[serde(default)]
    pub linked: BTreeMap<String, ContractRecord>,
}

impl DeploymentRecord {
    /// Build the document describing the given handles
    pub fn from_handles<A: ArtifactStore>(
        handles: &BTreeMap<String, ContractHandle>,
        artifacts: &A,
        abi_aliases: &BTreeMap<String, String>,
    ) -> Result<Self, DeployError> {
        let mut record = DeploymentRecord {
            update_time: Utc::now(),
            deployed: BTreeMap::new(),
            linked: BTreeMap::new(),
        };

        for (name, handle) in handles {
            let artifact = artifacts.resolve(name)?;
            let abi_name = abi_aliases
                .get(&artifact.contract_name)
                .cloned()
                .unwrap_or(artifact.contract_name);

            let contract_record = ContractRecord {
                address: handle.address,
                block: handle
                    .deploy_tx
                    .map(|tx| tx.block_number.to_string())
                    .unwrap_or_else(|| LINKED_BLOCK.to_string()),
                proxy: handle.proxy_address(),
                implementation: handle.implementation_address(),
                proxy_admin: handle.proxy_admin_address(),
                meta: ContractMeta {
                    path: format!("{ABI_EXPORT_DIR}/{abi_name}.{JSON_EXTENSION}"),
                    contract: abi_name,
                },
                legacy_addresses: Vec::new(),
            };

            let bucket = if handle.is_deployed() {
                &mut record.deployed
            } else {
                &mut record.linked
            };
            bucket.insert(name.clone(), contract_record);
        }

        Ok(record)
    }

    /// The record looked up by contract name, in either bucket
    pub fn get(&self, name: &str) -> Option<&ContractRecord> {
        self.deployed.get(name).or_else(|| self.linked.get(name))
    }

    /// A config override linking every recorded contract, so that a rerun
    /// attaches to what an earlier run produced instead of deploying again
    pub fn linked_config(&self) -> EnvironmentConfig {
        let addresses = self
            .deployed
            .iter()
            .chain(self.linked.iter())
            .map(|(name, record)| (name.clone(), record.address))
            .collect();

        EnvironmentConfig {
            deployed_contract: Some(addresses),
            ..Default::default()
        }
    }
}

/// Reads and writes `<script>-<environment>-config.json` documents
#[derive(Clone, Debug)]
pub struct RecordStore {
    /// The directory holding the record files
    dir: PathBuf,
    /// The base name of the script or plan driving the run
    script_name: String,
}

impl RecordStore {
    /// Constructor
    pub fn new(dir: impl Into<PathBuf>, script_name: &str) -> Self {
        RecordStore {
            dir: dir.into(),
            script_name: script_name.to_string(),
        }
    }

    /// The record file of the given environment
    pub fn file_path(&self, environment: &str) -> PathBuf {
        self.dir
            .join(format!("{}-{environment}-{RECORD_FILE_SUFFIX}", self.script_name))
    }

    /// Overwrite the environment's record file with the given handles,
    /// returning the path written
    pub fn persist<A: ArtifactStore>(
        &self,
        environment: &str,
        handles: &BTreeMap<String, ContractHandle>,
        artifacts: &A,
        abi_aliases: &BTreeMap<String, String>,
    ) -> Result<PathBuf, DeployError> {
        let record = DeploymentRecord::from_handles(handles, artifacts, abi_aliases)?;
        let path = self.file_path(environment);
        write_record(&path, &record)?;

        Ok(path)
    }

    /// Read the environment's record file, if one was written
    pub fn load(&self, environment: &str) -> Result<Option<DeploymentRecord>, DeployError> {
        let path = self.file_path(environment);
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| DeployError::Io(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| DeployError::Io(format!("{}: {e}", path.display())))
    }
}

/// Serialize the record with four-space indentation and write it out
fn write_record(path: &Path, record: &DeploymentRecord) -> Result<(), DeployError> {
    let mut buf = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(RECORD_INDENT));
    record
        .serialize(&mut ser)
        .map_err(|e| DeployError::Io(format!("{}: {e}", path.display())))?;

    fs::write(path, buf).map_err(|e| DeployError::Io(format!("{}: {e}", path.display())))
}
