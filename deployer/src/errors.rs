//! Definitions of errors that can occur while deploying, linking and upgrading contracts

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// Errors that can occur while orchestrating a deployment run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    /// The contract is not on the upgradeable contracts allow-list
    NotUpgradeable(String),
    /// A role or ownership precondition does not hold
    PrecheckFailed(String),
    /// The chain client reported a failed or reverted call
    ChainCall(String),
    /// Error reading or writing a file (records, config, artifacts)
    Io(String),
    /// Error resolving or parsing a compilation artifact
    Artifact(String),
    /// Error constructing calldata for a contract method
    Calldata(String),
    /// A configuration value is missing or malformed
    Config(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
}

impl DeployError {
    /// Whether the error was raised by the chain client, i.e. something
    /// may have happened on chain
    pub fn is_chain_error(&self) -> bool {
        matches!(self, DeployError::ChainCall(_))
    }
}

impl Display for DeployError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DeployError::NotUpgradeable(name) => {
                write!(f, "contract \"{name}\" is not an upgradeable contract")
            }
            DeployError::PrecheckFailed(s) => write!(f, "precheck failed: {s}"),
            DeployError::ChainCall(s) => write!(f, "chain call failed: {s}"),
            DeployError::Io(s) => write!(f, "io error: {s}"),
            DeployError::Artifact(s) => write!(f, "error resolving artifact: {s}"),
            DeployError::Calldata(s) => write!(f, "error constructing calldata: {s}"),
            DeployError::Config(s) => write!(f, "configuration error: {s}"),
            DeployError::ClientInitialization(s) => write!(f, "error initializing client: {s}"),
        }
    }
}

impl Error for DeployError {}
