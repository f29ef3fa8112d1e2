//! Utilities for the deployer CLI

use std::path::Path;

use crate::constants::{HARDHAT_NETWORK, LOCALHOST_ENVIRONMENT, NETWORK_PREFIXES};

/// The environment a network deploys to, e.g. `eth_sepolia` -> `sepolia`
///
/// Chain prefixes are stripped and the in-process Hardhat network maps to
/// `localhost`.
pub fn run_environment(network: &str) -> String {
    let mut environment = network.to_string();
    for prefix in NETWORK_PREFIXES {
        environment = environment.replacen(prefix, "", 1);
    }

    environment.replacen(HARDHAT_NETWORK, LOCALHOST_ENVIRONMENT, 1)
}

/// The base name records are written under, i.e. the file stem of the plan
pub fn script_name(plan_path: &Path) -> String {
    plan_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
