//! Definitions of CLI arguments and commands for the deployer

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    commands::{check_upgradeable, run_plan},
    config::ConfigFile,
    constants::DEFAULT_PROXY_CONTRACT,
    errors::DeployError,
};

/// Deploys, links and upgrades proxied contracts
#[derive(Parser)]
pub struct Cli {
    /// Path to the deployment config file
    #[arg(short, long, default_value = "deploy-config.json")]
    pub config: PathBuf,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// The deployer commands
#[derive(Subcommand)]
pub enum Command {
    /// Run a deployment plan against one network
    Run(RunArgs),
    /// Audit the upgradeable contracts allow-list
    CheckUpgradeable(CheckUpgradeableArgs),
}

impl Command {
    /// Run the command
    pub async fn run(self, config: &ConfigFile) -> Result<(), DeployError> {
        match self {
            Command::Run(args) => run_plan(args, config).await,
            Command::CheckUpgradeable(args) => check_upgradeable(args, config),
        }
    }
}

/// Run a deployment plan against one network.
///
/// Every contract handled by the plan is recorded in
/// `<records-dir>/<plan stem>-<environment>-config.json`, rewritten after
/// each step.
#[derive(Args)]
pub struct RunArgs {
    /// Path to the JSON plan
    #[arg(short, long)]
    pub plan: PathBuf,

    /// Network name; the environment is derived from it,
    /// e.g. `eth_sepolia` deploys to `sepolia`
    #[arg(short, long)]
    pub network: String,

    /// Private key of the deployer
    #[arg(long, env = "PKEY", hide_env_values = true)]
    pub priv_key: String,

    /// Network RPC URL
    #[arg(short, long, env = "RPC_URL")]
    pub rpc_url: String,

    /// Directory of the compiled contract artifacts
    #[arg(short, long, default_value = "artifacts")]
    pub artifacts: PathBuf,

    /// Directory the record file is written to
    #[arg(long, default_value = ".")]
    pub records_dir: PathBuf,

    /// Path to a JSON file of run-specific overrides of the environment config
    #[arg(short, long)]
    pub overrides: Option<PathBuf>,

    /// Link the contracts recorded by an earlier run of the same plan instead
    /// of deploying them again
    #[arg(long)]
    pub resume: bool,

    /// Name of the proxy contract artifact
    #[arg(long, default_value = DEFAULT_PROXY_CONTRACT)]
    pub proxy_contract: String,
}

/// Check that every contract with an initializer is marked upgradeable,
/// and that every upgradeable contract has a storage layout
#[derive(Args)]
pub struct CheckUpgradeableArgs {
    /// Directory of the exported contract ABIs
    #[arg(long, default_value = "contract_abi")]
    pub abi_dir: PathBuf,

    /// Directory of the storage layout snapshots
    #[arg(long, default_value = ".storage-layouts")]
    pub storage_layout_dir: PathBuf,
}
