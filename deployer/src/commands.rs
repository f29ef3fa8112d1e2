//! Implementations of the deployer commands

use std::{fs, path::Path, sync::Arc};

use tracing::info;

use crate::{
    artifacts::HardhatArtifacts,
    audit::check_upgradeable_contracts,
    chain::{setup_client, ChainClient},
    cli::{CheckUpgradeableArgs, RunArgs},
    config::{ConfigFile, EnvironmentConfig},
    errors::DeployError,
    events::TracingSink,
    manager::Manager,
    plan::Plan,
    records::{DeploymentRecord, RecordStore},
    utils::{run_environment, script_name},
};

/// Run a deployment plan
///
/// Fails if a step fails, or if any permission check found a mismatch.
pub async fn run_plan(args: RunArgs, config: &ConfigFile) -> Result<(), DeployError> {
    let environment = run_environment(&args.network);
    let plan = Plan::load(&args.plan)?;
    let overrides = match &args.overrides {
        Some(path) => load_overrides(path)?,
        None => EnvironmentConfig::default(),
    };

    let records = RecordStore::new(&args.records_dir, &script_name(&args.plan));
    let resumed = if args.resume {
        records.load(&environment)?
    } else {
        None
    };

    let client = Arc::new(setup_client(&args.priv_key, &args.rpc_url)?);
    let artifacts = Arc::new(HardhatArtifacts::new(&args.artifacts));
    let mut manager = Manager::new(
        &environment,
        config,
        &overrides,
        client,
        artifacts,
        records,
        Arc::new(TracingSink),
    )?
    .with_proxy_contract(&args.proxy_contract);

    if let Some(record) = resumed {
        let resume_overrides = resume_config(&record, manager.config());
        manager.increase_config(&resume_overrides);
    }

    info!(
        %environment,
        sender = %manager.client().sender(),
        steps = plan.steps.len(),
        "running plan"
    );
    let outcome = plan.run(&mut manager).await?;
    info!(steps = outcome.steps, mismatches = outcome.mismatches, "plan complete");

    if outcome.mismatches > 0 {
        return Err(DeployError::PrecheckFailed(format!(
            "permission checks found {} mismatches",
            outcome.mismatches
        )));
    }

    Ok(())
}

/// Audit the exported ABIs and storage layouts against the allow-list
pub fn check_upgradeable(
    args: CheckUpgradeableArgs,
    config: &ConfigFile,
) -> Result<(), DeployError> {
    let report = check_upgradeable_contracts(
        &args.abi_dir,
        &args.storage_layout_dir,
        &config.allow_list(),
    )?;

    if !report.is_clean() {
        return Err(DeployError::Config(report.to_string()));
    }

    info!("upgradeable contracts are consistent");
    Ok(())
}

/// Read run-specific overrides of an environment config
fn load_overrides(path: &Path) -> Result<EnvironmentConfig, DeployError> {
    let contents =
        fs::read_to_string(path).map_err(|e| DeployError::Io(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&contents)
        .map_err(|e| DeployError::Config(format!("{}: {e}", path.display())))
}

/// Overrides linking every contract recorded by an earlier run, on top of
/// the contracts the working config already links
fn resume_config(record: &DeploymentRecord, working: &EnvironmentConfig) -> EnvironmentConfig {
    let mut resumed = record.linked_config();
    if let (Some(linked), Some(configured)) =
        (resumed.deployed_contract.as_mut(), working.deployed_contract.as_ref())
    {
        linked.extend(configured.iter().map(|(name, address)| (name.clone(), *address)));
    }

    resumed
}
