use deployer_tests::fixtures::{
    setup_manager, ENVIRONMENT, EXISTING_IMPL, PROXY_ADMIN, SENDER, TOKEN, WIDGET,
};
use eyre::Result;
use serde_json::json;
use xc_deployer::{
    constants::DEFAULT_ADMIN_ROLE,
    errors::DeployError,
    plan::{Plan, PlanOutcome},
};

#[tokio::test]
async fn test_plan_resolves_config_and_handle_arguments() -> Result<()> {
    let mut ctx = setup_manager(json!({
        "Admins": { "ProxyAdmin": PROXY_ADMIN, "Owner": SENDER },
        "Fee": 42
    }))?;

    let plan: Plan = serde_json::from_value(json!({
        "steps": [
            { "op": "deployOrLink", "name": TOKEN, "args": ["$Admins.Owner"] },
            {
                "op": "deployUpgradeableOrLink",
                "name": WIDGET,
                "proxyAdmin": "$Admins.ProxyAdmin",
                "initArgs": ["$Fee"]
            },
            { "op": "setAdmin", "name": WIDGET, "address": "@Widget", "newSuperAdmin": "@Token" },
            {
                "op": "checkPermission",
                "name": WIDGET,
                "address": "@Widget",
                "owner": "$Admins.Owner",
                "wallets": ["@Token"]
            }
        ]
    }))?;

    let outcome = plan.run(&mut ctx.manager).await?;
    assert_eq!(
        outcome,
        PlanOutcome {
            steps: 4,
            mismatches: 0
        }
    );

    let token = ctx.manager.handle(TOKEN).expect("token handled").address;
    let widget = ctx.manager.handle(WIDGET).expect("widget handled");
    assert_eq!(widget.proxy_admin_address(), Some(PROXY_ADMIN));
    assert!(ctx.chain.has_role(widget.address, DEFAULT_ADMIN_ROLE, token));

    let record = ctx.records.load(ENVIRONMENT)?.expect("record written");
    assert_eq!(record.deployed.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_plan_reports_mismatches() -> Result<()> {
    let mut ctx = setup_manager(json!({}))?;

    let plan: Plan = serde_json::from_value(json!({
        "steps": [{
            "op": "checkPermission",
            "name": WIDGET,
            "address": EXISTING_IMPL,
            "owner": PROXY_ADMIN,
            "wallets": [SENDER]
        }]
    }))?;

    let outcome = plan.run(&mut ctx.manager).await?;
    assert_eq!(outcome.mismatches, 2);

    Ok(())
}

#[tokio::test]
async fn test_plan_stops_at_first_error() -> Result<()> {
    let mut ctx = setup_manager(json!({}))?;

    let plan: Plan = serde_json::from_value(json!({
        "steps": [
            { "op": "deployOrLink", "name": TOKEN, "args": ["$Missing"] },
            { "op": "deployUpgradeableOrLink", "name": WIDGET, "proxyAdmin": PROXY_ADMIN }
        ]
    }))?;

    let res = plan.run(&mut ctx.manager).await;
    assert!(matches!(res, Err(DeployError::Config(_))));
    assert_eq!(ctx.chain.request_count(), 0);

    // Handles must exist before they are referenced
    let plan: Plan = serde_json::from_value(json!({
        "steps": [{ "op": "transferOwnership", "name": WIDGET, "address": "@Widget", "newOwner": SENDER }]
    }))?;
    assert!(matches!(plan.run(&mut ctx.manager).await, Err(DeployError::Config(_))));

    Ok(())
}
