use alloy::primitives::Address;
use deployer_tests::fixtures::{
    args, setup_manager, setup_manager_with_overrides, widget_artifact, ENVIRONMENT,
    EXISTING_IMPL, EXISTING_PROXY, GADGET, NEW_IMPL, OTHER_PROXY_ADMIN, PROXY_ADMIN, SENDER,
    TOKEN, WIDGET,
};
use eyre::Result;
use serde_json::json;
use xc_deployer::{
    config::EnvironmentConfig, errors::DeployError, events::DeployEvent, types::Branch,
};

#[tokio::test]
async fn test_deploy_or_link_links_configured_contract() -> Result<()> {
    let mut ctx = setup_manager(json!({ "deployedContract": { TOKEN: EXISTING_PROXY } }))?;

    let handle = ctx.manager.deploy_or_link(TOKEN, &args(&[SENDER])).await?;

    assert_eq!(handle.address, EXISTING_PROXY);
    assert!(handle.upgradeable.is_none());
    assert!(!handle.is_deployed());
    assert_eq!(ctx.chain.request_count(), 0);
    assert_eq!(ctx.events.branches(), vec![Branch::Link]);

    Ok(())
}

#[tokio::test]
async fn test_deploy_or_link_deploys_with_constructor_args() -> Result<()> {
    let mut ctx = setup_manager(json!({}))?;

    let handle = ctx.manager.deploy_or_link(TOKEN, &args(&[SENDER])).await?;

    assert_eq!(ctx.chain.deploy_count(), 1);
    assert_eq!(ctx.chain.deployed_addresses(), vec![handle.address]);
    assert!(handle.is_deployed());
    assert!(handle.upgradeable.is_none());

    Ok(())
}

#[tokio::test]
async fn test_fresh_upgradeable_deploy() -> Result<()> {
    let mut ctx = setup_manager(json!({}))?;

    let init_args = args(&[42]);
    let handle = ctx
        .manager
        .deploy_upgradeable_or_link(WIDGET, PROXY_ADMIN, Some(&init_args))
        .await?;

    // One implementation, then one proxy
    let deployed = ctx.chain.deployed_addresses();
    assert_eq!(deployed.len(), 2);
    let (implementation, proxy) = (deployed[0], deployed[1]);

    assert_eq!(handle.address, proxy);
    assert_eq!(handle.proxy_address(), Some(proxy));
    assert_eq!(handle.implementation_address(), Some(implementation));
    assert_eq!(handle.proxy_admin_address(), Some(PROXY_ADMIN));
    assert_ne!(handle.proxy_address(), handle.implementation_address());
    assert!(handle.is_deployed());

    // The proxy points at the implementation and ran `initialize(42)`
    assert_eq!(ctx.chain.implementation_of(proxy), Some(implementation));
    let expected_init = widget_artifact().encode_call("initialize", &init_args)?;
    assert_eq!(ctx.chain.init_data_of(proxy), Some(expected_init));
    assert_eq!(ctx.events.branches(), vec![Branch::DeployProxy]);

    Ok(())
}

#[tokio::test]
async fn test_fresh_upgradeable_deploy_without_init_args() -> Result<()> {
    let mut ctx = setup_manager(json!({}))?;

    let handle = ctx
        .manager
        .deploy_upgradeable_or_link(WIDGET, PROXY_ADMIN, None)
        .await?;

    let proxy = handle.address;
    assert_eq!(ctx.chain.init_data_of(proxy), Some(Default::default()));

    Ok(())
}

#[tokio::test]
async fn test_configured_upgradeable_is_linked() -> Result<()> {
    let mut ctx = setup_manager(json!({ "deployedContract": { WIDGET: EXISTING_PROXY } }))?;
    ctx.chain.set_implementation(EXISTING_PROXY, EXISTING_IMPL);

    let handle = ctx
        .manager
        .deploy_upgradeable_or_link(WIDGET, PROXY_ADMIN, Some(&args(&[42])))
        .await?;

    assert_eq!(handle.address, EXISTING_PROXY);
    assert_eq!(handle.implementation_address(), Some(EXISTING_IMPL));
    assert!(!handle.is_deployed());
    assert_eq!(ctx.chain.deploy_count(), 0);
    assert_eq!(ctx.chain.transaction_count(), 0);
    assert_eq!(ctx.chain.call_count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_deployed_pair_is_adopted() -> Result<()> {
    let mut ctx = setup_manager(json!({
        "deployedUpgradeableContract": {
            WIDGET: { "proxy": EXISTING_PROXY, "implementation": EXISTING_IMPL }
        }
    }))?;

    let handle = ctx
        .manager
        .deploy_upgradeable_or_link(WIDGET, PROXY_ADMIN, None)
        .await?;

    assert_eq!(handle.address, EXISTING_PROXY);
    assert_eq!(handle.implementation_address(), Some(EXISTING_IMPL));
    assert_eq!(ctx.chain.deploy_count(), 0);

    // The pair is registered through a real upgrade call
    let transactions = ctx.chain.transactions();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].to, PROXY_ADMIN);
    assert_eq!(ctx.chain.implementation_of(EXISTING_PROXY), Some(EXISTING_IMPL));
    assert_eq!(ctx.events.branches(), vec![Branch::AdoptDeployedPair]);

    Ok(())
}

#[tokio::test]
async fn test_deployed_contract_takes_priority_over_pair() -> Result<()> {
    let mut ctx = setup_manager(json!({
        "deployedContract": { WIDGET: EXISTING_PROXY },
        "deployedUpgradeableContract": {
            WIDGET: { "proxy": EXISTING_PROXY, "implementation": NEW_IMPL }
        }
    }))?;
    ctx.chain.set_implementation(EXISTING_PROXY, EXISTING_IMPL);

    let handle = ctx
        .manager
        .deploy_upgradeable_or_link(WIDGET, PROXY_ADMIN, None)
        .await?;

    assert_eq!(handle.implementation_address(), Some(EXISTING_IMPL));
    assert_eq!(ctx.chain.transaction_count(), 0);
    assert_eq!(ctx.events.branches(), vec![Branch::Link]);

    Ok(())
}

#[tokio::test]
async fn test_proxy_for_deployed_impl() -> Result<()> {
    let mut ctx = setup_manager(json!({}))?;

    let handle = ctx
        .manager
        .deploy_upgradeable_with_deployed_impl_or_link(WIDGET, PROXY_ADMIN, EXISTING_IMPL, None)
        .await?;

    // Only the proxy is deployed
    assert_eq!(ctx.chain.deployed_addresses(), vec![handle.address]);
    assert_eq!(handle.implementation_address(), Some(EXISTING_IMPL));
    assert_eq!(ctx.chain.implementation_of(handle.address), Some(EXISTING_IMPL));

    Ok(())
}

#[tokio::test]
async fn test_proxy_for_deployed_impl_is_idempotent_once_recorded() -> Result<()> {
    let mut first = setup_manager(json!({}))?;
    let deployed = first
        .manager
        .deploy_upgradeable_with_deployed_impl_or_link(WIDGET, PROXY_ADMIN, EXISTING_IMPL, None)
        .await?;

    // A rerun with the recorded contracts linked deploys nothing
    let resumed = first.records.load(ENVIRONMENT)?.expect("record written");
    let mut second = setup_manager_with_overrides(json!({}), resumed.linked_config())?;
    second.chain.set_implementation(deployed.address, EXISTING_IMPL);

    let linked = second
        .manager
        .deploy_upgradeable_with_deployed_impl_or_link(WIDGET, PROXY_ADMIN, EXISTING_IMPL, None)
        .await?;

    assert_eq!(linked.proxy_address(), deployed.proxy_address());
    assert_eq!(second.chain.deploy_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_upgrade_or_link_upgrades() -> Result<()> {
    let mut ctx = setup_manager(json!({}))?;
    ctx.chain.set_implementation(EXISTING_PROXY, EXISTING_IMPL);

    let handle = ctx
        .manager
        .upgrade_or_link(WIDGET, PROXY_ADMIN, EXISTING_PROXY)
        .await?;

    let new_impl = ctx.chain.deployed_addresses()[0];
    assert_eq!(handle.address, EXISTING_PROXY);
    assert_eq!(handle.implementation_address(), Some(new_impl));
    assert_eq!(handle.old_implementation_address(), Some(EXISTING_IMPL));
    assert_eq!(ctx.chain.implementation_of(EXISTING_PROXY), Some(new_impl));
    assert_eq!(ctx.events.branches(), vec![Branch::Upgrade]);

    Ok(())
}

#[tokio::test]
async fn test_upgrade_or_link_links_configured_proxy() -> Result<()> {
    let mut ctx = setup_manager(json!({ "deployedContract": { WIDGET: EXISTING_PROXY } }))?;
    ctx.chain.set_implementation(EXISTING_PROXY, EXISTING_IMPL);

    let handle = ctx
        .manager
        .upgrade_or_link(WIDGET, PROXY_ADMIN, EXISTING_PROXY)
        .await?;

    assert_eq!(handle.implementation_address(), Some(EXISTING_IMPL));
    assert_eq!(handle.old_implementation_address(), None);
    assert_eq!(ctx.chain.deploy_count(), 0);
    assert_eq!(ctx.chain.transaction_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_upgrade_with_deployed_impl() -> Result<()> {
    // Configured links do not short-circuit an explicit retarget
    let mut ctx = setup_manager(json!({ "deployedContract": { WIDGET: EXISTING_PROXY } }))?;
    ctx.chain.set_implementation(EXISTING_PROXY, EXISTING_IMPL);

    let handle = ctx
        .manager
        .upgrade_with_deployed_impl_or_link(WIDGET, PROXY_ADMIN, EXISTING_PROXY, NEW_IMPL)
        .await?;

    assert_eq!(handle.address, EXISTING_PROXY);
    assert_eq!(handle.implementation_address(), Some(NEW_IMPL));
    assert_eq!(handle.old_implementation_address(), Some(EXISTING_IMPL));
    assert_eq!(ctx.chain.implementation_of(EXISTING_PROXY), Some(NEW_IMPL));
    assert_eq!(ctx.chain.deploy_count(), 0);
    assert_eq!(ctx.events.branches(), vec![Branch::UpgradeWithImpl]);

    Ok(())
}

#[tokio::test]
async fn test_allow_list_is_checked_before_any_chain_call() -> Result<()> {
    let mut ctx = setup_manager(json!({ "deployedContract": { GADGET: EXISTING_PROXY } }))?;
    let not_upgradeable = DeployError::NotUpgradeable(GADGET.to_string());

    let res = ctx.manager.deploy_upgradeable_or_link(GADGET, PROXY_ADMIN, None).await;
    assert_eq!(res, Err(not_upgradeable.clone()));

    let res = ctx
        .manager
        .deploy_upgradeable_with_deployed_impl_or_link(GADGET, PROXY_ADMIN, EXISTING_IMPL, None)
        .await;
    assert_eq!(res, Err(not_upgradeable.clone()));

    let res = ctx.manager.upgrade_or_link(GADGET, PROXY_ADMIN, EXISTING_PROXY).await;
    assert_eq!(res, Err(not_upgradeable.clone()));

    let res = ctx
        .manager
        .upgrade_with_deployed_impl_or_link(GADGET, PROXY_ADMIN, EXISTING_PROXY, NEW_IMPL)
        .await;
    assert_eq!(res, Err(not_upgradeable));

    assert_eq!(ctx.chain.request_count(), 0);
    assert!(ctx.manager.handles().is_empty());
    assert!(!ctx.records.file_path(ENVIRONMENT).exists());

    Ok(())
}

#[tokio::test]
async fn test_proxy_admins_are_cached_per_address() -> Result<()> {
    let mut ctx = setup_manager(json!({}))?;

    ctx.manager.deploy_upgradeable_or_link(WIDGET, PROXY_ADMIN, None).await?;
    ctx.manager.deploy_upgradeable_or_link(WIDGET, PROXY_ADMIN, None).await?;
    ctx.manager.deploy_upgradeable_or_link(WIDGET, OTHER_PROXY_ADMIN, None).await?;

    let attached: Vec<Address> = ctx
        .events
        .events()
        .into_iter()
        .filter_map(|event| match event {
            DeployEvent::ProxyAdminAttached { proxy_admin } => Some(proxy_admin),
            _ => None,
        })
        .collect();
    assert_eq!(attached, vec![PROXY_ADMIN, OTHER_PROXY_ADMIN]);

    Ok(())
}

#[tokio::test]
async fn test_last_handle_wins() -> Result<()> {
    let mut ctx = setup_manager(json!({}))?;

    ctx.manager.deploy_upgradeable_or_link(WIDGET, PROXY_ADMIN, None).await?;
    let second = ctx.manager.deploy_upgradeable_or_link(WIDGET, PROXY_ADMIN, None).await?;

    assert_eq!(ctx.manager.handles().len(), 1);
    assert_eq!(ctx.manager.handle(WIDGET), Some(&second));

    Ok(())
}

#[tokio::test]
async fn test_chain_errors_propagate_unrecorded() -> Result<()> {
    let mut ctx = setup_manager(json!({}))?;
    ctx.chain.revert_all();

    let err = ctx
        .manager
        .deploy_upgradeable_or_link(WIDGET, PROXY_ADMIN, None)
        .await
        .unwrap_err();

    assert!(err.is_chain_error());
    assert!(ctx.manager.handles().is_empty());
    assert!(!ctx.records.file_path(ENVIRONMENT).exists());

    Ok(())
}

#[tokio::test]
async fn test_bad_init_args_fail_before_any_transaction() -> Result<()> {
    let mut ctx = setup_manager(json!({}))?;

    let res = ctx
        .manager
        .deploy_upgradeable_or_link(WIDGET, PROXY_ADMIN, Some(&args(&["forty-two"])))
        .await;

    assert!(matches!(res, Err(DeployError::Calldata(_))));
    assert_eq!(ctx.chain.deploy_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_overrides_and_increase_config() -> Result<()> {
    let overrides: EnvironmentConfig =
        serde_json::from_value(json!({ "deployedContract": { TOKEN: EXISTING_IMPL } }))?;
    let mut ctx = setup_manager_with_overrides(
        json!({ "deployedContract": { WIDGET: EXISTING_PROXY }, "Fee": 30 }),
        overrides,
    )?;

    // The override bucket replaces the static one wholesale
    assert_eq!(ctx.manager.config().deployed_address(TOKEN), Some(EXISTING_IMPL));
    assert_eq!(ctx.manager.config().deployed_address(WIDGET), None);
    assert_eq!(ctx.manager.config().lookup("Fee")?, "30");

    let more: EnvironmentConfig = serde_json::from_value(json!({ "Fee": 50 }))?;
    ctx.manager.increase_config(&more);
    assert_eq!(ctx.manager.config().lookup("Fee")?, "50");
    assert_eq!(ctx.manager.config().deployed_address(TOKEN), Some(EXISTING_IMPL));

    let handle = ctx.manager.deploy_or_link(TOKEN, &[]).await?;
    assert_eq!(handle.address, EXISTING_IMPL);

    Ok(())
}
