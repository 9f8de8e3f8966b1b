// Copyright 2025 Cowboy AI, LLC.

//! Integration tests for the creation wizard
//!
//! The wizard is driven exactly as a host would drive it: events go through
//! the wizard handle or the active child's handle, and assertions read
//! published snapshots.

mod common;

use common::{
    bundle, configuration, connector, connector_type, kafka, namespace, page, wait_until,
    ScriptedApi, ScriptedLoader,
};
use connectors_console::steps::{
    BasicEvent, BasicHandle, ConfigureHandle, ConfigurePhase, ConnectorTypePickerHandle,
    KafkaPickerHandle, NamespacePickerHandle, ReviewHandle,
};
use connectors_console::wizard::{self, ActiveStep};
use connectors_console::{
    DesiredState, JumpBackBehavior, ServiceAccount, WizardEvent, WizardHandle, WizardOptions,
    WizardSeed, WizardStep,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

fn scripted_catalog() -> Arc<ScriptedApi> {
    let api = ScriptedApi::default();
    api.connector_types
        .push_ok(page(vec![connector_type("slack_sink_0.1")]));
    api.kafkas.push_ok(page(vec![kafka("k1")]));
    api.namespaces.push_ok(page(vec![namespace("ns1")]));
    Arc::new(api)
}

async fn wait_step(handle: &WizardHandle, step: WizardStep) {
    let mut watch = handle.watch();
    wait_until(&mut watch, move |s| s.step == step).await;
}

fn type_picker(handle: &WizardHandle) -> ConnectorTypePickerHandle {
    match handle.snapshot().active {
        ActiveStep::ConnectorType(picker) => picker,
        other => panic!("expected the type picker, got {other:?}"),
    }
}

fn kafka_picker(handle: &WizardHandle) -> KafkaPickerHandle {
    match handle.snapshot().active {
        ActiveStep::Kafka(picker) => picker,
        other => panic!("expected the kafka picker, got {other:?}"),
    }
}

fn namespace_picker(handle: &WizardHandle) -> NamespacePickerHandle {
    match handle.snapshot().active {
        ActiveStep::Namespace(picker) => picker,
        other => panic!("expected the namespace picker, got {other:?}"),
    }
}

fn basic_step(handle: &WizardHandle) -> BasicHandle {
    match handle.snapshot().active {
        ActiveStep::Basic(step) => step,
        other => panic!("expected the basic step, got {other:?}"),
    }
}

fn configure_step(handle: &WizardHandle) -> ConfigureHandle {
    match handle.snapshot().active {
        ActiveStep::Configure(step) => step,
        other => panic!("expected the configure step, got {other:?}"),
    }
}

fn review_step(handle: &WizardHandle) -> ReviewHandle {
    match handle.snapshot().active {
        ActiveStep::Review(step) => step,
        other => panic!("expected the review step, got {other:?}"),
    }
}

/// Walk the first four steps: type, kafka, namespace, then name the
/// connector on the basic step, declining the auto-created credentials
async fn walk_to_configure(wizard: &WizardHandle) {
    let picker = type_picker(wizard);
    let mut watch = picker.watch();
    wait_until(&mut watch, |s| !s.resource.items.is_empty()).await;
    picker.select("slack_sink_0.1").unwrap();
    picker.confirm().unwrap();
    wait_step(wizard, WizardStep::SelectKafka).await;

    let picker = kafka_picker(wizard);
    let mut watch = picker.watch();
    wait_until(&mut watch, |s| !s.resource.items.is_empty()).await;
    picker.select("k1").unwrap();
    picker.confirm().unwrap();
    wait_step(wizard, WizardStep::SelectNamespace).await;

    let picker = namespace_picker(wizard);
    let mut watch = picker.watch();
    wait_until(&mut watch, |s| !s.resource.items.is_empty()).await;
    picker.select("ns1").unwrap();
    picker.confirm().unwrap();
    wait_step(wizard, WizardStep::BasicConfiguration).await;

    let basic = basic_step(wizard);
    basic.set_name("my-connector").unwrap();
    basic.dispatch(BasicEvent::SetAutoCreate(false)).unwrap();
    basic.confirm().unwrap();
    wait_step(wizard, WizardStep::ConfigureConnector).await;
}

#[tokio::test]
async fn test_walkthrough_creates_connector() {
    let api = scripted_catalog();
    api.service_accounts.push_ok(ServiceAccount {
        client_id: "sa-1".to_string(),
        client_secret: "secret".to_string(),
    });
    api.creations
        .push_ok(connector("c-new", "my-connector", DesiredState::Ready));

    let loader = Arc::new(ScriptedLoader::default());
    loader.push_bundle(Some(bundle(&["connection", "channel"])));

    let (saved_tx, saved_rx) = oneshot::channel();
    let wizard = wizard::spawn(
        Arc::clone(&api) as _,
        Arc::clone(&loader) as _,
        WizardOptions::default(),
        None,
        move |connector| {
            let _ = saved_tx.send(connector);
        },
    );

    let picker = type_picker(&wizard);
    let mut watch = picker.watch();
    wait_until(&mut watch, |s| !s.resource.items.is_empty()).await;
    picker.select("slack_sink_0.1").unwrap();
    picker.confirm().unwrap();
    wait_step(&wizard, WizardStep::SelectKafka).await;

    let picker = kafka_picker(&wizard);
    let mut watch = picker.watch();
    wait_until(&mut watch, |s| !s.resource.items.is_empty()).await;
    picker.select("k1").unwrap();
    picker.confirm().unwrap();
    wait_step(&wizard, WizardStep::SelectNamespace).await;

    let picker = namespace_picker(&wizard);
    let mut watch = picker.watch();
    wait_until(&mut watch, |s| !s.resource.items.is_empty()).await;
    picker.select("ns1").unwrap();
    picker.confirm().unwrap();
    wait_step(&wizard, WizardStep::BasicConfiguration).await;

    // Route through the wizard event surface for the basic step
    let basic = basic_step(&wizard);
    basic.set_name("my-connector").unwrap();
    wizard
        .dispatch(WizardEvent::Basic(BasicEvent::SetAutoCreate(true)))
        .unwrap();
    basic.confirm().unwrap();
    wait_step(&wizard, WizardStep::ConfigureConnector).await;

    let configure = configure_step(&wizard);
    let mut watch = configure.watch();
    wait_until(&mut watch, |s| s.phase == ConfigurePhase::Ready).await;
    assert_eq!(
        configure.snapshot().steps,
        Some(vec!["connection".to_string(), "channel".to_string()])
    );
    configure.configuration_changed(configuration(), true).unwrap();
    configure.next_sub_step().unwrap();
    wait_until(&mut watch, |s| s.active == 1).await;
    configure.configuration_changed(configuration(), true).unwrap();
    configure.confirm().unwrap();
    wait_step(&wizard, WizardStep::ReviewConfiguration).await;

    let review = review_step(&wizard);
    let mut watch = review.watch();
    wait_until(&mut watch, |s| s.valid).await;
    review.save().unwrap();
    wait_step(&wizard, WizardStep::Saved).await;

    let saved = tokio::time::timeout(Duration::from_secs(2), saved_rx)
        .await
        .expect("save callback before timeout")
        .expect("callback fired");
    assert_eq!(saved.id, "c-new");

    let submitted = api.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].name, "my-connector");
    assert_eq!(submitted[0].connector_type_id, "slack_sink_0.1");
    assert_eq!(submitted[0].kafka_id, "k1");
    assert_eq!(submitted[0].namespace_id, "ns1");
    assert_eq!(submitted[0].configuration, configuration());
    assert_eq!(
        submitted[0].service_account.as_ref().map(|sa| sa.client_id.as_str()),
        Some("sa-1")
    );
    drop(submitted);

    wizard.stop();
}

#[tokio::test]
async fn test_implicit_single_step_walkthrough() {
    let api = scripted_catalog();
    api.creations
        .push_ok(connector("c-new", "my-connector", DesiredState::Ready));
    // No configurator shipped: the loader answers None and the configure
    // step renders as one unnamed schema-driven step
    let loader = Arc::new(ScriptedLoader::default());

    let wizard = wizard::spawn(
        Arc::clone(&api) as _,
        Arc::clone(&loader) as _,
        WizardOptions::default(),
        None,
        |_| {},
    );
    walk_to_configure(&wizard).await;

    let configure = configure_step(&wizard);
    let mut watch = configure.watch();
    wait_until(&mut watch, |s| s.phase == ConfigurePhase::Ready).await;
    assert_eq!(configure.snapshot().steps, None);

    configure.configuration_changed(configuration(), true).unwrap();
    configure.confirm().unwrap();
    wait_step(&wizard, WizardStep::ReviewConfiguration).await;

    let review = review_step(&wizard);
    review.save().unwrap();
    wait_step(&wizard, WizardStep::Saved).await;

    assert_eq!(loader.load_calls.load(Ordering::SeqCst), 1);

    wizard.stop();
}

#[tokio::test]
async fn test_configurator_failure_blocks_until_retry() {
    let api = scripted_catalog();
    let loader = Arc::new(ScriptedLoader::default());
    loader.push_err("slack_sink_0.1", "cdn unreachable");
    loader.push_bundle(Some(bundle(&["channel"])));

    let wizard = wizard::spawn(
        Arc::clone(&api) as _,
        Arc::clone(&loader) as _,
        WizardOptions::default(),
        None,
        |_| {},
    );
    walk_to_configure(&wizard).await;

    let configure = configure_step(&wizard);
    let mut watch = configure.watch();
    wait_until(&mut watch, |s| {
        matches!(&s.phase, ConfigurePhase::LoadFailed { message } if message.contains("cdn unreachable"))
    })
    .await;

    // Confirm cannot fire while the configurator is missing
    configure.confirm().unwrap();
    assert_eq!(wizard.snapshot().step, WizardStep::ConfigureConnector);

    configure.retry_load().unwrap();
    wait_until(&mut watch, |s| s.phase == ConfigurePhase::Ready).await;
    assert_eq!(loader.load_calls.load(Ordering::SeqCst), 2);

    wizard.stop();
}

#[tokio::test]
async fn test_save_rejection_surfaces_and_retry_saves() {
    let api = scripted_catalog();
    api.creations.push_err("quota exceeded");
    api.creations
        .push_ok(connector("c-new", "my-connector", DesiredState::Ready));

    let loader = Arc::new(ScriptedLoader::default());
    loader.push_bundle(Some(bundle(&["channel"])));

    let wizard = wizard::spawn(
        Arc::clone(&api) as _,
        Arc::clone(&loader) as _,
        WizardOptions::default(),
        None,
        |_| {},
    );
    walk_to_configure(&wizard).await;

    let configure = configure_step(&wizard);
    let mut watch = configure.watch();
    wait_until(&mut watch, |s| s.phase == ConfigurePhase::Ready).await;
    configure.configuration_changed(configuration(), true).unwrap();
    configure.confirm().unwrap();
    wait_step(&wizard, WizardStep::ReviewConfiguration).await;

    let review = review_step(&wizard);
    review.save().unwrap();

    // The rejection reason reaches both the review step and the wizard
    let mut wizard_watch = wizard.watch();
    wait_until(&mut wizard_watch, |s| s.save_error.is_some()).await;
    assert_eq!(
        wizard.snapshot().save_error.as_deref(),
        Some("quota exceeded")
    );
    assert_eq!(wizard.snapshot().step, WizardStep::ReviewConfiguration);

    review.save().unwrap();
    wait_step(&wizard, WizardStep::Saved).await;

    wizard.stop();
}

#[tokio::test]
async fn test_seeded_wizard_jumps_straight_to_review() {
    let api = scripted_catalog();
    api.creations.push_ok(connector(
        "c-copy",
        "my-connector-copy",
        DesiredState::Ready,
    ));
    let loader = Arc::new(ScriptedLoader::default());

    let seed = WizardSeed {
        connector_type_id: Some("slack_sink_0.1".to_string()),
        kafka_id: Some("k1".to_string()),
        namespace_id: Some("ns1".to_string()),
        name: Some("my-connector-copy".to_string()),
        configuration: Some(configuration()),
    };

    let (saved_tx, saved_rx) = oneshot::channel();
    let wizard = wizard::spawn(
        Arc::clone(&api) as _,
        Arc::clone(&loader) as _,
        WizardOptions::default(),
        Some(seed),
        move |connector| {
            let _ = saved_tx.send(connector);
        },
    );

    // The seed carries the type id; the picker resolves the entity
    let mut watch = wizard.watch();
    wait_until(&mut watch, |s| s.context.connector_type.is_some()).await;

    wizard.jump_to(WizardStep::ReviewConfiguration).unwrap();
    wait_step(&wizard, WizardStep::ReviewConfiguration).await;

    let review = review_step(&wizard);
    let mut review_watch = review.watch();
    wait_until(&mut review_watch, |s| s.valid).await;
    review.save().unwrap();
    wait_step(&wizard, WizardStep::Saved).await;

    let saved = tokio::time::timeout(Duration::from_secs(2), saved_rx)
        .await
        .expect("save callback before timeout")
        .expect("callback fired");
    assert_eq!(saved.name, "my-connector-copy");

    // The configure step never ran
    assert_eq!(loader.load_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        api.submitted.lock().unwrap()[0].name,
        "my-connector-copy"
    );

    wizard.stop();
}

#[tokio::test]
async fn test_clear_downstream_drops_later_answers() {
    let api = scripted_catalog();
    let loader = Arc::new(ScriptedLoader::default());
    loader.push_bundle(Some(bundle(&["channel"])));

    let wizard = wizard::spawn(
        Arc::clone(&api) as _,
        Arc::clone(&loader) as _,
        WizardOptions {
            jump_back: JumpBackBehavior::ClearDownstream,
        },
        None,
        |_| {},
    );
    walk_to_configure(&wizard).await;

    wizard.jump_to(WizardStep::SelectKafka).unwrap();
    wait_step(&wizard, WizardStep::SelectKafka).await;

    let context = wizard.snapshot().context;
    assert_eq!(context.kafka_id.as_deref(), Some("k1"));
    assert!(context.namespace_id.is_none());
    assert!(context.name.is_none());

    // Later steps are unreachable again until the gap is refilled
    wizard.jump_to(WizardStep::BasicConfiguration).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(wizard.snapshot().step, WizardStep::SelectKafka);

    wizard.stop();
}
