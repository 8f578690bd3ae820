//! Dependency resolution and directory discovery tests

mod common;

use common::{manifest, module, HostFixture, Recorder};
use orion_host::module::{
    DependencyGraph, DirectorySource, FactoryRegistry, ModuleError, ModuleLoader, ModuleManager,
    ModuleState,
};
use std::collections::HashMap;
use std::sync::Arc;

fn resolve(descriptors: Vec<orion_host::ModuleDescriptor>) -> orion_host::module::DependencyResolution {
    DependencyGraph::new(descriptors.into_iter().map(Arc::new)).resolve()
}

#[test]
fn test_diamond_orders_every_dependency_first() {
    let resolution = resolve(vec![
        module("top").depends_on("left").depends_on("right"),
        module("left").depends_on("base"),
        module("right").depends_on("base"),
        module("base"),
    ]);
    assert!(resolution.rejected.is_empty());
    assert_eq!(resolution.load_order, vec!["base", "left", "right", "top"]);
    assert_eq!(resolution.reverse_order(), vec!["top", "right", "left", "base"]);
}

#[test]
fn test_cycle_poisons_dependents_only() {
    let resolution = resolve(vec![
        module("x").depends_on("y"),
        module("y").depends_on("z"),
        module("z").depends_on("x"),
        module("user").depends_on("x"),
        module("free"),
    ]);
    assert_eq!(resolution.load_order, vec!["free"]);
    match resolution.rejection("y") {
        Some(ModuleError::CircularDependency { cycle, .. }) => {
            assert_eq!(cycle, &vec!["x".to_string(), "y".to_string(), "z".to_string()])
        }
        other => panic!("unexpected rejection: {:?}", other),
    }
    assert!(matches!(
        resolution.rejection("user"),
        Some(ModuleError::DependencyFailed { .. })
    ));
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let resolution = resolve(vec![module("narcissus").depends_on("narcissus"), module("ok")]);
    assert_eq!(resolution.load_order, vec!["ok"]);
    assert!(matches!(
        resolution.rejection("narcissus"),
        Some(ModuleError::CircularDependency { .. })
    ));
}

#[test]
fn test_soft_cycle_does_not_reject() {
    let resolution = resolve(vec![
        module("a").soft_depends_on("b"),
        module("b").soft_depends_on("a"),
    ]);
    assert!(resolution.rejected.is_empty());
    assert_eq!(resolution.load_order.len(), 2);
}

#[test]
fn test_hard_dependents_lookup() {
    let graph = DependencyGraph::new(
        vec![module("a"), module("b").depends_on("a"), module("c").soft_depends_on("a")]
            .into_iter()
            .map(Arc::new),
    );
    assert_eq!(graph.hard_dependents("a"), vec!["b"]);
    assert!(graph.contains("c"));
    assert_eq!(graph.len(), 3);
}

#[tokio::test]
async fn test_directory_modules_load_with_merged_config() {
    let fixture = HostFixture::new();
    fixture.write_manifest("10-greeter", &manifest("greeter", "mock:greeter", &["core"]));
    fixture.write_manifest("20-core", &manifest("core", "mock:core", &[]));
    fixture.write_manifest("30-orphan", &manifest("orphan", "mock:unknown", &[]));
    fixture.write_module_config(
        "10-greeter",
        "greeting = \"hello\"\nchannels = [\"a\", \"b\"]\n\n[limits]\nper_user = 2\n",
    );

    let recorder = Recorder::new();
    let mut factories = FactoryRegistry::new();
    factories.register("mock:greeter", recorder.factory("greeter"));
    factories.register("mock:core", recorder.factory("core"));

    let mut overrides = HashMap::new();
    overrides.insert(
        "greeter".to_string(),
        HashMap::from([("greeting".to_string(), "salut".to_string())]),
    );
    let loader = ModuleLoader::new(&fixture.data_dir).with_overrides(overrides);
    let manager = ModuleManager::new(Arc::new(DirectorySource::new(
        &fixture.modules_dir,
        factories,
    )))
    .with_loader(loader);

    let report = manager.load_modules().await.unwrap();
    // orphan has no factory and is skipped at discovery
    assert_eq!(report.succeeded, vec!["core", "greeter"]);
    assert!(report.is_clean());

    let config = recorder.config_of("greeter").unwrap();
    assert_eq!(config["greeting"], "salut");
    assert_eq!(config["channels"], "a,b");
    assert_eq!(config["limits.per_user"], "2");
    assert!(recorder.config_of("core").unwrap().is_empty());

    manager.enable_modules().await;
    assert_eq!(manager.module_state("greeter").await, ModuleState::Enabled);
}

#[tokio::test]
async fn test_new_modules_are_picked_up_by_a_second_pass() {
    let fixture = HostFixture::new();
    fixture.write_manifest("core", &manifest("core", "mock:core", &[]));

    let recorder = Recorder::new();
    let mut factories = FactoryRegistry::new();
    factories.register("mock:core", recorder.factory("core"));
    factories.register("mock:addon", recorder.factory("addon"));
    let manager = ModuleManager::new(Arc::new(DirectorySource::new(
        &fixture.modules_dir,
        factories,
    )));

    assert_eq!(manager.load_modules().await.unwrap().count(), 1);
    fixture.write_manifest("addon", &manifest("addon", "mock:addon", &["core"]));
    let second = manager.load_modules().await.unwrap();
    assert_eq!(second.succeeded, vec!["addon"]);
    assert_eq!(recorder.instances_of("core"), 1);
}
