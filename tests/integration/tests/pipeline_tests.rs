//! Full pipeline: upload a package archive, validate it, commit it,
//! install a newer minor version, and upgrade the stored content.

mod helpers;

use h5p_core::host::HostAdapter;
use h5p_package::{PackageValidator, StorageCommitter};
use h5p_upgrade::{
    EngineConfig, EngineEvent, UpgradeEngine, UpgradeJob, UpgradeLibrary, UpgradeScript,
};
use helpers::{init_tracing, PipelineHost};
use serde_json::{json, Value};

fn greeting_package(host: &PipelineHost, minor: u32, patch: u32) {
    host.upload(&[
        (
            "h5p.json",
            json!({
                "title": "Greeting Card",
                "language": "en",
                "mainLibrary": "greeting-card",
                "preloadedDependencies": [
                    {"machineName": "greeting-card", "majorVersion": 1, "minorVersion": minor}
                ],
                "embedTypes": ["iframe"]
            }),
        ),
        ("content/content.json", json!({"greeting": "Hello"})),
        (
            "greeting-card/library.json",
            json!({
                "machineName": "greeting-card",
                "title": "Greeting Card",
                "majorVersion": 1,
                "minorVersion": minor,
                "patchVersion": patch,
                "runnable": true,
                "preloadedJs": [{"path": "greeting-card.js"}]
            }),
        ),
    ]);
}

#[test]
fn test_upload_validate_commit() {
    init_tracing();
    let mut host = PipelineHost::new();
    greeting_package(&host, 0, 1);

    let validated = PackageValidator::validate_package(&host).unwrap();
    let outcome = StorageCommitter::default()
        .commit(&validated, "c1", &mut host)
        .unwrap();

    assert_eq!(outcome.installed, vec!["greeting-card 1.0"]);
    let id = host.get_library_id("greeting-card", 1, 0).unwrap();
    assert!(host
        .storage_path()
        .join("libraries")
        .join(id.to_string())
        .join("greeting-card.js")
        .exists());
    assert!(host.storage_path().join("content/c1/content.json").exists());
    assert_eq!(host.content["c1"].0["greeting"], "Hello");
    assert!(!host.uploaded_folder_path().exists());
}

#[test]
fn test_reupload_of_older_patch_changes_nothing() {
    init_tracing();
    let mut host = PipelineHost::new();
    greeting_package(&host, 0, 3);
    let validated = PackageValidator::validate_package(&host).unwrap();
    StorageCommitter::default()
        .commit(&validated, "c1", &mut host)
        .unwrap();

    greeting_package(&host, 0, 2);
    let validated = PackageValidator::validate_package(&host).unwrap();
    let outcome = StorageCommitter::default()
        .commit(&validated, "c2", &mut host)
        .unwrap();

    assert_eq!(outcome.skipped, vec!["greeting-card 1.0"]);
    let (_, stored) = &host.libraries[&("greeting-card".to_string(), 1, 0)];
    assert_eq!(stored.patch_version, 3);
}

#[tokio::test]
async fn test_commit_then_upgrade_content() {
    init_tracing();
    let mut host = PipelineHost::new();

    // Content created against greeting-card 1.0
    greeting_package(&host, 0, 1);
    let validated = PackageValidator::validate_package(&host).unwrap();
    StorageCommitter::default()
        .commit(&validated, "c1", &mut host)
        .unwrap();

    // A newer minor version arrives
    greeting_package(&host, 2, 0);
    let validated = PackageValidator::validate_package(&host).unwrap();
    let outcome = StorageCommitter::default()
        .commit(&validated, "c2", &mut host)
        .unwrap();
    assert_eq!(outcome.installed, vec!["greeting-card 1.2"]);

    // 1.1 renames the field, 1.2 wraps it in a card object
    let script = UpgradeScript::new()
        .register(1, 1, |mut params: Value| {
            let greeting = params["greeting"].take();
            Ok(json!({"text": greeting}))
        })
        .register(1, 2, |params: Value| Ok(json!({"card": params})));

    let (engine, mut events) = UpgradeEngine::new(EngineConfig::default());
    engine.submit(UpgradeJob {
        id: "c1".to_string(),
        name: "greeting-card".to_string(),
        old_version: "1.0".parse().unwrap(),
        new_version: "1.2".parse().unwrap(),
        params: host.content["c1"].0.clone(),
    });

    let upgraded = loop {
        match events.recv().await.unwrap() {
            EngineEvent::LoadLibrary { name, version, reply } => {
                let _ = reply.send(Ok(UpgradeLibrary {
                    name,
                    version,
                    upgrades: Some(script.clone()),
                }));
            }
            EngineEvent::Done { id, params } => {
                assert_eq!(id, "c1");
                break params;
            }
            EngineEvent::Failed { error, .. } => panic!("upgrade failed: {error}"),
        }
    };
    assert_eq!(upgraded, json!({"card": {"text": "Hello"}}));

    // The upgraded parameters replace the stored content.json
    StorageCommitter::default()
        .apply_upgrade("c1", "greeting-card 1.2", &upgraded, &mut host)
        .unwrap();
    let stored =
        std::fs::read_to_string(host.storage_path().join("content/c1/content.json")).unwrap();
    assert_eq!(
        serde_json::from_str::<Value>(&stored).unwrap(),
        json!({"card": {"text": "Hello"}})
    );
}

#[test]
fn test_invalid_upload_leaves_storage_untouched() {
    init_tracing();
    let mut host = PipelineHost::new();
    greeting_package(&host, 0, 1);
    let validated = PackageValidator::validate_package(&host).unwrap();
    StorageCommitter::default()
        .commit(&validated, "c1", &mut host)
        .unwrap();

    // Manifest demands a library nobody has
    host.upload(&[
        (
            "h5p.json",
            json!({
                "title": "Broken",
                "language": "en",
                "mainLibrary": "missing-lib",
                "preloadedDependencies": [
                    {"machineName": "missing-lib", "majorVersion": 9, "minorVersion": 9}
                ],
                "embedTypes": ["iframe"]
            }),
        ),
        ("content/content.json", json!({})),
    ]);
    assert!(PackageValidator::validate_package(&host).is_err());

    // Earlier commit unaffected, rejected scratch cleaned up
    assert!(host.storage_path().join("content/c1").exists());
    assert!(!host.uploaded_folder_path().exists());
    assert_eq!(host.libraries.len(), 1);
}
