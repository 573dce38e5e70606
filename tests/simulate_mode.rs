mod common;

use std::fs;
use std::io::{Read, Write};
use std::sync::Arc;

use catapply::system::{SimulatedSystem, System};
use catapply_test_utils::builders::{CatalogBuilder, ResourceBuilder};

use crate::common::{apply_with, init_tracing};

#[tokio::test]
async fn simulation_decides_like_a_real_run_but_mutates_nothing() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("d");
    let file = tmp.path().join("f");
    let link = tmp.path().join("l");
    let marker = tmp.path().join("marker");

    let catalog = CatalogBuilder::new()
        .with(ResourceBuilder::directory(1, &dir).mode(0o755))
        .with(ResourceBuilder::plain_file(2, &file).content(&b"hello"[..]))
        .with(ResourceBuilder::symlink(3, &link, "/target"))
        .with(ResourceBuilder::exec_script(4, format!("printf x > {}", marker.display())))
        .build();

    let stats = apply_with(Arc::new(SimulatedSystem), catalog, 2)
        .await
        .expect("simulated apply should succeed");

    // The appliers decided everything needs creating...
    assert_eq!(stats.changed, 4);
    // ...yet the host is untouched.
    assert!(!dir.exists());
    assert!(!file.exists());
    assert!(fs::symlink_metadata(&link).is_err());
    assert!(!marker.exists());
}

#[tokio::test]
async fn simulation_sees_converged_state_as_unchanged() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("f");
    fs::write(&file, b"hello").unwrap();

    let catalog = CatalogBuilder::new()
        .with(ResourceBuilder::plain_file(1, &file).content(&b"hello"[..]))
        .build();

    let stats = apply_with(Arc::new(SimulatedSystem), catalog, 1)
        .await
        .expect("simulated apply should succeed");
    assert_eq!(stats.changed, 0, "reads hit the live host, so no change is seen");
}

#[test]
fn simulated_create_rejects_an_existing_path() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("existing");
    fs::write(&path, b"x").unwrap();

    let err = SimulatedSystem
        .create_file(&path, 0o644)
        .expect_err("creating over an existing path must fail");
    assert!(err.to_string().contains("already exists"));
}

#[test]
fn simulated_write_then_read_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("f");
    fs::write(&path, b"original").unwrap();

    let mut handle = SimulatedSystem.open_file(&path).unwrap();

    let mut before = Vec::new();
    handle.read_to_end(&mut before).unwrap();
    assert_eq!(before, b"original");

    handle.write_all(b"simulated").unwrap();
    let mut after = Vec::new();
    let err = handle
        .read_to_end(&mut after)
        .expect_err("reads after a simulated write must fail");
    assert!(err.to_string().contains("read after simulated write"));

    // The real file is untouched.
    assert_eq!(fs::read(&path).unwrap(), b"original");
}
