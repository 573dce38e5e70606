mod common;

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

use catapply::system::LocalSystem;
use catapply_test_utils::builders::{CatalogBuilder, ResourceBuilder};
use catapply_test_utils::recording::RecordingSystem;

use crate::common::{apply_with, init_tracing, run_failure};

#[tokio::test]
async fn creates_a_plain_file_with_content_and_mode() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("a");

    let catalog = CatalogBuilder::new()
        .with(
            ResourceBuilder::plain_file(1, &path)
                .comment("greeting")
                .content(&b"hi\n"[..])
                .mode(0o644),
        )
        .build();

    let stats = apply_with(Arc::new(LocalSystem), catalog, 1)
        .await
        .expect("apply should succeed");
    assert_eq!(stats.changed, 1);

    assert_eq!(fs::read(&path).unwrap(), b"hi\n");
    let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o7777;
    assert_eq!(mode, 0o644);
}

#[tokio::test]
async fn second_apply_performs_no_mutations() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();

    let build_catalog = |tmp: &std::path::Path| {
        CatalogBuilder::new()
            .with(ResourceBuilder::directory(1, tmp.join("d")).mode(0o755))
            .with(
                ResourceBuilder::plain_file(2, tmp.join("d/x"))
                    .content(&b"x"[..])
                    .mode(0o600)
                    .after(1),
            )
            .with(ResourceBuilder::symlink(3, tmp.join("l"), tmp.join("d/x")))
            .build()
    };

    let recorder = RecordingSystem::new(Arc::new(LocalSystem));
    let sys = Arc::new(recorder.clone());

    apply_with(sys.clone(), build_catalog(tmp.path()), 1)
        .await
        .expect("first apply should succeed");
    assert!(!recorder.mutations().is_empty());

    recorder.clear();
    let stats = apply_with(sys, build_catalog(tmp.path()), 1)
        .await
        .expect("second apply should succeed");
    assert_eq!(
        recorder.mutations(),
        Vec::<String>::new(),
        "a converged host must not be touched"
    );
    assert_eq!(stats.changed, 0);
}

#[tokio::test]
async fn directory_then_file_under_parallel_jobs() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("d");
    let file = dir.join("x");

    let catalog = CatalogBuilder::new()
        .with(ResourceBuilder::directory(1, &dir).mode(0o755))
        .with(ResourceBuilder::plain_file(2, &file).content(&b"x"[..]).after(1))
        .build();

    apply_with(Arc::new(LocalSystem), catalog, 4)
        .await
        .expect("apply should succeed");

    assert!(dir.is_dir());
    assert_eq!(fs::read(&file).unwrap(), b"x");
}

#[tokio::test]
async fn replaces_a_symlink_pointing_elsewhere() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let link = tmp.path().join("l");
    std::os::unix::fs::symlink("/old", &link).unwrap();

    let catalog = CatalogBuilder::new()
        .with(ResourceBuilder::symlink(1, &link, "/new"))
        .build();

    let stats = apply_with(Arc::new(LocalSystem), catalog, 1)
        .await
        .expect("apply should succeed");
    assert_eq!(stats.changed, 1);
    assert_eq!(fs::read_link(&link).unwrap(), std::path::PathBuf::from("/new"));
}

#[tokio::test]
async fn rewrites_content_that_differs_and_truncates() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("conf");
    fs::write(&path, b"something much longer than desired").unwrap();

    let catalog = CatalogBuilder::new()
        .with(ResourceBuilder::plain_file(1, &path).content(&b"short"[..]))
        .build();

    apply_with(Arc::new(LocalSystem), catalog, 1)
        .await
        .expect("apply should succeed");
    assert_eq!(fs::read(&path).unwrap(), b"short");
}

#[tokio::test]
async fn plain_file_without_content_only_ensures_existence() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("keep");
    fs::write(&path, b"precious").unwrap();

    let catalog = CatalogBuilder::new()
        .with(ResourceBuilder::plain_file(1, &path))
        .build();

    let stats = apply_with(Arc::new(LocalSystem), catalog, 1)
        .await
        .expect("apply should succeed");
    assert_eq!(stats.changed, 0);
    assert_eq!(fs::read(&path).unwrap(), b"precious", "content is left alone");
}

#[tokio::test]
async fn absent_removes_files_and_tolerates_missing_paths() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("junk");
    fs::write(&path, b"x").unwrap();

    let catalog = CatalogBuilder::new()
        .with(ResourceBuilder::absent(1, &path))
        .build();

    let stats = apply_with(Arc::new(LocalSystem), catalog.clone(), 1)
        .await
        .expect("apply should succeed");
    assert_eq!(stats.changed, 1);
    assert!(!path.exists());

    // Removing an already-absent path succeeds and changes nothing.
    let stats = apply_with(Arc::new(LocalSystem), catalog, 1)
        .await
        .expect("second apply should succeed");
    assert_eq!(stats.changed, 0);
}

#[tokio::test]
async fn absent_refuses_a_non_empty_directory() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("full");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("inside"), b"x").unwrap();

    let catalog = CatalogBuilder::new()
        .with(ResourceBuilder::absent(1, &dir).comment("cleanup"))
        .build();

    let err = apply_with(Arc::new(LocalSystem), catalog, 1)
        .await
        .expect_err("non-empty directory must not be removed");
    let failure = run_failure(err);
    assert_eq!(failure.failures.len(), 1);
    assert_eq!(failure.failures[0].id, 1);
    assert!(dir.join("inside").exists(), "nothing was deleted");
}

#[tokio::test]
async fn plain_file_conflicting_with_a_directory_is_an_error() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("d");
    fs::create_dir(&dir).unwrap();

    let catalog = CatalogBuilder::new()
        .with(ResourceBuilder::plain_file(9, &dir).content(&b"x"[..]))
        .build();

    let err = apply_with(Arc::new(LocalSystem), catalog, 1)
        .await
        .expect_err("a directory cannot become a plain file");
    let failure = run_failure(err);
    assert_eq!(failure.failures[0].id, 9);
    let message = failure.to_string();
    assert!(
        message.contains("not a regular file"),
        "unexpected message: {message}"
    );
}

#[tokio::test]
async fn applies_mode_changes_to_existing_files() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("m");
    fs::write(&path, b"same").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

    let catalog = CatalogBuilder::new()
        .with(ResourceBuilder::plain_file(1, &path).content(&b"same"[..]).mode(0o640))
        .build();

    let stats = apply_with(Arc::new(LocalSystem), catalog, 1)
        .await
        .expect("apply should succeed");
    assert_eq!(stats.changed, 1);
    let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o7777;
    assert_eq!(mode, 0o640);
}
