mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use catapply::engine::{self, ApplyOptions};
use catapply::errors::ApplyError;
use catapply::system::LocalSystem;
use catapply_test_utils::builders::{CatalogBuilder, ResourceBuilder};
use catapply_test_utils::with_timeout;

use crate::common::init_tracing;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancellation_stops_dispatch_and_reports_as_cancelled() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let after_marker = tmp.path().join("after");

    // 1 blocks for much longer than the test runs; 2 would create a marker.
    let catalog = CatalogBuilder::new()
        .with(ResourceBuilder::exec_argv(1, ["sleep", "30"]).comment("long sleep"))
        .with(
            ResourceBuilder::exec_script(2, format!("printf x > {}", after_marker.display()))
                .after(1),
        )
        .build();

    let opts = ApplyOptions {
        jobs: 1,
        shell: PathBuf::from("/bin/sh"),
    };
    let cancel = CancellationToken::new();

    let apply_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { engine::apply(Arc::new(LocalSystem), catalog, &opts, cancel).await }
    });

    // Let the sleep start, then pull the plug.
    tokio::time::sleep(Duration::from_millis(300)).await;
    cancel.cancel();

    let result = with_timeout(async { apply_task.await.unwrap() }).await;
    match result {
        Err(ApplyError::Run(failure)) => {
            assert!(failure.cancelled, "run must report cancellation");
            assert!(failure.to_string().contains("cancelled"));
        }
        other => panic!("expected a cancelled run, got {other:?}"),
    }

    assert!(
        !after_marker.exists(),
        "work behind the cancelled resource must never run"
    );
}

#[tokio::test]
async fn pre_cancelled_token_applies_nothing() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let marker = tmp.path().join("marker");

    let catalog = CatalogBuilder::new()
        .with(ResourceBuilder::exec_script(1, format!("printf x > {}", marker.display())))
        .build();

    let opts = ApplyOptions {
        jobs: 1,
        shell: PathBuf::from("/bin/sh"),
    };
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = engine::apply(Arc::new(LocalSystem), catalog, &opts, cancel).await;
    match result {
        Err(ApplyError::Run(failure)) => {
            assert!(failure.cancelled);
            assert!(failure.failures.is_empty(), "no resource error, just cancellation");
        }
        other => panic!("expected a cancelled run, got {other:?}"),
    }
    assert!(!marker.exists());
}
