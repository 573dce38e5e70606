mod common;

use std::sync::Arc;

use catapply_test_utils::builders::{CatalogBuilder, ResourceBuilder};
use catapply_test_utils::fake_system::FakeSystem;

use crate::common::{apply_with, init_tracing, run_failure};

#[tokio::test]
async fn ownership_is_applied_once_and_then_converges() {
    init_tracing();
    let sys = FakeSystem::new();
    sys.add_user("app", 1000);
    sys.add_group("app", 1000);

    let build_catalog = || {
        CatalogBuilder::new()
            .with(
                ResourceBuilder::plain_file(1, "/srv/conf")
                    .content(&b"x"[..])
                    .user("app")
                    .group("app"),
            )
            .build()
    };

    apply_with(Arc::new(sys.clone()), build_catalog(), 1)
        .await
        .expect("first apply should succeed");
    assert!(
        sys.ops().iter().any(|op| op == "chown /srv/conf"),
        "ownership must be applied on create: {:?}",
        sys.ops()
    );

    let ops_before = sys.ops().len();
    let stats = apply_with(Arc::new(sys.clone()), build_catalog(), 1)
        .await
        .expect("second apply should succeed");
    assert_eq!(stats.changed, 0);
    assert_eq!(
        sys.ops().len(),
        ops_before,
        "converged ownership must not be re-applied: {:?}",
        sys.ops()
    );
}

#[tokio::test]
async fn unknown_user_fails_every_resource_that_names_it() {
    init_tracing();
    let sys = FakeSystem::new();

    let catalog = CatalogBuilder::new()
        .with(
            ResourceBuilder::plain_file(1, "/a")
                .content(&b"a"[..])
                .user("ghost"),
        )
        .with(
            ResourceBuilder::plain_file(2, "/b")
                .content(&b"b"[..])
                .user("ghost"),
        )
        .build();

    let err = apply_with(Arc::new(sys.clone()), catalog, 1)
        .await
        .expect_err("a missing user is a resource error");
    let failure = run_failure(err);
    assert_eq!(failure.failures.len(), 2);
    assert!(failure.to_string().contains("ghost"));
}

#[tokio::test]
async fn group_only_ownership_leaves_the_user_alone() {
    init_tracing();
    let sys = FakeSystem::new();
    sys.add_group("wheel", 10);

    let catalog = CatalogBuilder::new()
        .with(ResourceBuilder::directory(1, "/opt/d").group("wheel"))
        .build();

    apply_with(Arc::new(sys.clone()), catalog, 1)
        .await
        .expect("apply should succeed");
    assert!(sys.ops().iter().any(|op| op == "chown /opt/d"));
}
