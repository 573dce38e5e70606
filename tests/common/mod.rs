#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use catapply::catalog::Catalog;
use catapply::engine::{self, ApplyOptions, ApplyStats};
use catapply::errors::ApplyError;
use catapply::system::System;

pub use catapply_test_utils::init_tracing;

/// Apply a catalog with `/bin/sh` as the script shell and no cancellation.
pub async fn apply_with(
    sys: Arc<dyn System>,
    catalog: Catalog,
    jobs: usize,
) -> Result<ApplyStats, ApplyError> {
    let opts = ApplyOptions {
        jobs,
        shell: PathBuf::from("/bin/sh"),
    };
    engine::apply(sys, catalog, &opts, CancellationToken::new()).await
}

/// Unwrap the per-resource failure report out of an apply error.
pub fn run_failure(err: ApplyError) -> catapply::errors::RunFailure {
    match err {
        ApplyError::Run(failure) => failure,
        other => panic!("expected a run failure, got: {other}"),
    }
}
