// src/engine/runtime.rs

//! Bounded-parallel dispatch over the dependency graph.
//!
//! The engine is the only owner of the graph. Workers receive a cloned
//! resource, run the applier synchronously on a blocking thread, and report
//! back over the completion channel; the engine marks the graph and unlocks
//! successors. Marking strictly precedes dispatching a successor, which is
//! what gives dependents their happens-before edge.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::apply::{apply_resource, ApplyContext};
use crate::catalog::{validate_catalog, Catalog, Resource, ResourceId};
use crate::dag::{DepGraph, Outcome};
use crate::errors::{ApplyError, Cancelled, ResourceFailure, RunFailure};
use crate::system::{OwnerLookup, System};

pub const DEFAULT_SHELL: &str = "/bin/bash";

#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Maximum number of resources applied simultaneously.
    pub jobs: usize,
    /// Shell interpreter for script-form exec resources.
    pub shell: PathBuf,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            shell: PathBuf::from(DEFAULT_SHELL),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    /// Resources in the catalog.
    pub resources: usize,
    /// Resources that mutated the host.
    pub changed: usize,
    /// Resources never attempted because an ancestor failed.
    pub skipped: usize,
}

struct Completion {
    id: ResourceId,
    result: anyhow::Result<bool>,
}

/// Apply a catalog against a host.
///
/// Validates the catalog first: structural errors (duplicate IDs, dangling
/// dependencies, cycles) abort before any resource runs. Resource failures
/// skip their descendants but leave independent branches running; all of
/// them are collected into the returned [`RunFailure`]. Cancellation stops
/// dispatch, waits for in-flight workers, and surfaces as its own kind.
pub async fn apply(
    sys: Arc<dyn System>,
    catalog: Catalog,
    opts: &ApplyOptions,
    cancel: CancellationToken,
) -> Result<ApplyStats, ApplyError> {
    validate_catalog(&catalog)?;

    let jobs = opts.jobs.max(1);
    let mut graph = DepGraph::from_catalog(catalog);
    let total = graph.len();
    info!(resources = total, jobs, "applying catalog");

    let lookup = Arc::new(OwnerLookup::new());
    let (completions_tx, mut completions_rx) = mpsc::channel::<Completion>(jobs);

    let mut in_flight = 0usize;
    let mut failures: Vec<ResourceFailure> = Vec::new();
    let mut cancelled = false;

    loop {
        if cancel.is_cancelled() {
            cancelled = true;
        }

        if !cancelled {
            while in_flight < jobs {
                let Some(id) = graph.pop_ready() else { break };
                let resource = graph.resource(id).clone();
                let deps_changed = graph.deps_changed(id);
                debug!(resource = id, comment = %resource.comment, "dispatching resource");
                spawn_worker(
                    Arc::clone(&sys),
                    resource,
                    deps_changed,
                    opts.shell.clone(),
                    Arc::clone(&lookup),
                    cancel.clone(),
                    completions_tx.clone(),
                );
                in_flight += 1;
            }
        }

        if in_flight == 0 {
            if cancelled || graph.is_done() {
                break;
            }
            // Not done, nothing ready, nothing running. Cycles are caught at
            // validation, so this is a bug in the engine, not in the catalog.
            return Err(ApplyError::Internal(
                "graph stuck: work outstanding but nothing ready or in flight".to_string(),
            ));
        }

        let Some(completion) = completions_rx.recv().await else {
            return Err(ApplyError::Internal(
                "completion channel closed with workers in flight".to_string(),
            ));
        };
        in_flight -= 1;

        match completion.result {
            Ok(changed) => {
                debug!(resource = completion.id, changed, "resource applied");
                graph.mark(completion.id, Outcome::Ok { changed });
            }
            Err(error) => {
                graph.mark(completion.id, Outcome::Failed);
                if is_cancelled(&error) {
                    cancelled = true;
                } else {
                    let resource = graph.resource(completion.id);
                    let chain = format!("{error:#}");
                    warn!(
                        resource = completion.id,
                        comment = %resource.comment,
                        error = %chain,
                        "resource failed"
                    );
                    failures.push(ResourceFailure {
                        id: completion.id,
                        comment: resource.comment.clone(),
                        error,
                    });
                }
            }
        }
    }

    let stats = ApplyStats {
        resources: total,
        changed: graph.changed_count(),
        skipped: graph.skipped_count(),
    };

    if failures.is_empty() && !cancelled {
        info!(
            resources = stats.resources,
            changed = stats.changed,
            "apply complete"
        );
        return Ok(stats);
    }

    failures.sort_by_key(|failure| failure.id);
    Err(RunFailure {
        failures,
        cancelled,
    }
    .into())
}

fn is_cancelled(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| cause.downcast_ref::<Cancelled>().is_some())
}

/// Run one applier on a blocking worker thread and feed the outcome back to
/// the engine. A panicking applier is converted into a failed completion so
/// the run can still finish and report.
fn spawn_worker(
    sys: Arc<dyn System>,
    resource: Resource,
    deps_changed: bool,
    shell: PathBuf,
    lookup: Arc<OwnerLookup>,
    cancel: CancellationToken,
    completions_tx: mpsc::Sender<Completion>,
) {
    tokio::spawn(async move {
        let id = resource.id;
        let join = task::spawn_blocking(move || {
            let ctx = ApplyContext {
                shell: &shell,
                lookup: &lookup,
                deps_changed,
                cancel: &cancel,
            };
            apply_resource(sys.as_ref(), &resource, &ctx)
        })
        .await;

        let result = match join {
            Ok(result) => result,
            Err(err) => Err(anyhow::anyhow!("applier panicked: {err}")),
        };
        let _ = completions_tx.send(Completion { id, result }).await;
    });
}
