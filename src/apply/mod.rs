// src/apply/mod.rs

//! Resource appliers.
//!
//! Each applier reconciles observed host state to the desired state through
//! the [`crate::system::System`] trait and reports whether it mutated the
//! host. Appliers are synchronous; the engine runs them on blocking worker
//! threads.
//!
//! - [`file`] handles plain files, directories, symlinks, and absence.
//! - [`exec`] handles conditional shell commands.

pub mod exec;
pub mod file;

use std::path::Path;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::catalog::{Resource, ResourceBody};
use crate::errors::Cancelled;
use crate::system::{OwnerLookup, System};

/// Per-dispatch context handed to an applier.
pub struct ApplyContext<'a> {
    /// Shell interpreter for script-form exec resources.
    pub shell: &'a Path,
    /// Shared user/group resolution caches.
    pub lookup: &'a OwnerLookup,
    /// Whether any direct dependency of this resource reported a change.
    pub deps_changed: bool,
    /// Ambient cancellation signal, checked at I/O boundaries.
    pub cancel: &'a CancellationToken,
}

impl ApplyContext<'_> {
    /// Abort the applier if the run has been cancelled.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Cancelled.into());
        }
        Ok(())
    }
}

/// Apply one resource. Returns whether the host was mutated.
pub fn apply_resource(sys: &dyn System, resource: &Resource, ctx: &ApplyContext<'_>) -> Result<bool> {
    match &resource.body {
        ResourceBody::Noop => Ok(false),
        ResourceBody::File(file) => file::apply_file(sys, file, ctx),
        ResourceBody::Exec(exec) => exec::apply_exec(sys, exec, ctx),
    }
}
