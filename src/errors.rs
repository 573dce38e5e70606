// src/errors.rs

//! Crate-wide error types.
//!
//! The taxonomy mirrors the distinct failure classes of an apply run:
//! - [`CatalogError`]: the catalog itself is malformed; nothing is applied.
//! - [`RunFailure`]: one or more resources failed to apply (and possibly the
//!   run was cancelled); independent branches still completed.
//! - [`ApplyError::Internal`]: the engine wedged itself; a bug, not a user
//!   error.

use std::fmt;

use thiserror::Error;

use crate::apply::exec::ExecFailed;
use crate::catalog::ResourceId;

/// Structural problems with a catalog, detected before anything is applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("resource {comment:?} has reserved id 0")]
    ZeroId { comment: String },

    #[error("duplicate resource id {0}")]
    DuplicateId(ResourceId),

    #[error("resource {id} depends on unknown resource {dep}")]
    UnknownDependency { id: ResourceId, dep: ResourceId },

    #[error("resource {0} depends on itself")]
    SelfDependency(ResourceId),

    #[error("dependency cycle involving resource {0}")]
    Cycle(ResourceId),
}

/// Sentinel error observed by workers when the ambient cancellation signal
/// fires. Distinct from resource failures: the host is not necessarily in a
/// bad state, but the run is incomplete.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("apply cancelled")]
pub struct Cancelled;

/// A single resource that failed to apply.
#[derive(Debug)]
pub struct ResourceFailure {
    pub id: ResourceId,
    pub comment: String,
    pub error: anyhow::Error,
}

impl ResourceFailure {
    /// Captured command output attached to the failure, if any.
    pub fn output(&self) -> Option<&[u8]> {
        self.error
            .chain()
            .find_map(|cause| cause.downcast_ref::<ExecFailed>())
            .map(|failed| failed.output.as_slice())
    }
}

impl fmt::Display for ResourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.comment.is_empty() {
            write!(f, "resource {}: {:#}", self.id, self.error)?;
        } else {
            write!(f, "resource {} ({}): {:#}", self.id, self.comment, self.error)?;
        }
        if let Some(output) = self.output() {
            if !output.is_empty() {
                write!(f, "\n{}", String::from_utf8_lossy(output).trim_end())?;
            }
        }
        Ok(())
    }
}

/// Everything that went wrong during a run: all per-resource failures plus
/// whether the run was cut short by cancellation.
#[derive(Debug, Default)]
pub struct RunFailure {
    pub failures: Vec<ResourceFailure>,
    pub cancelled: bool,
}

impl RunFailure {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for failure in &self.failures {
            if !first {
                writeln!(f)?;
            }
            write!(f, "{failure}")?;
            first = false;
        }
        if self.cancelled {
            if !first {
                writeln!(f)?;
            }
            write!(f, "{}", Cancelled)?;
        }
        Ok(())
    }
}

impl std::error::Error for RunFailure {}

/// Top-level error returned by [`crate::engine::apply`] and the CLI wiring.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Run(#[from] RunFailure),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ApplyError>;
