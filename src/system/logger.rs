// src/system/logger.rs

//! Mutation-logging wrapper around another backend.
//!
//! Enabled by `-s/--show-commands`: every mutating operation emits one
//! shell-notation line before delegating. Reads pass through silently.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::system::{CmdOutput, CommandLine, FileHandle, FileMeta, FileWriter, System};

#[derive(Debug, Clone)]
pub struct LoggingSystem {
    inner: Arc<dyn System>,
}

impl LoggingSystem {
    pub fn new(inner: Arc<dyn System>) -> Self {
        Self { inner }
    }
}

impl System for LoggingSystem {
    fn lstat(&self, path: &Path) -> Result<Option<FileMeta>> {
        self.inner.lstat(path)
    }

    fn readlink(&self, path: &Path) -> Result<PathBuf> {
        self.inner.readlink(path)
    }

    fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        info!("mkdir {}", path.display());
        self.inner.mkdir(path, mode)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        info!("rm {}", path.display());
        self.inner.remove(path)
    }

    fn symlink(&self, target: &Path, path: &Path) -> Result<()> {
        info!("ln -s {} {}", target.display(), path.display());
        self.inner.symlink(target, path)
    }

    fn create_file(&self, path: &Path, mode: u32) -> Result<Box<dyn FileWriter>> {
        info!("create file {}", path.display());
        self.inner.create_file(path, mode)
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn FileHandle>> {
        self.inner.open_file(path)
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        info!("chmod {:04o} {}", mode, path.display());
        self.inner.chmod(path, mode)
    }

    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
        let fmt_half = |half: Option<u32>| half.map_or("-".to_string(), |v| v.to_string());
        info!("chown {}:{} {}", fmt_half(uid), fmt_half(gid), path.display());
        self.inner.chown(path, uid, gid)
    }

    fn lookup_user(&self, name: &str) -> Result<u32> {
        self.inner.lookup_user(name)
    }

    fn lookup_group(&self, name: &str) -> Result<u32> {
        self.inner.lookup_group(name)
    }

    fn run(&self, cmd: &CommandLine, cancel: &CancellationToken) -> Result<CmdOutput> {
        info!("exec {}", cmd.display());
        self.inner.run(cmd, cancel)
    }
}
