use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use catapply::system::{CmdOutput, CommandLine, FileHandle, FileMeta, FileWriter, System};

/// Wrapper that records every mutating operation while delegating to a real
/// backend. Lets end-to-end tests assert "the second apply wrote nothing".
#[derive(Debug, Clone)]
pub struct RecordingSystem {
    inner: Arc<dyn System>,
    mutations: Arc<Mutex<Vec<String>>>,
}

impl RecordingSystem {
    pub fn new(inner: Arc<dyn System>) -> Self {
        Self {
            inner,
            mutations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn mutations(&self) -> Vec<String> {
        self.mutations.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.mutations.lock().unwrap().clear();
    }

    fn record(&self, op: String) {
        self.mutations.lock().unwrap().push(op);
    }
}

impl System for RecordingSystem {
    fn lstat(&self, path: &Path) -> Result<Option<FileMeta>> {
        self.inner.lstat(path)
    }

    fn readlink(&self, path: &Path) -> Result<PathBuf> {
        self.inner.readlink(path)
    }

    fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        self.record(format!("mkdir {}", path.display()));
        self.inner.mkdir(path, mode)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.record(format!("rm {}", path.display()));
        self.inner.remove(path)
    }

    fn symlink(&self, target: &Path, path: &Path) -> Result<()> {
        self.record(format!("ln -s {} {}", target.display(), path.display()));
        self.inner.symlink(target, path)
    }

    fn create_file(&self, path: &Path, mode: u32) -> Result<Box<dyn FileWriter>> {
        self.record(format!("create file {}", path.display()));
        self.inner.create_file(path, mode)
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn FileHandle>> {
        self.inner.open_file(path)
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        self.record(format!("chmod {:04o} {}", mode, path.display()));
        self.inner.chmod(path, mode)
    }

    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
        self.record(format!("chown {}", path.display()));
        self.inner.chown(path, uid, gid)
    }

    fn lookup_user(&self, name: &str) -> Result<u32> {
        self.inner.lookup_user(name)
    }

    fn lookup_group(&self, name: &str) -> Result<u32> {
        self.inner.lookup_group(name)
    }

    fn run(&self, cmd: &CommandLine, cancel: &CancellationToken) -> Result<CmdOutput> {
        self.record(format!("exec {}", cmd.display()));
        self.inner.run(cmd, cancel)
    }
}
