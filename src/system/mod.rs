// src/system/mod.rs

//! The host abstraction the appliers run against.
//!
//! Every host-visible effect flows through the [`System`] trait, so the same
//! appliers drive:
//! - [`LocalSystem`]: live syscalls,
//! - [`SimulatedSystem`]: dry-run (reads hit the live host, mutations are
//!   no-ops),
//! - [`LoggingSystem`]: a wrapper that logs one line per mutation.

use std::fmt::Debug;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio_util::sync::CancellationToken;

pub mod local;
pub mod logger;
pub mod lookup;
pub mod simulated;

pub use local::LocalSystem;
pub use logger::LoggingSystem;
pub use lookup::OwnerLookup;
pub use simulated::SimulatedSystem;

/// What kind of filesystem object a path holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    Other,
}

/// Symlink-preserving metadata for a path.
#[derive(Debug, Clone, Copy)]
pub struct FileMeta {
    pub kind: FileKind,
    /// Permission bits: low 9 bits plus setuid/setgid/sticky.
    pub mode: u32,
    pub size: u64,
    pub uid: u32,
    pub gid: u32,
}

/// Result of running a child process: combined stdout/stderr plus the exit
/// code (`None` when the process was killed by a signal).
#[derive(Debug, Clone, Default)]
pub struct CmdOutput {
    pub output: Vec<u8>,
    pub code: Option<i32>,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Fully resolved command line, ready to execute.
#[derive(Debug, Clone)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// `Some` replaces the inherited environment entirely.
    pub env: Option<Vec<(String, String)>>,
    pub dir: Option<PathBuf>,
}

impl CommandLine {
    /// Render for logs, shell-style.
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Write handle returned by [`System::create_file`].
pub trait FileWriter: Write + Send + Debug {
    /// Flush and close the file.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Read/write handle returned by [`System::open_file`].
pub trait FileHandle: Read + Write + Seek + Send {
    fn truncate(&mut self, len: u64) -> Result<()>;
}

/// Abstract host interface.
///
/// Appliers check the ambient cancellation signal between calls; only
/// [`System::run`] takes it directly, because a child-process wait is the one
/// operation that blocks long enough to need interruption mid-call.
pub trait System: Send + Sync + Debug {
    /// Metadata for `path`, or `None` if nothing exists there.
    fn lstat(&self, path: &Path) -> Result<Option<FileMeta>>;

    fn readlink(&self, path: &Path) -> Result<PathBuf>;

    /// Create a directory. Fails if the path already exists.
    fn mkdir(&self, path: &Path, mode: u32) -> Result<()>;

    /// Delete a file, symlink, or *empty* directory.
    fn remove(&self, path: &Path) -> Result<()>;

    fn symlink(&self, target: &Path, path: &Path) -> Result<()>;

    /// Create a new file with the given mode. Fails if the path exists.
    fn create_file(&self, path: &Path, mode: u32) -> Result<Box<dyn FileWriter>>;

    /// Open an existing file for read/write.
    fn open_file(&self, path: &Path) -> Result<Box<dyn FileHandle>>;

    fn chmod(&self, path: &Path, mode: u32) -> Result<()>;

    /// Change ownership. A `None` half is left untouched.
    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> Result<()>;

    fn lookup_user(&self, name: &str) -> Result<u32>;

    fn lookup_group(&self, name: &str) -> Result<u32>;

    /// Run a child process to completion, capturing combined output.
    /// Observes `cancel` while waiting and kills the child when it fires.
    fn run(&self, cmd: &CommandLine, cancel: &CancellationToken) -> Result<CmdOutput>;
}
