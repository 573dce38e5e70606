use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use tokio_util::sync::CancellationToken;

use catapply::system::{
    CmdOutput, CommandLine, FileHandle, FileKind, FileMeta, FileWriter, System,
};

/// An in-memory `System` for scheduler and ordering tests:
/// - holds a flat path → entry map instead of touching the real host
/// - records every mutation, in order, as a shell-notation string
/// - can be told to fail mutations on specific paths or commands
/// - tracks how many `run` calls were in flight simultaneously
#[derive(Debug, Clone, Default)]
pub struct FakeSystem {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<PathBuf, FakeEntry>,
    ops: Vec<String>,
    fail_paths: HashSet<PathBuf>,
    fail_commands: HashSet<String>,
    users: HashMap<String, u32>,
    groups: HashMap<String, u32>,
    run_delay: Option<Duration>,
    active_runs: usize,
    max_active_runs: usize,
}

#[derive(Debug, Clone)]
enum FakeEntry {
    File {
        content: Vec<u8>,
        mode: u32,
        uid: u32,
        gid: u32,
    },
    Dir {
        mode: u32,
        uid: u32,
        gid: u32,
    },
    Symlink {
        target: PathBuf,
    },
}

impl FakeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>, mode: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.insert(
            path.as_ref().to_path_buf(),
            FakeEntry::File {
                content: content.into(),
                mode,
                uid: 0,
                gid: 0,
            },
        );
    }

    pub fn add_dir(&self, path: impl AsRef<Path>, mode: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.insert(
            path.as_ref().to_path_buf(),
            FakeEntry::Dir {
                mode,
                uid: 0,
                gid: 0,
            },
        );
    }

    pub fn add_symlink(&self, path: impl AsRef<Path>, target: impl AsRef<Path>) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.insert(
            path.as_ref().to_path_buf(),
            FakeEntry::Symlink {
                target: target.as_ref().to_path_buf(),
            },
        );
    }

    pub fn add_user(&self, name: &str, uid: u32) {
        self.inner.lock().unwrap().users.insert(name.to_string(), uid);
    }

    pub fn add_group(&self, name: &str, gid: u32) {
        self.inner.lock().unwrap().groups.insert(name.to_string(), gid);
    }

    /// Make any mutation of `path` fail.
    pub fn fail_on(&self, path: impl AsRef<Path>) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_paths.insert(path.as_ref().to_path_buf());
    }

    /// Make `run` report exit status 1 for this program.
    pub fn fail_command(&self, program: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_commands.insert(program.to_string());
    }

    /// Make every `run` take at least this long; lets tests observe overlap.
    pub fn set_run_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().run_delay = Some(delay);
    }

    /// Mutations in the order they happened.
    pub fn ops(&self) -> Vec<String> {
        self.inner.lock().unwrap().ops.clone()
    }

    /// Highest number of `run` calls that were in flight at once.
    pub fn max_concurrent_runs(&self) -> usize {
        self.inner.lock().unwrap().max_active_runs
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.inner.lock().unwrap().entries.contains_key(path.as_ref())
    }

    pub fn file_content(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.inner.lock().unwrap().entries.get(path.as_ref()) {
            Some(FakeEntry::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }

    fn check_fail(inner: &Inner, path: &Path, op: &str) -> Result<()> {
        if inner.fail_paths.contains(path) {
            bail!("{op} {path:?}: injected failure");
        }
        Ok(())
    }

    fn dir_is_empty(inner: &Inner, path: &Path) -> bool {
        !inner
            .entries
            .keys()
            .any(|p| p.parent() == Some(path))
    }
}

impl System for FakeSystem {
    fn lstat(&self, path: &Path) -> Result<Option<FileMeta>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.entries.get(path).map(|entry| match entry {
            FakeEntry::File {
                content,
                mode,
                uid,
                gid,
            } => FileMeta {
                kind: FileKind::Regular,
                mode: *mode,
                size: content.len() as u64,
                uid: *uid,
                gid: *gid,
            },
            FakeEntry::Dir { mode, uid, gid } => FileMeta {
                kind: FileKind::Directory,
                mode: *mode,
                size: 0,
                uid: *uid,
                gid: *gid,
            },
            FakeEntry::Symlink { .. } => FileMeta {
                kind: FileKind::Symlink,
                mode: 0o777,
                size: 0,
                uid: 0,
                gid: 0,
            },
        }))
    }

    fn readlink(&self, path: &Path) -> Result<PathBuf> {
        let inner = self.inner.lock().unwrap();
        match inner.entries.get(path) {
            Some(FakeEntry::Symlink { target }) => Ok(target.clone()),
            Some(_) => bail!("readlink {path:?}: not a symlink"),
            None => bail!("readlink {path:?}: not found"),
        }
    }

    fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_fail(&inner, path, "mkdir")?;
        if inner.entries.contains_key(path) {
            bail!("mkdir {path:?}: already exists");
        }
        inner.entries.insert(
            path.to_path_buf(),
            FakeEntry::Dir {
                mode,
                uid: 0,
                gid: 0,
            },
        );
        inner.ops.push(format!("mkdir {}", path.display()));
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_fail(&inner, path, "rm")?;
        match inner.entries.get(path) {
            None => bail!("rm {path:?}: not found"),
            Some(FakeEntry::Dir { .. }) => {
                if !Self::dir_is_empty(&inner, path) {
                    bail!("rmdir {path:?}: directory not empty");
                }
            }
            Some(_) => {}
        }
        inner.entries.remove(path);
        inner.ops.push(format!("rm {}", path.display()));
        Ok(())
    }

    fn symlink(&self, target: &Path, path: &Path) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_fail(&inner, path, "ln -s")?;
        if inner.entries.contains_key(path) {
            bail!("symlink {path:?}: already exists");
        }
        inner.entries.insert(
            path.to_path_buf(),
            FakeEntry::Symlink {
                target: target.to_path_buf(),
            },
        );
        inner
            .ops
            .push(format!("ln -s {} {}", target.display(), path.display()));
        Ok(())
    }

    fn create_file(&self, path: &Path, mode: u32) -> Result<Box<dyn FileWriter>> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_fail(&inner, path, "create")?;
        if inner.entries.contains_key(path) {
            bail!("create file {path:?}: already exists");
        }
        inner.entries.insert(
            path.to_path_buf(),
            FakeEntry::File {
                content: Vec::new(),
                mode,
                uid: 0,
                gid: 0,
            },
        );
        inner.ops.push(format!("create file {}", path.display()));
        Ok(Box::new(FakeFileWriter {
            sys: self.clone(),
            path: path.to_path_buf(),
            buffer: Vec::new(),
        }))
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn FileHandle>> {
        let inner = self.inner.lock().unwrap();
        let content = match inner.entries.get(path) {
            Some(FakeEntry::File { content, .. }) => content.clone(),
            Some(_) => bail!("open file {path:?}: not a regular file"),
            None => bail!("open file {path:?}: not found"),
        };
        Ok(Box::new(FakeFileHandle {
            sys: self.clone(),
            path: path.to_path_buf(),
            data: content,
            pos: 0,
            dirty: false,
        }))
    }

    fn chmod(&self, path: &Path, new_mode: u32) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_fail(&inner, path, "chmod")?;
        match inner.entries.get_mut(path) {
            Some(FakeEntry::File { mode, .. }) | Some(FakeEntry::Dir { mode, .. }) => {
                *mode = new_mode;
            }
            Some(FakeEntry::Symlink { .. }) => bail!("chmod {path:?}: is a symlink"),
            None => bail!("chmod {path:?}: not found"),
        }
        inner
            .ops
            .push(format!("chmod {:04o} {}", new_mode, path.display()));
        Ok(())
    }

    fn chown(&self, path: &Path, new_uid: Option<u32>, new_gid: Option<u32>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_fail(&inner, path, "chown")?;
        match inner.entries.get_mut(path) {
            Some(FakeEntry::File { uid, gid, .. }) | Some(FakeEntry::Dir { uid, gid, .. }) => {
                if let Some(new_uid) = new_uid {
                    *uid = new_uid;
                }
                if let Some(new_gid) = new_gid {
                    *gid = new_gid;
                }
            }
            Some(FakeEntry::Symlink { .. }) => bail!("chown {path:?}: is a symlink"),
            None => bail!("chown {path:?}: not found"),
        }
        inner.ops.push(format!("chown {}", path.display()));
        Ok(())
    }

    fn lookup_user(&self, name: &str) -> Result<u32> {
        let inner = self.inner.lock().unwrap();
        inner
            .users
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("unknown user {name:?}"))
    }

    fn lookup_group(&self, name: &str) -> Result<u32> {
        let inner = self.inner.lock().unwrap();
        inner
            .groups
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("unknown group {name:?}"))
    }

    fn run(&self, cmd: &CommandLine, _cancel: &CancellationToken) -> Result<CmdOutput> {
        let delay = {
            let mut inner = self.inner.lock().unwrap();
            inner.active_runs += 1;
            inner.max_active_runs = inner.max_active_runs.max(inner.active_runs);
            inner.ops.push(format!("exec {}", cmd.display()));
            inner.run_delay
        };

        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut inner = self.inner.lock().unwrap();
        inner.active_runs -= 1;
        let program = cmd.program.display().to_string();
        let code = if inner.fail_commands.contains(&program) {
            1
        } else {
            0
        };
        Ok(CmdOutput {
            output: Vec::new(),
            code: Some(code),
        })
    }
}

#[derive(Debug)]
struct FakeFileWriter {
    sys: FakeSystem,
    path: PathBuf,
    buffer: Vec<u8>,
}

impl Write for FakeFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl FileWriter for FakeFileWriter {
    fn close(self: Box<Self>) -> Result<()> {
        let mut inner = self.sys.inner.lock().unwrap();
        if let Some(FakeEntry::File { content, .. }) = inner.entries.get_mut(&self.path) {
            *content = self.buffer;
        }
        Ok(())
    }
}

struct FakeFileHandle {
    sys: FakeSystem,
    path: PathBuf,
    data: Vec<u8>,
    pos: usize,
    dirty: bool,
}

impl FakeFileHandle {
    fn write_back(&mut self) {
        if !self.dirty {
            return;
        }
        let mut inner = self.sys.inner.lock().unwrap();
        if let Some(FakeEntry::File { content, .. }) = inner.entries.get_mut(&self.path) {
            *content = self.data.clone();
        }
        inner.ops.push(format!("write {}", self.path.display()));
        self.dirty = false;
    }
}

impl Read for FakeFileHandle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = &self.data[self.pos.min(self.data.len())..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for FakeFileHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let end = self.pos + buf.len();
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        self.dirty = true;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Seek for FakeFileHandle {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => self.data.len() as i64 + offset,
            SeekFrom::Current(offset) => self.pos as i64 + offset,
        };
        if new_pos < 0 {
            return Err(std::io::Error::other("seek before start"));
        }
        self.pos = new_pos as usize;
        Ok(self.pos as u64)
    }
}

impl FileHandle for FakeFileHandle {
    fn truncate(&mut self, len: u64) -> Result<()> {
        self.data.truncate(len as usize);
        self.dirty = true;
        Ok(())
    }
}

impl Drop for FakeFileHandle {
    fn drop(&mut self) {
        self.write_back();
    }
}
