// src/system/local.rs

//! Live host backend: real syscalls, real processes.

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{DirBuilderExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use nix::unistd::{Gid, Group, Uid, User};
use tokio_util::sync::CancellationToken;
use wait_timeout::ChildExt;

use crate::errors::Cancelled;
use crate::system::{
    CmdOutput, CommandLine, FileHandle, FileKind, FileMeta, FileWriter, System,
};

/// How often a blocking child wait re-checks the cancellation signal.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSystem;

impl System for LocalSystem {
    fn lstat(&self, path: &Path) -> Result<Option<FileMeta>> {
        match fs::symlink_metadata(path) {
            Ok(meta) => Ok(Some(meta_from_std(&meta))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("lstat {:?}", path)),
        }
    }

    fn readlink(&self, path: &Path) -> Result<PathBuf> {
        fs::read_link(path).with_context(|| format!("readlink {:?}", path))
    }

    fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        fs::DirBuilder::new()
            .mode(mode)
            .create(path)
            .with_context(|| format!("mkdir {:?}", path))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let meta =
            fs::symlink_metadata(path).with_context(|| format!("lstat for remove {:?}", path))?;
        if meta.is_dir() {
            fs::remove_dir(path).with_context(|| format!("rmdir {:?}", path))
        } else {
            fs::remove_file(path).with_context(|| format!("rm {:?}", path))
        }
    }

    fn symlink(&self, target: &Path, path: &Path) -> Result<()> {
        std::os::unix::fs::symlink(target, path)
            .with_context(|| format!("symlink {:?} -> {:?}", path, target))
    }

    fn create_file(&self, path: &Path, mode: u32) -> Result<Box<dyn FileWriter>> {
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(mode)
            .open(path)
            .with_context(|| format!("create file {:?}", path))?;
        Ok(Box::new(LocalFileWriter { file }))
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn FileHandle>> {
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("open file {:?}", path))?;
        Ok(Box::new(LocalFileHandle { file }))
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .with_context(|| format!("chmod {:o} {:?}", mode, path))
    }

    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
        nix::unistd::chown(path, uid.map(Uid::from_raw), gid.map(Gid::from_raw))
            .with_context(|| format!("chown {:?}", path))
    }

    fn lookup_user(&self, name: &str) -> Result<u32> {
        match User::from_name(name).with_context(|| format!("looking up user {:?}", name))? {
            Some(user) => Ok(user.uid.as_raw()),
            None => bail!("unknown user {:?}", name),
        }
    }

    fn lookup_group(&self, name: &str) -> Result<u32> {
        match Group::from_name(name).with_context(|| format!("looking up group {:?}", name))? {
            Some(group) => Ok(group.gid.as_raw()),
            None => bail!("unknown group {:?}", name),
        }
    }

    fn run(&self, cmd: &CommandLine, cancel: &CancellationToken) -> Result<CmdOutput> {
        let mut command = Command::new(&cmd.program);
        command.args(&cmd.args);
        if let Some(env) = &cmd.env {
            command.env_clear();
            command.envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        if let Some(dir) = &cmd.dir {
            command.current_dir(dir);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .with_context(|| format!("spawning {}", cmd.display()))?;

        // Drain both pipes concurrently with the wait. If we waited first,
        // the child could block on write() once the pipe buffer fills.
        let output = Arc::new(Mutex::new(Vec::new()));
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_drain(stdout, Arc::clone(&output)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_drain(stderr, Arc::clone(&output)));
        }

        let status = loop {
            if let Some(status) = child
                .wait_timeout(WAIT_POLL_INTERVAL)
                .with_context(|| format!("waiting for {}", cmd.display()))?
            {
                break status;
            }
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                for reader in readers {
                    let _ = reader.join();
                }
                return Err(Cancelled.into());
            }
        };

        for reader in readers {
            let _ = reader.join();
        }

        let output = Arc::try_unwrap(output)
            .map(|m| m.into_inner().unwrap_or_default())
            .unwrap_or_default();

        Ok(CmdOutput {
            output,
            code: status.code(),
        })
    }
}

fn spawn_drain(mut stream: impl Read + Send + 'static, sink: Arc<Mutex<Vec<u8>>>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0u8; 8192];
        loop {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Ok(mut sink) = sink.lock() {
                        sink.extend_from_slice(&buf[..n]);
                    }
                }
            }
        }
    })
}

fn meta_from_std(meta: &fs::Metadata) -> FileMeta {
    let file_type = meta.file_type();
    let kind = if file_type.is_symlink() {
        FileKind::Symlink
    } else if file_type.is_dir() {
        FileKind::Directory
    } else if file_type.is_file() {
        FileKind::Regular
    } else {
        FileKind::Other
    };
    FileMeta {
        kind,
        mode: meta.mode() & 0o7777,
        size: meta.len(),
        uid: meta.uid(),
        gid: meta.gid(),
    }
}

#[derive(Debug)]
struct LocalFileWriter {
    file: fs::File,
}

impl Write for LocalFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl FileWriter for LocalFileWriter {
    fn close(mut self: Box<Self>) -> Result<()> {
        self.file.flush().context("closing created file")?;
        Ok(())
    }
}

struct LocalFileHandle {
    file: fs::File,
}

impl Read for LocalFileHandle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for LocalFileHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl Seek for LocalFileHandle {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.file.seek(pos)
    }
}

impl FileHandle for LocalFileHandle {
    fn truncate(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len).context("truncating file")
    }
}
