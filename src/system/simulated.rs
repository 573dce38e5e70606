// src/system/simulated.rs

//! Dry-run backend.
//!
//! Reads hit the live host so the appliers make the same decisions they
//! would for real; every mutation is a no-op. A path written during
//! simulation has unknowable content, so reading it back afterwards is an
//! error rather than a silent divergence.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tokio_util::sync::CancellationToken;

use crate::system::{
    CmdOutput, CommandLine, FileHandle, FileKind, FileMeta, FileWriter, LocalSystem, System,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedSystem;

impl System for SimulatedSystem {
    fn lstat(&self, path: &Path) -> Result<Option<FileMeta>> {
        LocalSystem.lstat(path)
    }

    fn readlink(&self, path: &Path) -> Result<PathBuf> {
        LocalSystem.readlink(path)
    }

    fn mkdir(&self, _path: &Path, _mode: u32) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn symlink(&self, _target: &Path, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn create_file(&self, path: &Path, _mode: u32) -> Result<Box<dyn FileWriter>> {
        if LocalSystem.lstat(path)?.is_some() {
            bail!("create file {:?}: already exists", path);
        }
        Ok(Box::new(DiscardWriter))
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn FileHandle>> {
        let file = std::fs::File::open(path)
            .map_err(|err| anyhow::anyhow!("open file {:?}: {err}", path))?;
        Ok(Box::new(ReadOnlyFile { file, wrote: false }))
    }

    fn chmod(&self, _path: &Path, _mode: u32) -> Result<()> {
        Ok(())
    }

    fn chown(&self, _path: &Path, _uid: Option<u32>, _gid: Option<u32>) -> Result<()> {
        Ok(())
    }

    fn lookup_user(&self, name: &str) -> Result<u32> {
        LocalSystem.lookup_user(name)
    }

    fn lookup_group(&self, name: &str) -> Result<u32> {
        LocalSystem.lookup_group(name)
    }

    fn run(&self, _cmd: &CommandLine, _cancel: &CancellationToken) -> Result<CmdOutput> {
        Ok(CmdOutput {
            output: Vec::new(),
            code: Some(0),
        })
    }
}

impl SimulatedSystem {
    /// Whether a path looks like a regular file on the live host.
    /// Convenience for tests asserting zero mutations.
    pub fn observes(&self, path: &Path) -> Result<Option<FileKind>> {
        Ok(self.lstat(path)?.map(|meta| meta.kind))
    }
}

/// Sink for content "written" to a file that was never created.
#[derive(Debug)]
struct DiscardWriter;

impl Write for DiscardWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl FileWriter for DiscardWriter {
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Read-only view of a live file that swallows writes. Once written to, the
/// handle's real content no longer matches what the run believes, so further
/// reads and seeks fail loudly.
struct ReadOnlyFile {
    file: std::fs::File,
    wrote: bool,
}

impl Read for ReadOnlyFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.wrote {
            return Err(std::io::Error::other("read after simulated write"));
        }
        self.file.read(buf)
    }
}

impl Write for ReadOnlyFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.wrote = true;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Seek for ReadOnlyFile {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        if self.wrote {
            return Err(std::io::Error::other("seek after simulated write"));
        }
        self.file.seek(pos)
    }
}

impl FileHandle for ReadOnlyFile {
    fn truncate(&mut self, _len: u64) -> Result<()> {
        self.wrote = true;
        Ok(())
    }
}
