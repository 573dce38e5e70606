// src/apply/file.rs

//! Reconciliation of file-like resources.
//!
//! Every sub-variant is idempotent: a second run against a converged host
//! performs no mutation. "Different" checks (content, mode, ownership) gate
//! every write.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::apply::ApplyContext;
use crate::catalog::{DirectoryFile, FileResource, FileState, PlainFile, SymlinkFile};
use crate::system::{FileKind, FileMeta, System};

const DEFAULT_FILE_MODE: u32 = 0o644;
const DEFAULT_DIR_MODE: u32 = 0o755;

pub fn apply_file(sys: &dyn System, file: &FileResource, ctx: &ApplyContext<'_>) -> Result<bool> {
    ctx.check_cancelled()?;
    match &file.state {
        FileState::Plain(plain) => apply_plain(sys, &file.path, plain, ctx),
        FileState::Directory(dir) => apply_directory(sys, &file.path, dir, ctx),
        FileState::Symlink(link) => apply_symlink(sys, &file.path, link),
        FileState::Absent => apply_absent(sys, &file.path),
    }
}

fn apply_plain(
    sys: &dyn System,
    path: &Path,
    desired: &PlainFile,
    ctx: &ApplyContext<'_>,
) -> Result<bool> {
    let observed = sys.lstat(path)?;
    let mut changed = false;

    let observed = match observed {
        None => {
            let mode = desired.mode.unwrap_or(DEFAULT_FILE_MODE) & 0o7777;
            let mut writer = sys.create_file(path, mode)?;
            if let Some(content) = &desired.content {
                writer
                    .write_all(content)
                    .with_context(|| format!("writing {:?}", path))?;
            }
            writer.close()?;
            changed = true;
            if desired.mode.is_some() {
                // create_file is subject to the umask; pin the exact bits.
                sys.chmod(path, mode)?;
            }
            sys.lstat(path)?
        }
        Some(meta) => {
            if meta.kind != FileKind::Regular {
                bail!("{:?} exists and is not a regular file", path);
            }
            if let Some(content) = &desired.content {
                ctx.check_cancelled()?;
                if sync_content(sys, path, &meta, content)? {
                    changed = true;
                }
            }
            if !same_mode(meta.mode, desired.mode) {
                sys.chmod(path, desired.mode.unwrap_or(0) & 0o7777)?;
                changed = true;
            }
            Some(meta)
        }
    };

    if sync_owner(sys, path, observed.as_ref(), &desired.user, &desired.group, ctx)? {
        changed = true;
    }
    Ok(changed)
}

fn apply_directory(
    sys: &dyn System,
    path: &Path,
    desired: &DirectoryFile,
    ctx: &ApplyContext<'_>,
) -> Result<bool> {
    let observed = sys.lstat(path)?;
    let mut changed = false;

    let observed = match observed {
        None => {
            let mode = desired.mode.unwrap_or(DEFAULT_DIR_MODE) & 0o7777;
            sys.mkdir(path, mode)?;
            changed = true;
            if desired.mode.is_some() {
                sys.chmod(path, mode)?;
            }
            sys.lstat(path)?
        }
        Some(meta) => {
            if meta.kind != FileKind::Directory {
                bail!("{:?} exists and is not a directory", path);
            }
            if !same_mode(meta.mode, desired.mode) {
                sys.chmod(path, desired.mode.unwrap_or(0) & 0o7777)?;
                changed = true;
            }
            Some(meta)
        }
    };

    if sync_owner(sys, path, observed.as_ref(), &desired.user, &desired.group, ctx)? {
        changed = true;
    }
    Ok(changed)
}

fn apply_symlink(sys: &dyn System, path: &Path, desired: &SymlinkFile) -> Result<bool> {
    match sys.lstat(path)? {
        None => {
            sys.symlink(&desired.target, path)?;
            Ok(true)
        }
        Some(meta) => {
            if meta.kind != FileKind::Symlink {
                bail!("{:?} exists and is not a symlink", path);
            }
            let current = sys.readlink(path)?;
            if current == desired.target {
                return Ok(false);
            }
            sys.remove(path)?;
            sys.symlink(&desired.target, path)?;
            Ok(true)
        }
    }
}

fn apply_absent(sys: &dyn System, path: &Path) -> Result<bool> {
    match sys.lstat(path)? {
        None => Ok(false),
        // Non-empty directories make remove fail; that error is the contract.
        Some(_) => {
            sys.remove(path)?;
            Ok(true)
        }
    }
}

/// Bring the file's bytes in line with `desired` through one read/write
/// handle. Compares size first, then content, and only rewrites on a
/// difference.
fn sync_content(sys: &dyn System, path: &Path, meta: &FileMeta, desired: &[u8]) -> Result<bool> {
    let mut handle = sys.open_file(path)?;

    let differs = if meta.size != desired.len() as u64 {
        true
    } else {
        let mut existing = Vec::with_capacity(desired.len());
        handle
            .read_to_end(&mut existing)
            .with_context(|| format!("reading {:?}", path))?;
        existing != desired
    };
    if !differs {
        return Ok(false);
    }

    handle
        .seek(SeekFrom::Start(0))
        .with_context(|| format!("rewinding {:?}", path))?;
    handle
        .write_all(desired)
        .with_context(|| format!("writing {:?}", path))?;
    handle.truncate(desired.len() as u64)?;
    Ok(true)
}

/// True iff `desired` is unset or matches the observed permission bits
/// (low 9 bits plus setuid/setgid/sticky).
fn same_mode(observed: u32, desired: Option<u32>) -> bool {
    match desired {
        None => true,
        Some(desired) => observed & 0o7777 == desired & 0o7777,
    }
}

/// Apply ownership if requested and different. `observed` is `None` only
/// when a simulated create left nothing to stat; the chown then carries just
/// the resolved halves.
fn sync_owner(
    sys: &dyn System,
    path: &Path,
    observed: Option<&FileMeta>,
    user: &Option<String>,
    group: &Option<String>,
    ctx: &ApplyContext<'_>,
) -> Result<bool> {
    if user.is_none() && group.is_none() {
        return Ok(false);
    }

    let uid = user
        .as_deref()
        .map(|name| ctx.lookup.user(sys, name))
        .transpose()?;
    let gid = group
        .as_deref()
        .map(|name| ctx.lookup.group(sys, name))
        .transpose()?;

    match observed {
        Some(meta) => {
            let want_uid = uid.unwrap_or(meta.uid);
            let want_gid = gid.unwrap_or(meta.gid);
            if want_uid == meta.uid && want_gid == meta.gid {
                return Ok(false);
            }
            sys.chown(path, Some(want_uid), Some(want_gid))?;
        }
        None => {
            sys.chown(path, uid, gid)?;
        }
    }
    Ok(true)
}
