// src/apply/exec.rs

//! Conditional shell-command execution.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::apply::ApplyContext;
use crate::catalog::{CommandPayload, CommandSpec, ExecCondition, ExecResource};
use crate::system::{CommandLine, System};

/// The exec's own command exited unsuccessfully. Carries the combined
/// stdout/stderr so the final report can show it verbatim.
#[derive(Debug)]
pub struct ExecFailed {
    pub code: Option<i32>,
    pub output: Vec<u8>,
}

impl fmt::Display for ExecFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "command exited with status {code}"),
            None => write!(f, "command terminated by signal"),
        }
    }
}

impl std::error::Error for ExecFailed {}

/// Apply an exec resource. Returns `true` iff the command actually ran.
///
/// A condition probe's exit status is a decision signal, never a failure;
/// an exec skipped by its condition is successful and unchanged.
pub fn apply_exec(sys: &dyn System, exec: &ExecResource, ctx: &ApplyContext<'_>) -> Result<bool> {
    ctx.check_cancelled()?;
    if !should_run(sys, exec, ctx)? {
        debug!("condition not met; command skipped");
        return Ok(false);
    }

    ctx.check_cancelled()?;
    let cmd = command_line(&exec.command, ctx.shell)?;
    let out = sys.run(&cmd, ctx.cancel)?;
    if !out.success() {
        return Err(ExecFailed {
            code: out.code,
            output: out.output,
        }
        .into());
    }
    Ok(true)
}

fn should_run(sys: &dyn System, exec: &ExecResource, ctx: &ApplyContext<'_>) -> Result<bool> {
    match &exec.condition {
        None => Ok(true),
        Some(ExecCondition::OnlyIf(probe)) => {
            let out = sys.run(&command_line(probe, ctx.shell)?, ctx.cancel)?;
            Ok(out.success())
        }
        Some(ExecCondition::Unless(probe)) => {
            let out = sys.run(&command_line(probe, ctx.shell)?, ctx.cancel)?;
            Ok(!out.success())
        }
        Some(ExecCondition::IfDepsChanged) => Ok(ctx.deps_changed),
    }
}

/// Resolve a command spec into a concrete command line. Script-form commands
/// run through the configured shell.
fn command_line(spec: &CommandSpec, shell: &Path) -> Result<CommandLine> {
    let (program, args) = match &spec.run {
        CommandPayload::Argv(argv) => {
            let (first, rest) = argv.split_first().context("exec command has empty argv")?;
            (PathBuf::from(first), rest.to_vec())
        }
        CommandPayload::Script(body) => (
            shell.to_path_buf(),
            vec!["-c".to_string(), body.clone()],
        ),
    };

    let env = spec
        .env
        .as_ref()
        .map(|pairs| pairs.iter().map(|pair| split_env(pair)).collect::<Result<Vec<_>>>())
        .transpose()?;

    Ok(CommandLine {
        program,
        args,
        env,
        dir: spec.dir.clone(),
    })
}

fn split_env(pair: &str) -> Result<(String, String)> {
    pair.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .with_context(|| format!("malformed environment entry {pair:?}, expected KEY=VALUE"))
}
