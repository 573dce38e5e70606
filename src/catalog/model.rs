// src/catalog/model.rs

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identifier of a resource within one catalog. Nonzero, unique.
pub type ResourceId = u64;

/// A decoded catalog: the complete desired state for one apply run.
///
/// The order of `resources` carries no meaning; only `dependencies` edges do.
///
/// ```json
/// {
///   "resources": [
///     { "id": 1, "comment": "config dir",
///       "body": { "type": "file", "path": "/etc/app",
///                 "state": { "kind": "directory", "mode": 493 } } },
///     { "id": 2, "dependencies": [1],
///       "body": { "type": "file", "path": "/etc/app/app.conf",
///                 "state": { "kind": "plain", "content": [104, 105, 10] } } }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Catalog {
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// One unit of desired state.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Resource {
    pub id: ResourceId,

    /// Human label, used only in logs and error messages.
    #[serde(default)]
    pub comment: String,

    /// Resources that must reach `Done` before this one runs.
    #[serde(default)]
    pub dependencies: Vec<ResourceId>,

    pub body: ResourceBody,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceBody {
    /// Succeeds unconditionally; useful as a grouping anchor.
    Noop,
    File(FileResource),
    Exec(ExecResource),
}

/// A filesystem object at an absolute `path`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileResource {
    pub path: PathBuf,
    pub state: FileState,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileState {
    Plain(PlainFile),
    Directory(DirectoryFile),
    Symlink(SymlinkFile),
    /// The path must not exist.
    Absent,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlainFile {
    /// Desired content. `None` means "ensure the file exists" without
    /// touching existing content.
    #[serde(default)]
    pub content: Option<Vec<u8>>,

    /// Permission bits (low 12 bits are significant).
    #[serde(default)]
    pub mode: Option<u32>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DirectoryFile {
    #[serde(default)]
    pub mode: Option<u32>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SymlinkFile {
    pub target: PathBuf,
}

/// A shell command to run, with an optional gating condition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecResource {
    pub command: CommandSpec,

    #[serde(default)]
    pub condition: Option<ExecCondition>,
}

/// A runnable command: what to run, plus environment and working directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandSpec {
    pub run: CommandPayload,

    /// `KEY=VALUE` pairs that *replace* the inherited environment.
    /// `None` inherits the applier's environment.
    #[serde(default)]
    pub env: Option<Vec<String>>,

    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandPayload {
    /// Direct argv; the first element is the program.
    Argv(Vec<String>),
    /// Script body handed to the configured shell interpreter.
    Script(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecCondition {
    /// Run the exec only if this probe exits 0.
    OnlyIf(CommandSpec),
    /// Run the exec only if this probe exits non-zero.
    Unless(CommandSpec),
    /// Run the exec only if at least one direct dependency reported a change.
    IfDepsChanged,
}

impl CommandSpec {
    /// Plain argv command with inherited environment and working directory.
    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            run: CommandPayload::Argv(args.into_iter().map(Into::into).collect()),
            env: None,
            dir: None,
        }
    }

    /// Shell-script command with inherited environment and working directory.
    pub fn script(body: impl Into<String>) -> Self {
        Self {
            run: CommandPayload::Script(body.into()),
            env: None,
            dir: None,
        }
    }
}
