#![allow(dead_code)]

use std::path::Path;

use catapply::catalog::{
    Catalog, CommandSpec, DirectoryFile, ExecCondition, ExecResource, FileResource, FileState,
    PlainFile, Resource, ResourceBody, ResourceId, SymlinkFile,
};

/// Builder for `Catalog` to simplify test setup.
#[derive(Default)]
pub struct CatalogBuilder {
    resources: Vec<Resource>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resource: ResourceBuilder) -> Self {
        self.resources.push(resource.build());
        self
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn build(self) -> Catalog {
        Catalog {
            resources: self.resources,
        }
    }
}

/// Builder for a single `Resource`.
pub struct ResourceBuilder {
    resource: Resource,
}

impl ResourceBuilder {
    fn new(id: ResourceId, body: ResourceBody) -> Self {
        Self {
            resource: Resource {
                id,
                comment: String::new(),
                dependencies: Vec::new(),
                body,
            },
        }
    }

    pub fn noop(id: ResourceId) -> Self {
        Self::new(id, ResourceBody::Noop)
    }

    pub fn plain_file(id: ResourceId, path: impl AsRef<Path>) -> Self {
        Self::new(
            id,
            ResourceBody::File(FileResource {
                path: path.as_ref().to_path_buf(),
                state: FileState::Plain(PlainFile::default()),
            }),
        )
    }

    pub fn directory(id: ResourceId, path: impl AsRef<Path>) -> Self {
        Self::new(
            id,
            ResourceBody::File(FileResource {
                path: path.as_ref().to_path_buf(),
                state: FileState::Directory(DirectoryFile::default()),
            }),
        )
    }

    pub fn symlink(id: ResourceId, path: impl AsRef<Path>, target: impl AsRef<Path>) -> Self {
        Self::new(
            id,
            ResourceBody::File(FileResource {
                path: path.as_ref().to_path_buf(),
                state: FileState::Symlink(SymlinkFile {
                    target: target.as_ref().to_path_buf(),
                }),
            }),
        )
    }

    pub fn absent(id: ResourceId, path: impl AsRef<Path>) -> Self {
        Self::new(
            id,
            ResourceBody::File(FileResource {
                path: path.as_ref().to_path_buf(),
                state: FileState::Absent,
            }),
        )
    }

    pub fn exec_argv<I, S>(id: ResourceId, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            id,
            ResourceBody::Exec(ExecResource {
                command: CommandSpec::argv(argv),
                condition: None,
            }),
        )
    }

    pub fn exec_script(id: ResourceId, body: impl Into<String>) -> Self {
        Self::new(
            id,
            ResourceBody::Exec(ExecResource {
                command: CommandSpec::script(body),
                condition: None,
            }),
        )
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.resource.comment = comment.to_string();
        self
    }

    pub fn after(mut self, dep: ResourceId) -> Self {
        self.resource.dependencies.push(dep);
        self
    }

    pub fn content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.plain_mut().content = Some(content.into());
        self
    }

    pub fn mode(mut self, mode: u32) -> Self {
        match &mut self.resource.body {
            ResourceBody::File(file) => match &mut file.state {
                FileState::Plain(plain) => plain.mode = Some(mode),
                FileState::Directory(dir) => dir.mode = Some(mode),
                _ => panic!("mode only applies to plain files and directories"),
            },
            _ => panic!("mode only applies to file resources"),
        }
        self
    }

    pub fn user(mut self, user: &str) -> Self {
        match &mut self.resource.body {
            ResourceBody::File(file) => match &mut file.state {
                FileState::Plain(plain) => plain.user = Some(user.to_string()),
                FileState::Directory(dir) => dir.user = Some(user.to_string()),
                _ => panic!("user only applies to plain files and directories"),
            },
            _ => panic!("user only applies to file resources"),
        }
        self
    }

    pub fn group(mut self, group: &str) -> Self {
        match &mut self.resource.body {
            ResourceBody::File(file) => match &mut file.state {
                FileState::Plain(plain) => plain.group = Some(group.to_string()),
                FileState::Directory(dir) => dir.group = Some(group.to_string()),
                _ => panic!("group only applies to plain files and directories"),
            },
            _ => panic!("group only applies to file resources"),
        }
        self
    }

    pub fn condition(mut self, condition: ExecCondition) -> Self {
        self.exec_mut().condition = Some(condition);
        self
    }

    pub fn env<I, S>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exec_mut().command.env = Some(pairs.into_iter().map(Into::into).collect());
        self
    }

    pub fn dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.exec_mut().command.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> Resource {
        self.resource
    }

    fn plain_mut(&mut self) -> &mut PlainFile {
        match &mut self.resource.body {
            ResourceBody::File(FileResource {
                state: FileState::Plain(plain),
                ..
            }) => plain,
            _ => panic!("content only applies to plain files"),
        }
    }

    fn exec_mut(&mut self) -> &mut ExecResource {
        match &mut self.resource.body {
            ResourceBody::Exec(exec) => exec,
            _ => panic!("only applies to exec resources"),
        }
    }
}
