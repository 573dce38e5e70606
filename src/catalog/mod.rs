// src/catalog/mod.rs

//! Catalog decoding and validation.
//!
//! Responsibilities:
//! - Define the serde-backed data model (`model.rs`).
//! - Decode a catalog from a file or stdin (`loader.rs`).
//! - Validate structural invariants like DAG correctness (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_from_path, load_from_reader};
pub use model::{
    Catalog, CommandPayload, CommandSpec, DirectoryFile, ExecCondition, ExecResource,
    FileResource, FileState, PlainFile, Resource, ResourceBody, ResourceId, SymlinkFile,
};
pub use validate::validate_catalog;
