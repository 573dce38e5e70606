// src/catalog/loader.rs

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use crate::catalog::model::Catalog;

/// Decode a catalog from a file.
///
/// This only performs deserialization; structural validation (unique IDs,
/// dependency references, acyclicity) lives in
/// [`crate::catalog::validate::validate_catalog`] and is run by the engine
/// before anything is applied.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Catalog> {
    let path = path.as_ref();
    let file = fs::File::open(path).with_context(|| format!("opening catalog at {:?}", path))?;
    let catalog: Catalog = serde_json::from_reader(file)
        .with_context(|| format!("decoding catalog from {:?}", path))?;
    Ok(catalog)
}

/// Decode a catalog from an arbitrary byte stream (typically stdin).
pub fn load_from_reader(reader: impl Read) -> Result<Catalog> {
    let catalog: Catalog =
        serde_json::from_reader(reader).context("decoding catalog from stream")?;
    Ok(catalog)
}
