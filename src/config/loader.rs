// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{RawStackFile, StackFile};
use crate::errors::Result;

/// Read and deserialize a manifest without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawStackFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let manifest: RawStackFile = toml::from_str(&contents)?;

    Ok(manifest)
}

/// Read, deserialize and validate a manifest.
///
/// Validation covers policy sanity, healthcheck shape and the dependency
/// graph (duplicates, unknown dependencies, cycles), so a `StackFile` can
/// always be turned into a declaration the orchestrator accepts.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<StackFile> {
    let raw = load_from_path(&path)?;
    let manifest = StackFile::try_from(raw)?;
    Ok(manifest)
}

/// Manifest looked up in the working directory when `--config` is omitted.
pub const DEFAULT_CONFIG_FILE: &str = "Stackup.toml";
