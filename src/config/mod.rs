// src/config/mod.rs

//! Stack manifest: TOML model, loading, validation and conversion into a
//! declaration for the orchestrator.

pub mod declaration;
pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{DEFAULT_CONFIG_FILE, load_and_validate, load_from_path};
pub use model::{DefaultsSection, HealthcheckConfig, RawStackFile, ServiceConfig, StackFile};
