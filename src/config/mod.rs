//! `localdev.toml` loading and per-component resolution.
//!
//! The config file names the components to patch and the variables their
//! paths are built from; resolution produces a ready-to-use
//! [`PatchSpec`](crate::spec::PatchSpec) with all expansion done.

mod loader;
mod schema;

pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{expand_vars, ComponentConfig, LocaldevConfig, ResolveError};
