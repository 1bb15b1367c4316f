//! Helm Localdev: reversible deployment-template patching for local development
//!
//! Rewrites a chart's `templates/deployment.yaml` so the container runs code
//! mounted from the local filesystem: the templated image reference becomes a
//! literal one, a `local-code` hostPath volume is mounted at `/app`, and the
//! start command is overridden to run the locally built jar.
//!
//! # Architecture
//!
//! The rewrite is a pure line-oriented state machine ([`rewrite`]) - no YAML
//! object model is ever built, so comments, ordering and Helm template syntax
//! survive byte-for-byte on untouched lines. File handling lives in
//! [`session`]: pristine backup on first patch, atomic writes, and a
//! git skip-worktree marker so the patched file cannot be committed by
//! accident.
//!
//! # Safety
//!
//! - A backup is taken before the first patch and never overwritten
//! - Atomic file writes (tempfile + fsync + rename)
//! - Missing sections degrade to warnings, never data loss
//! - `restore` puts the original bytes back and lifts the commit protection
//!
//! # Example
//!
//! ```no_run
//! use helm_localdev::{session, PatchSpec};
//! use helm_localdev::vcs::GitSkipWorktree;
//! use std::path::PathBuf;
//!
//! let spec = PatchSpec {
//!     component: "bulk-processor".to_string(),
//!     manifest_path: PathBuf::from("helm/bulk/templates/deployment.yaml"),
//!     image: "eclipse-temurin:17-jdk".to_string(),
//!     jar_path: "/app/bulk-processor.jar".to_string(),
//!     host_path: "/home/dev/bulk/target".to_string(),
//! };
//!
//! let report = session::patch(&spec, false, &GitSkipWorktree)?;
//! for warning in &report.warnings {
//!     eprintln!("warning: {warning}");
//! }
//! # Ok::<(), helm_localdev::SessionError>(())
//! ```

pub mod config;
pub mod rewrite;
pub mod session;
pub mod spec;
pub mod vcs;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, LocaldevConfig, ResolveError};
pub use rewrite::{rewrite, PatchReport};
pub use session::{ComponentStatus, SessionError};
pub use spec::{PatchSpec, SpecError};
pub use vcs::{GitSkipWorktree, IgnoreMarker, MarkerError, NoopMarker, ProtectStatus};
