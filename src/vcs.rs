//! Version-control ignore-marker: keeping patched manifests out of commits.
//!
//! A patched `deployment.yaml` is a tracked file with local-only changes.
//! Git's skip-worktree bit hides it from `git status` and staging, which is
//! exactly the protection wanted while hacking locally. The session layer
//! only needs the small [`IgnoreMarker`] capability; callers that run
//! outside a repository get errors they can downgrade to warnings.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use thiserror::Error;

/// Whether a file is currently protected from commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectStatus {
    Protected,
    Unprotected,
    /// Not tracked, not in a repository, or git unavailable
    Unknown,
}

#[derive(Error, Debug)]
pub enum MarkerError {
    #[error("{0} is not inside a git work tree")]
    NotARepository(PathBuf),

    #[error("path has no parent directory: {0}")]
    NoParent(PathBuf),

    #[error("failed to run git (is it installed?): {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
}

/// Mutators and status probe for the commit-protection marker.
///
/// Failures are expected to be recoverable: the session reports them as
/// warnings and keeps the patched file in place.
pub trait IgnoreMarker {
    fn protect(&self, path: &Path) -> Result<(), MarkerError>;
    fn unprotect(&self, path: &Path) -> Result<(), MarkerError>;
    fn status(&self, path: &Path) -> ProtectStatus;
}

/// [`IgnoreMarker`] backed by `git update-index --skip-worktree`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitSkipWorktree;

impl GitSkipWorktree {
    fn run_git(dir: &Path, args: &[&str]) -> Result<Output, MarkerError> {
        Ok(Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()?)
    }

    fn set_skip_worktree(path: &Path, enable: bool) -> Result<(), MarkerError> {
        let (dir, name) = split_path(path)?;

        let probe = Self::run_git(dir, &["rev-parse", "--git-dir"])?;
        if !probe.status.success() {
            return Err(MarkerError::NotARepository(dir.to_path_buf()));
        }

        let flag = if enable {
            "--skip-worktree"
        } else {
            "--no-skip-worktree"
        };
        let out = Self::run_git(dir, &["update-index", flag, name.as_str()])?;
        if !out.status.success() {
            return Err(MarkerError::CommandFailed {
                command: format!("update-index {flag}"),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl IgnoreMarker for GitSkipWorktree {
    fn protect(&self, path: &Path) -> Result<(), MarkerError> {
        Self::set_skip_worktree(path, true)
    }

    fn unprotect(&self, path: &Path) -> Result<(), MarkerError> {
        Self::set_skip_worktree(path, false)
    }

    fn status(&self, path: &Path) -> ProtectStatus {
        let Ok((dir, name)) = split_path(path) else {
            return ProtectStatus::Unknown;
        };
        let Ok(out) = Self::run_git(dir, &["ls-files", "-v", name.as_str()]) else {
            return ProtectStatus::Unknown;
        };
        if !out.status.success() {
            return ProtectStatus::Unknown;
        }
        let stdout = String::from_utf8_lossy(&out.stdout);
        match stdout.chars().next() {
            // 'S' marks skip-worktree; lowercase when assume-unchanged is
            // also set.
            Some('S') | Some('s') => ProtectStatus::Protected,
            Some(_) => ProtectStatus::Unprotected,
            None => ProtectStatus::Unknown,
        }
    }
}

/// Marker that does nothing and reports every file as unprotected.
///
/// For environments without git, and for exercising sessions in isolation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMarker;

impl IgnoreMarker for NoopMarker {
    fn protect(&self, _path: &Path) -> Result<(), MarkerError> {
        Ok(())
    }

    fn unprotect(&self, _path: &Path) -> Result<(), MarkerError> {
        Ok(())
    }

    fn status(&self, _path: &Path) -> ProtectStatus {
        ProtectStatus::Unprotected
    }
}

/// Split into (containing directory, file name); git commands run from the
/// directory and address the file by name, matching `update-index` semantics
/// for paths deep inside a work tree.
fn split_path(path: &Path) -> Result<(&Path, String), MarkerError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| MarkerError::NoParent(path.to_path_buf()))?;
    let name = path
        .file_name()
        .ok_or_else(|| MarkerError::NoParent(path.to_path_buf()))?
        .to_string_lossy()
        .into_owned();
    Ok((dir, name))
}
