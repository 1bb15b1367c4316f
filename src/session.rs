//! One component's patch/restore lifecycle.
//!
//! A session owns the file-level concerns the rewriter deliberately avoids:
//! locating the manifest, taking a pristine backup before the first patch,
//! writing the rewritten text atomically, and asking the VCS ignore-marker to
//! keep the patched file out of accidental commits. Marker failures never
//! fail the operation - the patch has already landed - they surface as
//! warnings instead.
//!
//! Sessions for different components are fully independent: distinct manifest
//! and backup files, no shared state, no cross-component rollback.

use crate::rewrite::{rewrite, PatchReport};
use crate::spec::{PatchSpec, SpecError};
use crate::vcs::{IgnoreMarker, ProtectStatus};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("deployment manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("no backup found for component '{component}' (expected {path})")]
    BackupNotFound { component: String, path: PathBuf },

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// What `status` reports for one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentStatus {
    pub manifest_exists: bool,
    pub backup_exists: bool,
    pub protection: ProtectStatus,
    /// Whether the working manifest differs from its backup; `None` when
    /// either file is missing or unreadable.
    pub modified: Option<bool>,
}

/// Run the rewriter without touching the filesystem.
///
/// Returns the full rewritten manifest text plus the report, for dry runs
/// and diff previews.
pub fn preview(spec: &PatchSpec) -> Result<(String, PatchReport), SessionError> {
    let (_, rewritten, report) = load_and_rewrite(spec)?;
    Ok((rewritten, report))
}

/// Patch one component's deployment manifest.
///
/// The first patch writes a verbatim backup at `_<file>.backup`; later
/// patches never overwrite it, so it always holds the pristine pre-patch
/// manifest. With `dry_run` nothing is written at all, not even the backup.
pub fn patch(
    spec: &PatchSpec,
    dry_run: bool,
    marker: &dyn IgnoreMarker,
) -> Result<PatchReport, SessionError> {
    let (original, rewritten, mut report) = load_and_rewrite(spec)?;

    if dry_run {
        report
            .warnings
            .push("dry run: nothing was written".to_string());
        return Ok(report);
    }

    let backup = spec.backup_path();
    if !backup.exists() {
        atomic_write(&backup, original.as_bytes())?;
    }

    atomic_write(&spec.manifest_path, rewritten.as_bytes())?;

    if let Err(e) = marker.protect(&spec.manifest_path) {
        report.warnings.push(format!(
            "component '{}': could not protect {} from commits: {e}",
            spec.component,
            spec.manifest_path.display()
        ));
    }

    Ok(report)
}

/// Copy the backup over the working manifest and drop the ignore-marker.
///
/// Returns the warnings produced along the way (at most the marker one).
pub fn restore(spec: &PatchSpec, marker: &dyn IgnoreMarker) -> Result<Vec<String>, SessionError> {
    spec.validate()?;

    let backup = spec.backup_path();
    if !backup.exists() {
        return Err(SessionError::BackupNotFound {
            component: spec.component.clone(),
            path: backup,
        });
    }

    let content = fs::read(&backup).map_err(|source| SessionError::Io {
        path: backup.clone(),
        source,
    })?;
    atomic_write(&spec.manifest_path, &content)?;

    let mut warnings = Vec::new();
    if let Err(e) = marker.unprotect(&spec.manifest_path) {
        warnings.push(format!(
            "component '{}': could not unprotect {}: {e}",
            spec.component,
            spec.manifest_path.display()
        ));
    }
    Ok(warnings)
}

/// Inspect one component without mutating anything.
pub fn status(spec: &PatchSpec, marker: &dyn IgnoreMarker) -> ComponentStatus {
    let manifest_exists = spec.manifest_path.exists();
    let backup = spec.backup_path();
    let backup_exists = backup.exists();

    let protection = if manifest_exists {
        marker.status(&spec.manifest_path)
    } else {
        ProtectStatus::Unknown
    };

    // Content hash comparison rather than mtime: restores and re-patches
    // both touch timestamps without necessarily changing bytes.
    let modified = if manifest_exists && backup_exists {
        match (fs::read(&spec.manifest_path), fs::read(&backup)) {
            (Ok(working), Ok(pristine)) => Some(xxh3_64(&working) != xxh3_64(&pristine)),
            _ => None,
        }
    } else {
        None
    };

    ComponentStatus {
        manifest_exists,
        backup_exists,
        protection,
        modified,
    }
}

fn load_and_rewrite(spec: &PatchSpec) -> Result<(String, String, PatchReport), SessionError> {
    spec.validate()?;

    if !spec.manifest_path.exists() {
        return Err(SessionError::ManifestNotFound(spec.manifest_path.clone()));
    }

    let original = fs::read_to_string(&spec.manifest_path).map_err(|source| SessionError::Io {
        path: spec.manifest_path.clone(),
        source,
    })?;

    // Splitting on '\n' keeps every untouched line byte-identical, trailing
    // newline included (the final empty element round-trips through join).
    let lines: Vec<String> = original.split('\n').map(str::to_string).collect();
    let (rewritten, report) = rewrite(&lines, spec);

    Ok((original, rewritten.join("\n"), report))
}

/// Atomic file write: tempfile in the target directory + fsync + rename.
///
/// Either the full write lands or the previous content stays intact.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), SessionError> {
    let io_err = |source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).ok_or_else(|| {
        io_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path has no parent directory",
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    temp.write_all(content).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    temp.persist(path).map_err(|e| io_err(e.error))?;

    // Bump mtime so file watchers (helm upgrade --reuse-values workflows,
    // tilt, skaffold) notice the rename-based replace.
    filetime::set_file_mtime(path, filetime::FileTime::now()).map_err(io_err)?;

    Ok(())
}
