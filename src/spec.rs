use std::path::{Path, PathBuf};
use thiserror::Error;

/// Everything needed to patch one component's deployment manifest.
///
/// Built by the configuration resolver with all variable expansion already
/// performed; immutable for the duration of a patch or restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSpec {
    /// Component identifier, used in warnings and error messages
    pub component: String,
    /// Path to the `deployment.yaml` template being patched
    pub manifest_path: PathBuf,
    /// Literal container image reference to substitute for the templated one
    pub image: String,
    /// Path to the jar inside the container, used to build the start command
    pub jar_path: String,
    /// Local filesystem path mounted into the container as a hostPath volume
    pub host_path: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("component '{component}' missing required field '{field}'")]
    MissingField {
        component: String,
        field: &'static str,
    },
}

impl PatchSpec {
    /// Check that every field is populated.
    ///
    /// An empty field is a configuration problem, not a patch-engine problem,
    /// so it is rejected before any file is touched.
    pub fn validate(&self) -> Result<(), SpecError> {
        let missing = |field| SpecError::MissingField {
            component: self.component.clone(),
            field,
        };

        if self.component.trim().is_empty() {
            return Err(SpecError::MissingField {
                component: String::new(),
                field: "component",
            });
        }
        if self.manifest_path.as_os_str().is_empty() {
            return Err(missing("directory"));
        }
        if self.image.trim().is_empty() {
            return Err(missing("image"));
        }
        if self.jar_path.trim().is_empty() {
            return Err(missing("jarpath"));
        }
        if self.host_path.trim().is_empty() {
            return Err(missing("hostpath"));
        }
        Ok(())
    }

    /// Sibling path where the pristine manifest is kept: `_<file>.backup`.
    ///
    /// The leading underscore keeps the backup out of Helm's template
    /// rendering (Helm skips files starting with `_`).
    pub fn backup_path(&self) -> PathBuf {
        let name = self
            .manifest_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "deployment.yaml".to_string());
        let parent = self
            .manifest_path
            .parent()
            .unwrap_or_else(|| Path::new(""));
        parent.join(format!("_{name}.backup"))
    }
}
