use crate::spec::PatchSpec;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::PathBuf;

/// The whole `localdev.toml`: user variables plus one table per component.
///
/// ```toml
/// [general]
/// project-home = "~/work/gazelle"
///
/// [component.bulk-processor]
/// directory = "${project-home}/helm/bulk-processor"
/// image = "eclipse-temurin:17-jdk"
/// jarpath = "/app/bulk-processor.jar"
/// hostpath = "${project-home}/bulk-processor/target"
/// ```
#[derive(Debug, Deserialize, Default, Clone)]
pub struct LocaldevConfig {
    #[serde(default)]
    pub general: BTreeMap<String, String>,
    #[serde(default)]
    pub component: BTreeMap<String, ComponentConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ComponentConfig {
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub jarpath: String,
    #[serde(default)]
    pub hostpath: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    UnknownComponent {
        name: String,
    },
    MissingField {
        component: String,
        field: &'static str,
    },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::UnknownComponent { name } => {
                write!(f, "component '{name}' not found in config")
            }
            ResolveError::MissingField { component, field } => {
                write!(f, "component '{component}' missing required field '{field}'")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

impl LocaldevConfig {
    /// Component names in stable (sorted) order.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.component.keys().map(String::as_str)
    }

    /// Build the patch inputs for one component.
    ///
    /// `directory` and `hostpath` go through variable expansion (they are the
    /// fields that reference local filesystem layout); `image` and `jarpath`
    /// are taken literally. The manifest lives at the chart's conventional
    /// `templates/deployment.yaml`.
    pub fn resolve(&self, name: &str) -> Result<PatchSpec, ResolveError> {
        let comp = self
            .component
            .get(name)
            .ok_or_else(|| ResolveError::UnknownComponent {
                name: name.to_string(),
            })?;

        let require = |value: &str, field| {
            if value.trim().is_empty() {
                Err(ResolveError::MissingField {
                    component: name.to_string(),
                    field,
                })
            } else {
                Ok(value.to_string())
            }
        };

        let directory = expand_vars(&require(&comp.directory, "directory")?, &self.general);
        let image = require(&comp.image, "image")?;
        let jar_path = require(&comp.jarpath, "jarpath")?;
        let host_path = expand_vars(&require(&comp.hostpath, "hostpath")?, &self.general);

        Ok(PatchSpec {
            component: name.to_string(),
            manifest_path: PathBuf::from(directory)
                .join("templates")
                .join("deployment.yaml"),
            image,
            jar_path,
            host_path,
        })
    }
}

/// Expand `~`, `${name}` (config variables from `[general]`, then the
/// environment) and bare `$VAR` environment references.
///
/// Unknown references are left untouched, so paths containing a literal `$`
/// fail loudly downstream instead of silently collapsing.
pub fn expand_vars(value: &str, general: &BTreeMap<String, String>) -> String {
    let value = expand_tilde(value);
    let mut out = String::with_capacity(value.len());
    let mut rest = value.as_str();

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if let Some(tail) = rest.strip_prefix("${") {
            if let Some(end) = tail.find('}') {
                let name = &tail[..end];
                match lookup(name, general) {
                    Some(replacement) => out.push_str(&replacement),
                    None => out.push_str(&rest[..end + 3]),
                }
                rest = &tail[end + 1..];
                continue;
            }
        }

        let tail = &rest[1..];
        let end = tail
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(tail.len());
        if end == 0 {
            out.push('$');
            rest = tail;
            continue;
        }
        let name = &tail[..end];
        match env::var(name) {
            Ok(v) => out.push_str(&v),
            Err(_) => {
                out.push('$');
                out.push_str(name);
            }
        }
        rest = &tail[end..];
    }

    out.push_str(rest);
    out
}

/// `[general]` variables win over the environment; their values get one
/// environment-only expansion pass of their own (no nesting of config
/// variables inside config variables).
fn lookup(name: &str, general: &BTreeMap<String, String>) -> Option<String> {
    if let Some(value) = general.get(name) {
        return Some(expand_vars(value, &BTreeMap::new()));
    }
    env::var(name).ok()
}

fn expand_tilde(value: &str) -> String {
    if let Some(stripped) = value.strip_prefix('~') {
        if stripped.is_empty() || stripped.starts_with('/') {
            if let Some(home) = home::home_dir() {
                return format!("{}{stripped}", home.display());
            }
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn general(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn expands_general_variables() {
        let vars = general(&[("project-home", "/home/dev/gazelle")]);
        assert_eq!(
            expand_vars("${project-home}/helm/bulk", &vars),
            "/home/dev/gazelle/helm/bulk"
        );
    }

    #[test]
    fn expands_environment_variables() {
        env::set_var("LOCALDEV_TEST_VAR", "/srv");
        assert_eq!(
            expand_vars("$LOCALDEV_TEST_VAR/data", &BTreeMap::new()),
            "/srv/data"
        );
        assert_eq!(
            expand_vars("${LOCALDEV_TEST_VAR}/data", &BTreeMap::new()),
            "/srv/data"
        );
    }

    #[test]
    fn unknown_references_are_left_untouched() {
        let vars = BTreeMap::new();
        assert_eq!(expand_vars("${no-such-var}/x", &vars), "${no-such-var}/x");
        assert_eq!(
            expand_vars("a$NO_SUCH_VAR_EITHER/b", &vars),
            "a$NO_SUCH_VAR_EITHER/b"
        );
    }

    #[test]
    fn lone_dollar_is_kept() {
        assert_eq!(expand_vars("price: 5$", &BTreeMap::new()), "price: 5$");
        assert_eq!(expand_vars("a$/b", &BTreeMap::new()), "a$/b");
    }

    #[test]
    fn general_values_are_env_expanded_once() {
        env::set_var("LOCALDEV_TEST_ROOT", "/opt");
        let vars = general(&[("home", "$LOCALDEV_TEST_ROOT/gazelle")]);
        assert_eq!(expand_vars("${home}/x", &vars), "/opt/gazelle/x");
    }

    #[test]
    fn tilde_expands_to_home_dir() {
        let home = home::home_dir().unwrap();
        assert_eq!(
            expand_vars("~/work", &BTreeMap::new()),
            format!("{}/work", home.display())
        );
        // the ~user form is not expanded
        assert_eq!(expand_vars("~other/work", &BTreeMap::new()), "~other/work");
    }

    #[test]
    fn resolve_builds_manifest_path_under_templates() {
        let mut config = LocaldevConfig::default();
        config.component.insert(
            "bulk".to_string(),
            ComponentConfig {
                directory: "/charts/bulk".to_string(),
                image: "local/app:dev".to_string(),
                jarpath: "/app/app.jar".to_string(),
                hostpath: "/home/dev/bulk".to_string(),
            },
        );

        let spec = config.resolve("bulk").unwrap();
        assert_eq!(
            spec.manifest_path,
            PathBuf::from("/charts/bulk/templates/deployment.yaml")
        );
        assert_eq!(spec.component, "bulk");
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn resolve_rejects_missing_field() {
        let mut config = LocaldevConfig::default();
        config.component.insert(
            "bulk".to_string(),
            ComponentConfig {
                directory: "/charts/bulk".to_string(),
                image: String::new(),
                jarpath: "/app/app.jar".to_string(),
                hostpath: "/home/dev/bulk".to_string(),
            },
        );

        assert_eq!(
            config.resolve("bulk"),
            Err(ResolveError::MissingField {
                component: "bulk".to_string(),
                field: "image",
            })
        );
    }

    #[test]
    fn resolve_rejects_unknown_component() {
        let config = LocaldevConfig::default();
        assert_eq!(
            config.resolve("ghost"),
            Err(ResolveError::UnknownComponent {
                name: "ghost".to_string(),
            })
        );
    }
}
