//! End-to-end workflow test
//!
//! Tests the complete workflow over a realistic chart layout:
//! 1. Resolve components from localdev.toml
//! 2. Patch deployments (backup + rewrite + protect)
//! 3. Restore from backups
//! 4. Check round-trip and backup immutability

use helm_localdev::config::load_from_str;
use helm_localdev::session;
use helm_localdev::vcs::NoopMarker;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const DEPLOYMENT: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: {{ include "bulk.fullname" . }}
  labels:
    {{- include "bulk.labels" . | nindent 4 }}
spec:
  replicas: {{ .Values.replicaCount }}
  template:
    spec:
      # Wait for the database before the app starts
      initContainers:
        - name: wait-for-db
          image: "{{ .Values.image.busybox }}"
          command: ['sh', '-c', 'until nc -z db 5432; do sleep 1; done']
      containers:
        - name: {{ .Chart.Name }}
          image: "{{ .Values.image.repository }}:{{ .Values.image.tag }}"
          imagePullPolicy: {{ .Values.image.pullPolicy }}
          ports:
            - name: http
              containerPort: 8080
          volumeMounts:
            - name: config
              mountPath: /conf
          resources:
            {{- toYaml .Values.resources | nindent 12 }}
      volumes:
        - name: config
          configMap:
            name: bulk-config
"#;

/// Chart directories plus a localdev.toml pointing at them.
fn setup_workspace() -> (TempDir, String) {
    let dir = TempDir::new().unwrap();

    for name in ["bulk-processor", "account-lookup"] {
        let templates = dir.path().join("helm").join(name).join("templates");
        fs::create_dir_all(&templates).unwrap();
        fs::write(templates.join("deployment.yaml"), DEPLOYMENT).unwrap();
    }

    let config = format!(
        r#"
[general]
project-home = "{root}"

[component.bulk-processor]
directory = "${{project-home}}/helm/bulk-processor"
image = "eclipse-temurin:17-jdk"
jarpath = "/app/bulk-processor.jar"
hostpath = "${{project-home}}/src/bulk-processor/target"

[component.account-lookup]
directory = "${{project-home}}/helm/account-lookup"
image = "eclipse-temurin:17-jdk"
jarpath = "/app/account-lookup.jar"
hostpath = "${{project-home}}/src/account-lookup/target"
"#,
        root = dir.path().display()
    );

    (dir, config)
}

fn manifest_path(root: &Path, component: &str) -> std::path::PathBuf {
    root.join("helm")
        .join(component)
        .join("templates")
        .join("deployment.yaml")
}

#[test]
fn patch_all_components_then_restore_round_trips() {
    let (dir, toml) = setup_workspace();
    let config = load_from_str(&toml).unwrap();
    let marker = NoopMarker;

    for name in config.components() {
        let spec = config.resolve(name).unwrap();
        let report = session::patch(&spec, false, &marker).unwrap();
        assert!(report.is_complete(), "warnings: {:?}", report.warnings);
    }

    for name in ["bulk-processor", "account-lookup"] {
        let patched = fs::read_to_string(manifest_path(dir.path(), name)).unwrap();
        assert!(patched.contains("image: \"eclipse-temurin:17-jdk\""));
        assert!(patched.contains("- name: local-code"));
        assert!(patched.contains("type: Directory"));
        // Helm templating outside the patched sections is untouched.
        assert!(patched.contains("{{- include \"bulk.labels\" . | nindent 4 }}"));
        assert!(patched.contains("image: \"{{ .Values.image.busybox }}\""));
    }

    for name in config.components() {
        let spec = config.resolve(name).unwrap();
        session::restore(&spec, &marker).unwrap();
    }

    for name in ["bulk-processor", "account-lookup"] {
        let restored = fs::read(manifest_path(dir.path(), name)).unwrap();
        assert_eq!(restored, DEPLOYMENT.as_bytes(), "round trip must be exact");
    }
}

#[test]
fn repatching_is_safe_and_backup_stays_pristine() {
    let (dir, toml) = setup_workspace();
    let config = load_from_str(&toml).unwrap();
    let marker = NoopMarker;
    let spec = config.resolve("bulk-processor").unwrap();

    session::patch(&spec, false, &marker).unwrap();
    let first_pass = fs::read_to_string(manifest_path(dir.path(), "bulk-processor")).unwrap();

    // Second patch runs over already-patched text; the backup must not move.
    session::patch(&spec, false, &marker).unwrap();
    assert_eq!(
        fs::read(spec.backup_path()).unwrap(),
        DEPLOYMENT.as_bytes()
    );

    // Restoring still lands back at the original regardless of the double
    // patch.
    session::restore(&spec, &marker).unwrap();
    assert_eq!(
        fs::read(manifest_path(dir.path(), "bulk-processor")).unwrap(),
        DEPLOYMENT.as_bytes()
    );

    // The second pass must not have re-added the image patch to the literal
    // line (it no longer matches the templated trigger).
    assert_eq!(
        first_pass
            .matches("image: \"eclipse-temurin:17-jdk\"")
            .count(),
        1
    );
}

#[test]
fn components_are_independent() {
    let (dir, toml) = setup_workspace();
    let config = load_from_str(&toml).unwrap();
    let marker = NoopMarker;

    let bulk = config.resolve("bulk-processor").unwrap();
    session::patch(&bulk, false, &marker).unwrap();

    // The other component is untouched and has no backup.
    let other = config.resolve("account-lookup").unwrap();
    assert_eq!(
        fs::read(manifest_path(dir.path(), "account-lookup")).unwrap(),
        DEPLOYMENT.as_bytes()
    );
    assert!(!other.backup_path().exists());

    // Restoring the untouched one fails locally; the patched one is fine.
    assert!(session::restore(&other, &marker).is_err());
    session::restore(&bulk, &marker).unwrap();
}

#[test]
fn dry_run_leaves_the_tree_alone() {
    let (dir, toml) = setup_workspace();
    let config = load_from_str(&toml).unwrap();
    let marker = NoopMarker;
    let spec = config.resolve("bulk-processor").unwrap();

    let report = session::patch(&spec, true, &marker).unwrap();
    assert!(report.is_complete());

    assert_eq!(
        fs::read(manifest_path(dir.path(), "bulk-processor")).unwrap(),
        DEPLOYMENT.as_bytes()
    );
    assert!(!spec.backup_path().exists());
}

#[test]
fn jar_command_lands_inside_primary_container() {
    let (dir, toml) = setup_workspace();
    let config = load_from_str(&toml).unwrap();
    let spec = config.resolve("bulk-processor").unwrap();

    session::patch(&spec, false, &NoopMarker).unwrap();
    let patched = fs::read_to_string(manifest_path(dir.path(), "bulk-processor")).unwrap();

    let lines: Vec<&str> = patched.lines().collect();
    let command_idx = lines
        .iter()
        .position(|l| l.contains("command: [\"java\", \"-jar\", \"/app/bulk-processor.jar\"]"))
        .expect("start command inserted");
    let containers_idx = lines
        .iter()
        .position(|l| l.trim_start().starts_with("containers:"))
        .unwrap();
    let volumes_idx = lines
        .iter()
        .position(|l| l.trim() == "volumes:")
        .unwrap();
    assert!(containers_idx < command_idx && command_idx < volumes_idx);

    // The init container's shell command is still the only other command.
    assert_eq!(patched.matches("command:").count(), 2);
}
