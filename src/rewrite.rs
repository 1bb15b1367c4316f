//! Line-oriented rewriter for Helm deployment templates.
//!
//! The manifest is never parsed into a YAML object model: comments, key
//! ordering and Helm template syntax (`{{ ... }}`) must survive the rewrite
//! byte-for-byte on every untouched line, and a structured parser would
//! normalize or reject them. Instead a single forward pass runs a small state
//! machine over the lines, replacing the templated image reference with a
//! literal one, adding a `local-code` volumeMount plus start command to the
//! primary container, and appending a `local-code` hostPath volume.
//!
//! Each of the three edits fires at most once per pass. A section that never
//! appears is reported as a warning, not an error - chart layouts vary and a
//! partial patch (for example just the image) is still useful.

use crate::spec::PatchSpec;

/// Scanner position within the manifest.
///
/// Only the first `- name:` entry after `containers:` is treated as the
/// primary container; later containers are passed through untouched, as is
/// everything under `initContainers:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatchState {
    Outside,
    InInitContainers,
    InContainers,
    InContainerDef,
    InVolumeMounts,
    InVolumes,
}

/// Which of the three target sections were found and modified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use = "PatchReport should be checked for unpatched sections"]
pub struct PatchReport {
    /// The templated `image:` line was replaced with a literal reference
    pub image_patched: bool,
    /// A `local-code` mount and start command were added under `volumeMounts:`
    pub volume_mount_patched: bool,
    /// A `local-code` hostPath volume was appended under `volumes:`
    pub volumes_patched: bool,
    /// One entry per missing section, plus any session-level notes
    pub warnings: Vec<String>,
}

impl PatchReport {
    /// True when all three target sections were patched.
    pub fn is_complete(&self) -> bool {
        self.image_patched && self.volume_mount_patched && self.volumes_patched
    }
}

/// Rewrite a manifest's lines for local development.
///
/// Pure function: the input is never mutated and no I/O happens here.
/// Returns the rewritten lines along with a report of what was found.
pub fn rewrite(lines: &[String], spec: &PatchSpec) -> (Vec<String>, PatchReport) {
    let mut scanner = Scanner {
        spec,
        state: PatchState::Outside,
        out: Vec::with_capacity(lines.len() + 8),
        image_patched: false,
        mounts_patched: false,
        volumes_patched: false,
        seen_primary_container: false,
        in_volume_entry: false,
        mount_anchor: 0,
        volume_anchor: 0,
    };

    let mut i = 0;
    while i < lines.len() {
        // step() returns false when the line ended a block and must be
        // re-dispatched in the new state without being consumed.
        if scanner.step(&lines[i]) {
            i += 1;
        }
    }

    // A mount or volume block can be the last thing in the file; the pending
    // insertion still has to land.
    match scanner.state {
        PatchState::InVolumeMounts => scanner.flush_mount_block(),
        PatchState::InVolumes => scanner.flush_volume_block(),
        _ => {}
    }

    let report = scanner.report();
    (scanner.out, report)
}

struct Scanner<'a> {
    spec: &'a PatchSpec,
    state: PatchState,
    out: Vec<String>,
    image_patched: bool,
    mounts_patched: bool,
    volumes_patched: bool,
    seen_primary_container: bool,
    /// Whether the current line sits inside an existing `- name:` volume entry
    in_volume_entry: bool,
    /// Indentation of the `volumeMounts:` line that opened the mount block
    mount_anchor: usize,
    /// Indentation of the `volumes:` line that opened the volume block
    volume_anchor: usize,
}

impl Scanner<'_> {
    /// Process one line. Returns true if the line was consumed.
    fn step(&mut self, line: &str) -> bool {
        match self.state {
            PatchState::InVolumeMounts => self.step_mounts(line),
            PatchState::InVolumes => self.step_volumes(line),
            _ => self.step_scalar(line),
        }
    }

    /// Line handling for every state outside the two copy-then-append blocks.
    fn step_scalar(&mut self, line: &str) -> bool {
        let trimmed = line.trim_start();

        // Section headers win over whatever state we are in. The check order
        // matters only for readability: "initContainers:" does not start
        // with "containers:".
        if trimmed.starts_with("initContainers:") {
            self.state = PatchState::InInitContainers;
            self.out.push(line.to_string());
            return true;
        }
        if trimmed.starts_with("containers:") {
            self.state = PatchState::InContainers;
            self.out.push(line.to_string());
            return true;
        }

        match self.state {
            PatchState::Outside | PatchState::InInitContainers => {}

            PatchState::InContainers => {
                if trimmed.starts_with("- name:") && !self.seen_primary_container {
                    self.seen_primary_container = true;
                    self.state = PatchState::InContainerDef;
                } else if trimmed.starts_with("volumes:") && !self.volumes_patched {
                    self.enter_volumes(line);
                    return true;
                }
            }

            PatchState::InContainerDef => {
                if !self.image_patched
                    && trimmed.contains("image:")
                    && trimmed.contains("{{")
                    && trimmed.contains("Values.image")
                {
                    self.patch_image(line, trimmed);
                    return true;
                }
                if trimmed.starts_with("volumeMounts:") && !self.mounts_patched {
                    self.mount_anchor = indent_width(line);
                    self.state = PatchState::InVolumeMounts;
                    self.out.push(line.to_string());
                    return true;
                }
                if trimmed.starts_with("volumes:") && !self.volumes_patched {
                    self.enter_volumes(line);
                    return true;
                }
            }

            PatchState::InVolumeMounts | PatchState::InVolumes => unreachable!(),
        }

        self.out.push(line.to_string());
        true
    }

    /// Copy existing mount entries; the first non-mount line closes the block.
    fn step_mounts(&mut self, line: &str) -> bool {
        let trimmed = line.trim_start();
        if trimmed.starts_with("- name:") || trimmed.starts_with("mountPath:") {
            self.out.push(line.to_string());
            return true;
        }
        self.flush_mount_block();
        false
    }

    /// Copy existing volume entries block by block; a blank line, a template
    /// directive or any other non-entry line closes the section.
    fn step_volumes(&mut self, line: &str) -> bool {
        let trimmed = line.trim_start();
        if trimmed.starts_with("- name:") {
            self.in_volume_entry = true;
            self.out.push(line.to_string());
            return true;
        }
        if self.in_volume_entry && !trimmed.is_empty() && !trimmed.starts_with("{{-") {
            self.out.push(line.to_string());
            return true;
        }
        self.flush_volume_block();
        false
    }

    fn enter_volumes(&mut self, line: &str) {
        self.volume_anchor = indent_width(line);
        self.in_volume_entry = false;
        self.state = PatchState::InVolumes;
        self.out.push(line.to_string());
    }

    /// Replace the templated image line with a literal reference, keeping the
    /// original as a comment directly below so the substitution stays
    /// auditable and reversible by hand.
    fn patch_image(&mut self, line: &str, trimmed: &str) {
        let indent = indent_width(line);
        self.out.push(format!(
            "{}image: \"{}\"  # local dev override",
            pad(indent),
            self.spec.image
        ));
        self.out.push(format!(
            "{}#{}  # replaced to run local code via hostPath",
            pad(indent),
            trimmed.trim_end()
        ));
        self.image_patched = true;
    }

    /// Append the `local-code` mount and the start command, then hand the
    /// closing line back to the container scanner.
    fn flush_mount_block(&mut self) {
        let indent = self.mount_anchor;
        self.out
            .push(format!("{}- name: local-code", pad(indent + 2)));
        self.out.push(format!(
            "{}mountPath: /app # local code is mounted at /app in the container",
            pad(indent + 4)
        ));
        // The command overrides the image entrypoint so the container runs
        // the jar from the mounted host directory.
        self.out.push(format!(
            "{}command: [\"java\", \"-jar\", \"{}\"] # run the locally built jar",
            pad(indent),
            self.spec.jar_path
        ));
        self.mounts_patched = true;
        self.state = PatchState::InContainerDef;
    }

    /// Append the `local-code` hostPath volume and leave the section.
    fn flush_volume_block(&mut self) {
        let indent = self.volume_anchor;
        self.out
            .push(format!("{}- name: local-code", pad(indent + 2)));
        self.out
            .push(format!("{}hostPath: # local dev mount", pad(indent + 4)));
        self.out.push(format!(
            "{}path: {} # local project path",
            pad(indent + 6),
            self.spec.host_path
        ));
        self.out.push(format!(
            "{}type: Directory # must exist on the node",
            pad(indent + 6)
        ));
        self.volumes_patched = true;
        self.state = PatchState::Outside;
    }

    fn report(&self) -> PatchReport {
        let mut warnings = Vec::new();
        let component = &self.spec.component;
        if !self.image_patched {
            warnings.push(format!(
                "component '{component}': no templated image: line found"
            ));
        }
        if !self.mounts_patched {
            warnings.push(format!(
                "component '{component}': volumeMounts: section not found"
            ));
        }
        if !self.volumes_patched {
            warnings.push(format!(
                "component '{component}': volumes: section not found"
            ));
        }
        PatchReport {
            image_patched: self.image_patched,
            volume_mount_patched: self.mounts_patched,
            volumes_patched: self.volumes_patched,
            warnings,
        }
    }
}

fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn pad(width: usize) -> String {
    " ".repeat(width)
}
