use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use helm_localdev::config::{load_from_path, LocaldevConfig};
use helm_localdev::session;
use helm_localdev::vcs::{GitSkipWorktree, ProtectStatus};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "localdev")]
#[command(about = "Patch Helm deployment templates for local development", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to localdev.toml (default: $LOCALDEV_CONFIG, then ./localdev.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch deployment manifests (all components unless --component is given)
    Patch {
        /// Specific component to patch
        #[arg(long)]
        component: Option<String>,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Restore deployment manifests from their pristine backups
    Restore {
        /// Specific component to restore
        #[arg(long)]
        component: Option<String>,
    },

    /// Show patch, backup and commit-protection status per component
    Status {
        /// Specific component to inspect
        #[arg(long)]
        component: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Patch {
            component,
            dry_run,
            diff,
        } => cmd_patch(&config, component, dry_run, diff),

        Commands::Restore { component } => cmd_restore(&config, component),

        Commands::Status { component } => cmd_status(&config, component),
    }
}

/// Resolve and load the config file.
///
/// Priority order:
/// 1. Explicit --config flag
/// 2. LOCALDEV_CONFIG environment variable
/// 3. ./localdev.toml
fn load_config(cli_config: Option<PathBuf>) -> Result<LocaldevConfig> {
    if let Some(path) = cli_config {
        return Ok(load_from_path(&path)?);
    }

    if let Ok(env_path) = env::var("LOCALDEV_CONFIG") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(load_from_path(&path)?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: LOCALDEV_CONFIG is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    let default = PathBuf::from("localdev.toml");
    if default.exists() {
        return Ok(load_from_path(&default)?);
    }

    anyhow::bail!(
        "{}\n{}\n  {}\n  {}",
        "Could not find a localdev config file.".red(),
        "Try one of:".bold(),
        "1. Create localdev.toml in the current directory",
        "2. Point at one explicitly: localdev patch --config /path/to/localdev.toml"
    )
}

/// Components to operate on: the requested one, or all of them.
fn select_components(config: &LocaldevConfig, requested: Option<String>) -> Result<Vec<String>> {
    match requested {
        Some(name) => Ok(vec![name]),
        None => {
            let all: Vec<String> = config.components().map(str::to_string).collect();
            if all.is_empty() {
                anyhow::bail!("config file lists no [component.*] tables");
            }
            Ok(all)
        }
    }
}

/// Show a unified diff between original and modified content.
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_patch(
    config: &LocaldevConfig,
    component: Option<String>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let components = select_components(config, component)?;
    let marker = GitSkipWorktree;

    if dry_run {
        println!("{}", "[DRY RUN - no files will be modified]".cyan());
    }

    let mut patched = 0;
    let mut partial = 0;
    let mut failed = 0;

    for name in &components {
        let spec = match config.resolve(name) {
            Ok(spec) => spec,
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), name, e);
                failed += 1;
                continue;
            }
        };

        // Capture the pre-patch text for diff output; the manifest may not
        // exist yet, in which case patch() reports that below.
        let before = show_diff
            .then(|| fs::read_to_string(&spec.manifest_path).ok())
            .flatten();

        let result = if dry_run && show_diff {
            // A dry run writes nothing, so diff against the preview text.
            session::preview(&spec).map(|(text, report)| {
                if let Some(before) = &before {
                    display_diff(&spec.manifest_path, before, &text);
                    println!();
                }
                report
            })
        } else {
            session::patch(&spec, dry_run, &marker)
        };

        match result {
            Ok(report) => {
                let verb = if dry_run { "Would patch" } else { "Patched" };
                if report.is_complete() {
                    println!(
                        "{} {}: {} {}",
                        "✓".green(),
                        name,
                        verb,
                        spec.manifest_path.display()
                    );
                    patched += 1;
                } else {
                    println!(
                        "{} {}: {} {} (partially)",
                        "⊙".yellow(),
                        name,
                        verb,
                        spec.manifest_path.display()
                    );
                    partial += 1;
                }
                for warning in &report.warnings {
                    eprintln!("  {}", warning.yellow());
                }

                if show_diff && !dry_run {
                    if let (Some(before), Ok(after)) =
                        (&before, fs::read_to_string(&spec.manifest_path))
                    {
                        if before != &after {
                            display_diff(&spec.manifest_path, before, &after);
                            println!();
                        }
                    }
                }
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), name, e);
                failed += 1;
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} patched", format!("{}", patched).green());
    println!("  {} partially patched", format!("{}", partial).yellow());
    println!("  {} failed", format!("{}", failed).red());

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_restore(config: &LocaldevConfig, component: Option<String>) -> Result<()> {
    let components = select_components(config, component)?;
    let marker = GitSkipWorktree;

    let mut restored = 0;
    let mut failed = 0;

    for name in &components {
        let spec = match config.resolve(name) {
            Ok(spec) => spec,
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), name, e);
                failed += 1;
                continue;
            }
        };

        match session::restore(&spec, &marker) {
            Ok(warnings) => {
                println!(
                    "{} {}: Restored {}",
                    "✓".green(),
                    name,
                    spec.manifest_path.display()
                );
                for warning in &warnings {
                    eprintln!("  {}", warning.yellow());
                }
                restored += 1;
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), name, e);
                failed += 1;
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} restored", format!("{}", restored).green());
    println!("  {} failed", format!("{}", failed).red());

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_status(config: &LocaldevConfig, component: Option<String>) -> Result<()> {
    let components = select_components(config, component)?;
    let marker = GitSkipWorktree;

    println!("{}", "Component Status".bold());
    println!();

    for name in &components {
        let spec = match config.resolve(name) {
            Ok(spec) => spec,
            Err(e) => {
                println!("{} {}", "✗".red(), name.bold());
                println!("  {}", e.to_string().red());
                println!();
                continue;
            }
        };

        let status = session::status(&spec, &marker);
        println!("{} {}", "📦".normal(), name.bold());
        println!("  File: {}", spec.manifest_path.display());

        if !status.manifest_exists {
            println!("  {}", "Deployment file not found".red());
            println!();
            continue;
        }

        match (status.backup_exists, status.modified) {
            (false, _) => println!("  {}", "Not patched (no backup)".dimmed()),
            (true, Some(true)) => println!("  {}", "Patched (differs from backup)".green()),
            (true, Some(false)) => {
                println!("  {}", "Backup present but manifest is pristine".yellow())
            }
            (true, None) => println!("  {}", "Patch state unknown".yellow()),
        }

        match status.protection {
            ProtectStatus::Protected => {
                println!("  {}", "🔒 Protected from commits".green())
            }
            ProtectStatus::Unprotected => {
                println!("  {}", "⚠️  Not protected from commits".yellow())
            }
            ProtectStatus::Unknown => println!("  {}", "Protection status unknown".dimmed()),
        }
        println!();
    }

    Ok(())
}
