//! Command-line interface for anchorscope.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{Config, CONFIG_FILE_NAMES};
use crate::report;
use crate::runner::Runner;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_DIAGNOSTICS: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Structural context extractor for Anchor programs.
///
/// Anchorscope pulls complete struct and enum definitions, constants and
/// program ids out of a Solana/Anchor source tree, groups them by protocol
/// category and writes them as one self-contained Rust-like context file.
#[derive(Parser)]
#[command(name = "anchorscope")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract structural context from a source tree
    #[command(visible_alias = "scan")]
    Extract(ExtractArgs),
    /// Create a new anchorscope config from a template
    Init(InitArgs),
}

/// Arguments for the extract command.
#[derive(Parser)]
pub struct ExtractArgs {
    /// Path to extract from (file or directory)
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the extracted context to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format: pretty, json, or text
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Number of worker threads (default: one per core)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Leave unclassified declarations out of the context
    #[arg(long)]
    pub no_unclassified: bool,

    /// Log per-file progress
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "anchorscope.yaml")]
    pub output: PathBuf,

    /// Template to use
    #[arg(short, long, default_value = "default")]
    pub template: String,

    /// List available templates
    #[arg(short, long)]
    pub list: bool,
}

/// Available config templates.
struct Template {
    name: &'static str,
    description: &'static str,
    content: &'static str,
}

static TEMPLATES: &[Template] = &[
    Template {
        name: "default",
        description: "Built-in keyword table, unclassified structs kept",
        content: include_str!("templates/default.yaml"),
    },
    Template {
        name: "defi-only",
        description: "Wider DeFi keyword lists, unclassified structs dropped",
        content: include_str!("templates/defi-only.yaml"),
    },
];

/// Load the config named on the command line, or a discovered one, or defaults.
fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => Config::discover(Path::new(".")),
    };
    match path {
        Some(p) => {
            log::debug!("using config {}", p.display());
            Ok(Config::parse_file(&p)?)
        }
        None => {
            log::debug!(
                "no config file found (looked for {}), using defaults",
                CONFIG_FILE_NAMES.join(", ")
            );
            Ok(Config::default())
        }
    }
}

/// Run the extract command.
pub fn run_extract(args: &ExtractArgs) -> anyhow::Result<i32> {
    // Validate format
    if !matches!(args.format.as_str(), "pretty" | "json" | "text") {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty', 'json', or 'text'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    let mut config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error parsing config: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    if args.no_unclassified {
        config.include_unclassified = false;
    }

    let runner = match Runner::new(config) {
        Ok(r) => r.jobs(args.jobs),
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    if !args.path.exists() {
        eprintln!("Error: cannot access path {:?}", args.path);
        return Ok(EXIT_ERROR);
    }

    let extraction = match runner.run(&args.path) {
        Ok(ex) => ex,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let path_str = args.path.to_string_lossy().to_string();
    let output = args.output.as_deref();

    match args.format.as_str() {
        "text" => {
            report::write_text(&extraction, output)?;
        }
        "json" => {
            if output.is_some() {
                report::write_text(&extraction, output)?;
            }
            report::write_json(&path_str, &extraction, output)?;
        }
        _ => {
            if output.is_some() {
                report::write_text(&extraction, output)?;
            }
            report::write_pretty(&path_str, &extraction, output);
        }
    }

    if extraction.has_diagnostics() {
        Ok(EXIT_DIAGNOSTICS)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.list {
        print!("{}", template_listing());
        return Ok(EXIT_SUCCESS);
    }

    let Some(template) = TEMPLATES.iter().find(|t| t.name == args.template) else {
        let known: Vec<&str> = TEMPLATES.iter().map(|t| t.name).collect();
        eprintln!(
            "Error: no template named {:?} (known: {})",
            args.template,
            known.join(", ")
        );
        return Ok(EXIT_ERROR);
    };

    match write_template(&args.output, template) {
        Ok(()) => {
            println!("Wrote {} ({} keyword table)", args.output.display(), template.name);
            println!(
                "Extract with: anchorscope extract <program-dir> --config {} --output context.rs",
                args.output.display()
            );
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            Ok(EXIT_ERROR)
        }
    }
}

/// Write `template` to `path`, refusing to replace an existing config.
fn write_template(path: &Path, template: &Template) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!(
            "{} already exists; keep it or pick another path with --output",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    std::fs::write(path, template.content)
        .with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}

/// One line per template; the default is starred.
fn template_listing() -> String {
    let mut out = String::new();
    for template in TEMPLATES {
        let marker = if template.name == "default" { '*' } else { ' ' };
        out.push_str(&format!("{} {:<12} {}\n", marker, template.name, template.description));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_are_valid_configs() {
        for template in TEMPLATES {
            let config = Config::from_yaml(template.content)
                .unwrap_or_else(|e| panic!("{}: {}", template.name, e));
            config
                .validate()
                .unwrap_or_else(|e| panic!("{}: {}", template.name, e));
        }
    }

    #[test]
    fn test_defi_only_drops_unclassified() {
        let template = TEMPLATES.iter().find(|t| t.name == "defi-only").unwrap();
        let config = Config::from_yaml(template.content).unwrap();
        assert!(!config.include_unclassified);
    }

    #[test]
    fn test_write_template_refuses_to_overwrite() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("cfg/anchorscope.yaml");
        let template = &TEMPLATES[0];

        write_template(&path, template).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), template.content);

        let err = write_template(&path, template).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_template_listing_marks_default() {
        let listing = template_listing();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), TEMPLATES.len());
        assert!(lines[0].starts_with("* default"));
        assert!(lines[1].starts_with("  defi-only"));
    }

    #[test]
    fn test_cli_parses_scan_alias() {
        let cli = Cli::try_parse_from(["anchorscope", "scan", "programs", "-f", "json", "-j", "2"])
            .unwrap();
        match cli.command {
            Commands::Extract(args) => {
                assert_eq!(args.path, PathBuf::from("programs"));
                assert_eq!(args.format, "json");
                assert_eq!(args.jobs, Some(2));
                assert!(!args.no_unclassified);
            }
            Commands::Init(_) => panic!("expected extract"),
        }
    }
}
