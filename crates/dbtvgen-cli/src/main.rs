use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dbtvgen_core::VaultGenError;
use dbtvgen_engine::{process_config, DocsGenerator, DocsOptions, ShellRunner, SqlGenerator};

/// dbtvgen - Generate dbtvault models and docs from YAML
#[derive(Parser)]
#[command(name = "dbtvgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Root of the dbt project
    #[arg(long, global = true, env = "DBTVGEN_PROJECT_DIR", default_value = ".")]
    project_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one SQL model file per declared model
    Sql {
        /// Replace model files that already exist
        #[arg(long)]
        overwrite: bool,
    },

    /// Generate schema.yml documentation from the dbt catalog
    Docs {
        /// dbt target directory (overrides target-path in dbt_project.yml)
        #[arg(long)]
        target_path: Option<String>,

        /// Inline YAML arguments, e.g. "{model_names: [hub_customer]}"
        #[arg(long)]
        args: Option<String>,

        /// Replace schema files instead of merging into them
        #[arg(long)]
        overwrite: bool,

        /// Run `dbt docs generate` first to refresh catalog.json
        #[arg(long)]
        generate_catalog: bool,
    },

    /// Show the resolved configuration without writing anything
    Debug {
        /// dbt target directory (overrides target-path in dbt_project.yml)
        #[arg(long)]
        target_path: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => ExitCode::from(report_error(&err)),
    }
}

/// Log to stderr; RUST_LOG wins over the verbosity flag
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    if cli.verbose {
        eprintln!("{} {}", "Project:".cyan(), cli.project_dir.display());
    }

    match cli.command {
        Commands::Sql { overwrite } => sql_command(&cli.project_dir, overwrite),
        Commands::Docs {
            target_path,
            args,
            overwrite,
            generate_catalog,
        } => {
            let options = DocsOptions {
                target_path,
                args,
                overwrite,
                generate_catalog,
            };
            docs_command(&cli.project_dir, &options)
        }
        Commands::Debug { target_path } => debug_command(&cli.project_dir, target_path.as_deref()),
    }
}

/// Sql command - write model files
fn sql_command(project_dir: &Path, overwrite: bool) -> Result<()> {
    let report = SqlGenerator::new().run(project_dir, overwrite)?;

    for path in &report.written {
        println!("{} {}", "✓".green(), path.display());
    }
    for path in &report.skipped {
        println!("{} {} (exists, use --overwrite to replace)", "-".yellow(), path.display());
    }

    println!(
        "\n{} {} written, {} skipped",
        "Summary:".bold(),
        report.written.len().to_string().green(),
        report.skipped.len().to_string().yellow()
    );
    Ok(())
}

/// Docs command - write schema.yml files
fn docs_command(project_dir: &Path, options: &DocsOptions) -> Result<()> {
    let report = DocsGenerator::new(ShellRunner).run(project_dir, options)?;

    for path in &report.written {
        println!("{} {}", "✓".green(), path.display());
    }
    for name in &report.missing_from_catalog {
        println!("{} {} not found in catalog", "⚠".yellow(), name);
    }

    println!(
        "\n{} {} models documented in {} files",
        "Summary:".bold(),
        report.documented.len().to_string().green(),
        report.written.len()
    );
    Ok(())
}

/// Debug command - print the resolved configuration
fn debug_command(project_dir: &Path, target_path: Option<&str>) -> Result<()> {
    let config = process_config(project_dir, target_path)?;

    println!("{}", "Project".bold());
    println!("  name:        {}", config.project.name.as_deref().unwrap_or("-"));
    println!("  root:        {}", config.project_dir.display());
    println!("  model dirs:  {}", config.project.model_dirs.join(", "));
    println!("  target dir:  {}", config.target_dir().display());

    println!("\n{}", "Config locations".bold());
    for location in &config.locations {
        println!("  {}", location.cyan());
    }

    println!("\n{}", "Models".bold());
    for model in &config.models {
        println!(
            "  {:<32} {:<8} {:<28} {}",
            model.display_name(),
            model.model_type.as_str().cyan(),
            model.location,
            config.sql_path(model).display()
        );
    }

    println!("\n{} {} models", "Total:".bold(), config.models.len());
    Ok(())
}

/// Print an error with its code and pick the exit status; usage errors exit with 2
fn report_error(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<VaultGenError>() {
        Some(vault_err) => {
            eprintln!("{} {}", format!("[{}]", vault_err.code()).red().bold(), vault_err);
            if vault_err.is_usage_error() {
                2
            } else {
                1
            }
        }
        None => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_docs_flags() {
        let cli = Cli::try_parse_from([
            "dbtvgen",
            "--project-dir",
            "/tmp/vault",
            "docs",
            "--args",
            "{model_names: [hub_customer]}",
            "--generate-catalog",
        ])
        .unwrap();

        assert_eq!(cli.project_dir, PathBuf::from("/tmp/vault"));
        match cli.command {
            Commands::Docs {
                args,
                generate_catalog,
                overwrite,
                target_path,
            } => {
                assert_eq!(args.as_deref(), Some("{model_names: [hub_customer]}"));
                assert!(generate_catalog);
                assert!(!overwrite);
                assert!(target_path.is_none());
            }
            _ => panic!("expected docs command"),
        }
    }

    #[test]
    fn usage_errors_exit_with_two() {
        let err = anyhow::Error::new(VaultGenError::ProjectNotConfigured("missing".to_string()));
        assert_eq!(report_error(&err), 2);

        let err = anyhow::Error::new(VaultGenError::ConfigInvalid("bad".to_string()));
        assert_eq!(report_error(&err), 1);
    }
}
