//! Command-line inspector for confgraph documents.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use confgraph::ConfigDocument;
use confgraph::inspect::{
    check_document, load_manager, resolve_record, summarize_globals, summarize_records,
};
use log::info;
use serde::Serialize;
use std::path::PathBuf;

/// Command-line options for the inspector.
#[derive(Parser)]
#[command(name = "confgraph", version)]
struct Cli {
    /// Path to a JSON5 configuration document (defaults to ~/.confgraph/confgraph.json5)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Import environment variables starting with this prefix as global properties
    #[arg(long, global = true)]
    env_prefix: Option<String>,
    /// Print JSON instead of plain text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the document into a configuration manager and list its components
    Show,
    /// Construct every component, reporting the first error
    Check,
    /// List global properties and their resolved values
    Globals,
    /// Rewrite the document, with includes and inheritance expanded, as JSON
    Normalize {
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print one record with global properties substituted
    Resolve {
        /// Instance name of the record
        name: String,
    },
}

fn main() -> anyhow::Result<()> {
    confgraph::init_logging();
    let cli = Cli::parse();

    let path = match cli.config.clone() {
        Some(path) => path,
        None => match ConfigDocument::default_path() {
            Some(path) => path,
            None => bail!("no --config given and the home directory is unknown"),
        },
    };
    let mut document = ConfigDocument::load_from_path(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    if let Some(prefix) = &cli.env_prefix {
        let imported = document.globals.import_environment(Some(prefix.as_str()));
        info!("imported environment globals (prefix={prefix}, count={imported})");
    }

    match &cli.command {
        Command::Show => {
            let manager = load_manager(&document)?;
            let records = summarize_records(&document);
            if cli.json {
                print_json(&records)?;
            } else {
                if manager.has_active_registry() {
                    println!("registry: {}", confgraph::core::REGISTRY_COMPONENT);
                }
                for record in &records {
                    let mut flags = Vec::new();
                    if record.exportable {
                        flags.push("export");
                    }
                    if record.importable {
                        flags.push("import");
                    }
                    println!(
                        "{} ({}){}{}",
                        record.name,
                        record.type_name,
                        if flags.is_empty() {
                            String::new()
                        } else {
                            format!(" [{}]", flags.join(", "))
                        },
                        if record.properties.is_empty() {
                            String::new()
                        } else {
                            format!(": {}", record.properties.join(", "))
                        }
                    );
                }
            }
        }
        Command::Check => {
            let report = check_document(&document)?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "ok: {} components, {} constructed, registry {}",
                    report.components,
                    report.instantiated,
                    if report.registry_active { "active" } else { "absent" }
                );
            }
        }
        Command::Globals => {
            let globals = summarize_globals(&document.globals);
            if cli.json {
                print_json(&globals)?;
            } else {
                for global in &globals {
                    match (&global.resolved, &global.error) {
                        (Some(resolved), _) => println!("{} = {resolved}", global.name),
                        (None, Some(error)) => {
                            println!("{} = {} (error: {error})", global.name, global.raw)
                        }
                        (None, None) => println!("{} = {}", global.name, global.raw),
                    }
                }
            }
        }
        Command::Normalize { output } => match output {
            Some(output) => {
                document
                    .save_to_path(output)
                    .with_context(|| format!("failed to write {}", output.display()))?;
                info!("wrote normalized document (path={})", output.display());
            }
            None => println!("{}", document.to_json_string()?),
        },
        Command::Resolve { name } => {
            let value = resolve_record(&document, name)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
