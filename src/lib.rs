pub mod components;
pub mod config;
pub mod engine;
pub mod index;
pub mod registry;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub use components::{
    Analyzer, ComponentError, ComponentKind, ComponentLoader, Converter, IndexCreator,
};
pub use config::{ConfigurationResolver, IndexConfig, IndexProperties, RegistrySettings};
pub use engine::{EngineConnection, EngineError, IndexDocument};
pub use index::lifecycle::FillContext;
pub use index::{IndexHandle, IndexState, IndexStatus};
pub use registry::{IndexRegistry, RegistryError};

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "idxreg",
    version,
    about = "Build and inspect named search indexes"
)]
pub struct Cli {
    /// TOML file layered over the built-in defaults
    #[arg(long, global = true, env = config::CONFIG_FILE_ENV)]
    pub config: Option<PathBuf>,

    /// Directory for derived index paths (defaults to the system temp dir)
    #[arg(long, global = true, env = config::TMP_ROOT_ENV)]
    pub tmp_root: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build an index (if needed) and print its status
    Get {
        name: String,

        /// Override a property: `attribute=value` or `index.<name>.<attribute>=value`
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        #[arg(long)]
        json: bool,
    },
    /// Delete an index's data and rebuild it with the same configuration
    Rebuild {
        name: String,

        #[arg(long)]
        json: bool,
    },
    /// Print the built-in default table
    Defaults {
        #[arg(long)]
        json: bool,
    },
    /// List registered converter, creator and analyzer ids
    Components,
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = RegistrySettings::from_env();
    if let Some(root) = cli.tmp_root {
        settings.tmp_root = root;
    }
    if let Some(file) = cli.config {
        settings.config_file = Some(file);
    }

    match cli.command {
        Commands::Get { name, set, json } => {
            let registry = IndexRegistry::from_settings(&settings)?;
            let overrides = expand_assignments(&name, &set)?;
            let handle = registry
                .get_index_with(&name, &overrides)
                .with_context(|| format!("build index {name}"))?;
            report(&handle, json)
        }
        Commands::Rebuild { name, json } => {
            let registry = IndexRegistry::from_settings(&settings)?;
            let handle = registry
                .get_new_index(&name)
                .with_context(|| format!("rebuild index {name}"))?;
            report(&handle, json)
        }
        Commands::Defaults { json } => {
            print_defaults(json)?;
            Ok(())
        }
        Commands::Components => {
            let loader = ComponentLoader::with_builtins();
            for kind in ComponentKind::ALL {
                println!("{kind}: {}", loader.ids(kind).join(", "));
            }
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "idxreg", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Log level used when `RUST_LOG` is unset.
fn default_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Expand `--set` values; bare attributes are scoped to `name`.
pub fn expand_assignments(name: &str, raw: &[String]) -> Result<IndexProperties> {
    let scoped: Vec<String> = raw
        .iter()
        .map(|a| match a.split_once('=') {
            Some((key, value)) if !key.contains('.') && !key.trim().is_empty() => {
                format!("{}={value}", config::index_key(name, key.trim()))
            }
            _ => a.clone(),
        })
        .collect();
    Ok(IndexProperties::from_assignments(&scoped)?)
}

fn report(handle: &IndexHandle, json: bool) -> Result<()> {
    let status = handle.status();
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!(
            "{}\t{}\t{} docs\t{}",
            status.name,
            status.state.label(),
            status.documents_added,
            status.path.display()
        );
    }
    if let Some(reason) = status.state.failure_reason() {
        bail!("index {} failed: {reason}", status.name);
    }
    Ok(())
}

fn print_defaults(json: bool) -> Result<()> {
    if json {
        let rows: Vec<serde_json::Value> = config::DEFAULT_INDICES
            .iter()
            .map(|d| {
                serde_json::json!({
                    "name": d.name,
                    "converter": d.converter,
                    "creator": d.creator,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    for d in config::DEFAULT_INDICES {
        println!("{}\t{}\t{}", d.name, d.converter, d.creator.unwrap_or("-"));
    }
    Ok(())
}
