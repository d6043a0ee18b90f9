//! m3 CLI: run model-edit batches from the command line.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use m3_engine::config::EngineConfig;
use m3_engine::engine::BatchEngine;
use m3_engine::request::{BatchRequest, Request};

#[derive(Parser)]
#[command(name = "m3", version, about = "Batch edit engine for molecular models")]
struct Cli {
    /// Engine configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for stored models. Overrides the configuration.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one batch from a JSON file and print the response.
    Batch {
        /// Either a full batch body `{"uid", "requests", ...}` or a bare
        /// array of requests.
        #[arg(long)]
        file: PathBuf,

        /// Acting user id.
        #[arg(long)]
        uid: Option<String>,

        /// Allow model edits.
        #[arg(long)]
        privileged: bool,

        /// Print the response on a single line.
        #[arg(long)]
        compact: bool,
    },

    /// List the ids of all known models.
    Models,

    /// Show engine info.
    Info,

    /// Print the effective configuration as TOML.
    Config,
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    Ok(config)
}

fn read_batch(file: &Path) -> Result<BatchRequest> {
    let content = std::fs::read_to_string(file).into_diagnostic()?;
    let value: serde_json::Value = serde_json::from_str(&content).into_diagnostic()?;
    if value.is_array() {
        let requests: Vec<Request> = serde_json::from_value(value).into_diagnostic()?;
        Ok(BatchRequest {
            requests,
            ..Default::default()
        })
    } else {
        serde_json::from_value(value).into_diagnostic()
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Batch {
            file,
            uid,
            privileged,
            compact,
        } => {
            let mut batch = read_batch(&file)?;
            if uid.is_some() {
                batch.uid = uid;
            }
            let engine = BatchEngine::new(config)?;
            let response = engine.handle(&batch, privileged);
            let rendered = if compact {
                serde_json::to_string(&response)
            } else {
                serde_json::to_string_pretty(&response)
            }
            .into_diagnostic()?;
            println!("{rendered}");
            if !response.is_success() {
                std::process::exit(1);
            }
        }

        Commands::Models => {
            let engine = BatchEngine::new(config)?;
            let ids = engine.model_ids()?;
            if ids.is_empty() {
                println!("No models.");
            }
            for id in ids {
                println!("{id}");
            }
        }

        Commands::Info => {
            let engine = BatchEngine::new(config)?;
            println!("{}", engine.info()?);
        }

        Commands::Config => {
            let rendered = toml::to_string_pretty(&config).into_diagnostic()?;
            print!("{rendered}");
        }
    }

    Ok(())
}
