//! Assistants CLI, the main entry point.
//!
//! Commands:
//! - `run`    Serve assistants from loaded manifests until Ctrl-C
//! - `check`  Reconcile manifests offline and report what was accepted
//! - `render` Render a template against loaded Prompts and Configs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "assistants",
    about = "Assistants: resource controllers for code agents on data streams",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.assistants/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start every controller and serve assistants
    Run {
        /// Manifest file or directory, overriding `resources_dir`
        #[arg(short, long)]
        resources: Option<PathBuf>,

        /// Publish stdin lines to this stream and print the replies
        #[arg(long, value_name = "STREAM")]
        stdin: Option<String>,
    },

    /// Reconcile manifests without a provider and report the result
    Check {
        #[arg(short, long)]
        resources: Option<PathBuf>,
    },

    /// Render a template against loaded Prompts and Configs
    Render {
        /// Template text, e.g. 'Hello ${name}'
        template: String,

        /// Binding for the template, parsed as JSON when possible
        #[arg(long = "set", value_name = "KEY=VALUE")]
        bindings: Vec<String>,

        #[arg(short, long)]
        resources: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { resources, stdin } => commands::run::run(config, resources, stdin).await?,
        Commands::Check { resources } => commands::check::run(config, resources).await?,
        Commands::Render {
            template,
            bindings,
            resources,
        } => commands::render::run(config, template, bindings, resources).await?,
    }

    Ok(())
}
