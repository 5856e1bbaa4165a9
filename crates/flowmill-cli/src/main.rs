//! flowmill CLI entry point.
//!
//! Binary name: `flowmill`
//!
//! Sub-commands:
//! - `serve`    -- load workflows, bind triggers, run the engine loop.
//! - `run`      -- execute one workflow once; exit non-zero on failure.
//! - `validate` -- parse and validate a single JCWF file.
//! - `list`     -- list workflows in the configured folder.

mod commands;
mod engine;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "flowmill",
    about = "Workflow orchestration runtime for JCWF documents",
    version
)]
struct Cli {
    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the engine: registry, triggers, and the driver loop.
    Serve {
        /// Path to the engine configuration JSON.
        #[arg(long, default_value = "flowmill.json")]
        config: PathBuf,
    },

    /// Run one workflow to completion and print the recorded run.
    Run {
        #[arg(long, default_value = "flowmill.json")]
        config: PathBuf,

        /// Workflow id to activate.
        workflow_id: String,

        /// Explicit run id (defaults to `<workflow_id>_<unix_seconds>`).
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Parse and validate a single JCWF file.
    Validate {
        /// Path to the `.jcwf` document.
        path: PathBuf,
    },

    /// List the workflows in the configured workflows folder.
    List {
        #[arg(long, default_value = "flowmill.json")]
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "info,flowmill=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    match cli.command {
        Command::Serve { config } => {
            let config = commands::load_checked_config(&config)?;

            // The wave dispatcher may park every worker in blocking process
            // waits; a couple of spare threads keep the driver responsive.
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(config.max_threads as usize + 2)
                .enable_all()
                .build()?;

            runtime.block_on(engine::serve(config))
        }

        Command::Run {
            config,
            workflow_id,
            run_id,
        } => {
            let config = commands::load_checked_config(&config)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(config.max_threads as usize + 2)
                .enable_all()
                .build()?;

            let ok = runtime.block_on(commands::run_workflow(
                config,
                &workflow_id,
                run_id.as_deref(),
                cli.json,
            ))?;

            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }

        Command::Validate { path } => {
            if !commands::validate_file(&path, cli.json)? {
                std::process::exit(1);
            }
            Ok(())
        }

        Command::List { config } => {
            let config = commands::load_checked_config(&config)?;
            commands::list_workflows(&config, cli.json)
        }
    }
}
