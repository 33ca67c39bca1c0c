//! metacfg CLI: run configuration passes over package declaration trees.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "metacfg", version, about = "Embedded configuration object model")]
struct Cli {
    /// Log registrations and hook activity to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load packages (and their imports) and check every declaration
    Check {
        /// Package tree root
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Dotted package names
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Run a configuration pass for a user configuration file
    Configure {
        /// Package tree root
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// User configuration (.cfg.toml)
        config: PathBuf,
        /// Print the sealed configuration as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the composed descriptor of a module or interface
    Inspect {
        /// Package tree root
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Qualified module name (e.g., ti.platforms.tiva.Platform)
        qualified: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

/// `METACFG_LOG` takes precedence; otherwise `warn`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("METACFG_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Check { root, packages } => commands::check::run(&root, &packages),
        Commands::Configure { root, config, json } => commands::configure::run(&root, &config, json),
        Commands::Inspect {
            root,
            qualified,
            json,
        } => commands::inspect::run(&root, &qualified, json),
    }
}
