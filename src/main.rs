mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sigspan::diagnostics;

#[derive(Parser)]
#[command(name = "sigspan", version, about = "Locate signed comments in wiki discussion source")]
struct Cli {
    /// Config file to use instead of `.sigspan.toml` in the current directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Locate a comment in a wikitext file (exit 1 if not found, 2 if ambiguous, 3 on bad input)
    Locate {
        /// Wikitext source file
        file: PathBuf,
        /// Target descriptor: inline JSON or a path to a JSON file
        #[arg(long)]
        target: String,
        /// Output the resolved span as JSON
        #[arg(long)]
        json: bool,
    },
    /// Find the revision whose diff added a comment
    Origin {
        /// JSON request with `target` and `revisions`
        request: PathBuf,
        /// Output the revision as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the signatures in a file or in every .wiki/.txt file under a directory
    Scan {
        /// File or directory to scan
        path: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| return EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let config = match commands::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            diagnostics::print_error(&e);
            return commands::exit_code_for(&e);
        },
    };

    let result = match cli.command {
        Commands::Locate { file, target, json } => commands::locate(&file, &target, json, &config),
        Commands::Origin { request, json } => commands::origin(&request, json, &config),
        Commands::Scan { path, json } => commands::scan(&path, json, &config),
    };

    return result.unwrap_or_else(|e| {
        diagnostics::print_error(&e);
        return commands::exit_code_for(&e);
    });
}
