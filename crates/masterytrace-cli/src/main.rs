//! masterytrace CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

use commands::show::Source;

#[derive(Parser)]
#[command(
    name = "masterytrace",
    version,
    about = "Bayesian knowledge tracing over quiz catalogs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted session of attempts through the mastery engine
    Replay {
        /// Path to .toml catalog
        #[arg(long)]
        catalog: PathBuf,

        /// Path to .toml session script
        #[arg(long)]
        session: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// JSON store snapshot to seed from and write back to
        #[arg(long)]
        state: Option<PathBuf>,

        /// Output directory (defaults to the configured output_dir)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate catalog TOML files
    Validate {
        /// Path to catalog file or directory
        #[arg(long)]
        catalog: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show the effective BKT parameters of every skill
    Params {
        /// Path to .toml catalog
        #[arg(long)]
        catalog: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show mastery records stored in a snapshot or a saved replay report
    Show {
        /// JSON store snapshot
        #[arg(long, required_unless_present = "report", conflicts_with = "report")]
        state: Option<PathBuf>,

        /// JSON replay report
        #[arg(long)]
        report: Option<PathBuf>,

        /// Only show this user
        #[arg(long)]
        user: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example catalog
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("masterytrace=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replay {
            catalog,
            session,
            config,
            state,
            output,
        } => commands::replay::execute(catalog, session, config, state, output).await,
        Commands::Validate { catalog, config } => commands::validate::execute(catalog, config),
        Commands::Params { catalog, config } => commands::params::execute(catalog, config),
        Commands::Show {
            state,
            report,
            user,
            config,
        } => match (state, report) {
            (Some(state), _) => commands::show::execute(Source::State(state), user, config),
            (None, Some(report)) => commands::show::execute(Source::Report(report), user, config),
            (None, None) => Err(anyhow::anyhow!("either --state or --report is required")),
        },
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
