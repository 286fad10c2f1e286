use buybye_cli::{cmd, config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "buybye",
    about = "Serve and inspect the buybye synchronization engine",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: nearest buybye.yaml, upward from the current directory)
    #[arg(long, global = true, env = "BUYBYE_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Override server.port
        #[arg(long, short = 'p')]
        port: Option<u16>,
    },

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate the config and the rule set
    Check,

    /// List the rules, or show one in full
    Syncs {
        /// Sync name
        name: Option<String>,
    },

    /// List every concept route and how it is served
    Routes {
        /// Only routes served directly, bypassing the rules
        #[arg(long)]
        direct: bool,
    },

    /// Serve a single call in-process and print the reply
    Call {
        /// Full route, e.g. /api/UserAuth/signup
        route: String,
        /// JSON object body
        #[arg(long, short = 'b')]
        body: Option<String>,
        /// Print the run's occurrence log and rule firings to stderr
        #[arg(long)]
        trace: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = config::resolve_config_path(cli.config.as_deref());

    let result = match cli.command {
        Commands::Serve { port } => cmd::serve::run(&config_path, port),
        Commands::Init { force } => cmd::init::run(&config_path, force),
        Commands::Check => cmd::check::run(&config_path, cli.json),
        Commands::Syncs { name } => cmd::syncs::run(&config_path, name.as_deref(), cli.json),
        Commands::Routes { direct } => cmd::routes::run(&config_path, direct, cli.json),
        Commands::Call { route, body, trace } => {
            cmd::call::run(&config_path, &route, body.as_deref(), trace)
        }
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
