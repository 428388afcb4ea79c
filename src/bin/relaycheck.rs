#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use clap::{Parser, Subcommand};
use relaycheck::lens::utils::OutputFormat;
use relaycheck::RelaycheckConfig;
use tracing::Level;

mod commands;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.relaycheck/relaycheck.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Output format: text (default), json, or json-pretty
    #[clap(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP lookup service
    Serve(commands::serve::ServeArgs),

    /// Check whether an IP address is an egress relay address
    Check(commands::check::CheckArgs),

    /// Refresh the local copy of the egress range list
    Refresh(commands::refresh::RefreshArgs),

    /// Show the state of the egress range cache
    Status,

    /// Show configuration and data file locations
    Config,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug {
        Level::DEBUG
    } else if matches!(cli.command, Commands::Serve(_)) {
        Level::INFO
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match RelaycheckConfig::new(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: unable to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let output_format = cli.format;

    let success = match cli.command {
        Commands::Serve(args) => commands::serve::run(&config, args),
        Commands::Check(args) => commands::check::run(&config, args, output_format),
        Commands::Refresh(args) => commands::refresh::run(&config, args, output_format),
        Commands::Status => commands::status::run(&config, output_format),
        Commands::Config => {
            commands::config::run(&config, cli.config.as_deref(), output_format);
            true
        }
    };

    if !success {
        std::process::exit(1);
    }
}
