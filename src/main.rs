use clap::{Parser, Subcommand};
use tracing::error;

use flashgate::config::{load_config, print_schema};
use flashgate::startup::{self, Command};
use flashgate::state::ClientState;
use flashgate::utils::logger::init_logging;

#[derive(Parser)]
#[command(name = "flashgate")]
#[command(about = "Command-line client for the flashcards API")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, env = "FLASHGATE_CONFIG", default_value = "./config.yaml")]
    config: String,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Print the JSON schema of the configuration file
    Schema,

    #[command(flatten)]
    Api(Command),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let command = match cli.command {
        CliCommand::Schema => {
            if let Err(e) = print_schema() {
                eprintln!("Failed to print schema: {}", e);
                std::process::exit(1);
            }
            return;
        }
        CliCommand::Api(command) => command,
    };

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from '{}': {}", cli.config, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialise logging: {}", e);
        std::process::exit(1);
    }

    let state = match ClientState::new(config) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to set up client: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = startup::run(state, command).await {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
