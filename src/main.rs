//! Agora CLI entry point.

use clap::Parser;

use agora::cli::{commands, handle_error, Cli, Commands};
use agora::infrastructure::config::ConfigLoader;
use agora::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            handle_error(&err, cli.json);
            std::process::exit(2);
        }
    };

    let logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("Warning: logging disabled: {err:#}");
            None
        }
    };

    let result = match cli.command {
        Commands::Serve(args) => commands::serve::execute(args, config, cli.json).await,
        Commands::Agent(args) => commands::agent::execute(args, config, cli.json).await,
        Commands::Conversation(args) => commands::conversation::execute(args, config, cli.json).await,
        Commands::Messages(args) => commands::messages::execute(args, config, cli.json).await,
        Commands::Grade(args) => commands::grade::execute(args, config, cli.json).await,
        Commands::Export(args) => commands::export::execute(args, config, cli.json).await,
    };

    let code = match result {
        Ok(()) => 0,
        Err(err) => {
            handle_error(&err, cli.json);
            1
        }
    };

    // Flush file logs before exiting; exiting here also avoids waiting on a
    // blocked stdin read left behind by `serve`.
    drop(logger);
    std::process::exit(code);
}
