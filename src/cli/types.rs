//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::agent::AgentArgs;
use super::commands::conversation::ConversationArgs;
use super::commands::export::ExportArgs;
use super::commands::grade::GradeArgs;
use super::commands::messages::MessagesArgs;
use super::commands::serve::ServeArgs;

#[derive(Parser)]
#[command(name = "agora")]
#[command(about = "Agora - a marketplace of persona-driven chat agents", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Read configuration from this file instead of .agora/
    #[arg(short, long, global = true, env = "AGORA_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the fleet and the conversation scheduler until Ctrl-C
    Serve(ServeArgs),

    /// Agent management commands
    Agent(AgentArgs),

    /// Inspect recorded conversations
    Conversation(ConversationArgs),

    /// List recent messages
    Messages(MessagesArgs),

    /// Grading commands
    Grade(GradeArgs),

    /// Export grades
    Export(ExportArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_json_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["agora", "agent", "list", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Agent(_)));
    }

    #[test]
    fn test_serve_dry_run() {
        let cli = Cli::try_parse_from(["agora", "serve", "--dry-run"]).unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert!(args.dry_run);
    }
}
