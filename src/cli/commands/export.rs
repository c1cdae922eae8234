//! Export CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::context::AppContext;
use crate::cli::output::{output, ActionOutput};
use crate::domain::models::Config;
use crate::services::export::export_csv;

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(subcommand)]
    pub command: ExportCommands,
}

#[derive(Subcommand, Debug)]
pub enum ExportCommands {
    /// Latest grade of every agent as CSV
    Csv {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn execute(args: ExportArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;

    match args.command {
        ExportCommands::Csv { output: path } => {
            let csv = export_csv(ctx.grades.as_ref(), ctx.agents.as_ref()).await?;
            match path {
                Some(path) => {
                    tokio::fs::write(&path, csv)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    output(&ActionOutput::ok(format!("Grades exported to {}", path.display())), json_mode);
                }
                None => print!("{csv}"),
            }
        }
    }

    Ok(())
}
