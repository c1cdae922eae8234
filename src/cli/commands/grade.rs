//! Grading CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::Cell;
use serde::Serialize;
use std::collections::HashMap;

use crate::cli::commands::context::AppContext;
use crate::cli::output::{output, truncate, CommandOutput};
use crate::cli::table::{score_cell, table_with_header};
use crate::domain::models::{AgentId, Config, Grade};
use crate::domain::ports::{AgentRepository, GradeRepository};
use crate::services::grading::{new_run_id, GradeEvaluator};

#[derive(Args, Debug)]
pub struct GradeArgs {
    #[command(subcommand)]
    pub command: GradeCommands,
}

#[derive(Subcommand, Debug)]
pub enum GradeCommands {
    /// Grade every active agent now
    Run {
        /// Use the scripted generator instead of the configured backend
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the latest grade of every agent, best first
    Leaderboard,
}

#[derive(Debug, Serialize)]
pub struct GradeRow {
    pub rank: usize,
    pub agent: String,
    #[serde(flatten)]
    pub grade: Grade,
}

#[derive(Debug, Serialize)]
pub struct GradeTableOutput {
    pub run_id: Option<String>,
    pub grades: Vec<GradeRow>,
}

impl CommandOutput for GradeTableOutput {
    fn to_human(&self) -> String {
        if self.grades.is_empty() {
            return "No grades yet.".to_string();
        }

        let mut table = table_with_header(&[
            "#", "Agent", "Overall", "Objective", "Quality", "Human", "Volume", "Msgs", "Reasoning",
        ]);
        for row in &self.grades {
            let g = &row.grade;
            table.add_row(vec![
                Cell::new(row.rank),
                Cell::new(&row.agent),
                score_cell(g.overall_score),
                Cell::new(format!("{:.0}", g.objective_score)),
                Cell::new(format!("{:.0}", g.quality_score)),
                Cell::new(format!("{:.0}", g.human_score)),
                Cell::new(format!("{:.0}", g.volume_score)),
                Cell::new(g.total_messages),
                Cell::new(truncate(&g.reasoning, 60)),
            ]);
        }
        match &self.run_id {
            Some(run_id) => format!("Grading run {run_id}:\n{table}"),
            None => table.to_string(),
        }
    }
}

async fn rows(ctx: &AppContext, grades: Vec<Grade>) -> Result<Vec<GradeRow>> {
    let names: HashMap<AgentId, String> = ctx.agents.list().await?.into_iter().map(|a| (a.id, a.name)).collect();
    let mut sorted = grades;
    sorted.sort_by(|a, b| b.overall_score.total_cmp(&a.overall_score));
    Ok(sorted
        .into_iter()
        .enumerate()
        .map(|(i, grade)| GradeRow {
            rank: i + 1,
            agent: names.get(&grade.agent_id).cloned().unwrap_or_else(|| "Unknown".to_string()),
            grade,
        })
        .collect())
}

pub async fn execute(args: GradeArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;

    match args.command {
        GradeCommands::Run { dry_run } => {
            let evaluator = GradeEvaluator::new(
                ctx.agents.clone(),
                ctx.conversations.clone(),
                ctx.grades.clone(),
                ctx.text_generator(dry_run)?,
            );
            let run_id = new_run_id();
            let grades = evaluator.grade_all(&run_id).await.context("Grading run failed")?;
            let out = GradeTableOutput { grades: rows(&ctx, grades).await?, run_id: Some(run_id) };
            output(&out, json_mode);
        }

        GradeCommands::Leaderboard => {
            let latest = ctx.grades.latest_per_agent().await?;
            let out = GradeTableOutput { run_id: None, grades: rows(&ctx, latest).await? };
            output(&out, json_mode);
        }
    }

    Ok(())
}
