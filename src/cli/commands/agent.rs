//! Agent CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use comfy_table::Cell;
use serde::Serialize;

use crate::cli::commands::context::AppContext;
use crate::cli::output::{output, truncate, ActionOutput, CommandOutput};
use crate::cli::table::{active_cell, table_with_header};
use crate::domain::models::{Agent, AgentStats, AgentUpdate, Config, Grade, NewAgent};
use crate::domain::ports::{AgentRepository, ConversationRepository, GradeRepository};

#[derive(Args, Debug)]
pub struct AgentArgs {
    #[command(subcommand)]
    pub command: AgentCommands,
}

#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// Register a new agent
    Add {
        /// Display name in the shared channel
        name: String,
        /// Person who owns the agent
        #[arg(short, long)]
        owner: String,
        /// Credential for the agent's channel connection
        #[arg(long, env = "AGORA_AGENT_CREDENTIAL", default_value = "")]
        credential: String,
        /// Personality description
        #[arg(short, long)]
        personality: Option<String>,
        /// Marketing objective
        #[arg(long)]
        objective: Option<String>,
        /// Behavior rules
        #[arg(short, long)]
        rules: Option<String>,
    },
    /// List agents
    List {
        /// Show only active agents
        #[arg(long)]
        active_only: bool,
    },
    /// Show agent details and activity
    Show {
        /// Agent id or name
        agent: String,
    },
    /// Edit an agent
    Update {
        /// Agent id or name
        agent: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        credential: Option<String>,
        #[arg(long)]
        personality: Option<String>,
        #[arg(long)]
        objective: Option<String>,
        #[arg(long)]
        rules: Option<String>,
    },
    /// Delete an agent and its grades
    Remove {
        /// Agent id or name
        agent: String,
    },
    /// Let the agent join the fleet
    Activate {
        /// Agent id or name
        agent: String,
    },
    /// Take the agent out of the fleet
    Deactivate {
        /// Agent id or name
        agent: String,
    },
}

#[derive(Debug, Serialize)]
pub struct AgentOutput {
    pub id: i64,
    pub name: String,
    pub owner: String,
    pub active: bool,
    pub objective: String,
    pub created_at: String,
}

impl From<&Agent> for AgentOutput {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id.0,
            name: agent.name.clone(),
            owner: agent.owner_name.clone(),
            active: agent.is_active,
            objective: agent.objective.clone(),
            created_at: agent.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AgentListOutput {
    pub agents: Vec<AgentOutput>,
    pub total: usize,
}

impl CommandOutput for AgentListOutput {
    fn to_human(&self) -> String {
        if self.agents.is_empty() {
            return "No agents found.".to_string();
        }

        let mut table = table_with_header(&["ID", "Name", "Owner", "Status", "Objective"]);
        for agent in &self.agents {
            table.add_row(vec![
                Cell::new(agent.id),
                Cell::new(&agent.name),
                Cell::new(&agent.owner),
                active_cell(agent.active),
                Cell::new(truncate(&agent.objective, 50)),
            ]);
        }
        format!("Found {} agent(s):\n{table}", self.total)
    }
}

#[derive(Debug, Serialize)]
pub struct AgentDetailOutput {
    pub agent: AgentOutput,
    pub personality: String,
    pub behavior_rules: String,
    pub stats: AgentStats,
    pub latest_grade: Option<Grade>,
}

impl CommandOutput for AgentDetailOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Agent: {}", self.agent.name),
            format!("ID: {}", self.agent.id),
            format!("Owner: {}", self.agent.owner),
            format!("Status: {}", if self.agent.active { "active" } else { "inactive" }),
            format!("Created: {}", self.agent.created_at),
        ];

        for (label, value) in [
            ("Personality", &self.personality),
            ("Objective", &self.agent.objective),
            ("Behavior rules", &self.behavior_rules),
        ] {
            if !value.is_empty() {
                lines.push(format!("\n{label}: {value}"));
            }
        }

        lines.push("\nActivity:".to_string());
        lines.push(format!("  Messages:           {}", self.stats.messages));
        lines.push(format!("  Conversations:      {}", self.stats.conversations));
        lines.push(format!("  Human interactions: {}", self.stats.human_interactions));

        if let Some(grade) = &self.latest_grade {
            lines.push(format!("\nLatest grade: {:.1} (run {})", grade.overall_score, grade.run_id));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: AgentArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;

    match args.command {
        AgentCommands::Add { name, owner, credential, personality, objective, rules } => {
            let new_agent = NewAgent::new(owner, name, credential)
                .with_personality(personality.unwrap_or_default())
                .with_objective(objective.unwrap_or_default())
                .with_behavior_rules(rules.unwrap_or_default());
            let agent = ctx.agents.create(&new_agent).await?;
            tracing::info!(agent_id = %agent.id, agent = %agent.name, "agent registered");
            output(&ActionOutput::ok(format!("Agent registered: {} (id {})", agent.name, agent.id)), json_mode);
        }

        AgentCommands::List { active_only } => {
            let agents = if active_only { ctx.agents.get_active().await? } else { ctx.agents.list().await? };
            let out = AgentListOutput { total: agents.len(), agents: agents.iter().map(AgentOutput::from).collect() };
            output(&out, json_mode);
        }

        AgentCommands::Show { agent } => {
            let agent = ctx.resolve_agent(&agent).await?;
            let stats = ctx.conversations.agent_stats(agent.id).await?;
            let latest_grade = ctx.grades.list_for_agent(agent.id).await?.into_iter().next();
            let out = AgentDetailOutput {
                agent: AgentOutput::from(&agent),
                personality: agent.personality.clone(),
                behavior_rules: agent.behavior_rules.clone(),
                stats,
                latest_grade,
            };
            output(&out, json_mode);
        }

        AgentCommands::Update { agent, name, owner, credential, personality, objective, rules } => {
            let agent = ctx.resolve_agent(&agent).await?;
            let update = AgentUpdate {
                owner_name: owner,
                name,
                credential,
                personality,
                objective,
                behavior_rules: rules,
                is_active: None,
            };
            if update.is_empty() {
                anyhow::bail!("Nothing to update: pass at least one field");
            }
            set_fields(&ctx, &agent, &update, "updated", json_mode).await?;
        }

        AgentCommands::Remove { agent } => {
            let agent = ctx.resolve_agent(&agent).await?;
            ctx.agents.delete(agent.id).await?;
            tracing::info!(agent_id = %agent.id, agent = %agent.name, "agent removed");
            output(&ActionOutput::ok(format!("Agent removed: {}", agent.name)), json_mode);
        }

        AgentCommands::Activate { agent } => {
            let agent = ctx.resolve_agent(&agent).await?;
            let update = AgentUpdate { is_active: Some(true), ..Default::default() };
            set_fields(&ctx, &agent, &update, "activated", json_mode).await?;
        }

        AgentCommands::Deactivate { agent } => {
            let agent = ctx.resolve_agent(&agent).await?;
            let update = AgentUpdate { is_active: Some(false), ..Default::default() };
            set_fields(&ctx, &agent, &update, "deactivated", json_mode).await?;
        }
    }

    Ok(())
}

/// Apply an update. A running `serve` picks the change up on its next fleet sync.
async fn set_fields(ctx: &AppContext, agent: &Agent, update: &AgentUpdate, verb: &str, json_mode: bool) -> Result<()> {
    let updated = ctx
        .agents
        .update(agent.id, update)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Agent not found: {}", agent.id))?;
    tracing::info!(agent_id = %updated.id, agent = %updated.name, verb, "agent changed");
    output(&ActionOutput::ok(format!("Agent {verb}: {}", updated.name)), json_mode);
    Ok(())
}
