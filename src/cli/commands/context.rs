//! Shared setup for commands: configuration, database and repositories.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::adapters::llm::{OpenAiChatGenerator, ScriptedGenerator};
use crate::adapters::sqlite::{
    initialize_database, PoolConfig, SqliteAgentRepository, SqliteConversationRepository, SqliteGradeRepository,
};
use crate::domain::models::{Agent, AgentId, Config};
use crate::domain::ports::{AgentRepository, TextGenerator};

pub struct AppContext {
    pub config: Config,
    pub agents: Arc<SqliteAgentRepository>,
    pub conversations: Arc<SqliteConversationRepository>,
    pub grades: Arc<SqliteGradeRepository>,
}

impl AppContext {
    /// Open (and migrate) the configured database.
    pub async fn open(config: Config) -> Result<Self> {
        let url = config.database.url();
        let pool = initialize_database(&url, Some(PoolConfig::from(&config.database)))
            .await
            .with_context(|| format!("Failed to initialize database at {}", config.database.path))?;

        Ok(Self {
            agents: Arc::new(SqliteAgentRepository::new(pool.clone())),
            conversations: Arc::new(SqliteConversationRepository::new(pool.clone())),
            grades: Arc::new(SqliteGradeRepository::new(pool)),
            config,
        })
    }

    /// The configured text generator, or a scripted echo generator for dry runs.
    pub fn text_generator(&self, dry_run: bool) -> Result<Arc<dyn TextGenerator>> {
        if dry_run {
            return Ok(Arc::new(ScriptedGenerator::echo()));
        }
        let generator = OpenAiChatGenerator::new(&self.config.llm)
            .context("Failed to configure text generator (set llm.api_key or OPENAI_API_KEY, or use --dry-run)")?;
        Ok(Arc::new(generator))
    }

    /// Look an agent up by numeric id or by name.
    pub async fn resolve_agent(&self, key: &str) -> Result<Agent> {
        let found = match key.parse::<i64>() {
            Ok(id) => self.agents.get(AgentId(id)).await?,
            Err(_) => None,
        };
        let found = match found {
            Some(agent) => Some(agent),
            None => self.agents.get_by_name(key).await?,
        };
        found.ok_or_else(|| anyhow::anyhow!("Agent not found: {key}"))
    }
}
