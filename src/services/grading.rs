//! Rubric grading of agents by the text generator.

use serde::Deserialize;
use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, AgentStats, CompletionRequest, Grade, LiveEvent, NewGrade, PromptMessage, RubricScores};
use crate::domain::ports::{AgentRepository, ConversationRepository, GradeRepository, LiveUpdateSink, NullSink, TextGenerator};

/// Conversations sampled per agent.
pub const SAMPLE_CONVERSATIONS: u32 = 5;
/// Characters kept from each sampled message.
pub const SAMPLE_MESSAGE_CHARS: usize = 200;

const GRADING_MAX_TOKENS: u32 = 512;
const GRADING_TEMPERATURE: f32 = 0.2;

pub const GRADING_SYSTEM_PROMPT: &str = r#"You are an expert evaluator for an electronic marketing course.
Students have created AI-powered marketing bots that converse autonomously in a shared marketplace channel.
Your job is to grade each bot on how well it performs its stated marketing objective.

Respond ONLY with valid JSON in this exact format:
{
  "objective_score": <0-100>,
  "quality_score": <0-100>,
  "human_score": <0-100>,
  "volume_score": <0-100>,
  "reasoning": "<2-4 sentences explaining scores>"
}
"#;

const NOT_SPECIFIED: &str = "(not specified)";

fn or_unspecified(value: &str) -> &str {
    if value.is_empty() {
        NOT_SPECIFIED
    } else {
        value
    }
}

/// User prompt for one agent.
pub fn grading_user_prompt(agent: &Agent, stats: &AgentStats, sample_conversations: &str) -> String {
    let samples = if sample_conversations.is_empty() { "(no conversations yet)" } else { sample_conversations };
    format!(
        "Grade the following bot:

**Bot Name:** {name}
**Owner:** {owner}
**Stated Marketing Objective:** {objective}
**Personality Description:** {personality}
**Behavior Rules:** {rules}

**Statistics:**
- Total messages sent: {messages}
- Total conversations: {conversations}
- Human interactions: {human}

**Sample Conversations (most recent):**
{samples}

**Scoring Criteria:**

1. **Objective Achievement (0-100):** How well does the bot's conversation content align with and advance its stated marketing objective?

2. **Conversation Quality (0-100):** Are responses coherent, engaging, on-brand, and natural? Does the bot maintain its personality consistently?

3. **Human Interaction (0-100):** How well does the bot engage with human users? Score 50 if no human interactions occurred (neutral).

4. **Volume & Activity (0-100):** Based on message count relative to class norms. Score proportionally: 0 msgs=0, 10+=30, 25+=60, 50+=80, 100+=100.
",
        name = agent.name,
        owner = agent.owner_name,
        objective = or_unspecified(&agent.objective),
        personality = or_unspecified(&agent.personality),
        rules = or_unspecified(&agent.behavior_rules),
        messages = stats.messages,
        conversations = stats.conversations,
        human = stats.human_interactions,
    )
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let body = trimmed.split_once('\n').map_or("", |(_, rest)| rest);
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScoreResponse {
    objective_score: f64,
    quality_score: f64,
    human_score: f64,
    volume_score: f64,
    reasoning: String,
}

/// Scores and reasoning parsed from a grader reply. Unparseable replies
/// score zero with the reply quoted in the reasoning.
pub fn parse_scores(raw: &str) -> (RubricScores, String) {
    let body = strip_code_fence(raw);
    match serde_json::from_str::<ScoreResponse>(body) {
        Ok(r) => (
            RubricScores {
                objective: r.objective_score,
                quality: r.quality_score,
                human: r.human_score,
                volume: r.volume_score,
            },
            r.reasoning,
        ),
        Err(e) => {
            tracing::error!(error = %e, response = %body, "failed to parse grading response");
            let quoted: String = body.chars().take(200).collect();
            (RubricScores::default(), format!("Parse error: {quoted}"))
        }
    }
}

/// Fresh grading run id.
pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub struct GradeEvaluator {
    agents: Arc<dyn AgentRepository>,
    conversations: Arc<dyn ConversationRepository>,
    grades: Arc<dyn GradeRepository>,
    generator: Arc<dyn TextGenerator>,
    live: Arc<dyn LiveUpdateSink>,
}

impl GradeEvaluator {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        conversations: Arc<dyn ConversationRepository>,
        grades: Arc<dyn GradeRepository>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self { agents, conversations, grades, generator, live: Arc::new(NullSink) }
    }

    pub fn with_live_updates(mut self, live: Arc<dyn LiveUpdateSink>) -> Self {
        self.live = live;
        self
    }

    /// Grade every active agent under `run_id`. An agent whose grading fails
    /// is logged and left out of the result.
    pub async fn grade_all(&self, run_id: &str) -> DomainResult<Vec<Grade>> {
        let agents = self.agents.get_active().await?;
        tracing::info!(run_id, agents = agents.len(), "grading run started");

        let mut results = Vec::with_capacity(agents.len());
        for agent in &agents {
            match self.grade_agent(agent, run_id).await {
                Ok(grade) => results.push(grade),
                Err(e) => tracing::error!(run_id, agent_id = %agent.id, agent = %agent.name, error = %e, "failed to grade agent"),
            }
        }

        self.live.notify(LiveEvent::GradingComplete { run_id: run_id.to_string(), graded: results.len() });
        tracing::info!(run_id, graded = results.len(), "grading run complete");
        Ok(results)
    }

    pub async fn grade_agent(&self, agent: &Agent, run_id: &str) -> DomainResult<Grade> {
        let stats = self.conversations.agent_stats(agent.id).await?;
        let samples = self.sample_conversations(agent).await?;

        let request = CompletionRequest::new(
            vec![
                PromptMessage::system(GRADING_SYSTEM_PROMPT),
                PromptMessage::user(grading_user_prompt(agent, &stats, &samples)),
            ],
            GRADING_MAX_TOKENS,
            GRADING_TEMPERATURE,
        );
        let raw = self.generator.complete(request).await?;
        let raw = if raw.trim().is_empty() { "{}".to_string() } else { raw };
        let (scores, reasoning) = parse_scores(&raw);

        let grade = self
            .grades
            .create(&NewGrade {
                agent_id: agent.id,
                run_id: run_id.to_string(),
                scores,
                reasoning,
                total_messages: stats.messages,
                total_conversations: stats.conversations,
                human_interactions: stats.human_interactions,
            })
            .await?;

        tracing::info!(
            run_id,
            agent_id = %agent.id,
            agent = %agent.name,
            overall = grade.overall_score,
            objective = scores.objective,
            quality = scores.quality,
            human = scores.human,
            volume = scores.volume,
            "agent graded"
        );
        Ok(grade)
    }

    async fn sample_conversations(&self, agent: &Agent) -> DomainResult<String> {
        let conversations = self.conversations.list_agent_conversations(agent.id, SAMPLE_CONVERSATIONS).await?;

        let mut parts = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let messages = self.conversations.get_conversation_messages(conversation.id).await?;
            if messages.is_empty() {
                continue;
            }
            let mut lines = vec![format!("[{} conversation #{}]", conversation.kind, conversation.id)];
            for m in &messages {
                let content: String = m.content.chars().take(SAMPLE_MESSAGE_CHARS).collect();
                lines.push(format!("  {}: {content}", m.author_name));
            }
            parts.push(lines.join("\n"));
        }
        Ok(parts.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::llm::ScriptedGenerator;
    use crate::adapters::sqlite::{
        create_migrated_test_pool, SqliteAgentRepository, SqliteConversationRepository, SqliteGradeRepository,
    };
    use crate::domain::models::{NewConversation, NewMessage};
    use crate::services::live_updates::LiveUpdateBus;
    use crate::services::test_support::create_agent;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("  {\"a\": 1}  "), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n{}```"), "{}");
    }

    #[test]
    fn test_parse_scores_with_missing_fields() {
        let (scores, reasoning) = parse_scores(r#"{"objective_score": 80, "quality_score": 70.5}"#);
        assert!((scores.objective - 80.0).abs() < f64::EPSILON);
        assert!((scores.quality - 70.5).abs() < f64::EPSILON);
        assert!(scores.human.abs() < f64::EPSILON);
        assert_eq!(reasoning, "");
    }

    #[test]
    fn test_parse_failure_scores_zero() {
        let raw = "I refuse. ".repeat(50);
        let (scores, reasoning) = parse_scores(&raw);
        assert_eq!(scores, RubricScores::default());
        assert!(reasoning.starts_with("Parse error: I refuse."));
        assert_eq!(reasoning.chars().count(), "Parse error: ".len() + 200);
    }

    #[test]
    fn test_user_prompt_fills_placeholders() {
        let agent = crate::services::test_support::agent(1, "LatteBot");
        let prompt = grading_user_prompt(&agent, &AgentStats { messages: 12, conversations: 3, human_interactions: 0 }, "");
        assert!(prompt.contains("**Bot Name:** LatteBot"));
        assert!(prompt.contains("**Stated Marketing Objective:** (not specified)"));
        assert!(prompt.contains("- Total messages sent: 12"));
        assert!(prompt.contains("(no conversations yet)"));
    }

    #[tokio::test]
    async fn test_grade_all_persists_and_skips_failures() {
        let pool = create_migrated_test_pool().await.unwrap();
        let agents = Arc::new(SqliteAgentRepository::new(pool.clone()));
        let conversations = Arc::new(SqliteConversationRepository::new(pool.clone()));
        let grades = Arc::new(SqliteGradeRepository::new(pool));

        let alpha = create_agent(agents.as_ref(), "Alpha").await;
        create_agent(agents.as_ref(), "Beta").await;

        let conv = conversations
            .create_conversation(&NewConversation::with_human(None, alpha.id))
            .await
            .unwrap();
        conversations
            .create_message(&NewMessage::from_bot(conv.id, alpha.id, "Alpha", "x".repeat(500), None))
            .await
            .unwrap();

        // Active agents are graded in name order: Alpha succeeds, Beta fails.
        let generator = Arc::new(ScriptedGenerator::failing());
        generator.push_reply(
            "```json\n{\"objective_score\": 90, \"quality_score\": 80, \"human_score\": 50, \"volume_score\": 10, \"reasoning\": \"Solid.\"}\n```",
        );
        let bus = Arc::new(LiveUpdateBus::default());
        let mut feed = bus.subscribe();
        let evaluator = GradeEvaluator::new(agents, conversations, grades.clone(), generator.clone())
            .with_live_updates(bus.clone());

        let run_id = new_run_id();
        let graded = evaluator.grade_all(&run_id).await.unwrap();

        assert_eq!(graded.len(), 1);
        let grade = &graded[0];
        assert_eq!(grade.agent_id, alpha.id);
        assert_eq!(grade.reasoning, "Solid.");
        assert_eq!(grade.total_messages, 1);
        let expected = 90.0 * 0.35 + 80.0 * 0.30 + 50.0 * 0.20 + 10.0 * 0.15;
        assert!((grade.overall_score - expected).abs() < 1e-9);

        let request = &generator.requests()[0];
        assert!((request.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(request.max_tokens, 512);
        let sample_line = format!("  Alpha: {}", "x".repeat(200));
        assert!(request.messages[1].content.contains(&sample_line));
        assert!(!request.messages[1].content.contains(&"x".repeat(201)));

        assert_eq!(grades.list_by_run(&run_id).await.unwrap().len(), 1);
        let update = feed.try_recv().unwrap();
        assert_eq!(update.event, LiveEvent::GradingComplete { run_id, graded: 1 });
    }
}
