//! SQLite implementation of the ConversationRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentId, AgentStats, AuthorKind, Conversation, ConversationId, ConversationKind, Message,
    MessageId, NewConversation, NewMessage, PairCounts, PairKey, PairTally,
};
use crate::domain::ports::{ConversationRepository, MessageFilter};

use super::{now_timestamp, parse_datetime, parse_optional_datetime, to_u32};

#[derive(Clone)]
pub struct SqliteConversationRepository {
    pool: SqlitePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationRepository for SqliteConversationRepository {
    async fn create_conversation(&self, conversation: &NewConversation) -> DomainResult<Conversation> {
        let row: ConversationRow = sqlx::query_as(
            r#"INSERT INTO conversations (channel_id, kind, initiator_id, responder_id, turn_count, started_at)
               VALUES (?, ?, ?, ?, 0, ?)
               RETURNING *"#
        )
        .bind(&conversation.channel_id)
        .bind(conversation.kind.as_str())
        .bind(conversation.initiator_id.map(|id| id.0))
        .bind(conversation.responder_id.map(|id| id.0))
        .bind(now_timestamp())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn end_conversation(&self, id: ConversationId, turn_count: u32) -> DomainResult<()> {
        let result = sqlx::query("UPDATE conversations SET ended_at = ?, turn_count = ? WHERE id = ?")
            .bind(now_timestamp())
            .bind(i64::from(turn_count))
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ConversationNotFound(id));
        }

        Ok(())
    }

    async fn get_conversation(&self, id: ConversationId) -> DomainResult<Option<Conversation>> {
        let row: Option<ConversationRow> = sqlx::query_as("SELECT * FROM conversations WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_conversations(&self, limit: u32) -> DomainResult<Vec<Conversation>> {
        let rows: Vec<ConversationRow> =
            sqlx::query_as("SELECT * FROM conversations ORDER BY started_at DESC, id DESC LIMIT ?")
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_agent_conversations(&self, agent_id: AgentId, limit: u32) -> DomainResult<Vec<Conversation>> {
        let rows: Vec<ConversationRow> = sqlx::query_as(
            r#"SELECT * FROM conversations
               WHERE initiator_id = ? OR responder_id = ?
               ORDER BY started_at DESC, id DESC LIMIT ?"#
        )
        .bind(agent_id.0)
        .bind(agent_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create_message(&self, message: &NewMessage) -> DomainResult<Message> {
        let row: MessageRow = sqlx::query_as(
            r#"INSERT INTO messages (conversation_id, agent_id, author_kind, author_name, content, external_id, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               RETURNING *"#
        )
        .bind(message.conversation_id.map(|id| id.0))
        .bind(message.agent_id.map(|id| id.0))
        .bind(message.author_kind.as_str())
        .bind(&message.author_name)
        .bind(&message.content)
        .bind(&message.external_id)
        .bind(now_timestamp())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_conversation_messages(&self, id: ConversationId) -> DomainResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as("SELECT * FROM messages WHERE conversation_id = ? ORDER BY id ASC")
            .bind(id.0)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_messages(&self, filter: MessageFilter) -> DomainResult<Vec<Message>> {
        let rows: Vec<MessageRow> = match filter.agent_id {
            Some(agent_id) => {
                sqlx::query_as("SELECT * FROM messages WHERE agent_id = ? ORDER BY id DESC LIMIT ?")
                    .bind(agent_id.0)
                    .bind(i64::from(filter.limit))
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM messages ORDER BY id DESC LIMIT ?")
                    .bind(i64::from(filter.limit))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn agent_stats(&self, agent_id: AgentId) -> DomainResult<AgentStats> {
        let (messages,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE agent_id = ?")
            .bind(agent_id.0)
            .fetch_one(&self.pool)
            .await?;

        let (conversations,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM conversations WHERE initiator_id = ? OR responder_id = ?")
                .bind(agent_id.0)
                .bind(agent_id.0)
                .fetch_one(&self.pool)
                .await?;

        let (human_interactions,): (i64,) = sqlx::query_as(
            r#"SELECT COUNT(DISTINCT conversation_id) FROM messages
               WHERE author_kind = 'human' AND conversation_id IN (
                   SELECT id FROM conversations WHERE initiator_id = ? OR responder_id = ?
               )"#
        )
        .bind(agent_id.0)
        .bind(agent_id.0)
        .fetch_one(&self.pool)
        .await?;

        Ok(AgentStats { messages, conversations, human_interactions })
    }

    async fn get_pair_counts(&self) -> DomainResult<PairCounts> {
        let rows: Vec<(i64, i64, i64)> =
            sqlx::query_as("SELECT agent_a_id, agent_b_id, conversation_count FROM conversation_pairs")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(a, b, count)| (PairKey::new(AgentId(a), AgentId(b)), u64::try_from(count).unwrap_or(0)))
            .collect())
    }

    async fn list_pair_tallies(&self) -> DomainResult<Vec<PairTally>> {
        let rows: Vec<PairRow> = sqlx::query_as(
            "SELECT * FROM conversation_pairs ORDER BY conversation_count DESC, agent_a_id, agent_b_id"
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn increment_pair(&self, a: AgentId, b: AgentId) -> DomainResult<()> {
        if a == b {
            return Err(DomainError::ValidationFailed(format!("cannot pair agent {a} with itself")));
        }
        let key = PairKey::new(a, b);
        let now = now_timestamp();

        sqlx::query(
            r#"INSERT INTO conversation_pairs (agent_a_id, agent_b_id, conversation_count, last_conversation_at)
               VALUES (?, ?, 1, ?)
               ON CONFLICT(agent_a_id, agent_b_id)
               DO UPDATE SET conversation_count = conversation_count + 1, last_conversation_at = excluded.last_conversation_at"#
        )
        .bind(key.low().0)
        .bind(key.high().0)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: i64,
    channel_id: Option<String>,
    kind: String,
    initiator_id: Option<i64>,
    responder_id: Option<i64>,
    turn_count: i64,
    started_at: String,
    ended_at: Option<String>,
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = DomainError;

    fn try_from(row: ConversationRow) -> Result<Self, Self::Error> {
        let kind = ConversationKind::parse_str(&row.kind)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid conversation kind: {}", row.kind)))?;

        Ok(Conversation {
            id: ConversationId(row.id),
            channel_id: row.channel_id,
            kind,
            initiator_id: row.initiator_id.map(AgentId),
            responder_id: row.responder_id.map(AgentId),
            turn_count: to_u32(row.turn_count, "turn_count")?,
            started_at: parse_datetime(&row.started_at)?,
            ended_at: parse_optional_datetime(row.ended_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    conversation_id: Option<i64>,
    agent_id: Option<i64>,
    author_kind: String,
    author_name: String,
    content: String,
    external_id: Option<String>,
    created_at: String,
}

impl TryFrom<MessageRow> for Message {
    type Error = DomainError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let author_kind = AuthorKind::parse_str(&row.author_kind)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid author kind: {}", row.author_kind)))?;

        Ok(Message {
            id: MessageId(row.id),
            conversation_id: row.conversation_id.map(ConversationId),
            agent_id: row.agent_id.map(AgentId),
            author_kind,
            author_name: row.author_name,
            content: row.content,
            external_id: row.external_id,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PairRow {
    agent_a_id: i64,
    agent_b_id: i64,
    conversation_count: i64,
    last_conversation_at: String,
}

impl TryFrom<PairRow> for PairTally {
    type Error = DomainError;

    fn try_from(row: PairRow) -> Result<Self, Self::Error> {
        Ok(PairTally {
            pair: PairKey::new(AgentId(row.agent_a_id), AgentId(row.agent_b_id)),
            conversation_count: u64::try_from(row.conversation_count)
                .map_err(|_| DomainError::SerializationError(format!("negative pair count: {}", row.conversation_count)))?,
            last_conversation_at: parse_datetime(&row.last_conversation_at)?,
        })
    }
}
