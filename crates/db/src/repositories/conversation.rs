use sqlx::{sqlite::SqliteRow, Row};

use opsdesk_core::domain::conversation::{
    Conversation, ConversationId, ConversationKind, ConversationMessage, ConversationSummary,
    MessageRole,
};

use super::{parse_enum, parse_timestamp, ConversationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn message_from_row(row: SqliteRow) -> Result<ConversationMessage, RepositoryError> {
    let role: MessageRole = parse_enum("role", row.try_get("role")?)?;
    Ok(ConversationMessage {
        role,
        content: row.try_get("content")?,
        agent: row.try_get("agent")?,
        timestamp: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn summary_from_row(row: SqliteRow) -> Result<ConversationSummary, RepositoryError> {
    let kind: ConversationKind = parse_enum("kind", row.try_get("kind")?)?;
    let message_count: i64 = row.try_get("message_count")?;
    Ok(ConversationSummary {
        id: ConversationId(row.try_get("id")?),
        kind,
        supplier_id: row.try_get("supplier_id")?,
        message_count: usize::try_from(message_count).unwrap_or_default(),
        last_message: row.try_get("last_message")?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn find(&self, id: &ConversationId) -> Result<Option<Conversation>, RepositoryError> {
        let Some(header) = sqlx::query(
            "SELECT id, kind, supplier_id, created_at, updated_at FROM conversation WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let messages = sqlx::query(
            "SELECT role, content, agent, created_at
             FROM conversation_message
             WHERE conversation_id = ?
             ORDER BY id ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(message_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        let kind: ConversationKind = parse_enum("kind", header.try_get("kind")?)?;
        Ok(Some(Conversation {
            id: ConversationId(header.try_get("id")?),
            kind,
            supplier_id: header.try_get("supplier_id")?,
            messages,
            created_at: parse_timestamp("created_at", header.try_get("created_at")?)?,
            updated_at: parse_timestamp("updated_at", header.try_get("updated_at")?)?,
        }))
    }

    async fn append(
        &self,
        conversation: &Conversation,
        messages: &[ConversationMessage],
    ) -> Result<(), RepositoryError> {
        let updated_at = messages
            .last()
            .map(|message| message.timestamp)
            .unwrap_or(conversation.updated_at)
            .to_rfc3339();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO conversation (id, kind, supplier_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at",
        )
        .bind(&conversation.id.0)
        .bind(conversation.kind.as_str())
        .bind(&conversation.supplier_id)
        .bind(conversation.created_at.to_rfc3339())
        .bind(&updated_at)
        .execute(&mut *tx)
        .await?;

        for message in messages {
            sqlx::query(
                "INSERT INTO conversation_message (conversation_id, role, content, agent, created_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&conversation.id.0)
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(&message.agent)
            .bind(message.timestamp.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list(&self, limit: u32) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT c.id, c.kind, c.supplier_id, c.updated_at,
                    (SELECT COUNT(1) FROM conversation_message m WHERE m.conversation_id = c.id)
                        AS message_count,
                    (SELECT m.content FROM conversation_message m
                      WHERE m.conversation_id = c.id ORDER BY m.id DESC LIMIT 1) AS last_message
             FROM conversation c
             ORDER BY c.updated_at DESC
             LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(summary_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use opsdesk_core::domain::conversation::{
        Conversation, ConversationId, ConversationKind, ConversationMessage, MessageRole,
    };

    use super::SqlConversationRepository;
    use crate::repositories::ConversationRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn append_creates_then_extends_history() {
        let repo = SqlConversationRepository::new(setup().await);
        let conversation =
            Conversation::new(ConversationId("conv_abc".to_string()), ConversationKind::Consumer);

        repo.append(
            &conversation,
            &[
                ConversationMessage::user("Do you have toasters?"),
                ConversationMessage::agent("Yes, 15 in stock.").with_agent("customer"),
            ],
        )
        .await
        .expect("first append");
        repo.append(&conversation, &[ConversationMessage::user("Great, thanks")])
            .await
            .expect("second append");

        let stored = repo.find(&conversation.id).await.expect("find").expect("exists");
        assert_eq!(stored.messages.len(), 3);
        assert_eq!(stored.messages[1].role, MessageRole::Agent);
        assert_eq!(stored.messages[1].agent.as_deref(), Some("customer"));
        assert_eq!(stored.messages[2].content, "Great, thanks");
    }

    #[tokio::test]
    async fn list_reports_counts_and_last_message() {
        let repo = SqlConversationRepository::new(setup().await);
        let mut supplier_chat =
            Conversation::new(ConversationId("conv_sup".to_string()), ConversationKind::Supplier);
        supplier_chat.supplier_id = Some("sup-001".to_string());

        repo.append(&supplier_chat, &[ConversationMessage::user("We can ship 20 units")])
            .await
            .expect("append");

        let summaries = repo.list(10).await.expect("list");
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].kind, ConversationKind::Supplier);
        assert_eq!(summaries[0].supplier_id.as_deref(), Some("sup-001"));
        assert_eq!(summaries[0].message_count, 1);
        assert_eq!(summaries[0].last_message.as_deref(), Some("We can ship 20 units"));
    }

    #[tokio::test]
    async fn unknown_conversation_is_none() {
        let repo = SqlConversationRepository::new(setup().await);
        let found = repo.find(&ConversationId("conv_missing".to_string())).await.expect("find");
        assert!(found.is_none());
    }
}
