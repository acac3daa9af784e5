use sqlx::{sqlite::SqliteRow, Row};

use opsdesk_core::domain::activity::AgentActivity;

use super::{parse_timestamp, ActivityRepository, RepositoryError};
use crate::DbPool;

pub struct SqlActivityRepository {
    pool: DbPool,
}

impl SqlActivityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn activity_from_row(row: SqliteRow) -> Result<AgentActivity, RepositoryError> {
    Ok(AgentActivity {
        agent_name: row.try_get("agent_name")?,
        action: row.try_get("action")?,
        details: row.try_get("details")?,
        conversation_id: row.try_get("conversation_id")?,
        order_id: row.try_get("order_id")?,
        timestamp: parse_timestamp("created_at", row.try_get("created_at")?)?,
        success: row.try_get("success")?,
    })
}

#[async_trait::async_trait]
impl ActivityRepository for SqlActivityRepository {
    async fn record(&self, activity: &AgentActivity) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO agent_activity (agent_name, action, details, conversation_id, order_id,
                                         success, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&activity.agent_name)
        .bind(&activity.action)
        .bind(&activity.details)
        .bind(&activity.conversation_id)
        .bind(&activity.order_id)
        .bind(activity.success)
        .bind(activity.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<AgentActivity>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT agent_name, action, details, conversation_id, order_id, success, created_at
             FROM agent_activity
             ORDER BY id DESC
             LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(activity_from_row).collect()
    }
}
