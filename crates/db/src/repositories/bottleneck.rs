use sqlx::{sqlite::SqliteRow, Row};

use opsdesk_core::domain::bottleneck::{Bottleneck, BottleneckSeverity, BottleneckType};

use super::{
    json_list, parse_enum, parse_json_list, parse_optional_timestamp, parse_timestamp,
    BottleneckRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlBottleneckRepository {
    pool: DbPool,
}

impl SqlBottleneckRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const BOTTLENECK_COLUMNS: &str = "id, kind, severity, title, description, affected_resources_json,
     suggested_actions_json, is_resolved, detected_at, resolved_at";

fn bottleneck_from_row(row: SqliteRow) -> Result<Bottleneck, RepositoryError> {
    let kind: BottleneckType = parse_enum("kind", row.try_get("kind")?)?;
    let severity: BottleneckSeverity = parse_enum("severity", row.try_get("severity")?)?;
    Ok(Bottleneck {
        id: row.try_get("id")?,
        kind,
        severity,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        affected_resources: parse_json_list(
            "affected_resources_json",
            row.try_get("affected_resources_json")?,
        )?,
        suggested_actions: parse_json_list(
            "suggested_actions_json",
            row.try_get("suggested_actions_json")?,
        )?,
        is_resolved: row.try_get("is_resolved")?,
        detected_at: parse_timestamp("detected_at", row.try_get("detected_at")?)?,
        resolved_at: parse_optional_timestamp("resolved_at", row.try_get("resolved_at")?)?,
    })
}

#[async_trait::async_trait]
impl BottleneckRepository for SqlBottleneckRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Bottleneck>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {BOTTLENECK_COLUMNS} FROM bottleneck WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(bottleneck_from_row).transpose()
    }

    async fn save(&self, bottleneck: &Bottleneck) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO bottleneck (id, kind, severity, title, description,
                                     affected_resources_json, suggested_actions_json,
                                     is_resolved, detected_at, resolved_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 severity = excluded.severity,
                 description = excluded.description,
                 affected_resources_json = excluded.affected_resources_json,
                 suggested_actions_json = excluded.suggested_actions_json,
                 is_resolved = excluded.is_resolved,
                 resolved_at = excluded.resolved_at",
        )
        .bind(&bottleneck.id)
        .bind(bottleneck.kind.as_str())
        .bind(bottleneck.severity.as_str())
        .bind(&bottleneck.title)
        .bind(&bottleneck.description)
        .bind(json_list(&bottleneck.affected_resources)?)
        .bind(json_list(&bottleneck.suggested_actions)?)
        .bind(bottleneck.is_resolved)
        .bind(bottleneck.detected_at.to_rfc3339())
        .bind(bottleneck.resolved_at.map(|at| at.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, active_only: bool, limit: u32) -> Result<Vec<Bottleneck>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {BOTTLENECK_COLUMNS}
             FROM bottleneck
             WHERE (? = 0 OR is_resolved = 0)
             ORDER BY detected_at DESC
             LIMIT ?"
        ))
        .bind(active_only)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(bottleneck_from_row).collect()
    }
}
