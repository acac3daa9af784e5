use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use opsdesk_core::domain::lead::{Lead, LeadId, LeadStatus};

use super::{parse_enum, LeadRepository, RepositoryError};
use crate::DbPool;

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const UPSERT_LEAD: &str = "INSERT INTO lead (id, position, name, email, phone, company, industry,
                                  role, status, summary, updated_at)
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
     ON CONFLICT(id) DO UPDATE SET
         name = excluded.name,
         email = excluded.email,
         phone = excluded.phone,
         company = excluded.company,
         industry = excluded.industry,
         role = excluded.role,
         status = excluded.status,
         summary = excluded.summary,
         updated_at = excluded.updated_at";

fn lead_from_row(row: SqliteRow) -> Result<Lead, RepositoryError> {
    let status: LeadStatus = parse_enum("status", row.try_get("status")?)?;
    Ok(Lead {
        id: LeadId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        company: row.try_get("company")?,
        industry: row.try_get("industry")?,
        role: row.try_get("role")?,
        status,
        summary: row.try_get("summary")?,
    })
}

#[async_trait::async_trait]
impl LeadRepository for SqlLeadRepository {
    async fn replace_all(&self, leads: &[Lead]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM lead").execute(&mut *tx).await?;

        let now = Utc::now().to_rfc3339();
        for (position, lead) in leads.iter().enumerate() {
            sqlx::query(UPSERT_LEAD)
                .bind(&lead.id.0)
                .bind(position as i64)
                .bind(&lead.name)
                .bind(&lead.email)
                .bind(&lead.phone)
                .bind(&lead.company)
                .bind(&lead.industry)
                .bind(&lead.role)
                .bind(lead.status.as_str())
                .bind(&lead.summary)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn save(&self, lead: &Lead) -> Result<(), RepositoryError> {
        let position: Option<i64> = sqlx::query_scalar("SELECT position FROM lead WHERE id = ?")
            .bind(&lead.id.0)
            .fetch_optional(&self.pool)
            .await?;
        let position = match position {
            Some(position) => position,
            None => sqlx::query_scalar("SELECT COALESCE(MAX(position) + 1, 0) FROM lead")
                .fetch_one(&self.pool)
                .await?,
        };

        sqlx::query(UPSERT_LEAD)
            .bind(&lead.id.0)
            .bind(position)
            .bind(&lead.name)
            .bind(&lead.email)
            .bind(&lead.phone)
            .bind(&lead.company)
            .bind(&lead.industry)
            .bind(&lead.role)
            .bind(lead.status.as_str())
            .bind(&lead.summary)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<Lead>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, email, phone, company, industry, role, status, summary
             FROM lead
             ORDER BY position ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(lead_from_row).collect()
    }
}
