use sqlx::Executor;

use opsdesk_core::domain::lead::LeadList;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_PRODUCT_IDS: &[&str] = &[
    "prod-jw-001",
    "prod-jw-002",
    "prod-jw-003",
    "prod-jw-004",
    "prod-jw-005",
    "prod-jw-006",
    "prod-ka-001",
    "prod-ka-002",
    "prod-ka-003",
    "prod-ka-004",
    "prod-ka-005",
    "prod-ka-006",
    "prod-mk-001",
    "prod-mk-002",
    "prod-mk-003",
    "prod-mk-004",
    "prod-mk-005",
    "prod-mk-006",
];

const SEED_STAFF_IDS: &[&str] =
    &["stf-001", "stf-002", "stf-003", "stf-004", "stf-005", "stf-006", "stf-007", "stf-008"];

const SEED_SUPPLIER_IDS: &[&str] = &[
    "sup-001", "sup-002", "sup-003", "sup-004", "sup-005", "sup-006", "sup-007", "sup-008",
    "sup-009",
];

/// Demo catalog, team roster and supplier directory used by `opsdesk seed` and tests.
///
/// Loading is idempotent: rows that already exist are left untouched so local edits survive
/// a second seed.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed.sql");

    /// Sample prospect list in the `{"clients": [...]}` shape the lead sequencer accepts.
    pub const LEADS_JSON: &str = include_str!("../../../config/fixtures/demo_leads.json");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            products: SEED_PRODUCT_IDS.len(),
            staff: SEED_STAFF_IDS.len(),
            suppliers: SEED_SUPPLIER_IDS.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        checks.push(("products", count_present(pool, "product", SEED_PRODUCT_IDS).await?));
        checks.push(("staff", count_present(pool, "staff", SEED_STAFF_IDS).await?));
        checks.push(("suppliers", count_present(pool, "supplier", SEED_SUPPLIER_IDS).await?));

        let uncovered_categories: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT p.category)
             FROM product p
             WHERE NOT EXISTS (
                   SELECT 1 FROM supplier s, json_each(s.categories_json) c
                   WHERE c.value = p.category AND s.is_active = 1
               )",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("supplier-coverage", uncovered_categories == 0));

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        sqlx::query(&format!(
            "DELETE FROM staff_task WHERE staff_id IN {}",
            sql_array_from_ids(SEED_STAFF_IDS)
        ))
        .execute(&mut *tx)
        .await?;
        for (table, ids) in
            [("product", SEED_PRODUCT_IDS), ("staff", SEED_STAFF_IDS), ("supplier", SEED_SUPPLIER_IDS)]
        {
            sqlx::query(&format!("DELETE FROM {table} WHERE id IN {}", sql_array_from_ids(ids)))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub fn demo_leads() -> Result<LeadList, RepositoryError> {
        serde_json::from_str(Self::LEADS_JSON)
            .map_err(|error| RepositoryError::Decode(format!("demo leads: {error}")))
    }
}

async fn count_present(
    pool: &DbPool,
    table: &str,
    ids: &[&str],
) -> Result<bool, RepositoryError> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(1) FROM {table} WHERE id IN {}",
        sql_array_from_ids(ids)
    ))
    .fetch_one(pool)
    .await?;
    Ok(count == ids.len() as i64)
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedResult {
    pub products: usize,
    pub staff: usize,
    pub suppliers: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_is_valid() {
        assert!(!DemoSeedDataset::SQL.is_empty());
        assert!(DemoSeedDataset::SQL.contains("ON CONFLICT(id) DO NOTHING"));
    }

    #[test]
    fn demo_leads_parse_into_pending_leads() {
        let leads = DemoSeedDataset::demo_leads()
            .expect("parse demo leads")
            .into_leads()
            .expect("valid lead records");
        assert_eq!(leads.len(), 5);
        assert_eq!(leads[0].id.0, "LEAD_001");
        assert_eq!(leads[0].name, "John Anderson");
    }

    #[tokio::test]
    async fn seed_is_idempotent_and_verifiable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");

        let first = DemoSeedDataset::load(&pool).await.expect("load seed fixtures");
        let first_verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(first_verification.all_present, "{:?}", first_verification.checks);
        assert_eq!(first, SeedResult { products: 18, staff: 8, suppliers: 9 });

        DemoSeedDataset::load(&pool).await.expect("reload seed fixtures");
        let second_verification = DemoSeedDataset::verify(&pool).await.expect("re-verify");
        assert_eq!(first_verification.checks, second_verification.checks);

        let product_rows: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM product")
            .fetch_one(&pool)
            .await
            .expect("count products");
        assert_eq!(product_rows, 18);
    }

    #[tokio::test]
    async fn clean_removes_seeded_rows() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");

        DemoSeedDataset::load(&pool).await.expect("load seed fixtures");
        DemoSeedDataset::clean(&pool).await.expect("clean");

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
        let staff_rows: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM staff")
            .fetch_one(&pool)
            .await
            .expect("count staff");
        assert_eq!(staff_rows, 0);
    }
}
