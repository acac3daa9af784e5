use sqlx::{sqlite::SqliteRow, Row};

use opsdesk_core::domain::product::ProductId;
use opsdesk_core::domain::supplier::{Supplier, SupplierId, SupplierQuery, SupplierQueryStatus};

use super::{
    json_list, parse_enum, parse_json_list, parse_optional_timestamp, parse_timestamp, parse_u32,
    RepositoryError, SupplierQueryRepository, SupplierRepository,
};
use crate::DbPool;

pub struct SqlSupplierRepository {
    pool: DbPool,
}

impl SqlSupplierRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub struct SqlSupplierQueryRepository {
    pool: DbPool,
}

impl SqlSupplierQueryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn list_where(
        &self,
        clause: &str,
        value: &str,
    ) -> Result<Vec<SupplierQuery>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUERY_COLUMNS} FROM supplier_query WHERE {clause} = ? ORDER BY created_at ASC"
        ))
        .bind(value)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(query_from_row).collect()
    }
}

const SUPPLIER_COLUMNS: &str = "id, name, contact_person, phone, email, address, categories_json,
     products_offered_json, avg_response_time_hours, reliability_score, is_active, created_at";

const QUERY_COLUMNS: &str = "id, supplier_id, supplier_name, order_id, order_number, product_id,
     product_name, quantity_needed, status, response_quantity, response_message, created_at,
     responded_at";

fn supplier_from_row(row: SqliteRow) -> Result<Supplier, RepositoryError> {
    Ok(Supplier {
        id: SupplierId(row.try_get("id")?),
        name: row.try_get("name")?,
        contact_person: row.try_get("contact_person")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        address: row.try_get("address")?,
        categories: parse_json_list("categories_json", row.try_get("categories_json")?)?,
        products_offered: parse_json_list(
            "products_offered_json",
            row.try_get("products_offered_json")?,
        )?,
        avg_response_time_hours: row.try_get("avg_response_time_hours")?,
        reliability_score: row.try_get("reliability_score")?,
        is_active: row.try_get("is_active")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn query_from_row(row: SqliteRow) -> Result<SupplierQuery, RepositoryError> {
    let status: SupplierQueryStatus = parse_enum("status", row.try_get("status")?)?;
    let response_quantity: Option<i64> = row.try_get("response_quantity")?;
    Ok(SupplierQuery {
        id: row.try_get("id")?,
        supplier_id: SupplierId(row.try_get("supplier_id")?),
        supplier_name: row.try_get("supplier_name")?,
        order_id: row.try_get("order_id")?,
        order_number: row.try_get("order_number")?,
        product_id: ProductId(row.try_get("product_id")?),
        product_name: row.try_get("product_name")?,
        quantity_needed: parse_u32("quantity_needed", row.try_get("quantity_needed")?)?,
        status,
        response_quantity: response_quantity
            .map(|quantity| parse_u32("response_quantity", quantity))
            .transpose()?,
        response_message: row.try_get("response_message")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        responded_at: parse_optional_timestamp("responded_at", row.try_get("responded_at")?)?,
    })
}

#[async_trait::async_trait]
impl SupplierRepository for SqlSupplierRepository {
    async fn find_by_id(&self, id: &SupplierId) -> Result<Option<Supplier>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SUPPLIER_COLUMNS} FROM supplier WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(supplier_from_row).transpose()
    }

    async fn list(&self, active_only: bool) -> Result<Vec<Supplier>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SUPPLIER_COLUMNS}
             FROM supplier
             WHERE (? = 0 OR is_active = 1)
             ORDER BY reliability_score DESC, name ASC"
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(supplier_from_row).collect()
    }

    async fn save(&self, supplier: &Supplier) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO supplier (id, name, contact_person, phone, email, address, categories_json,
                                   products_offered_json, avg_response_time_hours,
                                   reliability_score, is_active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 contact_person = excluded.contact_person,
                 phone = excluded.phone,
                 email = excluded.email,
                 address = excluded.address,
                 categories_json = excluded.categories_json,
                 products_offered_json = excluded.products_offered_json,
                 avg_response_time_hours = excluded.avg_response_time_hours,
                 reliability_score = excluded.reliability_score,
                 is_active = excluded.is_active",
        )
        .bind(&supplier.id.0)
        .bind(&supplier.name)
        .bind(&supplier.contact_person)
        .bind(&supplier.phone)
        .bind(&supplier.email)
        .bind(&supplier.address)
        .bind(json_list(&supplier.categories)?)
        .bind(json_list(&supplier.products_offered)?)
        .bind(supplier.avg_response_time_hours)
        .bind(supplier.reliability_score)
        .bind(supplier.is_active)
        .bind(supplier.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &SupplierId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM supplier WHERE id = ?").bind(&id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl SupplierQueryRepository for SqlSupplierQueryRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<SupplierQuery>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {QUERY_COLUMNS} FROM supplier_query WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(query_from_row).transpose()
    }

    async fn save(&self, query: &SupplierQuery) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO supplier_query (id, supplier_id, supplier_name, order_id, order_number,
                                         product_id, product_name, quantity_needed, status,
                                         response_quantity, response_message, created_at,
                                         responded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 quantity_needed = excluded.quantity_needed,
                 status = excluded.status,
                 response_quantity = excluded.response_quantity,
                 response_message = excluded.response_message,
                 responded_at = excluded.responded_at",
        )
        .bind(&query.id)
        .bind(&query.supplier_id.0)
        .bind(&query.supplier_name)
        .bind(&query.order_id)
        .bind(&query.order_number)
        .bind(&query.product_id.0)
        .bind(&query.product_name)
        .bind(i64::from(query.quantity_needed))
        .bind(query.status.as_str())
        .bind(query.response_quantity.map(i64::from))
        .bind(&query.response_message)
        .bind(query.created_at.to_rfc3339())
        .bind(query.responded_at.map(|at| at.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<SupplierQuery>, RepositoryError> {
        self.list_where("status", SupplierQueryStatus::Pending.as_str()).await
    }

    async fn list_for_supplier(
        &self,
        supplier_id: &SupplierId,
    ) -> Result<Vec<SupplierQuery>, RepositoryError> {
        self.list_where("supplier_id", &supplier_id.0).await
    }

    async fn list_for_order(&self, order_id: &str) -> Result<Vec<SupplierQuery>, RepositoryError> {
        self.list_where("order_id", order_id).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use opsdesk_core::domain::product::{ProductCategory, ProductId};
    use opsdesk_core::domain::supplier::{
        Supplier, SupplierId, SupplierQuery, SupplierQueryStatus,
    };

    use super::{SqlSupplierQueryRepository, SqlSupplierRepository};
    use crate::repositories::{SupplierQueryRepository, SupplierRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn supplier(id: &str, reliability: f64, is_active: bool) -> Supplier {
        Supplier {
            id: SupplierId(id.to_string()),
            name: format!("Supplier {id}"),
            contact_person: "Ravi".to_string(),
            phone: "+91-9800000000".to_string(),
            email: None,
            address: None,
            categories: vec![ProductCategory::Makeup, ProductCategory::Jewelry],
            products_offered: vec!["Lipstick".to_string()],
            avg_response_time_hours: Supplier::DEFAULT_RESPONSE_HOURS,
            reliability_score: reliability,
            is_active,
            created_at: Utc::now(),
        }
    }

    fn query(id: &str, supplier_id: &str, order_id: &str, age_minutes: i64) -> SupplierQuery {
        SupplierQuery {
            id: id.to_string(),
            supplier_id: SupplierId(supplier_id.to_string()),
            supplier_name: format!("Supplier {supplier_id}"),
            order_id: Some(order_id.to_string()),
            order_number: Some(format!("ORD-20260301-{order_id}")),
            product_id: ProductId("prod-mk-001".to_string()),
            product_name: "Lipstick".to_string(),
            quantity_needed: 4,
            status: SupplierQueryStatus::Pending,
            response_quantity: None,
            response_message: None,
            created_at: Utc::now() - Duration::minutes(age_minutes),
            responded_at: None,
        }
    }

    #[tokio::test]
    async fn supplier_categories_survive_json_columns() {
        let repo = SqlSupplierRepository::new(setup().await);
        repo.save(&supplier("sup-1", 0.9, true)).await.expect("save");

        let found =
            repo.find_by_id(&SupplierId("sup-1".to_string())).await.expect("find").expect("exists");
        assert_eq!(found.categories, vec![ProductCategory::Makeup, ProductCategory::Jewelry]);
        assert_eq!(found.products_offered, vec!["Lipstick".to_string()]);
        assert!(found.is_active);
    }

    #[tokio::test]
    async fn active_only_listing_hides_inactive_suppliers() {
        let repo = SqlSupplierRepository::new(setup().await);
        repo.save(&supplier("sup-1", 0.7, true)).await.expect("save");
        repo.save(&supplier("sup-2", 0.95, true)).await.expect("save");
        repo.save(&supplier("sup-3", 0.99, false)).await.expect("save");

        let active = repo.list(true).await.expect("list");
        let ids: Vec<&str> = active.iter().map(|supplier| supplier.id.0.as_str()).collect();
        assert_eq!(ids, vec!["sup-2", "sup-1"]);
        assert_eq!(repo.list(false).await.expect("list all").len(), 3);
    }

    #[tokio::test]
    async fn responding_moves_query_out_of_pending() {
        let repo = SqlSupplierQueryRepository::new(setup().await);
        repo.save(&query("SQ-1", "sup-1", "o1", 10)).await.expect("save");
        repo.save(&query("SQ-2", "sup-2", "o1", 5)).await.expect("save");

        let mut answered = repo.find_by_id("SQ-1").await.expect("find").expect("exists");
        answered.respond(true, Some(20), Some("Can ship tomorrow".to_string())).expect("respond");
        repo.save(&answered).await.expect("update");

        let pending = repo.list_pending().await.expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "SQ-2");

        let for_order = repo.list_for_order("o1").await.expect("for order");
        assert_eq!(for_order.len(), 2);
        assert_eq!(for_order[0].status, SupplierQueryStatus::Available);
        assert_eq!(for_order[0].response_quantity, Some(4));
        assert!(for_order[0].responded_at.is_some());

        let for_supplier =
            repo.list_for_supplier(&SupplierId("sup-2".to_string())).await.expect("for supplier");
        assert_eq!(for_supplier.len(), 1);
    }

    #[tokio::test]
    async fn lowered_requirement_and_expiry_are_stored() {
        let repo = SqlSupplierQueryRepository::new(setup().await);
        repo.save(&query("SQ-1", "sup-1", "o1", 10)).await.expect("save");
        repo.save(&query("SQ-2", "sup-2", "o1", 5)).await.expect("save");

        let mut lowered = repo.find_by_id("SQ-1").await.expect("find").expect("exists");
        lowered.quantity_needed = 1;
        repo.save(&lowered).await.expect("update");
        let mut expired = repo.find_by_id("SQ-2").await.expect("find").expect("exists");
        expired.status = SupplierQueryStatus::Expired;
        repo.save(&expired).await.expect("update");

        let pending = repo.list_pending().await.expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].quantity_needed, 1);
        let stored = repo.find_by_id("SQ-2").await.expect("find").expect("exists");
        assert_eq!(stored.status, SupplierQueryStatus::Expired);
    }
}
