use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use opsdesk_core::domain::product::{Product, ProductCategory, ProductId};

use super::{
    parse_decimal, parse_enum, parse_timestamp, parse_u32, ProductFilter, ProductRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const PRODUCT_COLUMNS: &str = "id, name, category, description, price, quantity,
     low_stock_threshold, supplier_id, image_url, created_at, updated_at";

pub(crate) fn product_from_row(row: SqliteRow) -> Result<Product, RepositoryError> {
    let category: ProductCategory = parse_enum("category", row.try_get("category")?)?;
    Ok(Product {
        id: ProductId(row.try_get("id")?),
        name: row.try_get("name")?,
        category,
        description: row.try_get("description")?,
        price: parse_decimal("price", row.try_get("price")?)?,
        quantity: parse_u32("quantity", row.try_get("quantity")?)?,
        low_stock_threshold: parse_u32("low_stock_threshold", row.try_get("low_stock_threshold")?)?,
        supplier_id: row.try_get("supplier_id")?,
        image_url: row.try_get("image_url")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(product_from_row).transpose()
    }

    async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM product
             WHERE (?1 IS NULL OR category = ?1)
               AND (?2 = 0 OR quantity <= low_stock_threshold)
             ORDER BY category ASC, name ASC"
        ))
        .bind(filter.category.map(|category| category.as_str()))
        .bind(filter.low_stock_only)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(product_from_row).collect()
    }

    async fn save(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO product (id, name, category, description, price, quantity,
                                  low_stock_threshold, supplier_id, image_url, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 category = excluded.category,
                 description = excluded.description,
                 price = excluded.price,
                 quantity = excluded.quantity,
                 low_stock_threshold = excluded.low_stock_threshold,
                 supplier_id = excluded.supplier_id,
                 image_url = excluded.image_url,
                 updated_at = excluded.updated_at",
        )
        .bind(&product.id.0)
        .bind(&product.name)
        .bind(product.category.as_str())
        .bind(&product.description)
        .bind(product.price.to_string())
        .bind(i64::from(product.quantity))
        .bind(i64::from(product.low_stock_threshold))
        .bind(&product.supplier_id)
        .bind(&product.image_url)
        .bind(product.created_at.to_rfc3339())
        .bind(product.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &ProductId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM product WHERE id = ?").bind(&id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn adjust_stock(
        &self,
        id: &ProductId,
        delta: i64,
    ) -> Result<Option<Product>, RepositoryError> {
        let result = sqlx::query(
            "UPDATE product SET quantity = MAX(quantity + ?, 0), updated_at = ? WHERE id = ?",
        )
        .bind(delta)
        .bind(Utc::now().to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }
}
