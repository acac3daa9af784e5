use sqlx::{sqlite::SqliteRow, Row, Sqlite, Transaction};

use opsdesk_core::domain::order::{CustomerInfo, Order, OrderId, OrderItem, OrderStatus};
use opsdesk_core::domain::product::ProductId;

use super::{
    parse_decimal, parse_enum, parse_optional_timestamp, parse_timestamp, parse_u32, OrderFilter,
    OrderRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, order_id: &str) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT product_id, product_name, quantity, unit_price, total_price
             FROM order_item
             WHERE order_id = ?
             ORDER BY position ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(item_from_row).collect()
    }

    async fn hydrate(&self, rows: Vec<SqliteRow>) -> Result<Vec<Order>, RepositoryError> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let mut order = order_from_row(row)?;
            order.items = self.load_items(&order.id.0).await?;
            orders.push(order);
        }
        Ok(orders)
    }
}

const ORDER_COLUMNS: &str = "id, order_number, customer_name, customer_phone, customer_email,
     customer_address, customer_city, customer_pincode, customer_notes, total_amount, status,
     assigned_staff_id, conversation_id, estimated_delivery, created_at, updated_at";

fn order_from_row(row: SqliteRow) -> Result<Order, RepositoryError> {
    let status: OrderStatus = parse_enum("status", row.try_get("status")?)?;
    Ok(Order {
        id: OrderId(row.try_get("id")?),
        order_number: row.try_get("order_number")?,
        customer: CustomerInfo {
            name: row.try_get("customer_name")?,
            phone: row.try_get("customer_phone")?,
            email: row.try_get("customer_email")?,
            address: row.try_get("customer_address")?,
            city: row.try_get("customer_city")?,
            pincode: row.try_get("customer_pincode")?,
            notes: row.try_get("customer_notes")?,
        },
        items: Vec::new(),
        total_amount: parse_decimal("total_amount", row.try_get("total_amount")?)?,
        status,
        assigned_staff_id: row.try_get("assigned_staff_id")?,
        conversation_id: row.try_get("conversation_id")?,
        estimated_delivery: parse_optional_timestamp(
            "estimated_delivery",
            row.try_get("estimated_delivery")?,
        )?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn item_from_row(row: SqliteRow) -> Result<OrderItem, RepositoryError> {
    Ok(OrderItem {
        product_id: ProductId(row.try_get("product_id")?),
        product_name: row.try_get("product_name")?,
        quantity: parse_u32("quantity", row.try_get("quantity")?)?,
        unit_price: parse_decimal("unit_price", row.try_get("unit_price")?)?,
        total_price: parse_decimal("total_price", row.try_get("total_price")?)?,
    })
}

async fn write_order(tx: &mut Transaction<'_, Sqlite>, order: &Order) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO orders (id, order_number, customer_name, customer_phone, customer_email,
                             customer_address, customer_city, customer_pincode, customer_notes,
                             total_amount, status, assigned_staff_id, conversation_id,
                             estimated_delivery, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             customer_name = excluded.customer_name,
             customer_phone = excluded.customer_phone,
             customer_email = excluded.customer_email,
             customer_address = excluded.customer_address,
             customer_city = excluded.customer_city,
             customer_pincode = excluded.customer_pincode,
             customer_notes = excluded.customer_notes,
             total_amount = excluded.total_amount,
             status = excluded.status,
             assigned_staff_id = excluded.assigned_staff_id,
             conversation_id = excluded.conversation_id,
             estimated_delivery = excluded.estimated_delivery,
             updated_at = excluded.updated_at",
    )
    .bind(&order.id.0)
    .bind(&order.order_number)
    .bind(&order.customer.name)
    .bind(&order.customer.phone)
    .bind(&order.customer.email)
    .bind(&order.customer.address)
    .bind(&order.customer.city)
    .bind(&order.customer.pincode)
    .bind(&order.customer.notes)
    .bind(order.total_amount.to_string())
    .bind(order.status.as_str())
    .bind(&order.assigned_staff_id)
    .bind(&order.conversation_id)
    .bind(order.estimated_delivery.map(|at| at.to_rfc3339()))
    .bind(order.created_at.to_rfc3339())
    .bind(order.updated_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;

    sqlx::query("DELETE FROM order_item WHERE order_id = ?")
        .bind(&order.id.0)
        .execute(&mut **tx)
        .await?;

    for (position, item) in order.items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO order_item (order_id, position, product_id, product_name, quantity,
                                     unit_price, total_price)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id.0)
        .bind(position as i64)
        .bind(&item.product_id.0)
        .bind(&item.product_name)
        .bind(i64::from(item.quantity))
        .bind(item.unit_price.to_string())
        .bind(item.total_price.to_string())
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(self.hydrate(row.into_iter().collect()).await?.pop())
    }

    async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = ?"))
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(self.hydrate(row.into_iter().collect()).await?.pop())
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS}
             FROM orders
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC
             LIMIT ?2 OFFSET ?3"
        ))
        .bind(filter.status.map(|status| status.as_str()))
        .bind(i64::from(filter.limit))
        .bind(i64::from(filter.skip))
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows =
            sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"))
                .fetch_all(&self.pool)
                .await?;

        self.hydrate(rows).await
    }

    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        write_order(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn place(
        &self,
        order: &Order,
        deductions: &[(ProductId, u32)],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for (product_id, quantity) in deductions {
            let result = sqlx::query(
                "UPDATE product
                 SET quantity = quantity - ?1, updated_at = ?2
                 WHERE id = ?3 AND quantity >= ?1",
            )
            .bind(i64::from(*quantity))
            .bind(order.created_at.to_rfc3339())
            .bind(&product_id.0)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::Conflict(format!(
                    "stock for product `{product_id}` changed while placing order {}",
                    order.order_number
                )));
            }
        }

        write_order(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use opsdesk_core::domain::order::{CustomerInfo, Order, OrderId, OrderItem, OrderStatus};
    use opsdesk_core::domain::product::{Product, ProductCategory, ProductId};

    use super::SqlOrderRepository;
    use crate::repositories::{
        OrderFilter, OrderRepository, ProductRepository, RepositoryError, SqlProductRepository,
    };
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn toaster(quantity: u32) -> Product {
        Product {
            id: ProductId("prod-ka-001".to_string()),
            name: "Toaster".to_string(),
            category: ProductCategory::KitchenAppliances,
            description: String::new(),
            price: Decimal::new(2_499_00, 2),
            quantity,
            low_stock_threshold: 5,
            supplier_id: None,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn order(id: &str, status: OrderStatus, age_minutes: i64) -> Order {
        let created_at = Utc::now() - Duration::minutes(age_minutes);
        let items = vec![OrderItem::new(
            ProductId("prod-ka-001".to_string()),
            "Toaster",
            2,
            Decimal::new(2_499_00, 2),
        )];
        Order {
            id: OrderId(id.to_string()),
            order_number: format!("ORD-20260301-{id}"),
            customer: CustomerInfo {
                name: "Priya".to_string(),
                phone: "+91-9000000000".to_string(),
                email: None,
                address: "12 MG Road".to_string(),
                city: "Pune".to_string(),
                pincode: "411001".to_string(),
                notes: None,
            },
            total_amount: Order::total_of(&items),
            items,
            status,
            assigned_staff_id: None,
            conversation_id: None,
            estimated_delivery: Some(created_at + Duration::days(5)),
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn place_deducts_stock_and_persists_items() {
        let pool = setup().await;
        let products = SqlProductRepository::new(pool.clone());
        let orders = SqlOrderRepository::new(pool);
        products.save(&toaster(10)).await.expect("seed product");

        let placed = order("A1", OrderStatus::Pending, 0);
        orders
            .place(&placed, &[(ProductId("prod-ka-001".to_string()), 2)])
            .await
            .expect("place");

        let stock = products
            .find_by_id(&ProductId("prod-ka-001".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(stock.quantity, 8);

        let stored = orders.find_by_number(&placed.order_number).await.expect("find").expect("exists");
        assert_eq!(stored.items.len(), 1);
        assert_eq!(stored.total_amount, Decimal::new(4_998_00, 2));
        assert_eq!(stored.customer.city, "Pune");
    }

    #[tokio::test]
    async fn place_rolls_back_when_stock_is_gone() {
        let pool = setup().await;
        let products = SqlProductRepository::new(pool.clone());
        let orders = SqlOrderRepository::new(pool);
        products.save(&toaster(1)).await.expect("seed product");

        let error = orders
            .place(&order("A1", OrderStatus::Pending, 0), &[(ProductId("prod-ka-001".to_string()), 2)])
            .await
            .expect_err("insufficient stock");
        assert!(matches!(error, RepositoryError::Conflict(_)));

        assert!(orders.find_by_id(&OrderId("A1".to_string())).await.expect("find").is_none());
        let stock = products
            .find_by_id(&ProductId("prod-ka-001".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(stock.quantity, 1);
    }

    #[tokio::test]
    async fn list_filters_by_status_newest_first_with_paging() {
        let orders = SqlOrderRepository::new(setup().await);
        orders.save(&order("old", OrderStatus::Pending, 30)).await.expect("save");
        orders.save(&order("mid", OrderStatus::Shipped, 20)).await.expect("save");
        orders.save(&order("new", OrderStatus::Pending, 10)).await.expect("save");

        let pending = orders
            .list(&OrderFilter { status: Some(OrderStatus::Pending), ..OrderFilter::default() })
            .await
            .expect("list");
        let ids: Vec<&str> = pending.iter().map(|order| order.id.0.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);

        let page = orders
            .list(&OrderFilter { status: None, limit: 1, skip: 1 })
            .await
            .expect("list");
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id.0, "mid");
    }

    #[tokio::test]
    async fn save_updates_status_without_duplicating_items() {
        let orders = SqlOrderRepository::new(setup().await);
        let mut stored = order("A1", OrderStatus::Pending, 0);
        orders.save(&stored).await.expect("save");

        stored.status = OrderStatus::Processing;
        stored.assigned_staff_id = Some("stf-001".to_string());
        orders.save(&stored).await.expect("update");

        let found = orders.find_by_id(&stored.id).await.expect("find").expect("exists");
        assert_eq!(found.status, OrderStatus::Processing);
        assert_eq!(found.assigned_staff_id.as_deref(), Some("stf-001"));
        assert_eq!(found.items.len(), 1);
        assert_eq!(orders.list_all().await.expect("list").len(), 1);
    }
}
