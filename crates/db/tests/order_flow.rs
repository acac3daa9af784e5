use chrono::{Duration, Utc};

use opsdesk_core::domain::order::{CustomerInfo, Order, OrderId, OrderStatus};
use opsdesk_core::domain::product::ProductId;
use opsdesk_core::domain::supplier::SupplierQueryStatus;
use opsdesk_core::ops::{
    plan_order, restock_deductions, restock_outcome, supplier_queries_for, RequestedItem,
    RestockOutcome,
};
use opsdesk_db::repositories::{
    OrderRepository, ProductFilter, ProductRepository, SqlOrderRepository, SqlProductRepository,
    SqlSupplierQueryRepository, SqlSupplierRepository, SupplierQueryRepository,
    SupplierRepository,
};
use opsdesk_db::{connect_with_settings, migrations, DbPool, DemoSeedDataset};

async fn seeded_pool() -> DbPool {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    DemoSeedDataset::load(&pool).await.expect("seed");
    pool
}

fn customer() -> CustomerInfo {
    CustomerInfo {
        name: "Meera Iyer".to_string(),
        phone: "+91-9123456780".to_string(),
        email: Some("meera@example.com".to_string()),
        address: "4 Park Street".to_string(),
        city: "Kolkata".to_string(),
        pincode: "700016".to_string(),
        notes: None,
    }
}

#[tokio::test]
async fn short_order_raises_supplier_queries_until_one_answers_yes() {
    let pool = seeded_pool().await;
    let products = SqlProductRepository::new(pool.clone());
    let orders = SqlOrderRepository::new(pool.clone());
    let suppliers = SqlSupplierRepository::new(pool.clone());
    let queries = SqlSupplierQueryRepository::new(pool);

    let catalog = products.list(&ProductFilter::default()).await.expect("catalog");
    let product = catalog
        .iter()
        .find(|product| product.id.0 == "prod-ka-001")
        .expect("seeded kitchen product")
        .clone();
    let requested = product.quantity + 3;

    let plan = plan_order(
        &[RequestedItem { product_id: product.id.clone(), quantity: requested }],
        &catalog,
    )
    .expect("plan");
    assert_eq!(plan.status, OrderStatus::AwaitingStock);
    assert_eq!(plan.shortages[0].shortage, 3);

    let now = Utc::now();
    let order = Order {
        id: OrderId("order-flow-1".to_string()),
        order_number: Order::generate_number(now),
        customer: customer(),
        items: plan.items.clone(),
        total_amount: plan.total_amount,
        status: plan.status,
        assigned_staff_id: None,
        conversation_id: None,
        estimated_delivery: Some(now + Duration::days(plan.delivery_days)),
        created_at: now,
        updated_at: now,
    };
    orders.place(&order, &plan.deductions).await.expect("place order");

    let drained = products.find_by_id(&product.id).await.expect("find").expect("exists");
    assert_eq!(drained.quantity, 0);

    let directory = suppliers.list(true).await.expect("suppliers");
    let raised = supplier_queries_for(&plan.shortages, &directory, &order, now);
    assert!(raised.len() >= 2, "seeded directory has several kitchen suppliers");
    for query in &raised {
        queries.save(query).await.expect("save query");
    }

    let mut first = raised[0].clone();
    first.respond(false, None, Some("Out of stock".to_string())).expect("respond");
    queries.save(&first).await.expect("update");
    let so_far = queries.list_for_order(&order.id.0).await.expect("order queries");
    assert!(matches!(restock_outcome(&first, &so_far), RestockOutcome::AwaitingResponses { .. }));

    let mut remaining: Vec<_> = so_far
        .into_iter()
        .filter(|query| query.status == SupplierQueryStatus::Pending)
        .collect();
    let last = remaining.len() - 1;
    for (index, query) in remaining.iter_mut().enumerate() {
        query.respond(index == last, (index == last).then_some(10), None).expect("respond");
        queries.save(query).await.expect("update");
    }

    let answered = remaining[last].clone();
    let all = queries.list_for_order(&order.id.0).await.expect("order queries");
    assert_eq!(
        restock_outcome(&answered, &all),
        RestockOutcome::OrderReady { order_number: order.order_number.clone() }
    );

    assert_eq!(answered.accepted_quantity(), 3);

    let kettle = ProductId("prod-ka-001".to_string());
    let restocked = products
        .adjust_stock(&kettle, i64::from(answered.accepted_quantity()))
        .await
        .expect("restock");
    assert_eq!(restocked.map(|product| product.quantity), Some(3));

    for (product_id, units) in restock_deductions(&all) {
        products.adjust_stock(&product_id, -i64::from(units)).await.expect("reserve");
    }
    let reserved = products.find_by_id(&kettle).await.expect("find").expect("exists");
    assert_eq!(reserved.quantity, 0);
}

#[tokio::test]
async fn fully_stocked_order_ships_in_standard_window() {
    let pool = seeded_pool().await;
    let products = SqlProductRepository::new(pool.clone());
    let orders = SqlOrderRepository::new(pool);

    let catalog = products.list(&ProductFilter::default()).await.expect("catalog");
    let plan = plan_order(
        &[RequestedItem { product_id: ProductId("prod-mk-001".to_string()), quantity: 1 }],
        &catalog,
    )
    .expect("plan");

    assert_eq!(plan.status, OrderStatus::Pending);
    assert!(plan.shortages.is_empty());
    assert_eq!(plan.delivery_days, 5);

    let now = Utc::now();
    let order = Order {
        id: OrderId("order-flow-2".to_string()),
        order_number: Order::generate_number(now),
        customer: customer(),
        items: plan.items,
        total_amount: plan.total_amount,
        status: plan.status,
        assigned_staff_id: None,
        conversation_id: None,
        estimated_delivery: Some(now + Duration::days(plan.delivery_days)),
        created_at: now,
        updated_at: now,
    };
    orders.place(&order, &plan.deductions).await.expect("place");

    let stored = orders.find_by_number(&order.order_number).await.expect("find").expect("exists");
    assert_eq!(stored.total_amount, order.total_amount);
}
