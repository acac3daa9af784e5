use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;

use opsdesk_core::domain::conversation::{ConversationKind, ConversationMessage};
use opsdesk_core::domain::order::Order;
use opsdesk_core::domain::product::{Product, ProductCategory};
use opsdesk_core::domain::supplier::{Supplier, SupplierId};
use opsdesk_core::ops::{
    format_findings, inventory_stats, roster_text, team_utilization, BottleneckDetector,
};

use crate::ops_data::OperationsSource;
use crate::router::Intent;

const RECENT_ORDER_LIMIT: u32 = 5;
const LOW_STOCK_LISTING_LIMIT: usize = 10;

/// What a specialist gets to look at for one turn.
#[derive(Clone, Copy, Debug)]
pub struct HandlerRequest<'a> {
    pub message: &'a str,
    pub history: &'a [ConversationMessage],
    pub kind: ConversationKind,
    pub supplier_id: Option<&'a SupplierId>,
}

/// A specialist: fixed instructions plus context assembled from current records.
#[async_trait]
pub trait Handler: Send + Sync {
    fn intent(&self) -> Intent;
    fn instructions(&self) -> &'static str;
    async fn context(
        &self,
        request: &HandlerRequest<'_>,
        data: &dyn OperationsSource,
    ) -> Result<String>;
}

pub struct HandlerRegistry {
    handlers: BTreeMap<Intent, Box<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn empty() -> Self {
        Self { handlers: BTreeMap::new() }
    }

    /// Registry with one handler per [`Intent`].
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(CustomerHandler);
        registry.register(OrderHandler);
        registry.register(InventoryHandler);
        registry.register(SupplierHandler);
        registry.register(WorkloadHandler);
        registry.register(BottleneckHandler);
        registry
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: Handler + 'static,
    {
        self.handlers.insert(handler.intent(), Box::new(handler));
    }

    /// Handler for `intent`, falling back to the customer handler when none is registered.
    pub fn get(&self, intent: Intent) -> Option<&dyn Handler> {
        self.handlers
            .get(&intent)
            .or_else(|| self.handlers.get(&Intent::Customer))
            .map(|handler| handler.as_ref())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

pub struct CustomerHandler;

#[async_trait]
impl Handler for CustomerHandler {
    fn intent(&self) -> Intent {
        Intent::Customer
    }

    fn instructions(&self) -> &'static str {
        "You are a friendly customer service agent for a business selling jewelry, kitchen appliances and makeup.
Help customers browse products, answer questions about prices and availability, and guide them to order.
Quote prices in INR (₹). When a customer wants to buy, confirm the product and ask for their name, phone number and delivery address.
If a product is out of stock, say you will check with suppliers and get back to them."
    }

    async fn context(
        &self,
        _request: &HandlerRequest<'_>,
        data: &dyn OperationsSource,
    ) -> Result<String> {
        let products = data.products().await?;
        Ok(catalog_text(&products))
    }
}

/// In-stock products grouped by category.
pub fn catalog_text(products: &[Product]) -> String {
    let mut sections = Vec::new();
    for category in ProductCategory::ALL {
        let lines: Vec<String> = products
            .iter()
            .filter(|product| product.category == category && !product.is_out_of_stock())
            .map(|product| {
                format!(
                    "  - {}: ₹{} ({} in stock) - {}",
                    product.name, product.price, product.quantity, product.description
                )
            })
            .collect();
        if !lines.is_empty() {
            sections.push(format!("{}:\n{}", category.label().to_uppercase(), lines.join("\n")));
        }
    }

    if sections.is_empty() {
        "No products currently in stock.".to_string()
    } else {
        sections.join("\n\n")
    }
}

pub struct OrderHandler;

#[async_trait]
impl Handler for OrderHandler {
    fn intent(&self) -> Intent {
        Intent::Order
    }

    fn instructions(&self) -> &'static str {
        "You are the order desk for a business selling jewelry, kitchen appliances and makeup.
Collect the details needed for an order: customer name, phone number, delivery address, city and pincode.
Ask for one or two details at a time and acknowledge what the customer already gave you.
For tracking questions, answer from the order records in the context. Never invent an order status.
When all details are collected, summarise the order and ask for final confirmation."
    }

    async fn context(
        &self,
        request: &HandlerRequest<'_>,
        data: &dyn OperationsSource,
    ) -> Result<String> {
        let numbers = order_numbers_in(request.message);
        let mut sections = Vec::new();

        if !numbers.is_empty() {
            let found = data.find_orders(&numbers).await?;
            let mut lines: Vec<String> = found.iter().map(order_line).collect();
            for number in &numbers {
                if !found.iter().any(|order| &order.order_number == number) {
                    lines.push(format!("- {number}: no such order on record"));
                }
            }
            sections.push(format!("Referenced orders:\n{}", lines.join("\n")));
        }

        let recent = data.recent_orders(RECENT_ORDER_LIMIT).await?;
        if recent.is_empty() {
            sections.push("No orders placed yet.".to_string());
        } else {
            let lines: Vec<String> = recent.iter().map(order_line).collect();
            sections.push(format!("Recent orders:\n{}", lines.join("\n")));
        }

        Ok(sections.join("\n\n"))
    }
}

fn order_line(order: &Order) -> String {
    let delivery = order
        .estimated_delivery
        .map(|at| format!(", estimated delivery {}", at.format("%Y-%m-%d")))
        .unwrap_or_default();
    format!(
        "- {}: {} for {}, ₹{} total, {} item(s){}",
        order.order_number,
        order.status.as_str(),
        order.customer.name,
        order.total_amount,
        order.items.len(),
        delivery
    )
}

/// Extracts `ORD-YYYYMMDD-XXXXXX` tokens, normalised to upper case, without duplicates.
pub fn order_numbers_in(message: &str) -> Vec<String> {
    let mut numbers = Vec::new();
    for token in message.split(|c: char| !(c.is_ascii_alphanumeric() || c == '-')) {
        let candidate = token.trim_matches('-').to_ascii_uppercase();
        if is_order_number(&candidate) && !numbers.contains(&candidate) {
            numbers.push(candidate);
        }
    }
    numbers
}

fn is_order_number(candidate: &str) -> bool {
    let mut parts = candidate.split('-');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("ORD"), Some(date), Some(suffix), None) => {
            date.len() == 8
                && date.chars().all(|c| c.is_ascii_digit())
                && suffix.len() == 6
                && suffix.chars().all(|c| c.is_ascii_hexdigit())
        }
        _ => false,
    }
}

pub struct InventoryHandler;

#[async_trait]
impl Handler for InventoryHandler {
    fn intent(&self) -> Intent {
        Intent::Inventory
    }

    fn instructions(&self) -> &'static str {
        "You are the inventory assistant for the operations team.
Report stock levels accurately from the context, call out out-of-stock and low-stock items, and suggest restocking where it is needed."
    }

    async fn context(
        &self,
        _request: &HandlerRequest<'_>,
        data: &dyn OperationsSource,
    ) -> Result<String> {
        let products = data.products().await?;
        let stats = inventory_stats(&products);

        let mut lines = vec![
            format!("Total products: {}", stats.total_products),
            format!("Out of stock: {}", stats.out_of_stock),
            format!("Low stock: {}", stats.low_stock),
            format!("Stock value: ₹{}", stats.total_value),
        ];

        let mut low: Vec<&Product> =
            products.iter().filter(|product| product.is_low_stock()).collect();
        low.sort_by_key(|product| product.quantity);
        if !low.is_empty() {
            lines.push(String::new());
            lines.push("Low-stock items:".to_string());
            for product in low.into_iter().take(LOW_STOCK_LISTING_LIMIT) {
                lines.push(format!(
                    "  - {} ({}): {} left, threshold {}",
                    product.name,
                    product.category.label(),
                    product.quantity,
                    product.low_stock_threshold
                ));
            }
        }

        Ok(lines.join("\n"))
    }
}

pub struct SupplierHandler;

#[async_trait]
impl Handler for SupplierHandler {
    fn intent(&self) -> Intent {
        Intent::Supplier
    }

    fn instructions(&self) -> &'static str {
        "You coordinate procurement with suppliers for a business selling jewelry, kitchen appliances and makeup.
Be professional and concise. When a supplier replies about availability, confirm the quantity and expected delivery.
For the operations team, summarise which supplier requests are still pending."
    }

    async fn context(
        &self,
        request: &HandlerRequest<'_>,
        data: &dyn OperationsSource,
    ) -> Result<String> {
        let mut sections = Vec::new();

        if request.kind == ConversationKind::Supplier {
            if let Some(id) = request.supplier_id {
                match data.supplier(id).await? {
                    Some(supplier) => {
                        sections.push(format!("You are talking to:\n{}", supplier_line(&supplier)))
                    }
                    None => sections.push(format!("Unknown supplier {id}.", id = id.0)),
                }
            }
        }

        let suppliers = data.suppliers().await?;
        let active: Vec<String> =
            suppliers.iter().filter(|supplier| supplier.is_active).map(supplier_line).collect();
        sections.push(if active.is_empty() {
            "No active suppliers.".to_string()
        } else {
            format!("Active suppliers:\n{}", active.join("\n"))
        });

        let pending = data.pending_supplier_queries().await?;
        let pending: Vec<&_> = match request.supplier_id {
            Some(id) if request.kind == ConversationKind::Supplier => {
                pending.iter().filter(|query| &query.supplier_id == id).collect()
            }
            _ => pending.iter().collect(),
        };
        sections.push(if pending.is_empty() {
            "No pending supplier requests.".to_string()
        } else {
            let lines: Vec<String> = pending
                .iter()
                .map(|query| {
                    format!(
                        "- {} to {}: {} x {}{}",
                        query.id,
                        query.supplier_name,
                        query.quantity_needed,
                        query.product_name,
                        query
                            .order_number
                            .as_deref()
                            .map(|number| format!(" for order {number}"))
                            .unwrap_or_default()
                    )
                })
                .collect();
            format!("Pending supplier requests:\n{}", lines.join("\n"))
        });

        Ok(sections.join("\n\n"))
    }
}

fn supplier_line(supplier: &Supplier) -> String {
    let categories: Vec<&str> =
        supplier.categories.iter().map(|category| category.label()).collect();
    format!(
        "- {} ({}), contact {} at {}, supplies {}, reliability {:.0}%",
        supplier.name,
        supplier.id.0,
        supplier.contact_person,
        supplier.phone,
        categories.join(", "),
        supplier.reliability_score * 100.0
    )
}

pub struct WorkloadHandler;

#[async_trait]
impl Handler for WorkloadHandler {
    fn intent(&self) -> Intent {
        Intent::Workload
    }

    fn instructions(&self) -> &'static str {
        "You manage task assignment for the operations team.
Use the roster in the context to say who has capacity, recommend the least loaded available member for new work, and flag anyone at capacity."
    }

    async fn context(
        &self,
        _request: &HandlerRequest<'_>,
        data: &dyn OperationsSource,
    ) -> Result<String> {
        let staff = data.staff().await?;
        Ok(format!(
            "Team roster:\n{}\n\nOverall utilization: {:.1}%",
            roster_text(&staff),
            team_utilization(&staff)
        ))
    }
}

pub struct BottleneckHandler;

#[async_trait]
impl Handler for BottleneckHandler {
    fn intent(&self) -> Intent {
        Intent::Bottleneck
    }

    fn instructions(&self) -> &'static str {
        "You analyse operations for delays and bottlenecks.
Explain the findings in the context in plain language, most severe first, with one concrete next step for each."
    }

    async fn context(
        &self,
        _request: &HandlerRequest<'_>,
        data: &dyn OperationsSource,
    ) -> Result<String> {
        let snapshot = data.snapshot().await?;
        let findings = BottleneckDetector::default().analyze(&snapshot);
        Ok(format_findings(&findings))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use opsdesk_core::domain::conversation::ConversationKind;
    use opsdesk_core::domain::order::{CustomerInfo, Order, OrderId, OrderStatus};
    use opsdesk_core::domain::product::{Product, ProductCategory, ProductId};
    use opsdesk_core::domain::supplier::{Supplier, SupplierId};

    use super::{
        catalog_text, order_numbers_in, CustomerHandler, Handler, HandlerRegistry, HandlerRequest,
        OrderHandler, SupplierHandler,
    };
    use crate::ops_data::StaticOperations;
    use crate::router::Intent;

    fn product(id: &str, name: &str, category: ProductCategory, quantity: u32) -> Product {
        Product {
            id: ProductId(id.to_string()),
            name: name.to_string(),
            category,
            description: "demo".to_string(),
            price: Decimal::new(149_900, 2),
            quantity,
            low_stock_threshold: 5,
            supplier_id: None,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn request(message: &str) -> HandlerRequest<'_> {
        HandlerRequest { message, history: &[], kind: ConversationKind::Consumer, supplier_id: None }
    }

    #[test]
    fn standard_registry_covers_every_intent() {
        let registry = HandlerRegistry::standard();
        assert_eq!(registry.len(), Intent::ALL.len());
        for intent in Intent::ALL {
            assert_eq!(registry.get(intent).map(|handler| handler.intent()), Some(intent));
        }
    }

    #[test]
    fn missing_handler_falls_back_to_customer() {
        let mut registry = HandlerRegistry::empty();
        registry.register(CustomerHandler);
        assert_eq!(
            registry.get(Intent::Bottleneck).map(|handler| handler.intent()),
            Some(Intent::Customer)
        );
    }

    #[test]
    fn catalog_skips_out_of_stock_products() {
        let text = catalog_text(&[
            product("p1", "Gold Necklace", ProductCategory::Jewelry, 3),
            product("p2", "Air Fryer", ProductCategory::KitchenAppliances, 0),
        ]);
        assert!(text.contains("JEWELRY:"));
        assert!(text.contains("Gold Necklace: ₹1499.00"));
        assert!(!text.contains("Air Fryer"));
    }

    #[test]
    fn order_numbers_are_extracted_case_insensitively() {
        let numbers =
            order_numbers_in("status of ord-20260301-a1b2c3? also ORD-20260301-A1B2C3, ORD-1");
        assert_eq!(numbers, vec!["ORD-20260301-A1B2C3".to_string()]);
    }

    #[tokio::test]
    async fn order_context_reports_unknown_numbers() {
        let now = Utc::now();
        let data = StaticOperations {
            orders: vec![Order {
                id: OrderId("o1".to_string()),
                order_number: "ORD-20260301-A1B2C3".to_string(),
                customer: CustomerInfo { name: "Asha".to_string(), ..CustomerInfo::default() },
                items: Vec::new(),
                total_amount: Decimal::new(2500, 0),
                status: OrderStatus::Shipped,
                assigned_staff_id: None,
                conversation_id: None,
                estimated_delivery: None,
                created_at: now,
                updated_at: now,
            }],
            ..StaticOperations::default()
        };

        let context = OrderHandler
            .context(&request("ORD-20260301-A1B2C3 and ORD-20260301-FFFFFF?"), &data)
            .await
            .expect("context");
        assert!(context.contains("ORD-20260301-A1B2C3: shipped for Asha"));
        assert!(context.contains("ORD-20260301-FFFFFF: no such order on record"));
    }

    #[tokio::test]
    async fn supplier_chat_includes_own_profile() {
        let supplier = Supplier {
            id: SupplierId("sup-001".to_string()),
            name: "Lotus Gems".to_string(),
            contact_person: "Ravi".to_string(),
            phone: "+91-9000000001".to_string(),
            email: None,
            address: None,
            categories: vec![ProductCategory::Jewelry],
            products_offered: Vec::new(),
            avg_response_time_hours: 24.0,
            reliability_score: 0.9,
            is_active: true,
            created_at: Utc::now(),
        };
        let data = StaticOperations { suppliers: vec![supplier], ..StaticOperations::default() };
        let id = SupplierId("sup-001".to_string());
        let request = HandlerRequest {
            message: "We have 20 units",
            history: &[],
            kind: ConversationKind::Supplier,
            supplier_id: Some(&id),
        };

        let context = SupplierHandler.context(&request, &data).await.expect("context");
        assert!(context.starts_with("You are talking to:\n- Lotus Gems (sup-001)"));
        assert!(context.contains("No pending supplier requests."));
    }
}
