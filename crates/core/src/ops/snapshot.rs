use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::{Order, OrderStatus};
use crate::domain::product::Product;
use crate::domain::staff::Staff;
use crate::domain::supplier::SupplierQuery;

/// Point-in-time view of the records that analytics and bottleneck detection read.
#[derive(Clone, Debug, Default)]
pub struct OperationsSnapshot {
    pub orders: Vec<Order>,
    pub products: Vec<Product>,
    pub staff: Vec<Staff>,
    pub supplier_queries: Vec<SupplierQuery>,
    pub taken_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_orders: usize,
    pub pending_orders: usize,
    pub processing_orders: usize,
    pub total_products: usize,
    pub low_stock_count: usize,
    pub active_bottlenecks: usize,
    pub staff_utilization: f64,
    pub orders_today: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub orders_today: usize,
    pub revenue_today: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub count: usize,
    pub total_value: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventoryStats {
    pub total_products: usize,
    pub out_of_stock: usize,
    pub low_stock: usize,
    pub total_value: Decimal,
    pub by_category: BTreeMap<String, CategoryStats>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemberLoad {
    pub id: String,
    pub name: String,
    pub role: String,
    pub current_workload: u32,
    pub max_workload: u32,
    pub utilization: f64,
    pub is_available: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSummary {
    pub members: Vec<MemberLoad>,
    pub total_capacity: u32,
    pub total_current: u32,
    pub utilization: f64,
    pub available_members: usize,
}

/// Team-wide utilization percentage: summed workload over summed capacity.
pub fn team_utilization(staff: &[Staff]) -> f64 {
    let capacity: u32 = staff.iter().map(|member| member.max_workload).sum();
    if capacity == 0 {
        return 0.0;
    }
    let current: u32 = staff.iter().map(|member| member.current_workload).sum();
    f64::from(current) / f64::from(capacity) * 100.0
}

fn round_one(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_hms_opt(0, 0, 0).map(|midnight| midnight.and_utc()).unwrap_or(now)
}

impl OperationsSnapshot {
    pub fn dashboard(&self, active_bottlenecks: usize) -> DashboardStats {
        let today = start_of_day(self.taken_at);
        DashboardStats {
            total_orders: self.orders.len(),
            pending_orders: self.orders.iter().filter(|order| order.status.is_open()).count(),
            processing_orders: self
                .orders
                .iter()
                .filter(|order| order.status == OrderStatus::Processing)
                .count(),
            total_products: self.products.len(),
            low_stock_count: self.products.iter().filter(|product| product.is_low_stock()).count(),
            active_bottlenecks,
            staff_utilization: round_one(team_utilization(&self.staff)),
            orders_today: self.orders.iter().filter(|order| order.created_at >= today).count(),
        }
    }
}

pub fn order_stats(orders: &[Order], now: DateTime<Utc>) -> OrderStats {
    let today = start_of_day(now);
    let mut by_status: BTreeMap<String, usize> =
        OrderStatus::ALL.iter().map(|status| (status.as_str().to_string(), 0)).collect();
    for order in orders {
        *by_status.entry(order.status.as_str().to_string()).or_default() += 1;
    }

    let todays = orders.iter().filter(|order| order.created_at >= today);
    OrderStats {
        total: orders.len(),
        by_status,
        orders_today: todays.clone().count(),
        revenue_today: todays
            .filter(|order| order.status != OrderStatus::Cancelled)
            .map(|order| order.total_amount)
            .sum(),
    }
}

pub fn inventory_stats(products: &[Product]) -> InventoryStats {
    let mut by_category: BTreeMap<String, CategoryStats> = BTreeMap::new();
    for product in products {
        let entry = by_category
            .entry(product.category.as_str().to_string())
            .or_insert(CategoryStats { count: 0, total_value: Decimal::ZERO });
        entry.count += 1;
        entry.total_value += product.stock_value();
    }

    InventoryStats {
        total_products: products.len(),
        out_of_stock: products.iter().filter(|product| product.is_out_of_stock()).count(),
        low_stock: products
            .iter()
            .filter(|product| !product.is_out_of_stock() && product.is_low_stock())
            .count(),
        total_value: products.iter().map(Product::stock_value).sum(),
        by_category,
    }
}

pub fn workload_summary(staff: &[Staff]) -> WorkloadSummary {
    WorkloadSummary {
        members: staff
            .iter()
            .map(|member| MemberLoad {
                id: member.id.0.clone(),
                name: member.name.clone(),
                role: member.role.clone(),
                current_workload: member.current_workload,
                max_workload: member.max_workload,
                utilization: round_one(member.utilization()),
                is_available: member.is_available,
            })
            .collect(),
        total_capacity: staff.iter().map(|member| member.max_workload).sum(),
        total_current: staff.iter().map(|member| member.current_workload).sum(),
        utilization: round_one(team_utilization(staff)),
        available_members: staff.iter().filter(|member| member.has_capacity()).count(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{inventory_stats, order_stats, team_utilization, workload_summary, OperationsSnapshot};
    use crate::domain::order::{CustomerInfo, Order, OrderId, OrderStatus};
    use crate::domain::product::{Product, ProductCategory, ProductId};
    use crate::domain::staff::{Staff, StaffId};

    fn order(status: OrderStatus, amount: i64, age_days: i64) -> Order {
        let created = Utc::now() - Duration::days(age_days);
        Order {
            id: OrderId(format!("ord-{amount}-{age_days}")),
            order_number: "ORD-X".to_owned(),
            customer: CustomerInfo::default(),
            items: Vec::new(),
            total_amount: Decimal::from(amount),
            status,
            assigned_staff_id: None,
            conversation_id: None,
            estimated_delivery: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn product(category: ProductCategory, quantity: u32, price: i64) -> Product {
        Product {
            id: ProductId(format!("{}-{quantity}", category.as_str())),
            name: "Thing".to_owned(),
            category,
            description: String::new(),
            price: Decimal::from(price),
            quantity,
            low_stock_threshold: 5,
            supplier_id: None,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn member(current: u32, max: u32) -> Staff {
        Staff {
            id: StaffId(format!("stf-{current}-{max}")),
            name: "Member".to_owned(),
            role: "Packer".to_owned(),
            phone: String::new(),
            email: None,
            is_available: true,
            current_workload: current,
            max_workload: max,
            skills: Vec::new(),
            tasks: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn utilization_is_summed_load_over_capacity() {
        assert!((team_utilization(&[member(3, 10), member(6, 10)]) - 45.0).abs() < 1e-9);
        assert_eq!(team_utilization(&[]), 0.0);
    }

    #[test]
    fn dashboard_counts_open_and_low_stock() {
        let snapshot = OperationsSnapshot {
            orders: vec![
                order(OrderStatus::Pending, 10, 0),
                order(OrderStatus::Confirmed, 10, 3),
                order(OrderStatus::Processing, 10, 3),
            ],
            products: vec![product(ProductCategory::Makeup, 0, 5), product(ProductCategory::Makeup, 9, 5)],
            staff: vec![member(1, 3)],
            supplier_queries: Vec::new(),
            taken_at: Utc::now(),
        };

        let stats = snapshot.dashboard(2);
        assert_eq!(stats.pending_orders, 2);
        assert_eq!(stats.processing_orders, 1);
        assert_eq!(stats.low_stock_count, 1);
        assert_eq!(stats.active_bottlenecks, 2);
        assert!((stats.staff_utilization - 33.3).abs() < 1e-9);
    }

    #[test]
    fn order_stats_exclude_cancelled_revenue() {
        let orders = vec![
            order(OrderStatus::Pending, 100, 0),
            order(OrderStatus::Cancelled, 40, 0),
            order(OrderStatus::Delivered, 70, 5),
        ];
        let stats = order_stats(&orders, Utc::now());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_status["cancelled"], 1);
        assert_eq!(stats.by_status["shipped"], 0);
        assert_eq!(stats.revenue_today, Decimal::from(100));
    }

    #[test]
    fn inventory_stats_group_by_category() {
        let products = vec![
            product(ProductCategory::Jewelry, 2, 100),
            product(ProductCategory::Jewelry, 0, 100),
            product(ProductCategory::Makeup, 10, 3),
        ];
        let stats = inventory_stats(&products);
        assert_eq!(stats.out_of_stock, 1);
        assert_eq!(stats.low_stock, 1);
        assert_eq!(stats.total_value, Decimal::from(230));
        assert_eq!(stats.by_category["jewelry"].count, 2);
    }

    #[test]
    fn workload_summary_lists_members() {
        let summary = workload_summary(&[member(5, 10), member(10, 10)]);
        assert_eq!(summary.total_capacity, 20);
        assert_eq!(summary.available_members, 1);
        assert!((summary.members[0].utilization - 50.0).abs() < 1e-9);
    }
}
