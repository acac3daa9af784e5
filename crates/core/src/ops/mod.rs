//! Operations side of the platform: order fulfillment planning, staff workload,
//! dashboard statistics and bottleneck detection over a point-in-time snapshot.

pub mod bottleneck;
pub mod fulfillment;
pub mod snapshot;
pub mod workload;

pub use bottleneck::{
    format_findings, unrecorded_findings, BottleneckDetector, BottleneckFinding,
    BottleneckThresholds,
};
pub use fulfillment::{
    plan_order, restock_deductions, restock_outcome, settle_sibling_queries,
    supplier_queries_for, supplier_request_message, FulfillmentPlan, RequestedItem, RestockOutcome, StockShortage,
};
pub use snapshot::{
    inventory_stats, order_stats, team_utilization, workload_summary, DashboardStats,
    InventoryStats, OperationsSnapshot, OrderStats, WorkloadSummary,
};
pub use workload::{pick_assignee, pick_assignee_mut, roster_text};
