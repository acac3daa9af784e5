pub mod activity;
pub mod bottleneck;
pub mod conversation;
pub mod lead;
pub mod order;
pub mod product;
pub mod staff;
pub mod supplier;
