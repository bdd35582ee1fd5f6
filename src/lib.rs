//! Credit Manager - Distributed per-minute credit limiter
//!
//! This crate throttles consumption of an expensive shared resource across
//! cooperating processes. Each resource declares how many credits it may spend
//! per minute; the balance lives in an external key-value store whose key
//! expiry doubles as the replenishment clock.

pub mod config;
pub mod credit;
pub mod error;
pub mod store;

pub use credit::{CreditManager, RegulatedResource, ResourceId, StaticResource};
pub use error::{CreditError, Result};
pub use store::{BalanceStore, InMemoryStore, StoreError};
