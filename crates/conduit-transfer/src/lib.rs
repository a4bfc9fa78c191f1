//! Conduit Transfer -- moving resources through discovered networks.
//!
//! # Key Types
//!
//! - [`NetworkCache`] -- per-source snapshots with a dirty marker.
//! - [`DistributionPolicy`] -- nearest, farthest or round-robin target order.
//! - [`TransferEngine`] -- one bounded move from a source into its targets.
//! - [`TransferSystem`] -- reacts to world events and drives scans and passes.

pub mod cache;
pub mod engine;
pub mod policy;
pub mod system;

pub use cache::{CacheError, NetworkCache};
pub use engine::{TransferBudget, TransferEngine};
pub use policy::{DistributionPolicy, Ordered, advance, order};
pub use system::{TickSummary, TransferSystem};
