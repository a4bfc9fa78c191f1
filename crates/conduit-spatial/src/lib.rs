//! Spatial side of conduit networks: breadth-first discovery of sinks
//! reachable from each source, and the per-face connection flags pipes
//! render with.

pub mod geometry;
pub mod scan;

pub use geometry::{connections_for, refresh, refresh_around};
pub use scan::{ScanJob, ScanProgress, ScanReport, rescan};
