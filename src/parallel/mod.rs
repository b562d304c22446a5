//! Parallel phase: partitioning, materialization and ordered aggregation
//!
//! Runs only after the boundary index is complete. Partitions are disjoint
//! contiguous index ranges, so workers share the buffer and the index
//! read-only and never synchronize.

mod aggregate;
mod materialize;
mod partition;

pub use aggregate::{aggregate, Extraction};
pub use materialize::{materialize, materialize_record, PartitionOutput};
pub use partition::{partition, worker_count, Partition};
