//! fastxmap: memory-mapped, index-first FASTA/FASTQ extraction
//!
//! # Overview
//!
//! A sequence file is materialized into records in three phases:
//!
//! 1. **Load**: sniff the compression envelope, then memory-map plain files
//!    or decode compressed ones into one contiguous buffer
//! 2. **Index**: one sequential scan records every record boundary
//! 3. **Extract**: the boundary list is cut into balanced ranges that a
//!    bounded rayon pool materializes in parallel; results are reassembled
//!    in on-disk order
//!
//! Output is identical for any worker count, and identical to the
//! sequential [`FastaStream`] and [`FastqStream`] readers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fastxmap::Format;
//!
//! # fn main() -> fastxmap::Result<()> {
//! let records = fastxmap::extract("reads.fq.gz", Format::Fastq)?;
//! for record in &records {
//!     println!("{}\t{}", record.id, record.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`io`]: compression, buffering, streams and writers
//! - [`index`]: boundary scanning
//! - [`parallel`]: partitioning, materialization and aggregation
//! - [`extract`]: the [`IndexedReader`] driver and its options
//! - [`types`]: [`Record`] and [`Format`]
//!
//! Logging goes through `tracing`; install a subscriber to see it.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod extract;
pub mod index;
pub mod io;
pub mod parallel;
pub mod types;

pub use error::{FastxError, Result};
pub use extract::{extract, extract_with, ErrorPolicy, ExtractOptions, IndexedReader};
pub use io::{sniff, CodecTag, FastaStream, FastaWriter, FastqStream, FastqWriter};
pub use parallel::Extraction;
pub use types::{Format, Record, DEFAULT_LINE_WIDTH};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
