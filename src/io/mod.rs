//! I/O: compression sniffing, buffering, sequential streams and writers
//!
//! - [`compression`]: codec detection and decoders (gzip, bgzip, bzip2, zip,
//!   zstd, lz4)
//! - [`buffer`]: the flat byte buffer the boundary index is built over
//! - [`fasta`] and [`FastqStream`]: sequential, constant-memory readers
//!   producing the same records as indexed extraction

pub mod buffer;
pub mod compression;
pub mod fasta;
mod fastq;

pub use buffer::SequenceBuffer;
pub use compression::{sniff, CodecTag, CompressedReader, CompressedWriter, Decoder};
pub use fasta::{FastaStream, FastaWriter};
pub use fastq::{FastqStream, FastqWriter};
