//! FASTA format support: sequential stream and writer
//!
//! ```no_run
//! use fastxmap::io::fasta::{FastaStream, FastaWriter};
//!
//! # fn main() -> fastxmap::Result<()> {
//! let mut writer = FastaWriter::create("filtered.fa")?;
//! for record in FastaStream::from_path("genome.fa.gz")? {
//!     let record = record?;
//!     if record.len() >= 1_000 {
//!         writer.write_record(&record)?;
//!     }
//! }
//! writer.finish()?;
//! # Ok(())
//! # }
//! ```

mod parser;
mod writer;

pub(crate) use parser::trim_newline;
pub use parser::FastaStream;
pub use writer::FastaWriter;
