//! FASTA output with fixed-width sequence lines

use crate::error::Result;
use crate::io::compression::CompressedWriter;
use crate::types::{Record, DEFAULT_LINE_WIDTH};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// FASTA writer
///
/// Sequence lines are wrapped at [`DEFAULT_LINE_WIDTH`] characters unless
/// configured otherwise; a width of 0 writes each sequence on one line.
///
/// # Example
///
/// ```no_run
/// use fastxmap::{FastaWriter, Record};
///
/// # fn main() -> fastxmap::Result<()> {
/// let mut writer = FastaWriter::create("out.fa.gz")?.with_line_width(60);
/// writer.write_record(&Record::new("chr1", "chr1 assembled", b"ACGT".to_vec()))?;
/// writer.finish()?;
/// # Ok(())
/// # }
/// ```
pub struct FastaWriter<W: Write> {
    writer: W,
    line_width: usize,
    records_written: usize,
}

impl FastaWriter<CompressedWriter> {
    /// Create a FASTA file; a `.gz` extension enables gzip compression
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(CompressedWriter::create(path)?))
    }

    /// Flush, finalize compression and return the number of records written
    pub fn finish(self) -> Result<usize> {
        debug!(records = self.records_written, "finished FASTA output");
        self.writer.finish()?;
        Ok(self.records_written)
    }
}

impl<W: Write> FastaWriter<W> {
    /// Wrap any writer
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            line_width: DEFAULT_LINE_WIDTH,
            records_written: 0,
        }
    }

    /// Set the sequence line width (0 disables wrapping)
    pub fn with_line_width(mut self, width: usize) -> Self {
        self.line_width = width;
        self
    }

    /// Write one record
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        record.write_fasta(&mut self.writer, self.line_width)?;
        self.records_written += 1;
        Ok(())
    }

    /// Number of records written so far
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Flush and return the inner writer
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
