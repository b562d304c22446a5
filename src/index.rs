//! Boundary indexing: one sequential scan over the whole buffer
//!
//! # Strategies
//!
//! - **FASTA** (header-marker scan): every `>` at the start of a line opens a
//!   record; its header span `[line_start, line_end)` is recorded. The last
//!   record is closed by an end-of-buffer sentinel.
//! - **FASTQ** (fixed-stride scan): line terminator positions are collected
//!   and grouped in runs of four (header, sequence, separator, quality).
//!
//! The scan is never split across threads. Cutting raw bytes into shards
//! before indexing can sever a header across a shard edge; only the finished,
//! strictly increasing boundary list is partitioned.

use crate::error::{FastxError, Result};
use crate::types::Format;
use memchr::{memchr, memchr_iter};
use tracing::debug;

/// Half-open byte range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// First byte
    pub start: usize,
    /// One past the last byte
    pub end: usize,
}

impl Span {
    /// Create a span
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Header spans of a FASTA buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaBoundaries {
    /// Header line spans (terminator excluded), strictly increasing
    pub headers: Vec<Span>,
    /// End-of-buffer sentinel closing the final record
    pub sentinel: usize,
}

/// Line terminator positions of a FASTQ buffer, four per record
///
/// A final line without a terminator is closed at end of content, so every
/// record owns exactly four entries. Blank lines before the first record are
/// skipped and not listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqBoundaries {
    /// Start of the first record's header line
    pub start: usize,
    /// Terminator position of every record line, strictly increasing
    pub line_ends: Vec<usize>,
}

impl FastqBoundaries {
    /// Byte offset of record `i`'s `@` line
    pub fn record_start(&self, i: usize) -> usize {
        if i == 0 {
            self.start
        } else {
            self.line_ends[4 * i - 1] + 1
        }
    }

    /// Spans of the four lines of record `i` (terminators excluded)
    pub fn lines(&self, i: usize) -> [Span; 4] {
        let base = 4 * i;
        let mut start = self.record_start(i);
        let mut spans = [Span::new(0, 0); 4];
        for (k, span) in spans.iter_mut().enumerate() {
            let end = self.line_ends[base + k];
            *span = Span::new(start, end);
            start = end + 1;
        }
        spans
    }
}

/// Ordered record boundaries of one buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryIndex {
    /// Header-marker scan result
    Fasta(FastaBoundaries),
    /// Fixed-stride scan result
    Fastq(FastqBoundaries),
}

impl BoundaryIndex {
    /// Scan `buf` for record boundaries of the declared `format`
    ///
    /// # Errors
    ///
    /// - FASTA: non-whitespace bytes before the first header
    /// - FASTQ: a final group with fewer than 4 lines (leading and trailing
    ///   blank lines are ignored)
    ///
    /// Both carry the byte offset of the offending content.
    ///
    /// # Example
    ///
    /// ```
    /// use fastxmap::index::BoundaryIndex;
    /// use fastxmap::Format;
    ///
    /// let index = BoundaryIndex::build(b">s1 desc\nACGT\n>s2\nTT\n", Format::Fasta)?;
    /// assert_eq!(index.len(), 2);
    /// assert_eq!(index.offsets(), vec![0, 14]);
    /// # Ok::<(), fastxmap::FastxError>(())
    /// ```
    pub fn build(buf: &[u8], format: Format) -> Result<Self> {
        let index = match format {
            Format::Fasta => BoundaryIndex::Fasta(scan_fasta(buf)?),
            Format::Fastq => BoundaryIndex::Fastq(scan_fastq(buf)?),
        };
        debug!(format = %format, records = index.len(), bytes = buf.len(), "indexed boundaries");
        Ok(index)
    }

    /// Format the index was built for
    pub fn format(&self) -> Format {
        match self {
            BoundaryIndex::Fasta(_) => Format::Fasta,
            BoundaryIndex::Fastq(_) => Format::Fastq,
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        match self {
            BoundaryIndex::Fasta(b) => b.headers.len(),
            BoundaryIndex::Fastq(b) => b.line_ends.len() / 4,
        }
    }

    /// Whether the buffer holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte offset where record `i` starts
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()`.
    pub fn record_offset(&self, i: usize) -> usize {
        match self {
            BoundaryIndex::Fasta(b) => b.headers[i].start,
            BoundaryIndex::Fastq(b) => b.record_start(i),
        }
    }

    /// Start offsets of all records, strictly increasing
    pub fn offsets(&self) -> Vec<usize> {
        (0..self.len()).map(|i| self.record_offset(i)).collect()
    }
}

fn scan_fasta(buf: &[u8]) -> Result<FastaBoundaries> {
    let mut headers = Vec::new();
    let mut pos = 0;

    while let Some(rel) = memchr(b'>', &buf[pos..]) {
        let start = pos + rel;
        if start == 0 || buf[start - 1] == b'\n' {
            let end = memchr(b'\n', &buf[start..]).map_or(buf.len(), |n| start + n);
            headers.push(Span::new(start, end));
            pos = end;
        } else {
            pos = start + 1;
        }
    }

    // Only blank lines may precede the first header
    let first = headers.first().map_or(buf.len(), |span| span.start);
    if let Some(offset) = buf[..first].iter().position(|b| !b.is_ascii_whitespace()) {
        return Err(FastxError::InvalidFasta {
            offset: offset as u64,
            msg: "Expected '>' at start of header".to_string(),
        });
    }

    Ok(FastaBoundaries {
        headers,
        sentinel: buf.len(),
    })
}

fn scan_fastq(buf: &[u8]) -> Result<FastqBoundaries> {
    let mut line_ends: Vec<usize> = memchr_iter(b'\n', buf).collect();
    if line_ends.last().map_or(0, |&end| end + 1) < buf.len() {
        line_ends.push(buf.len());
    }

    // Blank lines after the last complete record do not count as records
    let mut content_lines = line_ends.len();
    while content_lines > 0 {
        let start = if content_lines == 1 { 0 } else { line_ends[content_lines - 2] + 1 };
        let line = &buf[start..line_ends[content_lines - 1]];
        if !line.iter().all(u8::is_ascii_whitespace) {
            break;
        }
        content_lines -= 1;
    }

    // So do blank lines before the first record
    let mut leading = 0;
    let mut start = 0;
    while leading < content_lines {
        let line = &buf[start..line_ends[leading]];
        if !line.iter().all(u8::is_ascii_whitespace) {
            break;
        }
        start = line_ends[leading] + 1;
        leading += 1;
    }
    line_ends.drain(..leading);
    let content_lines = content_lines - leading;

    let records = content_lines.div_ceil(4);
    if 4 * records > line_ends.len() {
        let group = 4 * (records - 1);
        let offset = if group == 0 { start } else { line_ends[group - 1] + 1 };
        return Err(FastxError::InvalidFastq {
            offset: offset as u64,
            msg: format!("Truncated record: {} of 4 lines", line_ends.len() - group),
        });
    }
    line_ends.truncate(4 * records);

    Ok(FastqBoundaries { start, line_ends })
}
