//! Indexed, parallel record extraction
//!
//! # Pipeline
//!
//! 1. Sniff the compression envelope ([`sniff`](crate::io::sniff))
//! 2. Map or decode the file into one flat buffer ([`SequenceBuffer`])
//! 3. Scan record boundaries once, sequentially ([`BoundaryIndex`])
//! 4. Split the boundaries into one balanced range per worker ([`partition`])
//! 5. Materialize every range on a bounded rayon pool ([`materialize`])
//! 6. Reassemble the outputs by start rank ([`aggregate`])
//!
//! The buffer is owned by [`IndexedReader`] and released when the reader is
//! dropped, on success and on every error path alike.
//!
//! # Example
//!
//! ```no_run
//! use fastxmap::{ErrorPolicy, ExtractOptions, IndexedReader};
//!
//! # fn main() -> fastxmap::Result<()> {
//! let reader = IndexedReader::open_detect("reads.fq.gz")?;
//! println!("{} records ({} codec)", reader.len(), reader.codec());
//!
//! let options = ExtractOptions::new()
//!     .with_threads(8)
//!     .with_error_policy(ErrorPolicy::Collect);
//! let extraction = reader.extract(&options)?;
//! for error in &extraction.errors {
//!     eprintln!("skipped: {}", error);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{FastxError, Result};
use crate::index::BoundaryIndex;
use crate::io::{CodecTag, SequenceBuffer};
use crate::parallel::{aggregate, materialize, partition, worker_count, Extraction};
use crate::types::{Format, Record};
use rayon::prelude::*;
use std::path::Path;
use tracing::debug;

/// What to do when a record fails to materialize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Fail the whole extraction with the first bad record in file order
    #[default]
    Abort,
    /// Skip bad records and report them in [`Extraction::errors`]
    Collect,
}

/// Extraction settings
///
/// # Example
///
/// ```
/// use fastxmap::{ErrorPolicy, ExtractOptions, Format};
///
/// let options = ExtractOptions::new()
///     .with_format(Format::Fastq)
///     .with_threads(4)
///     .with_error_policy(ErrorPolicy::Collect);
/// assert_eq!(options.threads, Some(4));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Declared format; `None` detects it from the first record marker
    pub format: Option<Format>,
    /// Worker count; `None` uses every available core
    pub threads: Option<usize>,
    /// Partial-failure policy
    pub error_policy: ErrorPolicy,
}

impl ExtractOptions {
    /// Defaults: detect format, all cores, abort on first error
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the format instead of detecting it
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Set the worker count (clamped to `[1, available cores]`)
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Set the partial-failure policy
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }
}

/// A sequence file mapped into memory with its record boundaries indexed
///
/// Holds the only reference to the buffer; materialized records own their
/// data, so they outlive the reader.
#[derive(Debug)]
pub struct IndexedReader {
    buffer: SequenceBuffer,
    codec: CodecTag,
    index: BoundaryIndex,
}

impl IndexedReader {
    /// Open `path` as `format`
    pub fn open<P: AsRef<Path>>(path: P, format: Format) -> Result<Self> {
        let (buffer, codec) = SequenceBuffer::open(path)?;
        Self::build(buffer, codec, Some(format))
    }

    /// Open `path`, detecting FASTA or FASTQ from the first record marker
    pub fn open_detect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (buffer, codec) = SequenceBuffer::open(path)?;
        Self::build(buffer, codec, None)
    }

    /// Index in-memory bytes (treated as plain text)
    pub fn from_bytes(bytes: Vec<u8>, format: Format) -> Result<Self> {
        Self::build(SequenceBuffer::from_bytes(bytes), CodecTag::Plain, Some(format))
    }

    fn build(buffer: SequenceBuffer, codec: CodecTag, format: Option<Format>) -> Result<Self> {
        let format = match format {
            Some(format) => format,
            None => detect_format(&buffer)?,
        };
        let index = BoundaryIndex::build(&buffer, format)?;
        Ok(Self {
            buffer,
            codec,
            index,
        })
    }

    /// Codec the file was stored with
    pub fn codec(&self) -> CodecTag {
        self.codec
    }

    /// Format the buffer was indexed as
    pub fn format(&self) -> Format {
        self.index.format()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the file holds no records
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether the buffer is a memory map (plain, non-empty input)
    pub fn is_mapped(&self) -> bool {
        self.buffer.is_mapped()
    }

    /// Boundary index of the buffer
    pub fn index(&self) -> &BoundaryIndex {
        &self.index
    }

    /// Raw (decompressed) file content
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Materialize all records in parallel, in file order
    ///
    /// `options.format` is ignored here; the format was fixed when the
    /// reader was opened.
    pub fn extract(&self, options: &ExtractOptions) -> Result<Extraction> {
        let workers = worker_count(options.threads);
        let partitions = partition(self.index.len(), workers);
        debug!(
            records = self.index.len(),
            workers,
            partitions = partitions.len(),
            policy = ?options.error_policy,
            "extracting records"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| FastxError::WorkerPool(e.to_string()))?;

        let buf: &[u8] = &self.buffer;
        let index = &self.index;
        let policy = options.error_policy;
        let outputs = pool.install(|| {
            partitions
                .par_iter()
                .map(|part| materialize(part, buf, index, policy))
                .collect::<Vec<_>>()
        });

        aggregate(outputs, policy)
    }

    /// Materialize all records with default options
    pub fn records(&self) -> Result<Vec<Record>> {
        Ok(self.extract(&ExtractOptions::default())?.records)
    }
}

/// Detect the format of a buffer, failing on an unknown first marker
fn detect_format(buf: &[u8]) -> Result<Format> {
    Format::detect(buf).ok_or_else(|| {
        let offset = buf
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(0);
        FastxError::InvalidFasta {
            offset: offset as u64,
            msg: "Expected '>' or '@' at start of first header".to_string(),
        }
    })
}

/// Extract every record of `path` in file order
///
/// Aborts on the first bad record and uses every available core.
///
/// ```no_run
/// use fastxmap::Format;
///
/// # fn main() -> fastxmap::Result<()> {
/// let records = fastxmap::extract("genome.fa.gz", Format::Fasta)?;
/// for record in &records {
///     println!("{}: {} bp", record.id, record.len());
/// }
/// # Ok(())
/// # }
/// ```
pub fn extract<P: AsRef<Path>>(path: P, format: Format) -> Result<Vec<Record>> {
    IndexedReader::open(path, format)?.records()
}

/// Extract every record of `path` with explicit options
pub fn extract_with<P: AsRef<Path>>(path: P, options: &ExtractOptions) -> Result<Extraction> {
    let reader = match options.format {
        Some(format) => IndexedReader::open(path, format)?,
        None => IndexedReader::open_detect(path)?,
    };
    reader.extract(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_a() {
        let reader =
            IndexedReader::from_bytes(b">s1 desc one\nACGT\nACG\n>s2\nTTTT\n".to_vec(), Format::Fasta)
                .unwrap();
        let records = reader.records().unwrap();
        assert_eq!(
            records,
            vec![
                Record::new("s1", "s1 desc one", b"ACGTACG".to_vec()),
                Record::new("s2", "s2", b"TTTT".to_vec()),
            ]
        );
    }

    #[test]
    fn test_scenario_b_empty_input() {
        for format in [Format::Fasta, Format::Fastq] {
            let reader = IndexedReader::from_bytes(Vec::new(), format).unwrap();
            assert!(reader.is_empty());
            assert!(reader.records().unwrap().is_empty());
        }
    }

    #[test]
    fn test_scenario_c_fastq() {
        let reader = IndexedReader::from_bytes(b"@r1\nACGT\n+\n!!!!\n".to_vec(), Format::Fastq).unwrap();
        let records = reader.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "r1");
        assert_eq!(records[0].sequence, b"ACGT");
        assert_eq!(records[0].quality.as_deref(), Some(&b"!!!!"[..]));

        let err = IndexedReader::from_bytes(b"@r1\nACGT\n+\n!!!!\n@r2\n".to_vec(), Format::Fastq)
            .unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_fastq_leading_blank_lines_match_stream() {
        let text = b"\n\n@r1\nACGT\n+\nIIII\n@r2\nGG\n+\n!!\n".to_vec();
        let streamed: Vec<Record> = crate::FastqStream::from_reader(&text[..])
            .collect::<Result<_>>()
            .unwrap();

        let reader = IndexedReader::from_bytes(text.clone(), Format::Fastq).unwrap();
        assert_eq!(reader.index().offsets(), vec![2, 18]);
        assert_eq!(reader.records().unwrap(), streamed);
        assert_eq!(streamed.len(), 2);

        let mut truncated = text;
        truncated.truncate(11);
        let indexed = IndexedReader::from_bytes(truncated.clone(), Format::Fastq).unwrap_err();
        let streamed = crate::FastqStream::from_reader(&truncated[..])
            .next()
            .unwrap()
            .unwrap_err();
        assert_eq!(indexed.to_string(), streamed.to_string());
    }

    #[test]
    fn test_thread_counts_agree() {
        let mut text = Vec::new();
        for i in 0..257 {
            text.extend_from_slice(format!(">seq{} sample {}\nACGTN\nGG\n", i, i % 7).as_bytes());
        }
        let reader = IndexedReader::from_bytes(text, Format::Fasta).unwrap();

        let single = reader.extract(&ExtractOptions::new().with_threads(1)).unwrap();
        for threads in [2, 3, 8, 64] {
            let many = reader.extract(&ExtractOptions::new().with_threads(threads)).unwrap();
            assert_eq!(many.records, single.records);
        }
        assert_eq!(single.len(), 257);
        assert_eq!(single.records[256].id, "seq256");
    }

    #[test]
    fn test_error_policies() {
        let text = b">a\nAC\n>\nGT\n>c\nTT\n> x\nAA\n".to_vec();
        let reader = IndexedReader::from_bytes(text, Format::Fasta).unwrap();

        let err = reader.extract(&ExtractOptions::new().with_threads(4)).unwrap_err();
        assert_eq!(err.offset(), Some(6));

        let collected = reader
            .extract(
                &ExtractOptions::new()
                    .with_threads(4)
                    .with_error_policy(ErrorPolicy::Collect),
            )
            .unwrap();
        let ids: Vec<&str> = collected.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        let offsets: Vec<Option<u64>> = collected.errors.iter().map(FastxError::offset).collect();
        assert_eq!(offsets, vec![Some(6), Some(17)]);
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(b"\n@r\nA\n+\n!\n").unwrap(), Format::Fastq);
        assert_eq!(detect_format(b"").unwrap(), Format::Fasta);
        let err = detect_format(b"  ACGT").unwrap_err();
        assert_eq!(err.offset(), Some(2));
    }
}
