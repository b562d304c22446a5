//! Sequential FASTQ stream and writer
//!
//! Records are fixed 4-line groups: `@header`, sequence, `+separator`,
//! quality. Multi-line FASTQ is not supported. Blank lines before the first
//! record are skipped and trailing blank lines end the stream; anything else
//! that breaks the 4-line grouping is an error.

use crate::error::{FastxError, Result};
use crate::io::compression::{CompressedReader, CompressedWriter};
use crate::io::fasta::trim_newline;
use crate::types::{split_header, Record};
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::debug;

/// FASTQ streaming parser
///
/// Reuses four line buffers across records. Errors carry the byte offset of
/// the offending line; a structural error (truncated group, stray blank
/// line) ends the stream, while a bad record inside an intact group does not.
///
/// # Example
///
/// ```no_run
/// use fastxmap::FastqStream;
///
/// # fn main() -> fastxmap::Result<()> {
/// for record in FastqStream::from_path("large.fq.gz")? {
///     let record = record?;
///     let _mean_q = record.quality.as_deref().map(|q| q.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct FastqStream<R: BufRead> {
    reader: R,
    lines: [Vec<u8>; 4],
    starts: [u64; 4],
    offset: u64,
    /// Set once the first group has been read
    started: bool,
    finished: bool,
}

impl FastqStream<CompressedReader> {
    /// Open a FASTQ file, decompressing it if needed
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_reader(CompressedReader::open(path)?))
    }
}

impl<R: BufRead> FastqStream<R> {
    /// Create a FASTQ stream from any buffered reader
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader,
            lines: Default::default(),
            starts: [0; 4],
            offset: 0,
            started: false,
            finished: false,
        }
    }

    /// Read line `slot` of the current group; false at end of input
    fn read_line(&mut self, slot: usize) -> Result<bool> {
        let line = &mut self.lines[slot];
        line.clear();
        let n = self.reader.read_until(b'\n', line)?;
        self.starts[slot] = self.offset;
        self.offset += n as u64;
        Ok(n > 0)
    }

    fn is_blank(&self, slot: usize) -> bool {
        self.lines[slot].iter().all(u8::is_ascii_whitespace)
    }

    /// Fill all four slots; `Ok(false)` when input ends cleanly
    fn read_group(&mut self) -> Result<bool> {
        if !self.read_line(0)? {
            return Ok(false);
        }

        if !self.started {
            while self.is_blank(0) {
                if !self.read_line(0)? {
                    return Ok(false);
                }
            }
        } else if self.is_blank(0) {
            let blank = self.starts[0];
            while self.read_line(0)? {
                if !self.is_blank(0) {
                    return Err(FastxError::InvalidFastq {
                        offset: blank,
                        msg: "Expected '@' at start of header".to_string(),
                    });
                }
            }
            return Ok(false);
        }

        for slot in 1..4 {
            if !self.read_line(slot)? {
                return Err(FastxError::InvalidFastq {
                    offset: self.starts[0],
                    msg: format!("Truncated record: {} of 4 lines", slot),
                });
            }
        }
        self.started = true;
        Ok(true)
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        if self.finished {
            return Ok(None);
        }

        match self.read_group() {
            Ok(true) => {}
            Ok(false) => {
                self.finished = true;
                return Ok(None);
            }
            Err(e) => {
                self.finished = true;
                return Err(e);
            }
        }

        let (id, description) =
            split_header(trim_newline(&self.lines[0]), b'@').map_err(|e| {
                FastxError::InvalidFastq {
                    offset: self.starts[0],
                    msg: e.message(b'@'),
                }
            })?;

        if self.lines[2].first() != Some(&b'+') {
            return Err(FastxError::InvalidFastq {
                offset: self.starts[2],
                msg: "Expected '+' at start of separator".to_string(),
            });
        }

        let sequence = trim_newline(&self.lines[1]);
        let quality = trim_newline(&self.lines[3]);
        if sequence.len() != quality.len() {
            return Err(FastxError::InvalidFastq {
                offset: self.starts[3],
                msg: format!(
                    "Sequence length ({}) != quality length ({})",
                    sequence.len(),
                    quality.len()
                ),
            });
        }

        Ok(Some(
            Record::new(id, description, sequence.to_vec()).with_quality(quality.to_vec()),
        ))
    }
}

impl<R: BufRead> Iterator for FastqStream<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

/// FASTQ writer
///
/// Records without quality are written with an empty quality line, which
/// no reader accepts unless the sequence is empty too.
///
/// ```no_run
/// use fastxmap::{FastqStream, FastqWriter};
///
/// # fn main() -> fastxmap::Result<()> {
/// let mut writer = FastqWriter::create("trimmed.fq.gz")?;
/// for record in FastqStream::from_path("reads.fq.zst")? {
///     writer.write_record(&record?)?;
/// }
/// writer.finish()?;
/// # Ok(())
/// # }
/// ```
pub struct FastqWriter<W: Write> {
    writer: W,
    records_written: usize,
}

impl FastqWriter<CompressedWriter> {
    /// Create a FASTQ file; a `.gz` extension enables gzip compression
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(CompressedWriter::create(path)?))
    }

    /// Flush, finalize compression and return the number of records written
    pub fn finish(self) -> Result<usize> {
        debug!(records = self.records_written, "finished FASTQ output");
        self.writer.finish()?;
        Ok(self.records_written)
    }
}

impl<W: Write> FastqWriter<W> {
    /// Wrap any writer
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            records_written: 0,
        }
    }

    /// Write one record as a 4-line group
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        record.write_fastq(&mut self.writer)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    fn parse(data: &[u8]) -> Result<Vec<Record>> {
        FastqStream::from_reader(BufReader::new(Cursor::new(data))).collect()
    }

    #[test]
    fn test_parse_valid_fastq() {
        let records = parse(b"@SEQ_ID run=1\nGATTACA\n+\n!!!!!!!\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "SEQ_ID");
        assert_eq!(records[0].description, "SEQ_ID run=1");
        assert_eq!(records[0].sequence, b"GATTACA");
        assert_eq!(records[0].quality.as_deref(), Some(&b"!!!!!!!"[..]));
    }

    #[test]
    fn test_parse_multiple_records_and_trailing_blank_lines() {
        let records = parse(b"@SEQ1\nGAT\n+\n!!!\n@SEQ2\nTACA\n+SEQ2\n!!!!\n\n\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "SEQ1");
        assert_eq!(records[1].id, "SEQ2");
    }

    #[test]
    fn test_crlf_and_no_final_newline() {
        let records = parse(b"@r1\r\nACGT\r\n+\r\nIIII").unwrap();
        assert_eq!(records[0].sequence, b"ACGT");
        assert_eq!(records[0].quality.as_deref(), Some(&b"IIII"[..]));
    }

    #[test]
    fn test_invalid_header() {
        let err = parse(b"SEQ_ID\nGATTACA\n+\n!!!!!!!\n").unwrap_err();
        assert!(matches!(err, FastxError::InvalidFastq { offset: 0, .. }));
    }

    #[test]
    fn test_truncated_record() {
        let err = parse(b"@r1\nACGT\n+\n!!!!\n@r2\nAC\n").unwrap_err();
        assert_eq!(err.offset(), Some(16));
    }

    #[test]
    fn test_bad_separator_and_length() {
        let err = parse(b"@r1\nACGT\n-\n!!!!\n").unwrap_err();
        assert_eq!(err.offset(), Some(9));

        let err = parse(b"@r1\nACGT\n+\n!!!\n").unwrap_err();
        assert_eq!(err.offset(), Some(11));
    }

    #[test]
    fn test_bad_record_does_not_stop_stream() {
        let data = b"@r1\nACGT\n+\n!!\n@r2\nAC\n+\nII\n";
        let mut stream = FastqStream::from_reader(BufReader::new(Cursor::new(&data[..])));
        assert!(stream.next().unwrap().is_err());
        assert_eq!(stream.next().unwrap().unwrap().id, "r2");
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_blank_line_between_records() {
        let err = parse(b"@r1\nA\n+\nI\n\n@r2\nA\n+\nI\n").unwrap_err();
        assert_eq!(err.offset(), Some(10));
    }

    #[test]
    fn test_leading_blank_lines_skipped() {
        let records = parse(b"\n \r\n@r1\nACGT\n+\nIIII\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "r1");
        assert!(parse(b"\n\n").unwrap().is_empty());

        // Offsets still count the skipped bytes
        let err = parse(b"\n\n@r1\nACGT\n").unwrap_err();
        assert_eq!(err.offset(), Some(2));
    }

    #[test]
    fn test_writer_round_trip() {
        let records = vec![
            Record::new("r1", "r1 lane=2", b"ACGT".to_vec()).with_quality(b"IIII".to_vec()),
            Record::new("r2", "r2", b"GG".to_vec()).with_quality(b"#!".to_vec()),
        ];
        let mut writer = FastqWriter::new(Vec::new());
        for record in &records {
            writer.write_record(record).unwrap();
        }
        assert_eq!(writer.records_written(), 2);

        let out = writer.into_inner().unwrap();
        assert_eq!(&out[..19], b"@r1 lane=2\nACGT\n+\nI");
        assert_eq!(parse(&out).unwrap(), records);
    }

    use proptest::prelude::*;

    proptest! {
        /// Valid records parse back to their parts
        #[test]
        fn test_fastq_roundtrip(
            id in "[A-Za-z0-9_]{1,50}",
            seq in "[ACGTN]{1,500}",
        ) {
            let qual = "I".repeat(seq.len());
            let fastq = format!("@{}\n{}\n+\n{}\n", id, seq, qual);

            let records = parse(fastq.as_bytes()).unwrap();
            prop_assert_eq!(records.len(), 1);
            prop_assert_eq!(&records[0].id, &id);
            prop_assert_eq!(&records[0].sequence, seq.as_bytes());
            prop_assert_eq!(records[0].quality.as_deref(), Some(qual.as_bytes()));
        }

        /// Sequence and quality lengths must agree
        #[test]
        fn test_fastq_rejects_length_mismatch(
            id in "[A-Za-z0-9_]{1,50}",
            seq in "[ACGT]{10,20}",
            qual_len in 21..30usize,
        ) {
            let fastq = format!("@{}\n{}\n+\n{}\n", id, seq, "I".repeat(qual_len));
            prop_assert!(parse(fastq.as_bytes()).is_err());
        }

        /// Headers without '@' are rejected
        #[test]
        fn test_fastq_invalid_header(
            id in "[A-Za-z0-9_]{1,50}",
            seq in "[ACGT]{10,20}",
        ) {
            let fastq = format!("{}\n{}\n+\n{}\n", id, seq, "I".repeat(seq.len()));
            prop_assert!(parse(fastq.as_bytes()).is_err());
        }
    }
}
