//! Sequential FASTA stream with constant memory
//!
//! # Format
//!
//! ```text
//! >sequence1 description
//! GATTACAGATTACA
//! TGCATGCA
//! >sequence2
//! ACGTACGT
//! ```
//!
//! Produces exactly the records [`IndexedReader`](crate::IndexedReader)
//! extracts from the same bytes, one at a time and in order. Useful for
//! inputs too large to hold decompressed in memory.

use crate::error::{FastxError, Result};
use crate::io::compression::CompressedReader;
use crate::types::{split_header, strip_cr, Record};
use std::io::BufRead;
use std::path::Path;

/// FASTA streaming parser
///
/// Keeps one line buffer and the record being built. Blank lines may
/// precede the first header; after that every line up to the next `>` is
/// sequence. A header followed directly by another header yields an empty
/// sequence.
///
/// # Example
///
/// ```no_run
/// use fastxmap::FastaStream;
///
/// let stream = FastaStream::from_path("genome.fa.gz")?;
/// for record in stream {
///     let record = record?;
///     println!("{}: {} bp", record.id, record.sequence.len());
/// }
/// # Ok::<(), fastxmap::FastxError>(())
/// ```
pub struct FastaStream<R: BufRead> {
    reader: R,
    line: Vec<u8>,
    /// Bytes consumed so far
    offset: u64,
    /// Header line read ahead while finishing the previous record
    next_header: Option<(u64, Vec<u8>)>,
    finished: bool,
}

impl FastaStream<CompressedReader> {
    /// Open a FASTA file, decompressing it if needed
    ///
    /// ```no_run
    /// use fastxmap::FastaStream;
    ///
    /// let stream = FastaStream::from_path("genome.fa.bz2")?;
    /// # Ok::<(), fastxmap::FastxError>(())
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_reader(CompressedReader::open(path)?))
    }
}

impl<R: BufRead> FastaStream<R> {
    /// Create a FASTA stream from any buffered reader
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader,
            line: Vec::with_capacity(256),
            offset: 0,
            next_header: None,
            finished: false,
        }
    }

    /// Read the next line into `self.line`; returns its starting offset
    fn read_line(&mut self) -> Result<Option<u64>> {
        self.line.clear();
        let n = self.reader.read_until(b'\n', &mut self.line)?;
        if n == 0 {
            return Ok(None);
        }
        let start = self.offset;
        self.offset += n as u64;
        Ok(Some(start))
    }

    /// Find the first header, skipping leading blank lines
    fn first_header(&mut self) -> Result<Option<(u64, Vec<u8>)>> {
        while let Some(start) = self.read_line()? {
            let Some(pos) = self.line.iter().position(|b| !b.is_ascii_whitespace()) else {
                continue;
            };
            if pos != 0 || self.line[0] != b'>' {
                self.finished = true;
                return Err(FastxError::InvalidFasta {
                    offset: start + pos as u64,
                    msg: "Expected '>' at start of header".to_string(),
                });
            }
            return Ok(Some((start, std::mem::take(&mut self.line))));
        }
        Ok(None)
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        if self.finished {
            return Ok(None);
        }

        let (header_offset, header) = match self.next_header.take() {
            Some(header) => header,
            None => match self.first_header()? {
                Some(header) => header,
                None => {
                    self.finished = true;
                    return Ok(None);
                }
            },
        };

        let mut sequence = Vec::new();
        loop {
            match self.read_line()? {
                None => {
                    self.finished = true;
                    break;
                }
                Some(start) if self.line.first() == Some(&b'>') => {
                    self.next_header = Some((start, std::mem::take(&mut self.line)));
                    break;
                }
                Some(_) => sequence.extend_from_slice(trim_newline(&self.line)),
            }
        }

        let (id, description) =
            split_header(trim_newline(&header), b'>').map_err(|e| FastxError::InvalidFasta {
                offset: header_offset,
                msg: e.message(b'>'),
            })?;

        Ok(Some(Record::new(id, description, sequence)))
    }
}

impl<R: BufRead> Iterator for FastaStream<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

/// Strip a `\n` or `\r\n` terminator
pub(crate) fn trim_newline(line: &[u8]) -> &[u8] {
    strip_cr(line.strip_suffix(b"\n").unwrap_or(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    fn parse(fasta: &[u8]) -> Result<Vec<Record>> {
        FastaStream::from_reader(BufReader::new(Cursor::new(fasta))).collect()
    }

    #[test]
    fn test_parse_single_record() {
        let fasta = b">seq1\nGATTACA\n";
        let mut stream = FastaStream::from_reader(BufReader::new(Cursor::new(fasta)));

        let record = stream.next().unwrap().unwrap();
        assert_eq!(record.id, "seq1");
        assert_eq!(record.sequence, b"GATTACA");

        assert!(stream.next().is_none());
    }

    #[test]
    fn test_parse_multiline_sequence() {
        let records = parse(b">seq1\nGATT\nACA\n>seq2\nACGT\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence, b"GATTACA");
        assert_eq!(records[1].id, "seq2");
        assert_eq!(records[1].sequence, b"ACGT");
    }

    #[test]
    fn test_parse_with_description() {
        let records = parse(b">seq1 this is a description\nGATTACA\n").unwrap();
        assert_eq!(records[0].id, "seq1");
        assert_eq!(records[0].description, "seq1 this is a description");
    }

    #[test]
    fn test_crlf_and_missing_final_newline() {
        let records = parse(b">a x\r\nAC\r\nGT\r\n>b\r\nTT").unwrap();
        assert_eq!(records[0].description, "a x");
        assert_eq!(records[0].sequence, b"ACGT");
        assert_eq!(records[1].sequence, b"TT");
    }

    #[test]
    fn test_leading_blank_lines() {
        let records = parse(b"\n  \n>seq1\nACGT\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "seq1");
    }

    #[test]
    fn test_empty_sequence() {
        let records = parse(b">seq1\n>seq2\nACGT\n").unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].sequence.is_empty());
        assert_eq!(records[1].sequence, b"ACGT");
    }

    #[test]
    fn test_invalid_no_header() {
        let mut stream = FastaStream::from_reader(BufReader::new(Cursor::new(&b"\nGATTACA\n"[..])));

        let err = stream.next().unwrap().unwrap_err();
        assert!(matches!(err, FastxError::InvalidFasta { offset: 1, .. }));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_missing_id_does_not_stop_stream() {
        let mut stream =
            FastaStream::from_reader(BufReader::new(Cursor::new(&b">a\nAC\n> x\nGT\n>c\nTT\n"[..])));

        assert_eq!(stream.next().unwrap().unwrap().id, "a");
        assert_eq!(stream.next().unwrap().unwrap_err().offset(), Some(6));
        assert_eq!(stream.next().unwrap().unwrap().id, "c");
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_empty_file() {
        assert!(parse(b"").unwrap().is_empty());
        assert!(parse(b"\n\n").unwrap().is_empty());
    }

    use proptest::prelude::*;

    proptest! {
        /// Valid single records parse back to their parts
        #[test]
        fn test_fasta_roundtrip(
            id in "[A-Za-z0-9_]{1,50}",
            seq in "[ACGTN]{0,500}",
        ) {
            let fasta = format!(">{}\n{}\n", id, seq);
            let records = parse(fasta.as_bytes()).unwrap();

            prop_assert_eq!(records.len(), 1);
            prop_assert_eq!(&records[0].id, &id);
            prop_assert_eq!(&records[0].sequence, seq.as_bytes());
        }

        /// Wrapped sequence lines are joined
        #[test]
        fn test_fasta_multiline(
            id in "[A-Za-z0-9_]{1,50}",
            line_count in 2..10usize,
        ) {
            let mut fasta = format!(">{}\n", id);
            let line_seq = "ACGT".repeat(20);
            for _ in 0..line_count {
                fasta.push_str(&line_seq);
                fasta.push('\n');
            }

            let expected = line_seq.repeat(line_count);
            let records = parse(fasta.as_bytes()).unwrap();
            prop_assert_eq!(records.len(), 1);
            prop_assert_eq!(&records[0].sequence, expected.as_bytes());
        }

        /// The id stops at the first whitespace; the description keeps the whole header
        #[test]
        fn test_fasta_description_kept(
            id in "[A-Za-z0-9_]{1,50}",
            description in "[A-Za-z0-9]{1,20}( [A-Za-z0-9]{1,20}){0,4}",
            seq in "[ACGT]{10,100}",
        ) {
            let fasta = format!(">{} {}\n{}\n", id, description, seq);
            let records = parse(fasta.as_bytes()).unwrap();

            prop_assert_eq!(&records[0].id, &id);
            let header = format!("{} {}", id, description);
            prop_assert_eq!(&records[0].description, &header);
        }

        /// Content before the first header is rejected
        #[test]
        fn test_fasta_invalid_header(
            id in "[A-Za-z0-9_]{1,50}",
            seq in "[ACGT]{10,100}",
        ) {
            let fasta = format!("{}\n{}\n", id, seq);
            prop_assert!(parse(fasta.as_bytes()).is_err());
        }
    }
}
