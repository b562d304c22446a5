//! Common types used throughout fastxmap

use std::fmt;
use std::io::{self, Write};

/// Default line width for sequence wrapping (70 characters)
pub const DEFAULT_LINE_WIDTH: usize = 70;

/// Declared text format of a sequence buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// `>`-prefixed header followed by one or more sequence lines
    Fasta,
    /// Fixed 4-line groups: `@` header, sequence, `+` separator, quality
    Fastq,
}

impl Format {
    /// Header marker byte for this format
    pub fn marker(self) -> u8 {
        match self {
            Format::Fasta => b'>',
            Format::Fastq => b'@',
        }
    }

    /// Guess the format from the first non-whitespace byte
    ///
    /// Returns `None` when the first non-whitespace byte is neither marker.
    /// Empty or whitespace-only input is reported as FASTA, which indexes to
    /// zero records.
    ///
    /// ```
    /// use fastxmap::Format;
    ///
    /// assert_eq!(Format::detect(b"\n>chr1\nACGT\n"), Some(Format::Fasta));
    /// assert_eq!(Format::detect(b"@r1\nACGT\n+\n!!!!\n"), Some(Format::Fastq));
    /// assert_eq!(Format::detect(b"ACGT\n"), None);
    /// ```
    pub fn detect(bytes: &[u8]) -> Option<Format> {
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            None | Some(b'>') => Some(Format::Fasta),
            Some(b'@') => Some(Format::Fastq),
            Some(_) => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Fasta => f.write_str("FASTA"),
            Format::Fastq => f.write_str("FASTQ"),
        }
    }
}

/// A FASTA or FASTQ record
///
/// `description` holds the header text after the marker (trailing whitespace
/// removed), so it starts with `id` for every parsed record: `>s1 desc one`
/// yields `id == "s1"` and `description == "s1 desc one"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Sequence identifier (first header token, without the marker)
    pub id: String,
    /// Header text after the marker, may be empty
    pub description: String,
    /// Residues with line terminators removed
    pub sequence: Vec<u8>,
    /// Quality string (FASTQ only, same length as `sequence`)
    pub quality: Option<Vec<u8>>,
}

impl Record {
    /// Create a new record without quality
    pub fn new(id: impl Into<String>, description: impl Into<String>, sequence: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            sequence,
            quality: None,
        }
    }

    /// Attach a quality string
    pub fn with_quality(mut self, quality: Vec<u8>) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Sequence length
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Check if the record has an empty sequence
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Header line without the marker
    ///
    /// `id` followed by the description when it is non-empty. A description
    /// that already begins with the id token (the parsed form) is used as-is,
    /// so parsing, formatting and parsing again is the identity.
    pub fn header(&self) -> String {
        if self.description.is_empty() {
            return self.id.clone();
        }

        let rest = self.description.strip_prefix(self.id.as_str());
        match rest {
            Some(tail) if tail.is_empty() || tail.starts_with(|c: char| c.is_ascii_whitespace()) => {
                self.description.clone()
            }
            _ => format!("{} {}", self.id, self.description),
        }
    }

    /// FASTA header line, `>` included
    pub fn header_line(&self) -> String {
        format!(">{}", self.header())
    }

    /// Write the record as FASTA, wrapping sequence lines at `wrap` characters
    ///
    /// A width of 0 writes the sequence on a single line.
    pub fn write_fasta<W: Write>(&self, out: &mut W, wrap: usize) -> io::Result<()> {
        out.write_all(self.header_line().as_bytes())?;
        out.write_all(b"\n")?;

        if wrap == 0 {
            out.write_all(&self.sequence)?;
            out.write_all(b"\n")?;
        } else {
            for line in self.sequence.chunks(wrap) {
                out.write_all(line)?;
                out.write_all(b"\n")?;
            }
        }

        Ok(())
    }

    /// Write the record as a 4-line FASTQ group
    ///
    /// Records without quality are written with an empty quality line.
    pub fn write_fastq<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(b"@")?;
        out.write_all(self.header().as_bytes())?;
        out.write_all(b"\n")?;
        out.write_all(&self.sequence)?;
        out.write_all(b"\n+\n")?;
        out.write_all(self.quality.as_deref().unwrap_or_default())?;
        out.write_all(b"\n")
    }

    /// Format the record as FASTA text
    ///
    /// ```
    /// use fastxmap::Record;
    ///
    /// let record = Record::new("NP_055309.2", "TNRC6A", b"MRELEAKAT".to_vec());
    /// assert_eq!(record.format(3), ">NP_055309.2 TNRC6A\nMRE\nLEA\nKAT\n");
    /// assert_eq!(record.format(0), ">NP_055309.2 TNRC6A\nMRELEAKAT\n");
    /// ```
    pub fn format(&self, wrap: usize) -> String {
        self.render(|record, buf| record.write_fasta(buf, wrap))
    }

    /// Format the record as FASTQ text
    pub fn to_fastq(&self) -> String {
        self.render(|record, buf| record.write_fastq(buf))
    }

    fn render(&self, write: impl FnOnce(&Self, &mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::with_capacity(2 * self.sequence.len() + self.description.len() + 16);
        // Writing into a Vec cannot fail
        let _ = write(self, &mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.format(DEFAULT_LINE_WIDTH).trim_end())
    }
}

/// Why a header line could not be split into id and description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeaderError {
    MissingMarker,
    MissingId,
}

impl HeaderError {
    pub(crate) fn message(self, marker: u8) -> String {
        match self {
            HeaderError::MissingMarker => {
                format!("Expected '{}' at start of header", marker as char)
            }
            HeaderError::MissingId => {
                format!("Missing identifier after '{}'", marker as char)
            }
        }
    }
}

/// Split a header line (terminator excluded) into `(id, description)`
pub(crate) fn split_header(
    line: &[u8],
    marker: u8,
) -> std::result::Result<(String, String), HeaderError> {
    let text = match line.split_first() {
        Some((&first, rest)) if first == marker => rest.trim_ascii_end(),
        _ => return Err(HeaderError::MissingMarker),
    };

    let id_len = text
        .iter()
        .position(|b| b.is_ascii_whitespace())
        .unwrap_or(text.len());
    if id_len == 0 {
        return Err(HeaderError::MissingId);
    }

    Ok((
        String::from_utf8_lossy(&text[..id_len]).into_owned(),
        String::from_utf8_lossy(text).into_owned(),
    ))
}

/// Strip a trailing `\r` left by CRLF line endings
pub(crate) fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}
