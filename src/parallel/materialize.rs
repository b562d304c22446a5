//! Record materialization from byte spans of the shared buffer
//!
//! Workers only read: each one gets `&[u8]` over the whole buffer and the
//! shared boundary index, and touches the byte ranges of its own partition.

use crate::error::{FastxError, Result};
use crate::extract::ErrorPolicy;
use crate::index::{BoundaryIndex, FastaBoundaries, FastqBoundaries};
use crate::parallel::Partition;
use crate::types::{split_header, strip_cr, Record};
use memchr::memchr_iter;
use tracing::trace;

/// Records (and errors) produced by one partition
#[derive(Debug)]
pub struct PartitionOutput {
    /// Rank of the partition's first record
    pub start: usize,
    /// Materialized records in file order
    pub records: Vec<Record>,
    /// Record errors in file order; at most one under [`ErrorPolicy::Abort`]
    pub errors: Vec<FastxError>,
}

/// Materialize every record of `partition`
///
/// Under [`ErrorPolicy::Abort`] the partition stops at its first bad record;
/// under [`ErrorPolicy::Collect`] bad records are skipped and kept as errors.
pub fn materialize(
    partition: &Partition,
    buf: &[u8],
    index: &BoundaryIndex,
    policy: ErrorPolicy,
) -> PartitionOutput {
    let mut output = PartitionOutput {
        start: partition.start,
        records: Vec::with_capacity(partition.len()),
        errors: Vec::new(),
    };

    for i in partition.range() {
        match materialize_record(buf, index, i) {
            Ok(record) => output.records.push(record),
            Err(e) => {
                output.errors.push(e);
                if policy == ErrorPolicy::Abort {
                    break;
                }
            }
        }
    }

    trace!(
        start = partition.start,
        end = partition.end,
        records = output.records.len(),
        errors = output.errors.len(),
        "materialized partition"
    );
    output
}

/// Build record `i` of `index` from `buf`
pub fn materialize_record(buf: &[u8], index: &BoundaryIndex, i: usize) -> Result<Record> {
    match index {
        BoundaryIndex::Fasta(b) => fasta_record(buf, b, i),
        BoundaryIndex::Fastq(b) => fastq_record(buf, b, i),
    }
}

fn fasta_record(buf: &[u8], bounds: &FastaBoundaries, i: usize) -> Result<Record> {
    let header = bounds.headers[i];
    let (id, description) =
        split_header(strip_cr(&buf[header.start..header.end]), b'>').map_err(|e| {
            FastxError::InvalidFasta {
                offset: header.start as u64,
                msg: e.message(b'>'),
            }
        })?;

    let seq_end = bounds
        .headers
        .get(i + 1)
        .map_or(bounds.sentinel, |next| next.start);
    let seq_start = (header.end + 1).min(seq_end);

    Ok(Record::new(id, description, join_lines(&buf[seq_start..seq_end])))
}

fn fastq_record(buf: &[u8], bounds: &FastqBoundaries, i: usize) -> Result<Record> {
    let [header, seq, sep, qual] = bounds.lines(i);

    let (id, description) =
        split_header(strip_cr(&buf[header.start..header.end]), b'@').map_err(|e| {
            FastxError::InvalidFastq {
                offset: header.start as u64,
                msg: e.message(b'@'),
            }
        })?;

    if buf.get(sep.start) != Some(&b'+') {
        return Err(FastxError::InvalidFastq {
            offset: sep.start as u64,
            msg: "Expected '+' at start of separator".to_string(),
        });
    }

    let sequence = strip_cr(&buf[seq.start..seq.end]);
    let quality = strip_cr(&buf[qual.start..qual.end]);
    if sequence.len() != quality.len() {
        return Err(FastxError::InvalidFastq {
            offset: qual.start as u64,
            msg: format!(
                "Sequence length ({}) != quality length ({})",
                sequence.len(),
                quality.len()
            ),
        });
    }

    Ok(Record::new(id, description, sequence.to_vec()).with_quality(quality.to_vec()))
}

/// Concatenate the lines of `bytes`, dropping `\n` and `\r\n` terminators
fn join_lines(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut start = 0;
    for nl in memchr_iter(b'\n', bytes) {
        out.extend_from_slice(strip_cr(&bytes[start..nl]));
        start = nl + 1;
    }
    out.extend_from_slice(strip_cr(&bytes[start..]));
    out
}
