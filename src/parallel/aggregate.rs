//! Reassembly of partition outputs in file order

use crate::error::{FastxError, Result};
use crate::extract::ErrorPolicy;
use crate::parallel::PartitionOutput;
use crate::types::Record;
use std::collections::HashMap;
use tracing::warn;

/// Ordered result of an extraction
#[derive(Debug, Default)]
pub struct Extraction {
    /// Records in on-disk order
    pub records: Vec<Record>,
    /// Skipped records' errors in on-disk order (only with [`ErrorPolicy::Collect`])
    pub errors: Vec<FastxError>,
}

impl Extraction {
    /// Number of records extracted
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records were extracted
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Key records by id; a later duplicate replaces an earlier one
    pub fn into_map(self) -> HashMap<String, Record> {
        self.records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect()
    }
}

/// Concatenate partition outputs by start rank
///
/// Outputs may arrive in any completion order. Under [`ErrorPolicy::Abort`]
/// the error of the lowest-ranked failing partition is returned, which is
/// the first bad record in the file.
pub fn aggregate(mut outputs: Vec<PartitionOutput>, policy: ErrorPolicy) -> Result<Extraction> {
    outputs.sort_unstable_by_key(|output| output.start);

    if policy == ErrorPolicy::Abort {
        if let Some(failed) = outputs.iter_mut().find(|output| !output.errors.is_empty()) {
            return Err(failed.errors.swap_remove(0));
        }
    }

    let total = outputs.iter().map(|output| output.records.len()).sum();
    let mut extraction = Extraction {
        records: Vec::with_capacity(total),
        errors: Vec::new(),
    };

    for output in outputs {
        for error in &output.errors {
            warn!(error = %error, "skipped record");
        }
        extraction.records.extend(output.records);
        extraction.errors.extend(output.errors);
    }

    Ok(extraction)
}
