//! Matching expression sample identifiers to clinical records

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{AnalysisError, Result};

/// How expression sample IDs are matched against clinical sample IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "length")]
pub enum SampleMatching {
    /// Identifiers must be identical
    Exact,
    /// Compare the first N characters (TCGA patient barcode = 12)
    Prefix(usize),
}

impl Default for SampleMatching {
    fn default() -> Self {
        SampleMatching::Prefix(12)
    }
}

impl SampleMatching {
    /// Key used for matching
    pub fn key<'a>(&self, id: &'a str) -> &'a str {
        match *self {
            SampleMatching::Exact => id,
            SampleMatching::Prefix(n) => match id.char_indices().nth(n) {
                Some((byte_idx, _)) => &id[..byte_idx],
                None => id,
            },
        }
    }
}

/// Two-digit sample type code of a TCGA aliquot barcode.
///
/// `TCGA-A1-A0SB-01A-11R-A144-07` -> `01` (primary solid tumour).
/// Returns `None` when the identifier has no sample field.
pub fn tcga_sample_type(barcode: &str) -> Option<&str> {
    let field = barcode.split('-').nth(3)?;
    if field.len() >= 2 && field.is_char_boundary(2) && field[..2].chars().all(|c| c.is_ascii_digit()) {
        Some(&field[..2])
    } else {
        None
    }
}

/// Paired indices of matched samples, in expression order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedSamples {
    pub expression_indices: Vec<usize>,
    pub clinical_indices: Vec<usize>,
}

impl AlignedSamples {
    pub fn len(&self) -> usize {
        self.expression_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expression_indices.is_empty()
    }
}

/// Align expression samples with clinical rows.
///
/// Expression samples are visited in order. When `sample_types` is non-empty,
/// only barcodes whose sample type code is listed are considered. A clinical
/// key that was already claimed by an earlier expression sample is skipped, so
/// each patient contributes at most one sample.
pub fn align_samples(
    expression_ids: &[String],
    clinical_ids: &[String],
    matching: SampleMatching,
    sample_types: &[String],
) -> Result<AlignedSamples> {
    let mut clinical_by_key: HashMap<&str, usize> = HashMap::new();
    for (i, id) in clinical_ids.iter().enumerate() {
        clinical_by_key.entry(matching.key(id)).or_insert(i);
    }

    let mut claimed: HashMap<usize, &str> = HashMap::new();
    let mut expression_indices = Vec::new();
    let mut clinical_indices = Vec::new();
    let mut type_filtered = 0usize;
    let mut unmatched = 0usize;

    for (i, id) in expression_ids.iter().enumerate() {
        if !sample_types.is_empty() {
            let keep = tcga_sample_type(id)
                .map(|t| sample_types.iter().any(|s| s == t))
                .unwrap_or(false);
            if !keep {
                type_filtered += 1;
                continue;
            }
        }

        match clinical_by_key.get(matching.key(id)) {
            Some(&ci) => {
                if let Some(first) = claimed.get(&ci) {
                    log::warn!(
                        "Sample '{}' maps to the same clinical record as '{}'; skipped",
                        id,
                        first
                    );
                    continue;
                }
                claimed.insert(ci, id.as_str());
                expression_indices.push(i);
                clinical_indices.push(ci);
            }
            None => unmatched += 1,
        }
    }

    if type_filtered > 0 {
        log::info!(
            "{} samples removed by sample type filter {:?}",
            type_filtered,
            sample_types
        );
    }
    if unmatched > 0 {
        log::warn!("{} expression samples have no clinical record", unmatched);
    }

    if expression_indices.is_empty() {
        return Err(AnalysisError::SampleAlignment {
            reason: format!(
                "no expression sample matched a clinical record ({} expression, {} clinical, matching {:?})",
                expression_ids.len(),
                clinical_ids.len(),
                matching
            ),
        });
    }

    Ok(AlignedSamples {
        expression_indices,
        clinical_indices,
    })
}
