//! Clinical annotation table (samples x variables)

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{AnalysisError, Result};

/// Markers used by clinical exports for "no value"
const MISSING_MARKERS: &[&str] = &[
    "",
    "NA",
    "N/A",
    "NaN",
    "nan",
    "null",
    "NULL",
    "--",
    "'--",
    "[Not Available]",
    "[Not Applicable]",
    "[Not Evaluated]",
    "[Unknown]",
    "[Discrepancy]",
];

/// Parse a raw cell into `None` when it is a missing-value marker
pub fn parse_clinical_value(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if MISSING_MARKERS.contains(&trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Clinical variables per sample. Values are kept as text; missing cells are `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalTable {
    /// Sample identifiers (row keys)
    sample_ids: Vec<String>,
    /// Variable names in file order
    variables: Vec<String>,
    /// Column-major values: `columns[v][s]`
    columns: Vec<Vec<Option<String>>>,
}

impl ClinicalTable {
    /// Create an empty table for the given samples
    pub fn new(sample_ids: Vec<String>) -> Self {
        {
            let mut seen = HashSet::new();
            for id in &sample_ids {
                if !seen.insert(id) {
                    log::warn!("Duplicate clinical sample ID '{}'; the first row is used", id);
                }
            }
        }
        Self {
            sample_ids,
            variables: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Add a variable column
    pub fn add_variable(&mut self, name: &str, values: Vec<Option<String>>) -> Result<()> {
        if values.len() != self.sample_ids.len() {
            return Err(AnalysisError::DimensionMismatch {
                expected: format!("{} values", self.sample_ids.len()),
                got: format!("{} values", values.len()),
            });
        }
        if self.variables.iter().any(|v| v == name) {
            return Err(AnalysisError::InvalidClinical {
                reason: format!("duplicate variable '{}'", name),
            });
        }
        self.variables.push(name.to_string());
        self.columns.push(values);
        Ok(())
    }

    /// Get sample IDs
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get number of samples
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Variable names in order
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Column for a variable
    pub fn column(&self, name: &str) -> Option<&[Option<String>]> {
        self.variables
            .iter()
            .position(|v| v == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Value of a variable for one sample
    pub fn value(&self, name: &str, sample_idx: usize) -> Option<&str> {
        self.column(name)
            .and_then(|col| col.get(sample_idx))
            .and_then(|v| v.as_deref())
    }

    /// Fraction of missing cells for a variable
    pub fn missing_fraction(&self, name: &str) -> Option<f64> {
        let col = self.column(name)?;
        if col.is_empty() {
            return Some(1.0);
        }
        let missing = col.iter().filter(|v| v.is_none()).count();
        Some(missing as f64 / col.len() as f64)
    }

    /// Keep only the named variables (in the requested order).
    /// Unknown names are an error.
    pub fn select_variables(&self, names: &[String]) -> Result<Self> {
        let mut out = Self {
            sample_ids: self.sample_ids.clone(),
            variables: Vec::with_capacity(names.len()),
            columns: Vec::with_capacity(names.len()),
        };
        for name in names {
            let col = self.column(name).ok_or_else(|| AnalysisError::InvalidClinical {
                reason: format!("variable '{}' not found", name),
            })?;
            out.variables.push(name.clone());
            out.columns.push(col.to_vec());
        }
        Ok(out)
    }

    /// Drop variables whose missing fraction exceeds `max_missing_fraction`.
    /// Returns the names of the dropped variables.
    pub fn drop_sparse_variables(&mut self, max_missing_fraction: f64) -> Vec<String> {
        let fractions: Vec<f64> = self
            .variables
            .iter()
            .map(|name| self.missing_fraction(name).unwrap_or(1.0))
            .collect();
        let mut dropped = Vec::new();
        let mut kept_vars = Vec::new();
        let mut kept_cols = Vec::new();
        for ((name, col), missing) in self.variables.drain(..).zip(self.columns.drain(..)).zip(fractions) {
            if missing > max_missing_fraction {
                dropped.push(name);
            } else {
                kept_vars.push(name);
                kept_cols.push(col);
            }
        }
        self.variables = kept_vars;
        self.columns = kept_cols;
        dropped
    }

    /// Subset rows to specific samples (in the given order)
    pub fn subset_samples(&self, sample_indices: &[usize]) -> Self {
        Self {
            sample_ids: sample_indices.iter().map(|&i| self.sample_ids[i].clone()).collect(),
            variables: self.variables.clone(),
            columns: self
                .columns
                .iter()
                .map(|col| sample_indices.iter().map(|&i| col[i].clone()).collect())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ClinicalTable {
        let mut t = ClinicalTable::new(vec!["p1".into(), "p2".into(), "p3".into(), "p4".into()]);
        t.add_variable(
            "stage",
            vec![Some("I".into()), Some("II".into()), None, Some("III".into())],
        )
        .unwrap();
        t.add_variable("smoking", vec![None, None, None, Some("yes".into())])
            .unwrap();
        t
    }

    #[test]
    fn test_missing_markers() {
        assert_eq!(parse_clinical_value(" [Not Available] "), None);
        assert_eq!(parse_clinical_value("NA"), None);
        assert_eq!(parse_clinical_value("'--"), None);
        assert_eq!(parse_clinical_value(" stage ii "), Some("stage ii".to_string()));
    }

    #[test]
    fn test_missing_fraction_and_drop() {
        let mut t = table();
        assert_eq!(t.missing_fraction("stage"), Some(0.25));
        assert_eq!(t.missing_fraction("smoking"), Some(0.75));
        let dropped = t.drop_sparse_variables(0.5);
        assert_eq!(dropped, vec!["smoking".to_string()]);
        assert_eq!(t.variables(), &["stage"]);
    }

    #[test]
    fn test_select_and_subset() {
        let t = table();
        let selected = t.select_variables(&["smoking".to_string()]).unwrap();
        assert_eq!(selected.variables(), &["smoking"]);
        assert!(t.select_variables(&["age".to_string()]).is_err());

        let sub = t.subset_samples(&[3, 0]);
        assert_eq!(sub.sample_ids(), &["p4", "p1"]);
        assert_eq!(sub.value("stage", 0), Some("III"));
        assert_eq!(sub.value("smoking", 1), None);
    }

    #[test]
    fn test_duplicate_variable_rejected() {
        let mut t = table();
        assert!(t.add_variable("stage", vec![None; 4]).is_err());
        assert!(t.add_variable("age", vec![None; 3]).is_err());
    }
}
