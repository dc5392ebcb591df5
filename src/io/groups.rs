//! Tabular view of a group assignment

use crate::data::AnalysisDataset;
use crate::error::{AnalysisError, Result};
use crate::stratify::GroupAssignment;

/// A worksheet/TSV cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    /// Text form for delimited output; empty cells become `NA`
    pub fn to_field(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(v) => v.to_string(),
            Cell::Empty => "NA".to_string(),
        }
    }
}

/// One row per sample: id, group, marker expression, then clinical variables
#[derive(Debug, Clone)]
pub struct GroupTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl GroupTable {
    /// Build the table for every sample of `dataset`, in dataset order.
    pub fn build(assignment: &GroupAssignment, dataset: &AnalysisDataset) -> Result<Self> {
        let expression = dataset.expression();
        if assignment.sample_ids.as_slice() != expression.sample_ids() {
            return Err(AnalysisError::SampleAlignment {
                reason: "group assignment and dataset list different samples".to_string(),
            });
        }

        let markers: Vec<Vec<f64>> = assignment
            .thresholds
            .iter()
            .map(|t| expression.gene_expression(&t.gene_id).map(|row| row.to_vec()))
            .collect::<Result<_>>()?;

        let clinical = dataset.clinical();
        let mut header = vec!["sample_id".to_string(), "group".to_string()];
        header.extend(assignment.thresholds.iter().map(|t| t.gene_id.clone()));
        header.extend(clinical.variables().iter().cloned());

        let rows = assignment
            .sample_ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let mut row = vec![
                    Cell::Text(id.clone()),
                    Cell::Text(assignment.labels[i].to_string()),
                ];
                row.extend(markers.iter().map(|m| Cell::Number(m[i])));
                row.extend(clinical.variables().iter().map(|v| {
                    clinical
                        .value(v, i)
                        .map(|s| Cell::Text(s.to_string()))
                        .unwrap_or(Cell::Empty)
                }));
                row
            })
            .collect();

        Ok(Self { header, rows })
    }
}
