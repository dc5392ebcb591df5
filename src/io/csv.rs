//! Delimited text input and output for expression, clinical and result tables

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ndarray::Array2;

use super::groups::GroupTable;
use super::results::DeTable;
use crate::data::{parse_clinical_value, ClinicalTable, ExpressionMatrix};
use crate::error::{AnalysisError, Result};

/// Column names of the DE table, as printed by topTable
pub const DE_COLUMNS: [&str; 7] = ["gene_id", "logFC", "AveExpr", "t", "P.Value", "adj.P.Val", "B"];

/// Tab if the first non-empty line contains one, otherwise comma
fn detect_delimiter(path: &Path) -> Result<u8> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        return Ok(if line.contains('\t') { b'\t' } else { b',' });
    }
    Err(AnalysisError::EmptyData {
        reason: format!("{} is empty", path.display()),
    })
}

/// Header plus records of a delimited file, all fields trimmed
fn read_table(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let delimiter = detect_delimiter(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let header: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
    let mut records = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        if record.len() != header.len() {
            return Err(AnalysisError::InvalidInput {
                reason: format!(
                    "{}: row {} has {} columns, expected {}",
                    path.display(),
                    line + 2,
                    record.len(),
                    header.len()
                ),
            });
        }
        records.push(record.iter().map(|s| s.to_string()).collect());
    }
    Ok((header, records))
}

/// Read an expression matrix from CSV or TSV.
///
/// With `genes_in_rows` the first column holds gene IDs and the header holds
/// sample IDs; otherwise rows are samples and columns are genes.
pub fn read_expression_matrix<P: AsRef<Path>>(path: P, genes_in_rows: bool) -> Result<ExpressionMatrix> {
    let path = path.as_ref();
    let (header, records) = read_table(path)?;

    if header.len() < 2 {
        return Err(AnalysisError::InvalidExpressionMatrix {
            reason: "Not enough columns in header".to_string(),
        });
    }
    if records.is_empty() {
        return Err(AnalysisError::EmptyData {
            reason: "No data rows in expression file".to_string(),
        });
    }

    let col_ids: Vec<String> = header[1..].to_vec();
    let mut row_ids = Vec::with_capacity(records.len());
    let mut values = Array2::zeros((records.len(), col_ids.len()));

    for (i, record) in records.iter().enumerate() {
        row_ids.push(record[0].clone());
        for (j, field) in record[1..].iter().enumerate() {
            values[[i, j]] = field.parse::<f64>().map_err(|_| AnalysisError::InvalidExpressionMatrix {
                reason: format!(
                    "Invalid expression value '{}' at row '{}', column '{}'",
                    field, record[0], col_ids[j]
                ),
            })?;
        }
    }

    log::info!(
        "Read expression file {}: {} rows x {} columns",
        path.display(),
        row_ids.len(),
        col_ids.len()
    );

    if genes_in_rows {
        ExpressionMatrix::new(values, row_ids, col_ids)
    } else {
        ExpressionMatrix::new(values.t().to_owned(), col_ids, row_ids)
    }
}

/// Read a clinical table: first column sample IDs, remaining columns variables.
/// Missing-value markers become `None`.
pub fn read_clinical_table<P: AsRef<Path>>(path: P) -> Result<ClinicalTable> {
    let path = path.as_ref();
    let (header, records) = read_table(path)?;

    if header.is_empty() {
        return Err(AnalysisError::InvalidClinical {
            reason: "Clinical header has no columns".to_string(),
        });
    }
    if records.is_empty() {
        return Err(AnalysisError::EmptyData {
            reason: "No samples found in clinical table".to_string(),
        });
    }

    let sample_ids: Vec<String> = records.iter().map(|r| r[0].clone()).collect();
    let mut table = ClinicalTable::new(sample_ids);
    for (v, name) in header.iter().enumerate().skip(1) {
        let column = records.iter().map(|r| parse_clinical_value(&r[v])).collect();
        table.add_variable(name, column)?;
    }

    log::info!(
        "Read clinical table {}: {} samples, {} variables",
        path.display(),
        table.n_samples(),
        table.variables().len()
    );

    Ok(table)
}

fn tsv_writer<P: AsRef<Path>>(path: P) -> Result<csv::Writer<File>> {
    Ok(csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?)
}

/// Write the DE table as TSV.
///
/// Numbers use the shortest representation that parses back to the same f64.
pub fn write_de_table<P: AsRef<Path>>(path: P, table: &DeTable) -> Result<()> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(DE_COLUMNS)?;
    for row in &table.rows {
        writer.write_record([
            row.gene_id.clone(),
            row.log_fold_change.to_string(),
            row.average_expression.to_string(),
            row.t_statistic.to_string(),
            row.raw_p_value.to_string(),
            row.adjusted_p_value.to_string(),
            row.b_statistic.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the group assignment table as TSV
pub fn write_group_table<P: AsRef<Path>>(path: P, table: &GroupTable) -> Result<()> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(&table.header)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|c| c.to_field()))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::DeResult;
    use crate::testing::AdjustMethod;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_expression_genes_in_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gene_id\ts1\ts2\ts3").unwrap();
        writeln!(file, "TP53|7157\t1.5\t2\t3.25").unwrap();
        writeln!(file, "EGFR|1956\t5\t7.5\t6").unwrap();

        let matrix = read_expression_matrix(file.path(), true).unwrap();
        assert_eq!(matrix.n_genes(), 2);
        assert_eq!(matrix.n_samples(), 3);
        assert_eq!(matrix.values()[[0, 2]], 3.25);
        assert_eq!(matrix.gene_index("EGFR"), Some(1));
    }

    #[test]
    fn test_read_expression_samples_in_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample,TP53,EGFR").unwrap();
        writeln!(file, "s1,1,2").unwrap();
        writeln!(file, "s2,3,4").unwrap();
        writeln!(file, "s3,5,6").unwrap();

        let matrix = read_expression_matrix(file.path(), false).unwrap();
        assert_eq!(matrix.gene_ids(), &["TP53", "EGFR"]);
        assert_eq!(matrix.sample_ids(), &["s1", "s2", "s3"]);
        assert_eq!(matrix.values()[[1, 2]], 6.0);
    }

    #[test]
    fn test_read_expression_rejects_bad_input() {
        let mut ragged = NamedTempFile::new().unwrap();
        writeln!(ragged, "gene,s1,s2").unwrap();
        writeln!(ragged, "g1,1").unwrap();
        assert!(read_expression_matrix(ragged.path(), true).is_err());

        let mut text = NamedTempFile::new().unwrap();
        writeln!(text, "gene,s1,s2").unwrap();
        writeln!(text, "g1,1,abc").unwrap();
        assert!(read_expression_matrix(text.path(), true).is_err());

        let empty = NamedTempFile::new().unwrap();
        assert!(read_expression_matrix(empty.path(), true).is_err());
    }

    #[test]
    fn test_read_clinical_table() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "bcr_patient_barcode\tstage\tage").unwrap();
        writeln!(file, "TCGA-AA-0001\tStage II\t61").unwrap();
        writeln!(file, "TCGA-AA-0002\t[Not Available]\t").unwrap();

        let table = read_clinical_table(file.path()).unwrap();
        assert_eq!(table.sample_ids(), &["TCGA-AA-0001", "TCGA-AA-0002"]);
        assert_eq!(table.variables(), &["stage", "age"]);
        assert_eq!(table.value("stage", 0), Some("Stage II"));
        assert_eq!(table.value("stage", 1), None);
        assert_eq!(table.value("age", 1), None);
    }

    #[test]
    fn test_write_de_table() {
        let table = DeTable {
            contrast: "high-low".to_string(),
            adjust_method: AdjustMethod::Bh,
            p_value_cutoff: 0.05,
            lfc_cutoff: 0.0,
            n_tested: 10,
            rows: vec![DeResult {
                gene_id: "MYC".to_string(),
                log_fold_change: 1.0 / 3.0,
                average_expression: 7.5,
                t_statistic: -4.2,
                raw_p_value: 1.2345678901234e-7,
                adjusted_p_value: 0.001,
                b_statistic: 6.1,
            }],
        };
        let file = NamedTempFile::new().unwrap();
        write_de_table(file.path(), &table).unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "gene_id\tlogFC\tAveExpr\tt\tP.Value\tadj.P.Val\tB");
        let fields: Vec<&str> = lines.next().unwrap().split('\t').collect();
        assert_eq!(fields[0], "MYC");
        assert_eq!(fields[1].parse::<f64>().unwrap(), 1.0 / 3.0);
        assert_eq!(fields[4].parse::<f64>().unwrap(), 1.2345678901234e-7);
    }
}
