//! XLSX workbook output and read-back

use std::collections::HashSet;
use std::path::Path;

use calamine::{open_workbook, DataType, Reader, Xlsx};
use rust_xlsxwriter::{Format, Image, Workbook, Worksheet};

use super::csv::DE_COLUMNS;
use super::groups::{Cell, GroupTable};
use super::results::{DeResult, DeTable};
use crate::enrichment::DatabaseEnrichment;
use crate::error::{AnalysisError, Result};

pub const DE_SHEET: &str = "DEG";
pub const GROUPS_SHEET: &str = "Groups";
pub const PATHWAY_SHEET: &str = "Pathway";

const MAX_SHEET_NAME: usize = 31;

const ENRICHMENT_COLUMNS: [&str; 8] = [
    "Rank",
    "Term",
    "P.value",
    "Adjusted.P.value",
    "Odds.Ratio",
    "Combined.Score",
    "Overlap",
    "Genes",
];

/// Everything that goes into the output workbook
pub struct WorkbookContents<'a> {
    pub groups: &'a GroupTable,
    pub de: &'a DeTable,
    pub enrichment: &'a [DatabaseEnrichment],
    /// Pre-rendered pathway diagram to embed
    pub pathway_image: Option<&'a Path>,
}

/// Make `name` a valid, unused worksheet name.
///
/// Excel rejects `[]:*?/\`, names longer than 31 characters and names that
/// differ only in case from an existing sheet.
pub fn sanitize_sheet_name(name: &str, used: &mut HashSet<String>) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches('\'').trim();
    let base: String = if cleaned.is_empty() {
        "Sheet".to_string()
    } else {
        cleaned.chars().take(MAX_SHEET_NAME).collect()
    };

    let mut candidate = base.clone();
    let mut n = 2;
    while used.contains(&candidate.to_lowercase()) {
        let suffix = format!("~{}", n);
        let keep = MAX_SHEET_NAME - suffix.chars().count();
        candidate = format!("{}{}", base.chars().take(keep).collect::<String>(), suffix);
        n += 1;
    }
    used.insert(candidate.to_lowercase());
    candidate
}

fn write_header(sheet: &mut Worksheet, columns: &[&str], bold: &Format) -> Result<()> {
    for (j, name) in columns.iter().enumerate() {
        sheet.write_string_with_format(0, j as u16, *name, bold)?;
    }
    sheet.set_freeze_panes(1, 0)?;
    Ok(())
}

/// Non-finite values are left blank
fn write_number(sheet: &mut Worksheet, row: u32, col: u16, value: f64) -> Result<()> {
    if value.is_finite() {
        sheet.write_number(row, col, value)?;
    }
    Ok(())
}

fn write_de_sheet(sheet: &mut Worksheet, table: &DeTable, bold: &Format) -> Result<()> {
    write_header(sheet, &DE_COLUMNS, bold)?;
    sheet.set_column_width(0, 20)?;
    for (i, r) in table.rows.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, &r.gene_id)?;
        write_number(sheet, row, 1, r.log_fold_change)?;
        write_number(sheet, row, 2, r.average_expression)?;
        write_number(sheet, row, 3, r.t_statistic)?;
        write_number(sheet, row, 4, r.raw_p_value)?;
        write_number(sheet, row, 5, r.adjusted_p_value)?;
        write_number(sheet, row, 6, r.b_statistic)?;
    }
    Ok(())
}

fn write_groups_sheet(sheet: &mut Worksheet, table: &GroupTable, bold: &Format) -> Result<()> {
    let header: Vec<&str> = table.header.iter().map(String::as_str).collect();
    write_header(sheet, &header, bold)?;
    sheet.set_column_width(0, 30)?;
    for (i, cells) in table.rows.iter().enumerate() {
        let row = i as u32 + 1;
        for (j, cell) in cells.iter().enumerate() {
            match cell {
                Cell::Text(s) => {
                    sheet.write_string(row, j as u16, s)?;
                }
                Cell::Number(v) => write_number(sheet, row, j as u16, *v)?,
                Cell::Empty => {}
            }
        }
    }
    Ok(())
}

fn write_enrichment_sheet(sheet: &mut Worksheet, result: &DatabaseEnrichment, bold: &Format) -> Result<()> {
    write_header(sheet, &ENRICHMENT_COLUMNS, bold)?;
    sheet.set_column_width(1, 50)?;
    for (i, t) in result.terms.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_number(row, 0, t.rank as f64)?;
        sheet.write_string(row, 1, &t.term_name)?;
        write_number(sheet, row, 2, t.p_value)?;
        write_number(sheet, row, 3, t.adjusted_p_value)?;
        write_number(sheet, row, 4, t.odds_ratio)?;
        write_number(sheet, row, 5, t.combined_score)?;
        sheet.write_number(row, 6, t.genes.len() as f64)?;
        sheet.write_string(row, 7, t.genes.join(";"))?;
    }
    Ok(())
}

/// Write the result workbook and return the sheet names in order.
///
/// Sheets: `DEG`, `Groups`, one per database with at least one enriched
/// term, and `Pathway` when a diagram image is given and exists.
pub fn write_workbook<P: AsRef<Path>>(path: P, contents: &WorkbookContents<'_>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let mut used = HashSet::new();
    let mut names = Vec::new();

    {
        let name = sanitize_sheet_name(DE_SHEET, &mut used);
        let sheet = workbook.add_worksheet();
        sheet.set_name(&name)?;
        write_de_sheet(sheet, contents.de, &bold)?;
        names.push(name);
    }

    {
        let name = sanitize_sheet_name(GROUPS_SHEET, &mut used);
        let sheet = workbook.add_worksheet();
        sheet.set_name(&name)?;
        write_groups_sheet(sheet, contents.groups, &bold)?;
        names.push(name);
    }

    for result in contents.enrichment {
        if result.terms.is_empty() {
            log::info!("{}: no enriched terms, sheet omitted", result.database);
            continue;
        }
        let name = sanitize_sheet_name(&result.database, &mut used);
        let sheet = workbook.add_worksheet();
        sheet.set_name(&name)?;
        write_enrichment_sheet(sheet, result, &bold)?;
        names.push(name);
    }

    if let Some(image_path) = contents.pathway_image {
        if image_path.exists() {
            let image = Image::new(image_path)?;
            let name = sanitize_sheet_name(PATHWAY_SHEET, &mut used);
            let sheet = workbook.add_worksheet();
            sheet.set_name(&name)?;
            sheet.write_string_with_format(0, 0, "Pathway diagram", &bold)?;
            sheet.insert_image(1, 0, &image)?;
            names.push(name);
        } else {
            log::warn!(
                "Pathway image {} not found; Pathway sheet omitted",
                image_path.display()
            );
        }
    }

    workbook.save(path)?;
    log::info!("Wrote workbook {} ({} sheets)", path.display(), names.len());
    Ok(names)
}

/// Sheet names of an existing workbook
pub fn read_sheet_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let workbook: Xlsx<_> = open_workbook(path)?;
    Ok(workbook.sheet_names().to_vec())
}

fn cell_f64(cell: &DataType) -> f64 {
    match cell {
        DataType::Float(v) => *v,
        DataType::Int(v) => *v as f64,
        DataType::String(s) => s.parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Read the DE table back from the `DEG` sheet of a workbook
pub fn read_de_sheet<P: AsRef<Path>>(path: P) -> Result<Vec<DeResult>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook
        .worksheet_range(DE_SHEET)
        .ok_or_else(|| AnalysisError::Workbook {
            reason: format!("sheet '{}' not found", DE_SHEET),
        })??;

    let mut rows = range.rows();
    let header = rows.next().ok_or_else(|| AnalysisError::Workbook {
        reason: format!("sheet '{}' is empty", DE_SHEET),
    })?;
    let header: Vec<String> = header.iter().map(|c| c.to_string()).collect();
    if header != DE_COLUMNS {
        return Err(AnalysisError::Workbook {
            reason: format!("unexpected '{}' header: {:?}", DE_SHEET, header),
        });
    }

    rows.map(|row| {
        if row.len() < DE_COLUMNS.len() {
            return Err(AnalysisError::Workbook {
                reason: format!("short row in '{}'", DE_SHEET),
            });
        }
        Ok(DeResult {
            gene_id: row[0].to_string(),
            log_fold_change: cell_f64(&row[1]),
            average_expression: cell_f64(&row[2]),
            t_statistic: cell_f64(&row[3]),
            raw_p_value: cell_f64(&row[4]),
            adjusted_p_value: cell_f64(&row[5]),
            b_statistic: cell_f64(&row[6]),
        })
    })
    .collect()
}
