//! Input/Output: delimited tables and the result workbook

mod csv;
mod groups;
mod results;
mod workbook;

pub use self::csv::{
    read_clinical_table, read_expression_matrix, write_de_table, write_group_table, DE_COLUMNS,
};
pub use groups::{Cell, GroupTable};
pub use results::{DeResult, DeSummary, DeTable};
pub use workbook::{
    read_de_sheet, read_sheet_names, sanitize_sheet_name, write_workbook, WorkbookContents,
    DE_SHEET, GROUPS_SHEET, PATHWAY_SHEET,
};
