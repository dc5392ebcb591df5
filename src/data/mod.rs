//! Data structures for the stratified expression analysis

pub mod alignment;
mod clinical;
mod dataset;
mod expression;

pub use alignment::{align_samples, tcga_sample_type, AlignedSamples, SampleMatching};
pub use clinical::{parse_clinical_value, ClinicalTable};
pub use dataset::AnalysisDataset;
pub use expression::{gene_symbol, ExpressionMatrix};
