//! Linear model fitting for expression data

mod design;
mod fit;

pub use design::{check_full_rank, contrast_vector, group_design_matrix, DesignInfo};
pub use fit::{contrasts_fit, lm_fit, LinearModelFit};
