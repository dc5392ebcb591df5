//! Quantile stratification of samples by marker gene expression

mod groups;
mod split;

pub use groups::{GroupAssignment, GroupLabel, MarkerThresholds};
pub use split::{quantile_split, QuantileSplit, MIN_GROUP_SIZE};
