//! Moderated statistics and multiple testing for differential expression

mod ebayes;
mod fdr;
mod pvalue;
mod top_table;

pub use ebayes::{ebayes, fit_f_dist, squeeze_var, EbayesParams, ModeratedFit, VariancePrior};
pub use fdr::{benjamini_hochberg, bonferroni, AdjustMethod};
pub use pvalue::{calculate_pvalue, calculate_pvalue_t};
pub use top_table::{top_table, TopTableOptions};
