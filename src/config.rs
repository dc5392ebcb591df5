//! Run configuration, loaded from a TOML file.
//!
//! Every field has a default so a config file only needs the input paths and
//! marker genes. Command-line flags override file values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::SampleMatching;
use crate::enrichment::DEFAULT_ENRICHR_URL;
use crate::error::{AnalysisError, Result};
use crate::stratify::QuantileSplit;
use crate::testing::{AdjustMethod, EbayesParams, TopTableOptions};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub input: InputConfig,
    pub stratify: StratifyConfig,
    pub de: DeConfig,
    pub enrichment: EnrichmentConfig,
    pub output: OutputConfig,
    /// Worker threads for per-gene fitting (0 = all cores)
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Expression matrix (CSV or TSV)
    pub expression: PathBuf,
    /// Genes are rows and samples are columns
    pub genes_in_rows: bool,
    /// Clinical table (CSV or TSV); optional
    pub clinical: Option<PathBuf>,
    pub sample_matching: SampleMatching,
    /// TCGA sample type codes to keep, e.g. ["01"]; empty keeps all
    pub sample_types: Vec<String>,
    /// Clinical variables to keep; empty keeps all
    pub clinical_variables: Vec<String>,
    /// Drop clinical variables with a larger missing fraction
    pub max_missing_fraction: f64,
    /// Apply log2(x + pseudo_count) before analysis
    pub log_transform: bool,
    pub pseudo_count: f64,
    /// Drop genes with lower mean expression (after any transform)
    pub min_mean_expression: Option<f64>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            expression: PathBuf::new(),
            genes_in_rows: true,
            clinical: None,
            sample_matching: SampleMatching::default(),
            sample_types: Vec::new(),
            clinical_variables: Vec::new(),
            max_missing_fraction: 0.5,
            log_transform: false,
            pseudo_count: 1.0,
            min_mean_expression: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StratifyConfig {
    /// Marker gene symbols or identifiers
    pub marker_genes: Vec<String>,
    pub lower_quantile: f64,
    pub upper_quantile: f64,
}

impl Default for StratifyConfig {
    fn default() -> Self {
        let split = QuantileSplit::default();
        Self {
            marker_genes: Vec::new(),
            lower_quantile: split.lower,
            upper_quantile: split.upper,
        }
    }
}

impl StratifyConfig {
    pub fn split(&self) -> QuantileSplit {
        QuantileSplit {
            lower: self.lower_quantile,
            upper: self.upper_quantile,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeConfig {
    /// Adjusted p-value cutoff
    pub p_value_cutoff: f64,
    /// Minimum absolute log2 fold change
    pub lfc_cutoff: f64,
    pub adjust_method: AdjustMethod,
    /// Assumed proportion of DE genes for the B-statistic
    pub proportion: f64,
}

impl Default for DeConfig {
    fn default() -> Self {
        Self {
            p_value_cutoff: 0.05,
            lfc_cutoff: 0.0,
            adjust_method: AdjustMethod::Bh,
            proportion: EbayesParams::default().proportion,
        }
    }
}

impl DeConfig {
    pub fn top_table_options(&self) -> TopTableOptions {
        TopTableOptions {
            adjust_method: self.adjust_method,
            p_value_cutoff: self.p_value_cutoff,
            lfc_cutoff: self.lfc_cutoff,
        }
    }

    pub fn ebayes_params(&self) -> EbayesParams {
        EbayesParams {
            proportion: self.proportion,
            ..EbayesParams::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    /// Enrichr gene-set libraries
    pub databases: Vec<String>,
    /// Keep terms with adjusted p-value below this
    pub fdr_cutoff: f64,
    /// Terms per database listed in the run summary
    pub top_n: usize,
    pub base_url: String,
    /// Pause between consecutive service calls
    pub request_delay_ms: u64,
    /// Directory for cached results; no caching when unset
    pub cache_dir: Option<PathBuf>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            databases: vec![
                "KEGG_2021_Human".to_string(),
                "GO_Biological_Process_2023".to_string(),
                "Reactome_2022".to_string(),
            ],
            fdr_cutoff: 0.05,
            top_n: 10,
            base_url: DEFAULT_ENRICHR_URL.to_string(),
            request_delay_ms: 1000,
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub workbook: PathBuf,
    /// Optional TSV copy of the DE table
    pub de_table: Option<PathBuf>,
    /// Optional TSV of the group assignment
    pub groups_table: Option<PathBuf>,
    /// Pre-rendered pathway diagram embedded in the workbook
    pub pathway_image: Option<PathBuf>,
    /// Cohort label, e.g. "TCGA-BRCA"; used in the enrichment list description
    pub cohort: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            workbook: PathBuf::from("quantile_deg_results.xlsx"),
            de_table: None,
            groups_table: None,
            pathway_image: None,
            cohort: String::new(),
        }
    }
}

impl AnalysisConfig {
    /// Load a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: AnalysisConfig = toml::from_str(&content)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn invalid(reason: String) -> AnalysisError {
        AnalysisError::InvalidConfig { reason }
    }

    /// Check value ranges and required fields
    pub fn validate(&self) -> Result<()> {
        if self.input.expression.as_os_str().is_empty() {
            return Err(Self::invalid("input.expression is required".to_string()));
        }
        if self.stratify.marker_genes.is_empty() {
            return Err(Self::invalid(
                "stratify.marker_genes needs at least one gene".to_string(),
            ));
        }
        self.stratify
            .split()
            .validate()
            .map_err(|e| Self::invalid(e.to_string()))?;
        if !(0.0..=1.0).contains(&self.input.max_missing_fraction) {
            return Err(Self::invalid(format!(
                "input.max_missing_fraction must be in [0, 1], got {}",
                self.input.max_missing_fraction
            )));
        }
        if self.input.log_transform && !(self.input.pseudo_count >= 0.0) {
            return Err(Self::invalid(format!(
                "input.pseudo_count must be >= 0, got {}",
                self.input.pseudo_count
            )));
        }
        if let SampleMatching::Prefix(0) = self.input.sample_matching {
            return Err(Self::invalid("sample prefix length must be > 0".to_string()));
        }
        if !(self.de.p_value_cutoff > 0.0 && self.de.p_value_cutoff <= 1.0) {
            return Err(Self::invalid(format!(
                "de.p_value_cutoff must be in (0, 1], got {}",
                self.de.p_value_cutoff
            )));
        }
        if !(self.de.lfc_cutoff >= 0.0) {
            return Err(Self::invalid(format!(
                "de.lfc_cutoff must be >= 0, got {}",
                self.de.lfc_cutoff
            )));
        }
        if !(self.de.proportion > 0.0 && self.de.proportion < 1.0) {
            return Err(Self::invalid(format!(
                "de.proportion must be in (0, 1), got {}",
                self.de.proportion
            )));
        }
        if self.enrichment.enabled {
            if self.enrichment.databases.is_empty() {
                return Err(Self::invalid(
                    "enrichment.databases is empty; set enrichment.enabled = false instead".to_string(),
                ));
            }
            if !(self.enrichment.fdr_cutoff > 0.0 && self.enrichment.fdr_cutoff <= 1.0) {
                return Err(Self::invalid(format!(
                    "enrichment.fdr_cutoff must be in (0, 1], got {}",
                    self.enrichment.fdr_cutoff
                )));
            }
            if self.enrichment.base_url.trim().is_empty() {
                return Err(Self::invalid("enrichment.base_url is empty".to_string()));
            }
        }
        Ok(())
    }
}
