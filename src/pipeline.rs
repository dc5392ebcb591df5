//! End-to-end workflow: load, stratify, test, enrich, write

use std::fmt;
use std::path::PathBuf;

use crate::config::{AnalysisConfig, DeConfig, StratifyConfig};
use crate::data::{tcga_sample_type, AnalysisDataset, ClinicalTable};
use crate::enrichment::{
    enrichment_gene_list, run_enrichment, DatabaseEnrichment, EnrichmentCache, EnrichmentOptions,
    EnrichmentService,
};
use crate::error::{AnalysisError, Result};
use crate::io::{
    read_clinical_table, read_expression_matrix, write_de_table, write_group_table, write_workbook,
    DeSummary, DeTable, GroupTable, WorkbookContents,
};
use crate::linear_model::{contrast_vector, contrasts_fit, group_design_matrix, lm_fit};
use crate::stratify::{quantile_split, GroupAssignment, GroupLabel, MarkerThresholds, MIN_GROUP_SIZE};
use crate::testing::{ebayes, top_table};

/// Read and prepare the expression data (and clinical table, if configured).
///
/// Samples are aligned with the clinical table, clinical variables filtered,
/// then the optional log transform and gene filter are applied. Marker genes
/// always survive the gene filter.
pub fn load_dataset(config: &AnalysisConfig) -> Result<AnalysisDataset> {
    let input = &config.input;
    log::info!("Loading expression matrix from: {}", input.expression.display());
    let expression = read_expression_matrix(&input.expression, input.genes_in_rows)?;
    log::info!("  {} genes, {} samples", expression.n_genes(), expression.n_samples());

    let mut dataset = match &input.clinical {
        Some(path) => {
            log::info!("Loading clinical table from: {}", path.display());
            let clinical = read_clinical_table(path)?;
            let mut ds = AnalysisDataset::align(
                expression,
                clinical,
                input.sample_matching,
                &input.sample_types,
            )?;
            ds.filter_clinical(&input.clinical_variables, input.max_missing_fraction)?;
            ds
        }
        None => {
            let keep: Vec<usize> = (0..expression.n_samples())
                .filter(|&i| {
                    input.sample_types.is_empty()
                        || tcga_sample_type(&expression.sample_ids()[i])
                            .map(|t| input.sample_types.iter().any(|s| s == t))
                            .unwrap_or(false)
                })
                .collect();
            if keep.is_empty() {
                return Err(AnalysisError::SampleAlignment {
                    reason: format!("no sample has a type in {:?}", input.sample_types),
                });
            }
            let expression = expression.subset_samples(&keep)?;
            let clinical = ClinicalTable::new(expression.sample_ids().to_vec());
            AnalysisDataset::from_aligned(expression, clinical)?
        }
    };

    if input.log_transform {
        log::info!("Applying log2(x + {})", input.pseudo_count);
        dataset.expression_mut().log2_transform(input.pseudo_count)?;
    }

    if let Some(min_mean) = input.min_mean_expression {
        let filtered = dataset
            .expression()
            .filter_genes(min_mean, &config.stratify.marker_genes)?;
        dataset.set_expression(filtered)?;
    }

    Ok(dataset)
}

/// Split the samples of `dataset` by marker gene quantiles
pub fn stratify(dataset: &AnalysisDataset, config: &StratifyConfig) -> Result<GroupAssignment> {
    quantile_split(dataset.expression(), &config.marker_genes, &config.split())
}

/// High versus low moderated t-test on the retained samples.
/// R equivalent:
///   design <- model.matrix(~0 + group); fit <- lmFit(expr, design)
///   fit2 <- eBayes(contrasts.fit(fit, makeContrasts(high - low, levels=design)))
///   topTable(fit2, number=Inf, p.value=cutoff)
pub fn differential_expression(
    dataset: &AnalysisDataset,
    assignment: &GroupAssignment,
    config: &DeConfig,
) -> Result<DeTable> {
    let n_high = assignment.count(GroupLabel::High);
    let n_low = assignment.count(GroupLabel::Low);
    if n_high < MIN_GROUP_SIZE || n_low < MIN_GROUP_SIZE {
        return Err(AnalysisError::InvalidSplit {
            reason: format!(
                "each group needs at least {} samples ({} high, {} low)",
                MIN_GROUP_SIZE, n_high, n_low
            ),
        });
    }

    let expression = dataset.expression().subset_samples(&assignment.retained_indices())?;
    let (design, info) = group_design_matrix(&assignment.retained_labels())?;

    log::info!(
        "Fitting linear models: {} genes, {} high vs {} low",
        expression.n_genes(),
        n_high,
        n_low
    );
    let fit = lm_fit(&expression, &design, &info)?;
    let contrast = contrast_vector(&info, GroupLabel::High.as_str(), GroupLabel::Low.as_str())?;
    let fit = contrasts_fit(&fit, &contrast, "high-low")?;

    log::info!("Moderating variances (empirical Bayes)...");
    let moderated = ebayes(&fit, &config.ebayes_params())?;
    top_table(&moderated, 0, &config.top_table_options())
}

/// Enriched terms of one database as reported in the summary
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseSummary {
    pub database: String,
    pub significant_terms: usize,
    /// First `top_n` term names
    pub top_terms: Vec<String>,
}

/// Outcome of [`run_analysis`]
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub n_samples: usize,
    pub n_genes: usize,
    pub n_high: usize,
    pub n_low: usize,
    pub n_excluded: usize,
    pub thresholds: Vec<MarkerThresholds>,
    pub de: DeSummary,
    /// Genes submitted for enrichment
    pub enrichment_genes: usize,
    pub enrichment: Vec<DatabaseSummary>,
    pub workbook: PathBuf,
    pub sheets: Vec<String>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Quantile-stratified Differential Expression")?;
        writeln!(f, "===========================================")?;
        writeln!(f, "Samples: {} ({} genes)", self.n_samples, self.n_genes)?;
        for t in &self.thresholds {
            writeln!(
                f,
                "Marker {}: low < {:.4}, high > {:.4}",
                t.gene_id, t.lower_threshold, t.upper_threshold
            )?;
        }
        writeln!(
            f,
            "Groups: {} high, {} low, {} excluded",
            self.n_high, self.n_low, self.n_excluded
        )?;
        writeln!(f)?;
        write!(f, "{}", self.de)?;
        if !self.enrichment.is_empty() {
            writeln!(f)?;
            writeln!(f, "Enrichment ({} genes submitted)", self.enrichment_genes)?;
            for db in &self.enrichment {
                writeln!(f, "  {}: {} terms", db.database, db.significant_terms)?;
                for (i, term) in db.top_terms.iter().enumerate() {
                    writeln!(f, "    {:>2}. {}", i + 1, term)?;
                }
            }
        }
        writeln!(f)?;
        writeln!(f, "Workbook: {} [{}]", self.workbook.display(), self.sheets.join(", "))?;
        Ok(())
    }
}

/// Run the complete workflow described by `config`.
///
/// Enrichment is skipped when disabled in the configuration, when no service
/// is given, or when no gene passes the DE cutoffs.
pub fn run_analysis(
    config: &AnalysisConfig,
    service: Option<&mut dyn EnrichmentService>,
) -> Result<RunSummary> {
    config.validate()?;

    let dataset = load_dataset(config)?;
    let assignment = stratify(&dataset, &config.stratify)?;

    let groups = GroupTable::build(&assignment, &dataset)?;
    if let Some(path) = &config.output.groups_table {
        write_group_table(path, &groups)?;
        log::info!("Group assignment written to: {}", path.display());
    }

    let de = differential_expression(&dataset, &assignment, &config.de)?;
    if let Some(path) = &config.output.de_table {
        write_de_table(path, &de)?;
        log::info!("DE table written to: {}", path.display());
    }

    let genes = enrichment_gene_list(&de);
    let enrichment: Vec<DatabaseEnrichment> = match service {
        Some(service) if config.enrichment.enabled => {
            let cache = match &config.enrichment.cache_dir {
                Some(dir) => Some(EnrichmentCache::new(dir)?),
                None => None,
            };
            let options = EnrichmentOptions {
                databases: config.enrichment.databases.clone(),
                fdr_cutoff: config.enrichment.fdr_cutoff,
            };
            run_enrichment(service, &genes, &options, cache.as_ref())?
        }
        _ => {
            log::info!("Enrichment disabled");
            Vec::new()
        }
    };

    let contents = WorkbookContents {
        groups: &groups,
        de: &de,
        enrichment: &enrichment,
        pathway_image: config.output.pathway_image.as_deref(),
    };
    let sheets = write_workbook(&config.output.workbook, &contents)?;

    let top_n = config.enrichment.top_n;
    Ok(RunSummary {
        n_samples: dataset.n_samples(),
        n_genes: dataset.n_genes(),
        n_high: assignment.count(GroupLabel::High),
        n_low: assignment.count(GroupLabel::Low),
        n_excluded: assignment.count(GroupLabel::Excluded),
        thresholds: assignment.thresholds.clone(),
        de: de.summary(),
        enrichment_genes: if enrichment.is_empty() { 0 } else { genes.len() },
        enrichment: enrichment
            .iter()
            .map(|r| DatabaseSummary {
                database: r.database.clone(),
                significant_terms: r.terms.len(),
                top_terms: r.terms.iter().take(top_n).map(|t| t.term_name.clone()).collect(),
            })
            .collect(),
        workbook: config.output.workbook.clone(),
        sheets,
    })
}
