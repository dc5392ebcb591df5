//! Command-line interface for quantile_deg

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::testing::AdjustMethod;

#[derive(Parser)]
#[command(name = "quantile_deg")]
#[command(version)]
#[command(about = "Marker-gene quantile stratification, moderated t-test DE and pathway enrichment")]
#[command(disable_help_flag = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Options shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// TOML configuration file
    #[arg(short, long,
        long_help = "TOML configuration file.\n\
            Command-line options override the values it contains.")]
    pub config: Option<PathBuf>,

    /// Expression matrix (CSV/TSV)
    #[arg(short, long,
        long_help = "Expression matrix file.\n\
            Format: first column = gene IDs, header = sample IDs (use --samples-in-rows\n\
            for the transposed layout). CSV or TSV, auto-detected.")]
    pub expression: Option<PathBuf>,

    /// Rows of the expression file are samples
    #[arg(long)]
    pub samples_in_rows: bool,

    /// Clinical table (CSV/TSV)
    #[arg(long,
        long_help = "Clinical table file.\n\
            Format: first column = sample/patient IDs, remaining columns = variables.\n\
            IDs are matched on the first 12 characters (TCGA patient barcode) by default.")]
    pub clinical: Option<PathBuf>,

    /// Marker gene (repeatable)
    #[arg(short = 'g', long = "gene", value_name = "GENE",
        long_help = "Marker gene used for stratification. Can be given multiple times:\n\
            a sample is high (low) only if it is high (low) for every marker.")]
    pub genes: Vec<String>,

    /// Lower quantile cutoff [default: 0.25]
    #[arg(long)]
    pub lower: Option<f64>,

    /// Upper quantile cutoff [default: 0.75]
    #[arg(long)]
    pub upper: Option<f64>,

    /// Apply log2(x + 1) to the expression values
    #[arg(long)]
    pub log_transform: bool,

    /// Number of threads (0 = auto)
    #[arg(short = 't', long)]
    pub threads: Option<usize>,
}

impl InputArgs {
    /// Load the configuration file (or defaults) and apply the overrides
    pub fn load_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_file(path)?,
            None => AnalysisConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    pub fn apply(&self, config: &mut AnalysisConfig) {
        if let Some(path) = &self.expression {
            config.input.expression = path.clone();
        }
        if self.samples_in_rows {
            config.input.genes_in_rows = false;
        }
        if let Some(path) = &self.clinical {
            config.input.clinical = Some(path.clone());
        }
        if !self.genes.is_empty() {
            config.stratify.marker_genes = self.genes.clone();
        }
        if let Some(v) = self.lower {
            config.stratify.lower_quantile = v;
        }
        if let Some(v) = self.upper {
            config.stratify.upper_quantile = v;
        }
        if self.log_transform {
            config.input.log_transform = true;
        }
        if let Some(t) = self.threads {
            config.threads = t;
        }
    }
}

/// Differential expression overrides
#[derive(Args, Debug, Clone, Default)]
pub struct DeArgs {
    /// Adjusted p-value cutoff [default: 0.05]
    #[arg(short, long)]
    pub p_value: Option<f64>,

    /// Minimum |log2 fold change| [default: 0]
    #[arg(long)]
    pub lfc: Option<f64>,

    /// P-value adjustment: bh or bonferroni [default: bh]
    #[arg(long, value_parser = parse_adjust_method)]
    pub adjust: Option<AdjustMethod>,
}

impl DeArgs {
    pub fn apply(&self, config: &mut AnalysisConfig) {
        if let Some(v) = self.p_value {
            config.de.p_value_cutoff = v;
        }
        if let Some(v) = self.lfc {
            config.de.lfc_cutoff = v;
        }
        if let Some(m) = self.adjust {
            config.de.adjust_method = m;
        }
    }
}

fn parse_adjust_method(s: &str) -> std::result::Result<AdjustMethod, String> {
    match s.to_ascii_lowercase().as_str() {
        "bh" | "fdr" => Ok(AdjustMethod::Bh),
        "bonferroni" => Ok(AdjustMethod::Bonferroni),
        other => Err(format!("unknown adjustment '{}' (use bh or bonferroni)", other)),
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full workflow
    #[command(
        about = "Run the full workflow",
        long_about = "Run the full workflow\n\n\
            Splits samples into high/low groups by marker gene quantiles, tests\n\
            differential expression with a moderated t-test (limma eBayes) and BH\n\
            correction, submits the significant genes to Enrichr and writes an\n\
            xlsx workbook.",
        after_long_help = "\
Examples:
  # Everything from a configuration file
  quantile_deg run -c analysis.toml

  # Override the marker and quantiles
  quantile_deg run -c analysis.toml -g ERBB2 --lower 0.1 --upper 0.9

  # No configuration file, no enrichment
  quantile_deg run -e brca.tsv --clinical brca_clinical.tsv -g ESR1 \\
    --no-enrichment -o esr1.xlsx"
    )]
    Run {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        de: DeArgs,

        /// Output workbook [default: quantile_deg_results.xlsx]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the DE table as TSV
        #[arg(long)]
        de_table: Option<PathBuf>,

        /// Enrichr library (repeatable)
        #[arg(short = 'd', long = "database", value_name = "LIBRARY")]
        databases: Vec<String>,

        /// Enrichment FDR cutoff [default: 0.05]
        #[arg(long)]
        fdr: Option<f64>,

        /// Terms per database shown in the summary [default: 10]
        #[arg(long)]
        top_n: Option<usize>,

        /// Directory for cached enrichment results
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Pathway diagram image to embed
        #[arg(long)]
        pathway_image: Option<PathBuf>,

        /// Skip pathway enrichment
        #[arg(long)]
        no_enrichment: bool,
    },

    /// Stratify samples only
    #[command(
        long_about = "Split samples into high/low/excluded groups by marker gene quantiles\n\
            and write the assignment as TSV.",
        after_long_help = "\
Examples:
  quantile_deg split -e brca.tsv -g ESR1 -o groups.tsv
  quantile_deg split -c analysis.toml --lower 0.33 --upper 0.67"
    )]
    Split {
        #[command(flatten)]
        input: InputArgs,

        /// Output TSV [default: groups.tsv]
        #[arg(short, long, default_value = "groups.tsv")]
        output: PathBuf,
    },

    /// Stratify and test differential expression (no enrichment)
    #[command(
        long_about = "Stratify samples and run the moderated t-test; writes the DE table as TSV.\n\
            No network access.",
        after_long_help = "\
Examples:
  quantile_deg deg -e brca.tsv -g ESR1 -o esr1_deg.tsv
  quantile_deg deg -c analysis.toml -p 0.01 --lfc 1"
    )]
    Deg {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        de: DeArgs,

        /// Output TSV [default: deg.tsv]
        #[arg(short, long, default_value = "deg.tsv")]
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "quantile_deg", "-v", "run", "-e", "x.tsv", "-g", "ERBB2", "-g", "GRB7", "--upper", "0.9",
            "-p", "0.01", "--adjust", "bonferroni", "-d", "KEGG_2021_Human", "--no-enrichment",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Run { input, de, databases, no_enrichment, .. }) => {
                let mut config = AnalysisConfig::default();
                input.apply(&mut config);
                de.apply(&mut config);
                assert_eq!(config.input.expression, PathBuf::from("x.tsv"));
                assert_eq!(config.stratify.marker_genes, vec!["ERBB2", "GRB7"]);
                assert_eq!(config.stratify.upper_quantile, 0.9);
                assert_eq!(config.stratify.lower_quantile, 0.25);
                assert_eq!(config.de.p_value_cutoff, 0.01);
                assert_eq!(config.de.adjust_method, AdjustMethod::Bonferroni);
                assert_eq!(databases, vec!["KEGG_2021_Human"]);
                assert!(no_enrichment);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_split_defaults() {
        let cli = Cli::try_parse_from(["quantile_deg", "split", "-e", "x.tsv", "-g", "ESR1"]).unwrap();
        match cli.command {
            Some(Commands::Split { input, output }) => {
                assert_eq!(output, PathBuf::from("groups.tsv"));
                assert!(!input.samples_in_rows);
                assert_eq!(input.genes, vec!["ESR1"]);
            }
            _ => panic!("expected split"),
        }
    }

    #[test]
    fn test_bad_adjust_rejected() {
        assert!(Cli::try_parse_from(["quantile_deg", "deg", "--adjust", "holm"]).is_err());
    }
}
