//! quantile_deg command-line interface

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use log::{info, LevelFilter};

use quantile_deg::cli::{Cli, Commands, DeArgs, InputArgs};
use quantile_deg::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Find the first non-flag argument (potential subcommand)
    let first_positional = args.iter().skip(1).find(|a| !a.starts_with('-'));
    let subcommands = ["run", "split", "deg", "help"];
    let has_subcommand = first_positional.map_or(false, |a| subcommands.contains(&a.as_str()));

    if !has_subcommand {
        if args.len() == 1 {
            print_no_args();
            return;
        }
        if args.iter().any(|a| a == "--help") {
            print_long_help();
            return;
        }
        if args.iter().any(|a| a == "-h") {
            print_short_help();
            return;
        }
        if args.iter().any(|a| a == "-V" || a == "--version") {
            println!("quantile_deg {}", VERSION);
            return;
        }
        print_no_args();
        return;
    }

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Some(Commands::Run {
            input,
            de,
            output,
            de_table,
            databases,
            fdr,
            top_n,
            cache_dir,
            pathway_image,
            no_enrichment,
        }) => run_workflow(
            &input,
            &de,
            RunOverrides {
                output,
                de_table,
                databases,
                fdr,
                top_n,
                cache_dir,
                pathway_image,
                no_enrichment,
            },
        ),
        Some(Commands::Split { input, output }) => run_split(&input, &output),
        Some(Commands::Deg { input, de, output }) => run_deg(&input, &de, &output),
        None => {
            print_no_args();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Custom help output
// ---------------------------------------------------------------------------

fn print_no_args() {
    println!("quantile_deg v{}", VERSION);
    println!("Run `quantile_deg -h` for usage or `quantile_deg --help` for detailed information.");
}

fn print_short_help() {
    println!("quantile_deg v{}", VERSION);
    println!();
    println!("Usage: quantile_deg <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  run    Stratify, test, enrich and write the workbook");
    println!("  split  Stratify samples only");
    println!("  deg    Stratify and test differential expression");
    println!();
    println!("Run `quantile_deg <COMMAND> -h` for command-specific options.");
}

fn print_long_help() {
    println!("quantile_deg v{}", VERSION);
    println!("Marker-gene quantile stratification with limma-style differential expression");
    println!();
    println!("Usage: quantile_deg <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  run    Run the full workflow");
    println!("           - high/low split on marker gene quantiles (R type 7)");
    println!("           - two-group linear model, eBayes moderated t, BH correction");
    println!("           - Enrichr pathway enrichment with on-disk cache");
    println!("           - xlsx workbook (DEG, Groups, one sheet per library, Pathway)");
    println!("  split  Write the group assignment only");
    println!("  deg    Write the differential expression table only (no network)");
    println!();
    println!("Global Options:");
    println!("  -v, --verbose    Enable verbose output");
    println!("  -h               Print short help");
    println!("      --help       Print detailed help");
    println!("  -V, --version    Print version");
    println!();
    println!("Examples:");
    println!("  quantile_deg run -c analysis.toml");
    println!();
    println!("  quantile_deg run -e brca.tsv --clinical brca_clinical.tsv -g ESR1 \\");
    println!("    --lower 0.25 --upper 0.75 -p 0.05 -o esr1.xlsx");
    println!();
    println!("  quantile_deg deg -e brca.tsv -g ERBB2 -g GRB7 -o her2_deg.tsv");
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

struct RunOverrides {
    output: Option<PathBuf>,
    de_table: Option<PathBuf>,
    databases: Vec<String>,
    fdr: Option<f64>,
    top_n: Option<usize>,
    cache_dir: Option<PathBuf>,
    pathway_image: Option<PathBuf>,
    no_enrichment: bool,
}

fn configure_threads(threads: usize) {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok();
    }
}

fn run_workflow(input: &InputArgs, de: &DeArgs, overrides: RunOverrides) -> Result<()> {
    let mut config = input.load_config()?;
    de.apply(&mut config);

    if let Some(path) = overrides.output {
        config.output.workbook = path;
    }
    if overrides.de_table.is_some() {
        config.output.de_table = overrides.de_table;
    }
    if !overrides.databases.is_empty() {
        config.enrichment.databases = overrides.databases;
    }
    if let Some(v) = overrides.fdr {
        config.enrichment.fdr_cutoff = v;
    }
    if let Some(v) = overrides.top_n {
        config.enrichment.top_n = v;
    }
    if overrides.cache_dir.is_some() {
        config.enrichment.cache_dir = overrides.cache_dir;
    }
    if overrides.pathway_image.is_some() {
        config.output.pathway_image = overrides.pathway_image;
    }
    if overrides.no_enrichment {
        config.enrichment.enabled = false;
    }

    config.validate()?;
    configure_threads(config.threads);

    let summary = if config.enrichment.enabled {
        let markers = config.stratify.marker_genes.join("+");
        let description = if config.output.cohort.is_empty() {
            format!("{} high vs low", markers)
        } else {
            format!("{} {} high vs low", config.output.cohort, markers)
        };
        let mut client = EnrichrClient::new(
            &config.enrichment.base_url,
            Duration::from_millis(config.enrichment.request_delay_ms),
        )?
        .with_description(&description);
        run_analysis(&config, Some(&mut client))?
    } else {
        run_analysis(&config, None)?
    };

    println!("{}", summary);
    Ok(())
}

fn run_split(input: &InputArgs, output: &Path) -> Result<()> {
    let config = input.load_config()?;
    config.validate()?;

    let dataset = load_dataset(&config)?;
    let assignment = stratify(&dataset, &config.stratify)?;
    let table = GroupTable::build(&assignment, &dataset)?;
    write_group_table(output, &table)?;

    info!(
        "{} high, {} low, {} excluded",
        assignment.count(GroupLabel::High),
        assignment.count(GroupLabel::Low),
        assignment.count(GroupLabel::Excluded)
    );
    info!("Group assignment written to: {}", output.display());
    Ok(())
}

fn run_deg(input: &InputArgs, de: &DeArgs, output: &Path) -> Result<()> {
    let mut config = input.load_config()?;
    de.apply(&mut config);
    config.validate()?;
    configure_threads(config.threads);

    let dataset = load_dataset(&config)?;
    let assignment = stratify(&dataset, &config.stratify)?;
    let table = differential_expression(&dataset, &assignment, &config.de)?;
    write_de_table(output, &table)?;

    println!("{}", table.summary());
    info!("DE table written to: {}", output.display());
    Ok(())
}
