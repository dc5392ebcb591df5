//! Pathway enrichment of differentially expressed genes

mod cache;
mod enrichr;
mod terms;

pub use cache::EnrichmentCache;
pub use enrichr::{parse_enrich_response, EnrichrClient, DEFAULT_ENRICHR_URL};
pub use terms::{enrichment_gene_list, filter_terms, DatabaseEnrichment, EnrichmentTerm};

use std::time::Duration;

use crate::error::Result;

/// A gene-set enrichment backend
pub trait EnrichmentService {
    /// Enrichment of `genes` against one gene-set library
    fn enrich(&mut self, genes: &[String], database: &str) -> Result<Vec<EnrichmentTerm>>;
}

/// Options for [`run_enrichment`]
#[derive(Debug, Clone)]
pub struct EnrichmentOptions {
    /// Gene-set libraries, queried in order
    pub databases: Vec<String>,
    /// Keep terms with adjusted p-value below this
    pub fdr_cutoff: f64,
}

/// Query every database for `genes`, consulting the cache first.
///
/// Databases are processed sequentially. Results are filtered by
/// `fdr_cutoff`; a database with no surviving term still appears in the
/// output with an empty term list.
pub fn run_enrichment(
    service: &mut dyn EnrichmentService,
    genes: &[String],
    options: &EnrichmentOptions,
    cache: Option<&EnrichmentCache>,
) -> Result<Vec<DatabaseEnrichment>> {
    if genes.is_empty() {
        log::warn!("No genes to submit; enrichment skipped");
        return Ok(Vec::new());
    }

    let mut results = Vec::with_capacity(options.databases.len());
    for database in &options.databases {
        let cached = match cache {
            Some(c) => c.load(database, genes)?,
            None => None,
        };

        let raw = match cached {
            Some(terms) => {
                log::info!("{}: {} terms from cache", database, terms.len());
                terms
            }
            None => {
                log::info!("{}: querying enrichment service with {} genes", database, genes.len());
                let terms = service.enrich(genes, database)?;
                if let Some(c) = cache {
                    c.store(database, genes, &terms)?;
                }
                terms
            }
        };

        let n_raw = raw.len();
        let terms = filter_terms(raw, options.fdr_cutoff);
        log::info!(
            "{}: {} of {} terms with adj.P < {}",
            database,
            terms.len(),
            n_raw,
            options.fdr_cutoff
        );
        results.push(DatabaseEnrichment {
            database: database.clone(),
            n_tested_terms: n_raw,
            terms,
        });
    }
    Ok(results)
}

/// Sleep so that consecutive remote calls are at least `delay` apart
pub(crate) fn throttle(last_call: &mut Option<std::time::Instant>, delay: Duration) {
    if let Some(last) = *last_call {
        let elapsed = last.elapsed();
        if elapsed < delay {
            std::thread::sleep(delay - elapsed);
        }
    }
    *last_call = Some(std::time::Instant::now());
}


#[cfg(test)]
mod tests {
    use super::mock::{term, MockService};
    use super::*;
    use tempfile::TempDir;

    fn options() -> EnrichmentOptions {
        EnrichmentOptions {
            databases: vec!["KEGG_2021_Human".to_string(), "GO_Biological_Process_2023".to_string()],
            fdr_cutoff: 0.05,
        }
    }

    fn genes() -> Vec<String> {
        vec!["MYC".to_string(), "CCND1".to_string(), "TP53".to_string()]
    }

    #[test]
    fn test_empty_gene_list_skips_service() {
        let mut service = MockService::new();
        let out = run_enrichment(&mut service, &[], &options(), None).unwrap();
        assert!(out.is_empty());
        assert!(service.calls.is_empty());
    }

    #[test]
    fn test_filtered_per_database() {
        let mut service = MockService::new().with(
            "KEGG_2021_Human",
            vec![term("KEGG_2021_Human", "Cell cycle", 0.2), term("KEGG_2021_Human", "p53 signaling", 0.01)],
        );
        let out = run_enrichment(&mut service, &genes(), &options(), None).unwrap();
        assert_eq!(service.calls.len(), 2);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].terms.len(), 1);
        assert_eq!(out[0].terms[0].term_name, "p53 signaling");
        assert_eq!(out[0].n_tested_terms, 2);
        assert!(out[1].terms.is_empty());
    }

    #[test]
    fn test_cache_hit_and_stale_list() {
        let dir = TempDir::new().unwrap();
        let cache = EnrichmentCache::new(dir.path()).unwrap();
        let opts = EnrichmentOptions {
            databases: vec!["KEGG_2021_Human".to_string()],
            fdr_cutoff: 0.05,
        };

        let mut first = MockService::new().with("KEGG_2021_Human", vec![term("KEGG_2021_Human", "p53 signaling", 0.01)]);
        run_enrichment(&mut first, &genes(), &opts, Some(&cache)).unwrap();
        assert_eq!(first.calls.len(), 1);

        // same list: served from cache
        let mut second = MockService::new();
        let out = run_enrichment(&mut second, &genes(), &opts, Some(&cache)).unwrap();
        assert!(second.calls.is_empty());
        assert_eq!(out[0].terms[0].term_name, "p53 signaling");

        // different list: stale, refetched and overwritten
        let other = vec!["EGFR".to_string()];
        let mut third = MockService::new().with("KEGG_2021_Human", vec![term("KEGG_2021_Human", "ErbB signaling", 0.001)]);
        let out = run_enrichment(&mut third, &other, &opts, Some(&cache)).unwrap();
        assert_eq!(third.calls.len(), 1);
        assert_eq!(out[0].terms[0].term_name, "ErbB signaling");
        assert!(cache.load("KEGG_2021_Human", &genes()).unwrap().is_none());
        assert!(cache.load("KEGG_2021_Human", &other).unwrap().is_some());
    }

    #[test]
    fn test_throttle_enforces_delay() {
        let mut last = None;
        let delay = Duration::from_millis(30);
        let start = std::time::Instant::now();
        throttle(&mut last, delay);
        throttle(&mut last, delay);
        assert!(start.elapsed() >= delay);
    }
}
