//! On-disk JSON cache of enrichment results

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::terms::EnrichmentTerm;
use crate::error::Result;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    database: String,
    /// Gene list the terms were computed for
    genes: Vec<String>,
    terms: Vec<EnrichmentTerm>,
}

/// One JSON file per database under a cache directory.
///
/// An entry is only valid for the exact gene list it was stored with.
#[derive(Debug, Clone)]
pub struct EnrichmentCache {
    dir: PathBuf,
}

impl EnrichmentCache {
    /// Open (and create if needed) a cache directory
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, database: &str) -> PathBuf {
        let stem: String = database
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", stem))
    }

    /// Cached terms for `database`, or `None` when absent, unreadable or
    /// computed for a different gene list.
    pub fn load(&self, database: &str, genes: &[String]) -> Result<Option<Vec<EnrichmentTerm>>> {
        let path = self.entry_path(database);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        let entry: CacheEntry = match serde_json::from_str(&text) {
            Ok(e) => e,
            Err(e) => {
                log::warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                return Ok(None);
            }
        };
        if entry.database != database || entry.genes != genes {
            log::debug!("Cache entry {} is stale", path.display());
            return Ok(None);
        }
        Ok(Some(entry.terms))
    }

    /// Store terms, replacing any previous entry for `database`
    pub fn store(&self, database: &str, genes: &[String], terms: &[EnrichmentTerm]) -> Result<()> {
        let entry = CacheEntry {
            database: database.to_string(),
            genes: genes.to_vec(),
            terms: terms.to_vec(),
        };
        let path = self.entry_path(database);
        fs::write(&path, serde_json::to_string_pretty(&entry)?)?;
        log::debug!("Cached {} terms in {}", terms.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::mock::term;
    use tempfile::TempDir;

    #[test]
    fn test_store_and_load() {
        let dir = TempDir::new().unwrap();
        let cache = EnrichmentCache::new(dir.path().join("nested")).unwrap();
        let genes = vec!["MYC".to_string()];
        let terms = vec![term("WikiPathways 2019", "Wnt signaling", 0.01)];

        assert!(cache.load("WikiPathways 2019", &genes).unwrap().is_none());
        cache.store("WikiPathways 2019", &genes, &terms).unwrap();
        assert_eq!(cache.load("WikiPathways 2019", &genes).unwrap(), Some(terms));
        assert!(cache.dir().join("WikiPathways_2019.json").exists());
    }

    #[test]
    fn test_corrupt_entry_is_ignored() {
        let dir = TempDir::new().unwrap();
        let cache = EnrichmentCache::new(dir.path()).unwrap();
        fs::write(dir.path().join("KEGG.json"), "{not json").unwrap();
        assert!(cache.load("KEGG", &["A".to_string()]).unwrap().is_none());
    }
}
