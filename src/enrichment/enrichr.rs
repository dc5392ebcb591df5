//! Client for the Enrichr gene-set enrichment API

use std::time::{Duration, Instant};

use reqwest::blocking::{multipart, Client};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;

use super::terms::EnrichmentTerm;
use super::{throttle, EnrichmentService};
use crate::error::{AnalysisError, Result};

pub const DEFAULT_ENRICHR_URL: &str = "https://maayanlab.cloud/Enrichr";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddListResponse {
    user_list_id: u64,
}

/// Blocking Enrichr client.
///
/// The gene list is uploaded once (`addList`) and the returned list id is
/// reused for every database queried with the same genes. Consecutive HTTP
/// calls are spaced by `request_delay`.
pub struct EnrichrClient {
    client: Client,
    base_url: String,
    description: String,
    request_delay: Duration,
    last_call: Option<Instant>,
    submitted: Option<(Vec<String>, u64)>,
}

impl EnrichrClient {
    pub fn new(base_url: &str, request_delay: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("quantile_deg/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            description: "quantile_deg gene list".to_string(),
            request_delay,
            last_call: None,
            submitted: None,
        })
    }

    /// Description attached to uploaded gene lists
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    fn check_status(response: reqwest::blocking::Response, url: &str) -> Result<reqwest::blocking::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(AnalysisError::Enrichment {
            reason: format!("request to {} failed with status {}: {}", url, status, body.trim()),
        })
    }

    fn add_list(&mut self, genes: &[String]) -> Result<u64> {
        if let Some((list, id)) = &self.submitted {
            if list.as_slice() == genes {
                return Ok(*id);
            }
        }

        throttle(&mut self.last_call, self.request_delay);
        let url = format!("{}/addList", self.base_url);
        let form = multipart::Form::new()
            .text("list", genes.join("\n"))
            .text("description", self.description.clone());
        let response = self.client.post(&url).multipart(form).send()?;
        let body: AddListResponse = Self::check_status(response, &url)?.json()?;

        log::info!("Uploaded {} genes, user list id {}", genes.len(), body.user_list_id);
        self.submitted = Some((genes.to_vec(), body.user_list_id));
        Ok(body.user_list_id)
    }
}

impl EnrichmentService for EnrichrClient {
    fn enrich(&mut self, genes: &[String], database: &str) -> Result<Vec<EnrichmentTerm>> {
        let list_id = self.add_list(genes)?;

        throttle(&mut self.last_call, self.request_delay);
        let url = format!("{}/enrich", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("userListId", list_id.to_string()), ("backgroundType", database.to_string())])
            .send()?;
        let body: Value = Self::check_status(response, &url)?.json()?;
        parse_enrich_response(database, &body)
    }
}

/// Parse the `enrich` endpoint payload for one database.
///
/// Each row is `[rank, term, p, odds_ratio, combined_score, [genes], adj_p, ...]`.
pub fn parse_enrich_response(database: &str, body: &Value) -> Result<Vec<EnrichmentTerm>> {
    let rows = match body.get(database) {
        Some(Value::Array(rows)) => rows,
        Some(_) => {
            return Err(AnalysisError::Enrichment {
                reason: format!("unexpected payload for '{}'", database),
            })
        }
        None => {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("database missing from response");
            return Err(AnalysisError::Enrichment {
                reason: format!("'{}': {}", database, message),
            });
        }
    };

    let bad_row = |i: usize| AnalysisError::Enrichment {
        reason: format!("malformed row {} in '{}' response", i, database),
    };

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let fields = row.as_array().filter(|f| f.len() >= 7).ok_or_else(|| bad_row(i))?;
            let number = |k: usize| fields[k].as_f64().ok_or_else(|| bad_row(i));
            let genes = fields[5]
                .as_array()
                .ok_or_else(|| bad_row(i))?
                .iter()
                .filter_map(|g| g.as_str().map(str::to_string))
                .collect();
            Ok(EnrichmentTerm {
                database: database.to_string(),
                rank: u32::try_from(fields[0].as_u64().ok_or_else(|| bad_row(i))?).map_err(|_| bad_row(i))?,
                term_name: fields[1].as_str().ok_or_else(|| bad_row(i))?.to_string(),
                p_value: number(2)?,
                odds_ratio: number(3)?,
                combined_score: number(4)?,
                genes,
                adjusted_p_value: number(6)?,
            })
        })
        .collect()
}
