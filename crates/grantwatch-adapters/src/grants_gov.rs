//! Grants.gov API adapter.
//!
//! The upstream search API has shifted shape more than once, so each
//! keyword query walks a fallback list of endpoints and payload shapes
//! until one answers with a recognizable hit array. Overlapping keyword
//! searches are deduplicated by opportunity number before emission.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use grantwatch_core::{RawRecord, Source};
use grantwatch_storage::HttpFetcher;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

use crate::{store_artifact_best_effort, AdapterError, RunContext, SourceAdapter};

const DEFAULT_ENDPOINTS: &[&str] = &[
    "https://www.grants.gov/grantsws/rest/opportunities/search/",
    "https://www.grants.gov/grantsws/rest/search/opportunities/",
    "https://www.grants.gov/grantsws/rest/opportunities/",
    "https://www.grants.gov/rest/opportunities/search/",
];

/// Field names tried, in order, when deduplicating hits by identifier.
const HIT_ID_KEYS: &[&str] = &["oppNum", "id", "opportunityId", "opportunityNumber", "number"];

pub struct GrantsGovAdapter {
    endpoints: Vec<String>,
    keywords: Vec<String>,
    request_delay: Duration,
}

impl GrantsGovAdapter {
    pub fn new(keywords: Vec<String>, request_delay: Duration) -> Self {
        Self {
            endpoints: DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
            keywords,
            request_delay,
        }
    }

    fn payload_shapes(keyword: &str) -> [JsonValue; 2] {
        [
            json!({
                "keyword": keyword,
                "oppStatuses": "forecasted,posted",
                "sortBy": "openDate|desc",
                "rows": 100,
            }),
            json!({
                "searchText": keyword,
                "status": "forecasted,posted",
                "sort": "openDate|desc",
                "maxResults": 100,
            }),
        ]
    }

    /// Try every endpoint and payload shape until one yields hits.
    /// Exhausting them all is a per-keyword miss, not an adapter error.
    async fn search_keyword(
        &self,
        http: &HttpFetcher,
        ctx: &RunContext,
        keyword: &str,
    ) -> Vec<JsonValue> {
        for endpoint in &self.endpoints {
            for payload in Self::payload_shapes(keyword) {
                let data = match http.post_json(Source::GrantsGov, endpoint, &payload).await {
                    Ok(data) => data,
                    Err(err) => {
                        debug!(endpoint, keyword, %err, "endpoint attempt failed");
                        continue;
                    }
                };
                if let Some(hits) = extract_hits(&data) {
                    info!(keyword, endpoint, hits = hits.len(), "keyword search succeeded");
                    if let Ok(bytes) = serde_json::to_vec(&data) {
                        store_artifact_best_effort(ctx, Source::GrantsGov, "json", &bytes).await;
                    }
                    return hits;
                }
                debug!(endpoint, keyword, "response carried no recognizable hit array");
            }
        }
        warn!(keyword, "no Grants.gov endpoint yielded results");
        Vec::new()
    }
}

#[async_trait]
impl SourceAdapter for GrantsGovAdapter {
    fn source(&self) -> Source {
        Source::GrantsGov
    }

    async fn fetch_records(
        &self,
        http: &HttpFetcher,
        ctx: &RunContext,
    ) -> Result<Vec<RawRecord>, AdapterError> {
        let mut hits = Vec::new();
        for (index, keyword) in self.keywords.iter().enumerate() {
            if index > 0 {
                // Fixed inter-request pause, local to this adapter's loop.
                tokio::time::sleep(self.request_delay).await;
            }
            hits.extend(self.search_keyword(http, ctx, keyword).await);
        }

        let unique = dedupe_hits(hits);
        let records = unique
            .iter()
            .enumerate()
            .map(|(index, hit)| hit_to_record(hit, index as u32 + 1))
            .collect();
        Ok(records)
    }
}

/// Pull the hit array out of whichever response shape came back: a known
/// key first, otherwise the first array of objects anywhere at the top
/// level.
fn extract_hits(data: &JsonValue) -> Option<Vec<JsonValue>> {
    for key in ["oppHits", "opportunities", "searchHits"] {
        if let Some(array) = data.get(key).and_then(JsonValue::as_array) {
            return Some(array.clone());
        }
    }
    let object = data.as_object()?;
    for value in object.values() {
        if let Some(array) = value.as_array() {
            if array.first().map(JsonValue::is_object).unwrap_or(false) {
                return Some(array.clone());
            }
        }
    }
    None
}

/// Deduplicate by the first identifier key present on every hit; later
/// occurrences replace earlier ones. Without a common identifier the
/// hits pass through untouched.
fn dedupe_hits(hits: Vec<JsonValue>) -> Vec<JsonValue> {
    let Some(id_key) = HIT_ID_KEYS
        .iter()
        .find(|key| !hits.is_empty() && hits.iter().all(|h| h.get(**key).is_some()))
    else {
        return hits;
    };

    let mut order: Vec<JsonValue> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();
    for hit in hits {
        let id = hit
            .get(*id_key)
            .and_then(value_to_text)
            .unwrap_or_default();
        match position.get(&id) {
            Some(&index) => order[index] = hit,
            None => {
                position.insert(id, order.len());
                order.push(hit);
            }
        }
    }
    order
}

fn hit_to_record(hit: &JsonValue, sequence: u32) -> RawRecord {
    let mut record = RawRecord::new(Source::GrantsGov, sequence);
    if let Some(object) = hit.as_object() {
        for (key, value) in object {
            if let Some(text) = value_to_text(value) {
                record.set(key.clone(), text);
            }
        }
    }
    record
}

fn value_to_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(JsonValue::as_str).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        _ => None,
    }
}
