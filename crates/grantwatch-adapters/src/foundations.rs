//! Foundation-site adapter: walks a configured list of foundation
//! listing pages and runs the heuristic extraction engine over each.

use std::time::Duration;

use async_trait::async_trait;
use grantwatch_core::{RawRecord, Source};
use grantwatch_storage::HttpFetcher;
use serde::Deserialize;
use tracing::{info, warn};

use crate::extract::{ExtractionEngine, MissionVocabulary, PageContext};
use crate::{store_artifact_best_effort, AdapterError, RunContext, SourceAdapter};

/// One foundation listing page, with the funder name to stamp on
/// extracted records when the markup does not carry one.
#[derive(Debug, Clone, Deserialize)]
pub struct FoundationTarget {
    pub url: String,
    #[serde(default)]
    pub funder: Option<String>,
}

pub struct FoundationSitesAdapter {
    targets: Vec<FoundationTarget>,
    engine: ExtractionEngine,
    request_delay: Duration,
}

impl FoundationSitesAdapter {
    pub fn new(
        targets: Vec<FoundationTarget>,
        vocabulary: MissionVocabulary,
        request_delay: Duration,
    ) -> Self {
        Self {
            targets,
            engine: ExtractionEngine::new(vocabulary),
            request_delay,
        }
    }
}

#[async_trait]
impl SourceAdapter for FoundationSitesAdapter {
    fn source(&self) -> Source {
        Source::FoundationSites
    }

    async fn fetch_records(
        &self,
        http: &HttpFetcher,
        ctx: &RunContext,
    ) -> Result<Vec<RawRecord>, AdapterError> {
        let mut records = Vec::new();
        let mut sequence = 0u32;

        for (index, target) in self.targets.iter().enumerate() {
            if index > 0 {
                // Fixed inter-request pause, local to this adapter's
                // sequential loop, to stay under anti-scraping radar.
                tokio::time::sleep(self.request_delay).await;
            }

            let page = match http.get_text(Source::FoundationSites, &target.url).await {
                Ok(page) => page,
                Err(err) => {
                    warn!(url = %target.url, %err, "skipping unreachable foundation site");
                    continue;
                }
            };
            store_artifact_best_effort(ctx, Source::FoundationSites, "html", page.body.as_bytes())
                .await;

            let context = PageContext {
                source: Source::FoundationSites,
                base_url: page.final_url.clone(),
                funder: target.funder.clone(),
            };
            let extracted = self.engine.extract(&page.body, &context, &mut sequence);
            info!(url = %target.url, count = extracted.len(), "extracted foundation page");
            records.extend(extracted);
        }

        Ok(records)
    }
}
