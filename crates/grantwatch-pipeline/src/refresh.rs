//! One full refresh cycle: fan out across source adapters, then run
//! every surviving record through normalize → classify → quality →
//! merge, and write the run reports.
//!
//! Adapters run as a task group with a per-source timeout. A slow or
//! failing source degrades to an empty record set and a warning; the
//! refresh proceeds with whatever succeeded.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use grantwatch_adapters::extract::MissionVocabulary;
use grantwatch_adapters::{
    FoundationSitesAdapter, GrantsGovAdapter, NyGrantsGatewayAdapter, RunContext, SourceAdapter,
};
use grantwatch_core::{CanonicalGrant, RawRecord, Source};
use grantwatch_storage::{ArtifactStore, GrantStore, HttpClientConfig, HttpFetcher, UpsertStats};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classify::Classifier;
use crate::config::{PipelineConfig, RuleSet, SourceRegistry};
use crate::merge::{coalesce_batch, MergeStats};
use crate::normalize::Normalizer;
use crate::quality::QualityFilter;
use crate::report::{write_reports, RunRecord};
use crate::review::{near_duplicates, DEFAULT_REVIEW_THRESHOLD};

/// What one refresh did. The caller owns cadence and "last refresh"
/// bookkeeping; everything it needs for that is carried here rather
/// than held in ambient state.
#[derive(Debug, Clone)]
pub struct RefreshSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources_attempted: usize,
    pub sources_failed: usize,
    pub raw_records: usize,
    pub rejected: usize,
    pub merge: MergeStats,
    pub review_pairs: usize,
    pub store_available: bool,
    pub reports_dir: String,
}

pub struct RefreshPipeline {
    config: PipelineConfig,
    classifier: Classifier,
    quality: QualityFilter,
    http: Arc<HttpFetcher>,
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl RefreshPipeline {
    pub fn new(config: PipelineConfig, registry: SourceRegistry, rules: RuleSet) -> Result<Self> {
        let delay = Duration::from_millis(config.request_delay_ms);
        let vocabulary = MissionVocabulary::new(rules.relevance.clone());

        let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();
        for source in registry.sources.iter().filter(|s| s.enabled) {
            match Source::from_slug(&source.source_id) {
                Some(Source::GrantsGov) => {
                    adapters.push(Arc::new(GrantsGovAdapter::new(source.keywords.clone(), delay)));
                }
                Some(Source::NyGrantsGateway) => {
                    let url = source
                        .targets
                        .first()
                        .map(|t| t.url.clone())
                        .unwrap_or_else(|| Source::NyGrantsGateway.base_url().to_string());
                    adapters.push(Arc::new(NyGrantsGatewayAdapter::new(url)));
                }
                Some(Source::FoundationSites) => {
                    adapters.push(Arc::new(FoundationSitesAdapter::new(
                        source.targets.clone(),
                        vocabulary.clone(),
                        delay,
                    )));
                }
                None => warn!(source_id = %source.source_id, "no adapter registered for source"),
            }
        }

        Self::with_adapters(config, rules, adapters)
    }

    /// Assemble a pipeline around an explicit adapter list. `new` is the
    /// registry-driven front door; tests inject stub adapters here.
    pub fn with_adapters(
        config: PipelineConfig,
        rules: RuleSet,
        adapters: Vec<Arc<dyn SourceAdapter>>,
    ) -> Result<Self> {
        let http = HttpFetcher::new(HttpClientConfig {
            timeout: Duration::from_secs(config.http_timeout_secs),
            user_agent: config.user_agent.clone(),
            ..Default::default()
        })?;
        Ok(Self {
            classifier: Classifier::new(rules.tags, rules.funders),
            quality: QualityFilter::default(),
            http: Arc::new(http),
            adapters,
            config,
        })
    }

    pub async fn run_once(&self, store: &dyn GrantStore) -> Result<RefreshSummary> {
        let started_at = Utc::now();
        let ctx = RunContext::new(ArtifactStore::new(self.config.artifacts_dir.clone()));
        let run_id = ctx.run_id;
        info!(%run_id, sources = self.adapters.len(), "starting refresh");

        let (mut raw_records, sources_failed) = self.fetch_all(&ctx).await;
        // Completion order varies across tasks; fix batch order so
        // within-batch overwrite semantics stay deterministic.
        raw_records.sort_by_key(|record| (record.source, record.sequence));
        let raw_count = raw_records.len();

        let mut normalizer = Normalizer::new();
        let mut grants: Vec<CanonicalGrant> = raw_records
            .iter()
            .map(|record| normalizer.normalize(record))
            .collect();
        self.classifier.classify_batch(&mut grants);

        let mut accepted = Vec::new();
        let mut rejected = 0usize;
        for grant in grants {
            match self.quality.evaluate(&grant) {
                Ok(()) => accepted.push(grant),
                Err(reason) => {
                    rejected += 1;
                    debug!(id = %grant.id, %reason, "quality filter dropped record");
                }
            }
        }

        let incoming = accepted.len();
        let unique = coalesce_batch(accepted);
        let review = near_duplicates(&unique, DEFAULT_REVIEW_THRESHOLD);

        let mut store_available = store.ping().await;
        let upsert = if store_available {
            match store.upsert_batch(&unique).await {
                Ok(stats) => stats,
                Err(err) => {
                    warn!(%err, "grant store rejected the batch; keeping it in memory only");
                    store_available = false;
                    UpsertStats::default()
                }
            }
        } else {
            warn!("grant store unavailable; keeping this batch in memory only");
            UpsertStats::default()
        };
        let merge = MergeStats {
            incoming,
            unique: unique.len(),
            inserted: upsert.inserted,
            updated: upsert.updated,
        };

        let finished_at = Utc::now();
        let run = RunRecord {
            run_id,
            started_at,
            finished_at,
            sources_attempted: self.adapters.len(),
            sources_failed,
            raw_records: raw_count,
            rejected_records: rejected,
            store_available,
        };
        let reports_dir = write_reports(&self.config.reports_dir, &run, &unique, &review)
            .await
            .context("writing refresh reports")?;

        info!(%run_id, persisted = merge.unique, rejected, "refresh complete");

        Ok(RefreshSummary {
            run_id,
            started_at,
            finished_at,
            sources_attempted: self.adapters.len(),
            sources_failed,
            raw_records: raw_count,
            rejected,
            merge,
            review_pairs: review.len(),
            store_available,
            reports_dir: reports_dir.display().to_string(),
        })
    }

    async fn fetch_all(&self, ctx: &RunContext) -> (Vec<RawRecord>, usize) {
        let timeout = Duration::from_secs(self.config.source_timeout_secs);
        let mut tasks: JoinSet<(Source, Vec<RawRecord>, bool)> = JoinSet::new();

        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            let http = Arc::clone(&self.http);
            let ctx = ctx.clone();
            tasks.spawn(async move {
                let source = adapter.source();
                match tokio::time::timeout(timeout, adapter.fetch_records(&http, &ctx)).await {
                    Ok(Ok(records)) => {
                        info!(source = %source, count = records.len(), "adapter finished");
                        (source, records, false)
                    }
                    Ok(Err(err)) => {
                        warn!(source = %source, %err, "adapter failed; continuing without it");
                        (source, Vec::new(), true)
                    }
                    Err(_) => {
                        warn!(source = %source, timeout_secs = timeout.as_secs(), "adapter timed out; continuing without it");
                        (source, Vec::new(), true)
                    }
                }
            });
        }

        let mut raw = Vec::new();
        let mut failed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, records, was_failure)) => {
                    if was_failure {
                        failed += 1;
                    }
                    raw.extend(records);
                }
                Err(err) => {
                    warn!(%err, "adapter task aborted; continuing without it");
                    failed += 1;
                }
            }
        }
        (raw, failed)
    }
}
