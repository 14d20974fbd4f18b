//! End-to-end pipeline flow against stub adapters and an in-memory
//! store, using the checked-in rule tables.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use grantwatch_adapters::{AdapterError, RunContext, SourceAdapter};
use grantwatch_core::{RawRecord, Source, NO_DESCRIPTION};
use grantwatch_pipeline::{load_rules, PipelineConfig, RefreshPipeline};
use grantwatch_storage::{GrantStore, HttpFetcher, MemoryStore};

struct StubAdapter {
    source: Source,
    records: Vec<RawRecord>,
}

#[async_trait]
impl SourceAdapter for StubAdapter {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch_records(
        &self,
        _http: &HttpFetcher,
        _ctx: &RunContext,
    ) -> Result<Vec<RawRecord>, AdapterError> {
        Ok(self.records.clone())
    }
}

struct FailingAdapter;

#[async_trait]
impl SourceAdapter for FailingAdapter {
    fn source(&self) -> Source {
        Source::NyGrantsGateway
    }

    async fn fetch_records(
        &self,
        _http: &HttpFetcher,
        _ctx: &RunContext,
    ) -> Result<Vec<RawRecord>, AdapterError> {
        Err(AdapterError::Message("listing page unreachable".to_string()))
    }
}

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .expect("workspace root")
}

fn test_config(scratch: &Path) -> PipelineConfig {
    PipelineConfig {
        workspace_root: workspace_root(),
        data_dir: scratch.join("data"),
        artifacts_dir: scratch.join("artifacts"),
        reports_dir: scratch.join("reports"),
        user_agent: "grantwatch-test/0".to_string(),
        http_timeout_secs: 5,
        source_timeout_secs: 5,
        request_delay_ms: 0,
    }
}

fn api_record() -> RawRecord {
    let mut record = RawRecord::new(Source::GrantsGov, 1);
    record.set("oppNum", "ED-GRANTS-2026-01");
    record.set("opportunityTitle", "Adult Tech Training Program");
    record.set("agencyName", "Example Community Fund");
    record.set(
        "opportunityDescription",
        "Job training and technology education for adults entering the software workforce.",
    );
    record.set("closeDate", "03/15/2026");
    record.set("awardCeiling", "500000");
    record
}

fn foundation_record(sequence: u32, description: &str) -> RawRecord {
    let mut record = RawRecord::new(Source::FoundationSites, sequence);
    record.set("Title", "Workforce Training Expansion Grant");
    record.set("Funder", "Ford Foundation");
    record.set("Description", description);
    record.set("Link", "https://funder.example/grants/workforce");
    record
}

fn sparse_record(sequence: u32) -> RawRecord {
    let mut record = RawRecord::new(Source::FoundationSites, sequence);
    record.set("Title", "Untitled Opportunity Announcement");
    record.set("Funder", "Ford Foundation");
    record.set("Description", NO_DESCRIPTION);
    record
}

fn pipeline(scratch: &Path) -> RefreshPipeline {
    let rules = load_rules(&workspace_root()).expect("rules");
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(StubAdapter {
            source: Source::GrantsGov,
            records: vec![api_record()],
        }),
        Arc::new(StubAdapter {
            source: Source::FoundationSites,
            records: vec![
                foundation_record(1, "Early description of a multi-year workforce program."),
                foundation_record(2, "Final description of a multi-year workforce program."),
                sparse_record(3),
            ],
        }),
        Arc::new(FailingAdapter),
    ];
    RefreshPipeline::with_adapters(test_config(scratch), rules, adapters).expect("pipeline")
}

#[tokio::test]
async fn refresh_normalizes_classifies_filters_and_merges() {
    let scratch = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let pipeline = pipeline(scratch.path());

    let summary = pipeline.run_once(&store).await.expect("refresh");

    assert_eq!(summary.sources_attempted, 3);
    assert_eq!(summary.sources_failed, 1);
    assert_eq!(summary.raw_records, 4);
    // The sentinel-description record has no deadline or amount.
    assert_eq!(summary.rejected, 1);
    // Two foundation records share a derived (title, funder) key.
    assert_eq!(summary.merge.incoming, 3);
    assert_eq!(summary.merge.unique, 2);
    assert_eq!(summary.merge.inserted, 2);
    assert!(summary.store_available);

    let grants = store.load_all().await.unwrap();
    assert_eq!(grants.len(), 2);

    let api = grants.iter().find(|g| g.id == "ED-GRANTS-2026-01").unwrap();
    // Provenance beats the funder-name heuristics for government APIs.
    assert_eq!(api.funder_type, "Government");
    assert_eq!(api.topic, "Tech");
    assert_eq!(api.audience, "Adults 24+");
    assert!(api.deadline.is_some());

    let foundation = grants
        .iter()
        .find(|g| g.id == "workforce-training-expansion-grant::ford-foundation")
        .unwrap();
    assert_eq!(foundation.funder_type, "Foundation");
    // Within one batch the later record overwrote the earlier one.
    assert_eq!(
        foundation.description,
        "Final description of a multi-year workforce program."
    );

    let reports_dir = PathBuf::from(&summary.reports_dir);
    assert!(reports_dir.join("brief.md").exists());
    assert!(reports_dir.join("grants.csv").exists());
    assert!(reports_dir.join("delta.json").exists());
}

#[tokio::test]
async fn rerunning_an_identical_refresh_leaves_the_store_unchanged() {
    let scratch = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let pipeline = pipeline(scratch.path());

    pipeline.run_once(&store).await.expect("first refresh");
    let first = store.load_all().await.unwrap();

    let summary = pipeline.run_once(&store).await.expect("second refresh");
    let second = store.load_all().await.unwrap();

    assert_eq!(summary.merge.inserted, 0);
    assert_eq!(summary.merge.updated, 2);
    assert_eq!(first.len(), second.len());
    assert_eq!(first, second);
}
