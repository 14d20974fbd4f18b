//! Source adapter contract and the adapters for each grant origin.
//!
//! Every adapter is an independently failing unit: a network or parse
//! failure surfaces as an error from `fetch_records`, and the pipeline
//! runner degrades it to an empty record set plus a warning so the other
//! sources still land.

pub mod extract;
mod foundations;
mod grants_gov;
mod ny_gateway;

pub use foundations::{FoundationSitesAdapter, FoundationTarget};
pub use grants_gov::GrantsGovAdapter;
pub use ny_gateway::NyGrantsGatewayAdapter;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grantwatch_core::{RawRecord, Source};
use grantwatch_storage::{ArtifactStore, FetchError, HttpFetcher};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{0}")]
    Message(String),
}

/// Per-refresh context handed to every adapter.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub fetched_at: DateTime<Utc>,
    pub artifacts: ArtifactStore,
}

impl RunContext {
    pub fn new(artifacts: ArtifactStore) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            fetched_at: Utc::now(),
            artifacts,
        }
    }
}

/// One origin of grant opportunities.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;

    /// Fetch this origin and emit zero or more raw field maps. Field
    /// values stay as raw text; type coercion belongs to the normalizer.
    async fn fetch_records(
        &self,
        http: &HttpFetcher,
        ctx: &RunContext,
    ) -> Result<Vec<RawRecord>, AdapterError>;
}

/// Keep a copy of what we fetched; losing an artifact is never worth
/// failing the refresh over.
pub(crate) async fn store_artifact_best_effort(
    ctx: &RunContext,
    source: Source,
    extension: &str,
    bytes: &[u8],
) {
    if let Err(err) = ctx
        .artifacts
        .store_page(ctx.fetched_at, source, extension, bytes)
        .await
    {
        warn!(source = %source, %err, "failed to store raw artifact");
    }
}
