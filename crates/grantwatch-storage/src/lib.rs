//! Fetch utilities, immutable raw-page artifacts, and the persistence
//! contract the pipeline hands canonical grants to.

mod artifact;
mod http;
mod store;

pub use artifact::{ArtifactStore, StoredArtifact};
pub use http::{
    classify_reqwest_error, classify_status, FetchError, FetchPolicy, FetchedPage,
    HttpClientConfig, HttpFetcher, RetryDisposition,
};
pub use store::{GrantStore, JsonFileStore, MemoryStore, StoreError, UpsertStats};
