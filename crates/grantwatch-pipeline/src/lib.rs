//! The grantwatch processing pipeline: normalization, classification,
//! quality filtering, merge/dedup, and the refresh orchestration that
//! fans out across source adapters.

pub mod classify;
pub mod config;
pub mod export;
pub mod merge;
pub mod normalize;
pub mod quality;
pub mod refresh;
pub mod report;
pub mod review;

pub use classify::Classifier;
pub use config::{load_rules, load_source_registry, PipelineConfig, RuleSet, SourceConfig, SourceRegistry};
pub use merge::{coalesce_batch, MergeStats};
pub use normalize::Normalizer;
pub use quality::{QualityFilter, QualityPolicy, RejectReason};
pub use refresh::{RefreshPipeline, RefreshSummary};
pub use review::{near_duplicates, ReviewPair, DEFAULT_REVIEW_THRESHOLD};
