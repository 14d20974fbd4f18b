//! Core domain model for grantwatch: sources, raw field maps, and the
//! canonical grant record shared by every pipeline stage.

pub mod parse;

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default text when a source provides no description.
pub const NO_DESCRIPTION: &str = "No description provided.";
/// Default text when a source provides no eligibility details.
pub const NO_ELIGIBILITY: &str = "Eligibility information not available.";

/// Default tag labels. Geography defaults to national reach; the other
/// tag fields fall back to a catch-all bucket.
pub const DEFAULT_GEOGRAPHY: &str = "National";
pub const DEFAULT_TAG: &str = "Other";
pub const GOVERNMENT_FUNDER_TYPE: &str = "Government";

/// Which adapter produced a record. Never overwritten once classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "Grants.gov")]
    GrantsGov,
    #[serde(rename = "NY Grants Gateway")]
    NyGrantsGateway,
    #[serde(rename = "Foundation Sites")]
    FoundationSites,
}

impl Source {
    pub const ALL: [Source; 3] = [
        Source::GrantsGov,
        Source::NyGrantsGateway,
        Source::FoundationSites,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Source::GrantsGov => "grants-gov",
            Source::NyGrantsGateway => "ny-grants-gateway",
            Source::FoundationSites => "foundation-sites",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Source::GrantsGov => "Grants.gov",
            Source::NyGrantsGateway => "NY Grants Gateway",
            Source::FoundationSites => "Foundation Sites",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Source> {
        Source::ALL.iter().copied().find(|s| s.slug() == slug)
    }

    /// Landing page used when a record carries no specific link.
    pub fn base_url(self) -> &'static str {
        match self {
            Source::GrantsGov => "https://www.grants.gov",
            Source::NyGrantsGateway => "https://grantsmanagement.ny.gov/opportunities",
            Source::FoundationSites => "https://www.grantwatch.example/foundations",
        }
    }

    /// Government-operated origins. Provenance here is authoritative over
    /// any text-based funder-type heuristic.
    pub fn is_government(self) -> bool {
        matches!(self, Source::GrantsGov | Source::NyGrantsGateway)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Unvalidated field map emitted by one source adapter for one candidate
/// opportunity. Field values stay as raw text; type coercion happens in
/// the normalizer, never earlier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source: Source,
    /// Synthetic per-source sequence id, assigned in emission order.
    pub sequence: u32,
    pub fields: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn new(source: Source, sequence: u32) -> Self {
        Self {
            source,
            sequence,
            fields: BTreeMap::new(),
        }
    }

    /// Insert a field, dropping values that trim to nothing so "present
    /// but blank" and "absent" collapse into one case downstream.
    pub fn set(&mut self, name: impl Into<String>, value: impl AsRef<str>) {
        let trimmed = value.as_ref().trim();
        if !trimmed.is_empty() {
            self.fields.insert(name.into(), trimmed.to_string());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// The durable, normalized, classified grant entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalGrant {
    /// Stable identity key: source-provided grant number when present,
    /// otherwise derived from `(title, funder)`.
    pub id: String,
    pub title: String,
    pub funder: String,
    pub description: String,
    pub eligibility: String,
    pub start_date: Option<NaiveDate>,
    pub deadline: Option<NaiveDate>,
    pub award_amount: Option<f64>,
    pub link: String,
    pub source: Source,
    pub geography: String,
    pub topic: String,
    pub audience: String,
    pub funder_type: String,
}

impl CanonicalGrant {
    /// Lowercased haystack the classifier matches keywords against.
    pub fn classification_text(&self) -> String {
        let mut text = String::with_capacity(
            self.title.len() + self.description.len() + self.eligibility.len() + 2,
        );
        text.push_str(&self.title.to_lowercase());
        text.push(' ');
        text.push_str(&self.description.to_lowercase());
        text.push(' ');
        text.push_str(&self.eligibility.to_lowercase());
        text
    }
}

/// Derived identity key for records without a source-provided grant
/// number. Two records with the same derived key are the same grant
/// across refreshes.
pub fn derive_identity_key(title: &str, funder: &str) -> String {
    format!("{}::{}", slugify(title), slugify(funder))
}

fn slugify(input: &str) -> String {
    input
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}
