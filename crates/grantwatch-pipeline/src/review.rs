//! Advisory near-duplicate detection. Merging stays strictly
//! identity-key-based; this pass only surfaces cross-listing pairs
//! whose titles are suspiciously similar so a human can reconcile them.

use grantwatch_core::CanonicalGrant;
use serde::Serialize;
use strsim::jaro_winkler;

pub const DEFAULT_REVIEW_THRESHOLD: f64 = 0.88;

#[derive(Debug, Clone, Serialize)]
pub struct ReviewPair {
    pub id_a: String,
    pub id_b: String,
    pub title_a: String,
    pub title_b: String,
    pub similarity: f64,
}

/// Pairwise scan over the batch; pairs scoring at or above `threshold`
/// are reported. Quadratic, which is fine at per-refresh batch sizes.
pub fn near_duplicates(grants: &[CanonicalGrant], threshold: f64) -> Vec<ReviewPair> {
    let normalized: Vec<String> = grants.iter().map(|g| normalize_title(&g.title)).collect();
    let mut pairs = Vec::new();

    for i in 0..grants.len() {
        for j in (i + 1)..grants.len() {
            let similarity = jaro_winkler(&normalized[i], &normalized[j]);
            if similarity >= threshold {
                pairs.push(ReviewPair {
                    id_a: grants[i].id.clone(),
                    id_b: grants[j].id.clone(),
                    title_a: grants[i].title.clone(),
                    title_b: grants[j].title.clone(),
                    similarity,
                });
            }
        }
    }

    pairs
}

fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantwatch_core::Source;

    fn grant(id: &str, title: &str) -> CanonicalGrant {
        CanonicalGrant {
            id: id.to_string(),
            title: title.to_string(),
            funder: "Funder".to_string(),
            description: String::new(),
            eligibility: String::new(),
            start_date: None,
            deadline: None,
            award_amount: None,
            link: String::new(),
            source: Source::FoundationSites,
            geography: "National".to_string(),
            topic: "Other".to_string(),
            audience: "Other".to_string(),
            funder_type: "Other".to_string(),
        }
    }

    #[test]
    fn nearly_identical_titles_are_flagged() {
        let grants = vec![
            grant("a", "Workforce Development Initiative"),
            grant("b", "Workforce Development Initiative (2026)"),
        ];
        let pairs = near_duplicates(&grants, DEFAULT_REVIEW_THRESHOLD);
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].similarity >= DEFAULT_REVIEW_THRESHOLD);
    }

    #[test]
    fn unrelated_titles_are_not_flagged() {
        let grants = vec![
            grant("a", "Workforce Development Initiative"),
            grant("b", "Rural Broadband Expansion Fund"),
        ];
        assert!(near_duplicates(&grants, DEFAULT_REVIEW_THRESHOLD).is_empty());
    }
}
