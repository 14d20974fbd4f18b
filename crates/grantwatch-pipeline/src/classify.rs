//! Rule-table classifier for geography, topic, audience, and funder
//! type. Keyword matching is case-insensitive substring over title,
//! description, and eligibility text.

use grantwatch_core::{CanonicalGrant, DEFAULT_TAG, GOVERNMENT_FUNDER_TYPE};
use serde::Deserialize;

/// The three tag-field rule tables, as loaded from `rules/tags.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct TagTables {
    #[allow(dead_code)]
    version: u32,
    pub geography: RuleTable,
    pub topic: RuleTable,
    pub audience: RuleTable,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleTable {
    pub default: String,
    #[serde(default)]
    pub rules: Vec<TagRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagRule {
    pub label: String,
    pub contains_any: Vec<String>,
}

/// Funder-type resolution data, as loaded from `rules/funders.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct FunderRegistry {
    #[allow(dead_code)]
    version: u32,
    pub government_keywords: Vec<String>,
    #[serde(default)]
    pub categories: Vec<FunderCategory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunderCategory {
    pub category: String,
    pub funders: Vec<String>,
}

pub struct Classifier {
    tags: TagTables,
    funders: FunderRegistry,
}

impl Classifier {
    pub fn new(tags: TagTables, funders: FunderRegistry) -> Self {
        Self { tags, funders }
    }

    /// Classify every record, then apply the provenance pass: records
    /// from government-operated adapters are always `Government`,
    /// whatever their funder text looked like.
    pub fn classify_batch(&self, grants: &mut [CanonicalGrant]) {
        for grant in grants.iter_mut() {
            self.classify(grant);
        }
        for grant in grants.iter_mut() {
            if grant.source.is_government() {
                grant.funder_type = GOVERNMENT_FUNDER_TYPE.to_string();
            }
        }
    }

    fn classify(&self, grant: &mut CanonicalGrant) {
        let haystack = grant.classification_text();
        grant.geography = assign_label(&self.tags.geography, &haystack);
        grant.topic = assign_label(&self.tags.topic, &haystack);
        grant.audience = assign_label(&self.tags.audience, &haystack);
        grant.funder_type = self.funder_type_for(&grant.funder);
    }

    /// Resolution order: government-entity keyword in the funder name,
    /// then the funder registry (substring match either direction),
    /// then the default bucket.
    fn funder_type_for(&self, funder: &str) -> String {
        let funder_lower = funder.trim().to_lowercase();
        if funder_lower.is_empty() {
            return DEFAULT_TAG.to_string();
        }

        if self
            .funders
            .government_keywords
            .iter()
            .any(|keyword| funder_lower.contains(&keyword.to_lowercase()))
        {
            return GOVERNMENT_FUNDER_TYPE.to_string();
        }

        for category in &self.funders.categories {
            for known in &category.funders {
                let known_lower = known.to_lowercase();
                if funder_lower.contains(&known_lower) || known_lower.contains(&funder_lower) {
                    return category.category.clone();
                }
            }
        }

        DEFAULT_TAG.to_string()
    }
}

/// One generic matcher for every tag table. The scan deliberately does
/// not short-circuit: the last matching rule in table order wins.
fn assign_label(table: &RuleTable, haystack: &str) -> String {
    let mut label = table.default.clone();
    for rule in &table.rules {
        if rule
            .contains_any
            .iter()
            .any(|keyword| haystack.contains(&keyword.to_lowercase()))
        {
            label = rule.label.clone();
        }
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantwatch_core::Source;

    fn table(default: &str, rules: &[(&str, &[&str])]) -> RuleTable {
        RuleTable {
            default: default.to_string(),
            rules: rules
                .iter()
                .map(|(label, keywords)| TagRule {
                    label: label.to_string(),
                    contains_any: keywords.iter().map(|k| k.to_string()).collect(),
                })
                .collect(),
        }
    }

    fn classifier() -> Classifier {
        let tags = TagTables {
            version: 1,
            geography: table(
                "National",
                &[
                    ("NY", &["new york", "nyc", "brooklyn"]),
                    ("National", &["national", "nationwide", "united states"]),
                ],
            ),
            topic: table(
                "Other",
                &[
                    ("Workforce", &["workforce", "job training"]),
                    ("Tech", &["technology", "coding"]),
                ],
            ),
            audience: table(
                "Other",
                &[
                    ("Adults 24+", &["adult"]),
                    ("Low-income", &["low-income", "underserved", "equity"]),
                ],
            ),
        };
        let funders = FunderRegistry {
            version: 1,
            government_keywords: ["department", "agency", "federal", "state of"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            categories: vec![
                FunderCategory {
                    category: "Foundation".to_string(),
                    funders: vec!["Ford Foundation".to_string()],
                },
                FunderCategory {
                    category: "Community".to_string(),
                    funders: vec!["Example Community Fund".to_string()],
                },
            ],
        };
        Classifier::new(tags, funders)
    }

    fn grant(source: Source, funder: &str, description: &str) -> CanonicalGrant {
        CanonicalGrant {
            id: "g-1".to_string(),
            title: "Grant".to_string(),
            funder: funder.to_string(),
            description: description.to_string(),
            eligibility: String::new(),
            start_date: None,
            deadline: None,
            award_amount: None,
            link: String::new(),
            source,
            geography: "National".to_string(),
            topic: "Other".to_string(),
            audience: "Other".to_string(),
            funder_type: "Other".to_string(),
        }
    }

    #[test]
    fn keywords_assign_tags_from_any_text_field() {
        let mut grants = vec![grant(
            Source::FoundationSites,
            "Ford Foundation",
            "Job training for underserved adults in Brooklyn.",
        )];
        classifier().classify_batch(&mut grants);
        assert_eq!(grants[0].geography, "NY");
        assert_eq!(grants[0].topic, "Workforce");
        assert_eq!(grants[0].audience, "Low-income");
        assert_eq!(grants[0].funder_type, "Foundation");
    }

    #[test]
    fn later_matching_rules_overwrite_earlier_ones() {
        // Both geography tables match; the scan must not short-circuit
        // on NY, so the later National rule wins.
        let mut grants = vec![grant(
            Source::FoundationSites,
            "Ford Foundation",
            "A nationwide program with a New York pilot site.",
        )];
        classifier().classify_batch(&mut grants);
        assert_eq!(grants[0].geography, "National");
    }

    #[test]
    fn unmatched_records_keep_the_default_labels() {
        let mut grants = vec![grant(
            Source::FoundationSites,
            "Someone Entirely Unknown",
            "General operating support.",
        )];
        classifier().classify_batch(&mut grants);
        assert_eq!(grants[0].geography, "National");
        assert_eq!(grants[0].topic, "Other");
        assert_eq!(grants[0].audience, "Other");
        assert_eq!(grants[0].funder_type, "Other");
    }

    #[test]
    fn government_keywords_beat_the_registry() {
        let mut grants = vec![grant(
            Source::FoundationSites,
            "Department of Community Funds",
            "",
        )];
        classifier().classify_batch(&mut grants);
        assert_eq!(grants[0].funder_type, "Government");
    }

    #[test]
    fn registry_matches_case_insensitively_in_either_direction() {
        let mut grants = vec![
            grant(Source::FoundationSites, "THE FORD FOUNDATION TRUST", ""),
            grant(Source::FoundationSites, "Ford", ""),
        ];
        classifier().classify_batch(&mut grants);
        assert_eq!(grants[0].funder_type, "Foundation");
        // "Ford" is a substring of the registry entry, so the reverse
        // direction matches too.
        assert_eq!(grants[1].funder_type, "Foundation");
    }

    #[test]
    fn source_provenance_overrides_the_text_heuristics() {
        let mut grants = vec![grant(
            Source::GrantsGov,
            "Example Community Fund",
            "Technology grants.",
        )];
        classifier().classify_batch(&mut grants);
        assert_eq!(grants[0].funder_type, "Government");
    }
}
