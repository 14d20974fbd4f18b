//! Quality gate over normalized, classified records. Runs on every
//! record regardless of origin: the HTML extraction gates only cover
//! the heuristic sources, and API-backed adapters validate far less.

use grantwatch_core::{CanonicalGrant, NO_DESCRIPTION};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("empty title")]
    EmptyTitle,
    #[error("empty funder")]
    EmptyFunder,
    #[error("no deadline, no award amount, and no substantive description")]
    LowInformation,
}

#[derive(Debug, Clone)]
pub struct QualityPolicy {
    /// Descriptions at or below this length count as generic.
    pub min_description_chars: usize,
    /// Exact (case-insensitive) description texts that carry no signal.
    pub generic_descriptions: Vec<String>,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self {
            min_description_chars: 40,
            generic_descriptions: vec![
                NO_DESCRIPTION.to_string(),
                "n/a".to_string(),
                "tbd".to_string(),
                "see website".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QualityFilter {
    policy: QualityPolicy,
}

impl QualityFilter {
    pub fn new(policy: QualityPolicy) -> Self {
        Self { policy }
    }

    pub fn evaluate(&self, grant: &CanonicalGrant) -> Result<(), RejectReason> {
        if grant.title.trim().is_empty() {
            return Err(RejectReason::EmptyTitle);
        }
        if grant.funder.trim().is_empty() {
            return Err(RejectReason::EmptyFunder);
        }
        if grant.deadline.is_none()
            && grant.award_amount.is_none()
            && self.is_generic_description(&grant.description)
        {
            return Err(RejectReason::LowInformation);
        }
        Ok(())
    }

    pub fn accepts(&self, grant: &CanonicalGrant) -> bool {
        self.evaluate(grant).is_ok()
    }

    fn is_generic_description(&self, description: &str) -> bool {
        let trimmed = description.trim();
        if trimmed.chars().count() <= self.policy.min_description_chars {
            return true;
        }
        let lower = trimmed.to_lowercase();
        self.policy
            .generic_descriptions
            .iter()
            .any(|generic| generic.to_lowercase() == lower)
    }
}
