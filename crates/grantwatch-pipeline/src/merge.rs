//! Merge/dedup of a quality-passed batch against the persisted set.
//!
//! Identity is the canonical `id` (grant number or derived key). Merging
//! is a full replace: no field-level reconciliation, no freshness
//! checks. Within one batch later records overwrite earlier ones
//! sharing a key; across refreshes the store's upsert does the same.

use std::collections::HashMap;

use grantwatch_core::CanonicalGrant;
use grantwatch_storage::{GrantStore, StoreError, UpsertStats};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub incoming: usize,
    pub unique: usize,
    pub inserted: usize,
    pub updated: usize,
}

/// Collapse within-batch key collisions, keeping first-seen order and
/// the last-seen record for each key.
pub fn coalesce_batch(batch: Vec<CanonicalGrant>) -> Vec<CanonicalGrant> {
    let mut order: Vec<CanonicalGrant> = Vec::with_capacity(batch.len());
    let mut position: HashMap<String, usize> = HashMap::with_capacity(batch.len());
    for grant in batch {
        match position.get(&grant.id) {
            Some(&index) => order[index] = grant,
            None => {
                position.insert(grant.id.clone(), order.len());
                order.push(grant);
            }
        }
    }
    order
}

/// Coalesce and upsert one batch. No incoming record is ever dropped
/// here for being "older"; freshness ordering is the caller's batch
/// order.
pub async fn merge_batch(
    store: &dyn GrantStore,
    batch: Vec<CanonicalGrant>,
) -> Result<MergeStats, StoreError> {
    let incoming = batch.len();
    let unique = coalesce_batch(batch);
    let UpsertStats { inserted, updated } = store.upsert_batch(&unique).await?;
    Ok(MergeStats {
        incoming,
        unique: unique.len(),
        inserted,
        updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantwatch_core::{derive_identity_key, Source};
    use grantwatch_storage::MemoryStore;

    fn grant(title: &str, funder: &str, description: &str) -> CanonicalGrant {
        CanonicalGrant {
            id: derive_identity_key(title, funder),
            title: title.to_string(),
            funder: funder.to_string(),
            description: description.to_string(),
            eligibility: "Nonprofits".to_string(),
            start_date: None,
            deadline: None,
            award_amount: Some(100000.0),
            link: "https://example.org".to_string(),
            source: Source::FoundationSites,
            geography: "National".to_string(),
            topic: "Workforce".to_string(),
            audience: "Other".to_string(),
            funder_type: "Foundation".to_string(),
        }
    }

    #[test]
    fn shared_derived_key_keeps_only_the_later_record() {
        let batch = vec![
            grant("Tech Training Fund", "Ford Foundation", "early version"),
            grant("Other Grant", "Ford Foundation", "unrelated"),
            grant("Tech Training Fund", "Ford Foundation", "late version"),
        ];
        let unique = coalesce_batch(batch);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].description, "late version");
        assert_eq!(unique[1].title, "Other Grant");
    }

    #[tokio::test]
    async fn merging_an_identical_batch_twice_is_idempotent() {
        let store = MemoryStore::new();
        let batch = vec![
            grant("Tech Training Fund", "Ford Foundation", "v1"),
            grant("Other Grant", "Ford Foundation", "v1"),
        ];

        let first = merge_batch(&store, batch.clone()).await.unwrap();
        assert_eq!(first.inserted, 2);
        let snapshot_one = store.load_all().await.unwrap();

        let second = merge_batch(&store, batch).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 2);
        let snapshot_two = store.load_all().await.unwrap();

        assert_eq!(snapshot_one.len(), 2);
        assert_eq!(snapshot_one, snapshot_two);
    }

    #[tokio::test]
    async fn reingestion_updates_in_place_rather_than_duplicating() {
        let store = MemoryStore::new();
        merge_batch(
            &store,
            vec![grant("Tech Training Fund", "Ford Foundation", "old text")],
        )
        .await
        .unwrap();
        merge_batch(
            &store,
            vec![grant("Tech Training Fund", "Ford Foundation", "new text")],
        )
        .await
        .unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].description, "new text");
    }
}
