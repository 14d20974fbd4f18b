//! Per-run reports: a markdown brief, a CSV snapshot of the batch, and
//! a JSON delta for downstream consumers (notification, spreadsheets).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use grantwatch_core::CanonicalGrant;
use serde::Serialize;
use tokio::fs;
use uuid::Uuid;

use crate::export;
use crate::review::ReviewPair;

#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources_attempted: usize,
    pub sources_failed: usize,
    pub raw_records: usize,
    pub rejected_records: usize,
    pub store_available: bool,
}

pub async fn write_reports(
    reports_root: &Path,
    run: &RunRecord,
    batch: &[CanonicalGrant],
    review: &[ReviewPair],
) -> Result<PathBuf> {
    let run_dir = reports_root.join(run.run_id.to_string());
    fs::create_dir_all(&run_dir)
        .await
        .with_context(|| format!("creating {}", run_dir.display()))?;

    let mut source_counts: BTreeMap<String, usize> = BTreeMap::new();
    for grant in batch {
        *source_counts
            .entry(grant.source.display_name().to_string())
            .or_default() += 1;
    }

    let brief = format!(
        "# Grantwatch Refresh Brief\n\n\
         - Run ID: `{}`\n\
         - Started: {}\n\
         - Finished: {}\n\
         - Sources attempted: {} ({} failed)\n\
         - Raw records: {}\n\
         - Persisted batch: {}\n\
         - Rejected by quality filter: {}\n\
         - Store available: {}\n\n\
         ## Source Counts\n{}\n\n\
         ## Near-duplicate review\n{}\n",
        run.run_id,
        run.started_at,
        run.finished_at,
        run.sources_attempted,
        run.sources_failed,
        run.raw_records,
        batch.len(),
        run.rejected_records,
        run.store_available,
        format_counts(&source_counts),
        format_review(review),
    );
    fs::write(run_dir.join("brief.md"), brief)
        .await
        .context("writing brief.md")?;

    fs::write(run_dir.join("grants.csv"), export::to_csv(batch))
        .await
        .context("writing grants.csv")?;

    let delta = serde_json::to_vec_pretty(&serde_json::json!({
        "refresh": run,
        "grants": batch,
        "review": review,
    }))
    .context("serializing refresh delta")?;
    fs::write(run_dir.join("delta.json"), delta)
        .await
        .context("writing delta.json")?;

    Ok(run_dir)
}

fn format_counts(counts: &BTreeMap<String, usize>) -> String {
    if counts.is_empty() {
        return "- none".to_string();
    }
    counts
        .iter()
        .map(|(source, count)| format!("- {source}: {count}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_review(review: &[ReviewPair]) -> String {
    if review.is_empty() {
        return "- none".to_string();
    }
    review
        .iter()
        .map(|pair| {
            format!(
                "- `{}` vs `{}` ({:.2}): {} / {}",
                pair.id_a, pair.id_b, pair.similarity, pair.title_a, pair.title_b
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantwatch_core::Source;

    #[tokio::test]
    async fn reports_land_under_the_run_directory() {
        let dir = tempfile::tempdir().unwrap();
        let run = RunRecord {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            sources_attempted: 3,
            sources_failed: 1,
            raw_records: 5,
            rejected_records: 2,
            store_available: true,
        };
        let batch = vec![CanonicalGrant {
            id: "g-1".to_string(),
            title: "Workforce Grant".to_string(),
            funder: "Ford Foundation".to_string(),
            description: "desc".to_string(),
            eligibility: "elig".to_string(),
            start_date: None,
            deadline: None,
            award_amount: None,
            link: "https://example.org".to_string(),
            source: Source::FoundationSites,
            geography: "National".to_string(),
            topic: "Workforce".to_string(),
            audience: "Other".to_string(),
            funder_type: "Foundation".to_string(),
        }];

        let run_dir = write_reports(dir.path(), &run, &batch, &[]).await.unwrap();
        assert!(run_dir.join("brief.md").exists());
        assert!(run_dir.join("grants.csv").exists());
        assert!(run_dir.join("delta.json").exists());

        let brief = std::fs::read_to_string(run_dir.join("brief.md")).unwrap();
        assert!(brief.contains("Foundation Sites: 1"));
        assert!(brief.contains("(1 failed)"));
    }
}
