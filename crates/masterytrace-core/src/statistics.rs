//! Aggregate statistics over mastery records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::MasteryRecord;

/// Mastery statistics for one learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterySummary {
    pub user_id: String,
    /// Skills with at least one stored record.
    pub skills_tracked: usize,
    /// Skills whose `p_know` reached the mastered threshold.
    pub skills_mastered: usize,
    /// Mean `p_know` over tracked skills, 0 when none are tracked.
    pub mean_p_know: f64,
    pub total_exposures: u64,
}

/// Summarize records per user, ordered by user id.
pub fn summarize(records: &[MasteryRecord], mastered_threshold: f64) -> Vec<MasterySummary> {
    let mut per_user: BTreeMap<&str, Vec<&MasteryRecord>> = BTreeMap::new();
    for r in records {
        per_user.entry(r.user_id.as_str()).or_default().push(r);
    }

    per_user
        .into_iter()
        .map(|(user_id, records)| {
            let tracked = records.len();
            let mean = if tracked == 0 {
                0.0
            } else {
                records.iter().map(|r| r.p_know).sum::<f64>() / tracked as f64
            };
            MasterySummary {
                user_id: user_id.to_string(),
                skills_tracked: tracked,
                skills_mastered: records
                    .iter()
                    .filter(|r| r.p_know >= mastered_threshold)
                    .count(),
                mean_p_know: mean,
                total_exposures: records.iter().map(|r| r.exposure_count as u64).sum(),
            }
        })
        .collect()
}

/// Whether a record counts as mastered.
pub fn is_mastered(record: &MasteryRecord, mastered_threshold: f64) -> bool {
    record.p_know >= mastered_threshold
}
