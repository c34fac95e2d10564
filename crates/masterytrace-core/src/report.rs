//! Replay report types with JSON persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::SubmissionOutcome;
use crate::model::{Catalog, MasteryRecord};
use crate::statistics::MasterySummary;

/// A complete replay report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// Summary of the catalog the session was replayed against.
    pub catalog: CatalogSummary,
    /// Outcome of every submitted attempt, in session order.
    pub outcomes: Vec<SubmissionOutcome>,
    /// Attempts of the session that failed, with the reason.
    #[serde(default)]
    pub failures: Vec<ReplayFailure>,
    /// Final mastery records of every user in the session.
    pub mastery: Vec<MasteryRecord>,
    /// Per-user statistics over `mastery`.
    pub summaries: Vec<MasterySummary>,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Summary of a catalog (without the full quiz definitions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSummary {
    pub id: String,
    pub name: String,
    pub skill_count: usize,
    pub quiz_count: usize,
}

impl From<&Catalog> for CatalogSummary {
    fn from(catalog: &Catalog) -> Self {
        Self {
            id: catalog.id.clone(),
            name: catalog.name.clone(),
            skill_count: catalog.skills.len(),
            quiz_count: catalog.quizzes.len(),
        }
    }
}

/// A scripted attempt the engine rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayFailure {
    /// Position of the attempt in the session.
    pub index: usize,
    pub user_id: String,
    pub quiz_id: String,
    pub error: String,
}

impl ReplayReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: ReplayReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Share of submitted attempts that produced a passing observation.
    pub fn pass_rate(&self) -> f64 {
        let total = self.outcomes.len();
        if total == 0 {
            return 0.0;
        }
        let passed = self
            .outcomes
            .iter()
            .filter(|o| o.observations.iter().all(|obs| obs.correct) && !o.observations.is_empty())
            .count();
        passed as f64 / total as f64
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "# Replay of {} ({})\n\n**Summary:** {} attempts submitted, {} failed\n\n",
            self.catalog.name,
            self.catalog.id,
            self.outcomes.len(),
            self.failures.len()
        ));

        if !self.outcomes.is_empty() {
            md.push_str("### Attempts\n\n");
            md.push_str("| User | Quiz | Score | Correct | p_know |\n");
            md.push_str("|------|------|-------|---------|--------|\n");
            for o in &self.outcomes {
                let p_know = o
                    .mastery
                    .as_ref()
                    .map(|m| format!("{:.4}", m.p_know))
                    .unwrap_or_else(|| "-".into());
                md.push_str(&format!(
                    "| {} | {} | {:.1}% | {}/{} | {} |\n",
                    o.user_id,
                    o.quiz_id,
                    o.score.score * 100.0,
                    o.score.correct_count,
                    o.score.graded_count,
                    p_know
                ));
            }
            md.push('\n');
        }

        if !self.failures.is_empty() {
            md.push_str("### Failures\n\n");
            for f in &self.failures {
                md.push_str(&format!(
                    "- #{} {} / {}: {}\n",
                    f.index, f.user_id, f.quiz_id, f.error
                ));
            }
        }

        md
    }
}
