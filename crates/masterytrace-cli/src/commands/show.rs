//! The `masterytrace show` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use masterytrace_core::config::load_config_from;
use masterytrace_core::model::MasteryRecord;
use masterytrace_core::report::ReplayReport;
use masterytrace_core::statistics::{is_mastered, summarize};
use masterytrace_store::Snapshot;

/// Where `show` reads mastery records from.
pub enum Source {
    /// A store snapshot written by `replay --state`.
    State(PathBuf),
    /// A JSON report written by `replay`.
    Report(PathBuf),
}

pub fn execute(source: Source, user: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let records: Vec<MasteryRecord> = match &source {
        Source::State(path) => {
            let snapshot = Snapshot::load_json(path)?;
            match &user {
                Some(user) => snapshot.mastery_for(user).cloned().collect(),
                None => snapshot.mastery,
            }
        }
        Source::Report(path) => {
            let report = ReplayReport::load_json(path)?;
            print!("{}", report.to_markdown());
            println!(
                "Pass rate: {:.1}% ({} attempts)\n",
                report.pass_rate() * 100.0,
                report.outcomes.len()
            );
            report
                .mastery
                .into_iter()
                .filter(|r| match &user {
                    Some(user) => &r.user_id == user,
                    None => true,
                })
                .collect()
        }
    };

    if records.is_empty() {
        match &user {
            Some(user) => println!("No mastery records for {user}."),
            None => println!("No mastery records."),
        }
        return Ok(());
    }

    print_mastery(&records, config.mastered_threshold);

    let mut table = Table::new();
    table.set_header(vec!["User", "Tracked", "Mastered", "Mean p_know", "Exposures"]);
    for s in summarize(&records, config.mastered_threshold) {
        table.add_row(vec![
            Cell::new(&s.user_id),
            Cell::new(s.skills_tracked),
            Cell::new(s.skills_mastered),
            Cell::new(format!("{:.4}", s.mean_p_know)),
            Cell::new(s.total_exposures),
        ]);
    }
    println!("{table}");

    Ok(())
}

/// Print one row per mastery record.
pub fn print_mastery(records: &[MasteryRecord], mastered_threshold: f64) {
    let mut table = Table::new();
    table.set_header(vec!["User", "Skill", "p_know", "Exposures", "Mastered", "Updated"]);

    for r in records {
        table.add_row(vec![
            Cell::new(&r.user_id),
            Cell::new(&r.skill_id),
            Cell::new(format!("{:.4}", r.p_know)),
            Cell::new(r.exposure_count),
            Cell::new(if is_mastered(r, mastered_threshold) {
                "yes"
            } else {
                "no"
            }),
            Cell::new(r.updated_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }

    println!("{table}");
}
