//! The `masterytrace replay` command.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use masterytrace_core::attempt::Attempt;
use masterytrace_core::config::{create_matcher, load_config_from};
use masterytrace_core::engine::{SubmissionEngine, SubmissionObserver, SubmissionOutcome};
use masterytrace_core::grading::Grader;
use masterytrace_core::model::QuestionId;
use masterytrace_core::parser::{self, ScriptedAttempt};
use masterytrace_core::report::{CatalogSummary, ReplayFailure, ReplayReport};
use masterytrace_core::statistics::summarize;
use masterytrace_store::{MemoryStore, Snapshot};

use super::show::print_mastery;

/// Console progress observer.
struct ConsoleObserver;

impl SubmissionObserver for ConsoleObserver {
    fn on_attempt_started(&self, attempt: &Attempt) {
        eprintln!("  Starting: {} :: {}", attempt.user_id, attempt.quiz_id);
    }

    fn on_response_saved(&self, _attempt_id: Uuid, _question_id: QuestionId) {}

    fn on_submitted(&self, outcome: &SubmissionOutcome) {
        let p_know = outcome
            .mastery
            .as_ref()
            .map(|m| format!(" p_know {:.4}", m.p_know))
            .unwrap_or_default();
        eprintln!(
            "  Done: {} :: {} score {}/{}{}",
            outcome.user_id,
            outcome.quiz_id,
            outcome.score.correct_count,
            outcome.score.graded_count,
            p_know
        );
    }
}

pub async fn execute(
    catalog_path: PathBuf,
    session_path: PathBuf,
    config_path: Option<PathBuf>,
    state_path: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let start = Instant::now();

    // Load config, catalog and session
    let config = load_config_from(config_path.as_deref())?;
    let catalog = parser::parse_catalog(&catalog_path)?;
    for w in parser::validate_catalog(&catalog, &config.defaults, &config.short_answer) {
        tracing::warn!("{}: {}", w.quiz_id.as_deref().unwrap_or(&catalog.id), w.message);
    }
    let session = parser::parse_session(&session_path)?;

    // Seed the store
    let store = match &state_path {
        Some(path) => Arc::new(MemoryStore::from_snapshot(Snapshot::load_or_default(path)?)),
        None => Arc::new(MemoryStore::new()),
    };

    let grader = Grader::new(create_matcher(&config.short_answer));
    let matcher_name = grader.short_answer_matcher().to_string();
    let engine = SubmissionEngine::new(
        Arc::new(catalog),
        grader,
        store.clone(),
        store.clone(),
        config.engine_config(),
    )
    .with_observer(Arc::new(ConsoleObserver));

    eprintln!(
        "masterytrace v{}: replaying {} attempts against {} (short answers: {}, pass above {:.2})",
        env!("CARGO_PKG_VERSION"),
        session.attempts.len(),
        engine.catalog().id,
        matcher_name,
        engine.config().pass_threshold
    );
    eprintln!();

    let mut outcomes = Vec::new();
    let mut failures = Vec::new();
    for (index, scripted) in session.attempts.iter().enumerate() {
        match replay_attempt(&engine, scripted).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                eprintln!("  ERROR: {} :: {}: {e:#}", scripted.user, scripted.quiz);
                failures.push(ReplayFailure {
                    index,
                    user_id: scripted.user.clone(),
                    quiz_id: scripted.quiz.clone(),
                    error: format!("{e:#}"),
                });
            }
        }
    }

    eprintln!(
        "\nComplete: {}/{} submitted, {} failed ({:.1}s)",
        outcomes.len(),
        session.attempts.len(),
        failures.len(),
        start.elapsed().as_secs_f64()
    );

    // Final mastery of everyone in the session
    let users: BTreeSet<&str> = session.attempts.iter().map(|a| a.user.as_str()).collect();
    let mut mastery = Vec::new();
    for user in users {
        mastery.extend(engine.mastery_for_user(user).await?);
    }
    let summaries = summarize(&mastery, config.mastered_threshold);

    let report = ReplayReport {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        catalog: CatalogSummary::from(engine.catalog()),
        outcomes,
        failures,
        mastery,
        summaries,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    print_summary(&report, config.mastered_threshold);

    // Save outputs
    let output = output.unwrap_or_else(|| config.output_dir.clone());
    std::fs::create_dir_all(&output)?;
    let timestamp = Utc::now().format("%Y-%m-%dT%H%M%S");
    let path = output.join(format!("replay-{timestamp}.json"));
    report.save_json(&path)?;
    let md_path = path.with_extension("md");
    std::fs::write(&md_path, report.to_markdown())?;
    eprintln!("Results saved to: {} and {}", path.display(), md_path.display());

    if let Some(state_path) = &state_path {
        store.snapshot().await.save_json(state_path)?;
        eprintln!("State saved to: {}", state_path.display());
    }

    Ok(())
}

/// Start, answer, and submit one scripted attempt.
async fn replay_attempt(
    engine: &SubmissionEngine,
    scripted: &ScriptedAttempt,
) -> Result<SubmissionOutcome> {
    let attempt = engine.start_attempt(&scripted.user, &scripted.quiz).await?;
    for response in &scripted.responses {
        engine
            .save_response(&scripted.user, attempt.id, response.question, &response.answer)
            .await?;
    }
    engine.submit_attempt(&scripted.user, attempt.id).await
}

fn print_summary(report: &ReplayReport, mastered_threshold: f64) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["User", "Quiz", "Score", "Correct", "Observations", "p_know"]);

    for o in &report.outcomes {
        let observations: String = o
            .observations
            .iter()
            .map(|obs| if obs.correct { '+' } else { '-' })
            .collect();
        table.add_row(vec![
            Cell::new(&o.user_id),
            Cell::new(&o.quiz_id),
            Cell::new(format!("{:.1}%", o.score.score * 100.0)),
            Cell::new(format!("{}/{}", o.score.correct_count, o.score.graded_count)),
            Cell::new(observations),
            Cell::new(
                o.mastery
                    .as_ref()
                    .map(|m| format!("{:.4}", m.p_know))
                    .unwrap_or_else(|| "-".into()),
            ),
        ]);
    }

    println!("{table}");
    if !report.outcomes.is_empty() {
        println!("Pass rate: {:.1}%", report.pass_rate() * 100.0);
    }

    if !report.mastery.is_empty() {
        print_mastery(&report.mastery, mastered_threshold);
    }
}
