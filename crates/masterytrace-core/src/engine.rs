//! Attempt submission engine.
//!
//! Coordinates the attempt lifecycle against the storage traits: grading on
//! submit, scoring, and folding the resulting observations into the
//! learner's mastery record for the quiz's skill.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attempt::{Attempt, AttemptScore};
use crate::bkt;
use crate::error::AttemptError;
use crate::grading::Grader;
use crate::model::{Catalog, MasteryRecord, Observation, QuestionId, SkillParameters};
use crate::traits::{AttemptStore, MasteryStore};

/// How many mastery observations a submitted attempt produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryGranularity {
    /// One pass/fail observation per attempt, from the attempt score.
    #[default]
    PerAttempt,
    /// One observation per graded response, in quiz order.
    PerQuestion,
}

/// Configuration for the submission engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Parameters for skills the catalog does not override.
    pub default_params: SkillParameters,
    /// An attempt passes when its score is strictly greater than this.
    pub pass_threshold: f64,
    pub granularity: MasteryGranularity,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_params: SkillParameters::default(),
            pass_threshold: 0.7,
            granularity: MasteryGranularity::PerAttempt,
        }
    }
}

/// Result of submitting an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub attempt_id: Uuid,
    pub user_id: String,
    pub quiz_id: String,
    pub skill_id: String,
    pub submitted_at: DateTime<Utc>,
    pub score: AttemptScore,
    /// Observations folded into mastery, in order.
    pub observations: Vec<Observation>,
    /// The mastery record after the last observation, if any was folded.
    pub mastery: Option<MasteryRecord>,
}

/// Lifecycle notifications.
pub trait SubmissionObserver: Send + Sync {
    fn on_attempt_started(&self, attempt: &Attempt);
    fn on_response_saved(&self, attempt_id: Uuid, question_id: QuestionId);
    fn on_submitted(&self, outcome: &SubmissionOutcome);
}

/// No-op observer.
pub struct NoopObserver;

impl SubmissionObserver for NoopObserver {
    fn on_attempt_started(&self, _: &Attempt) {}
    fn on_response_saved(&self, _: Uuid, _: QuestionId) {}
    fn on_submitted(&self, _: &SubmissionOutcome) {}
}

/// The attempt submission engine.
pub struct SubmissionEngine {
    catalog: Arc<Catalog>,
    grader: Grader,
    mastery: Arc<dyn MasteryStore>,
    attempts: Arc<dyn AttemptStore>,
    observer: Arc<dyn SubmissionObserver>,
    config: EngineConfig,
}

impl SubmissionEngine {
    pub fn new(
        catalog: Arc<Catalog>,
        grader: Grader,
        mastery: Arc<dyn MasteryStore>,
        attempts: Arc<dyn AttemptStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            catalog,
            grader,
            mastery,
            attempts,
            observer: Arc::new(NoopObserver),
            config,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SubmissionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Effective BKT parameters for a skill.
    pub fn params_for(&self, skill_id: &str) -> SkillParameters {
        self.catalog
            .effective_params(skill_id, &self.config.default_params)
    }

    /// Start a new attempt of `quiz_id` for `user_id`.
    pub async fn start_attempt(&self, user_id: &str, quiz_id: &str) -> Result<Attempt> {
        let quiz = self
            .catalog
            .quiz(quiz_id)
            .ok_or_else(|| AttemptError::QuizNotFound(quiz_id.to_string()))?;

        let attempt = Attempt::start(user_id, quiz, Utc::now());
        self.attempts.insert(attempt.clone()).await?;

        tracing::info!(attempt = %attempt.id, user = user_id, quiz = quiz_id, "attempt started");
        self.observer.on_attempt_started(&attempt);
        Ok(attempt)
    }

    /// Fetch one of the user's attempts.
    pub async fn attempt(&self, user_id: &str, attempt_id: Uuid) -> Result<Attempt> {
        match self.attempts.get(attempt_id).await? {
            Some(attempt) if attempt.user_id == user_id => Ok(attempt),
            _ => Err(AttemptError::AttemptNotFound(attempt_id).into()),
        }
    }

    /// Record (or overwrite) the answer to one question.
    pub async fn save_response(
        &self,
        user_id: &str,
        attempt_id: Uuid,
        question_id: QuestionId,
        answer: &str,
    ) -> Result<()> {
        let catalog = &self.catalog;
        self.attempts
            .modify(
                attempt_id,
                Box::new(move |attempt: &mut Attempt| -> Result<(), AttemptError> {
                    if attempt.user_id != user_id {
                        return Err(AttemptError::AttemptNotFound(attempt.id));
                    }
                    let quiz = catalog
                        .quiz(&attempt.quiz_id)
                        .ok_or_else(|| AttemptError::QuizNotFound(attempt.quiz_id.clone()))?;
                    attempt.save_response(quiz, question_id, answer)
                }),
            )
            .await?;

        tracing::debug!(attempt = %attempt_id, question = question_id, "response saved");
        self.observer.on_response_saved(attempt_id, question_id);
        Ok(())
    }

    /// Grade and close an attempt, then update mastery for its skill.
    pub async fn submit_attempt(&self, user_id: &str, attempt_id: Uuid) -> Result<SubmissionOutcome> {
        let now = Utc::now();
        let catalog = &self.catalog;
        let grader = &self.grader;
        let mut scored: Option<AttemptScore> = None;

        let attempt = self
            .attempts
            .modify(
                attempt_id,
                Box::new(|attempt: &mut Attempt| -> Result<(), AttemptError> {
                    if attempt.user_id != user_id {
                        return Err(AttemptError::AttemptNotFound(attempt.id));
                    }
                    let quiz = catalog
                        .quiz(&attempt.quiz_id)
                        .ok_or_else(|| AttemptError::QuizNotFound(attempt.quiz_id.clone()))?;
                    scored = Some(attempt.submit(quiz, grader, now)?);
                    Ok(())
                }),
            )
            .await?;

        let score =
            scored.ok_or_else(|| anyhow::anyhow!("attempt {attempt_id} was stored without a score"))?;
        let quiz = self
            .catalog
            .quiz(&attempt.quiz_id)
            .ok_or_else(|| AttemptError::QuizNotFound(attempt.quiz_id.clone()))?;

        let observations = self.observations(&quiz.skill_id, &score);
        let params = self.params_for(&quiz.skill_id);

        let mut mastery = None;
        for observation in &observations {
            let correct = observation.correct;
            let skill_id = observation.skill_id.as_str();
            let record = self
                .mastery
                .upsert_with(
                    user_id,
                    skill_id,
                    Box::new(move |current: Option<&MasteryRecord>| {
                        bkt::update_mastery(current, user_id, skill_id, correct, &params, now)
                    }),
                )
                .await?;
            mastery = Some(record);
        }

        tracing::info!(
            attempt = %attempt_id,
            user = user_id,
            quiz = %attempt.quiz_id,
            score = score.score,
            correct = score.correct_count,
            graded = score.graded_count,
            p_know = mastery.as_ref().map(|m| m.p_know),
            "attempt submitted"
        );

        let outcome = SubmissionOutcome {
            attempt_id,
            user_id: user_id.to_string(),
            quiz_id: attempt.quiz_id.clone(),
            skill_id: quiz.skill_id.clone(),
            submitted_at: now,
            score,
            observations,
            mastery,
        };
        self.observer.on_submitted(&outcome);
        Ok(outcome)
    }

    /// Fold a single observation into mastery, outside any attempt.
    pub async fn observe(&self, user_id: &str, skill_id: &str, correct: bool) -> Result<MasteryRecord> {
        let params = self.params_for(skill_id);
        let now = Utc::now();
        self.mastery
            .upsert_with(
                user_id,
                skill_id,
                Box::new(move |current: Option<&MasteryRecord>| {
                    bkt::update_mastery(current, user_id, skill_id, correct, &params, now)
                }),
            )
            .await
    }

    /// All mastery records of a user.
    pub async fn mastery_for_user(&self, user_id: &str) -> Result<Vec<MasteryRecord>> {
        self.mastery.list_for_user(user_id).await
    }

    /// Observations produced by a scored attempt on `skill_id`.
    pub fn observations(&self, skill_id: &str, score: &AttemptScore) -> Vec<Observation> {
        match self.config.granularity {
            MasteryGranularity::PerAttempt => vec![Observation {
                skill_id: skill_id.to_string(),
                correct: score.score > self.config.pass_threshold,
            }],
            MasteryGranularity::PerQuestion => score
                .grades
                .iter()
                .map(|(_, grade)| Observation {
                    skill_id: skill_id.to_string(),
                    correct: grade.is_correct(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::Grade;

    struct NoStore;

    #[async_trait::async_trait]
    impl MasteryStore for NoStore {
        async fn get(&self, _: &str, _: &str) -> Result<Option<MasteryRecord>> {
            Ok(None)
        }
        async fn upsert_with(
            &self,
            user_id: &str,
            skill_id: &str,
            update: crate::traits::MasteryUpdateFn<'_>,
        ) -> Result<MasteryRecord> {
            let _ = (user_id, skill_id);
            Ok(update(None))
        }
        async fn list_for_user(&self, _: &str) -> Result<Vec<MasteryRecord>> {
            Ok(vec![])
        }
    }

    #[async_trait::async_trait]
    impl AttemptStore for NoStore {
        async fn insert(&self, _: Attempt) -> Result<()> {
            Ok(())
        }
        async fn get(&self, _: Uuid) -> Result<Option<Attempt>> {
            Ok(None)
        }
        async fn modify(&self, id: Uuid, _: crate::traits::AttemptEditFn<'_>) -> Result<Attempt> {
            Err(AttemptError::AttemptNotFound(id).into())
        }
    }

    fn engine(granularity: MasteryGranularity) -> SubmissionEngine {
        let catalog = Catalog {
            id: "c".into(),
            name: "C".into(),
            description: String::new(),
            defaults: Default::default(),
            skills: vec![],
            quizzes: vec![],
        };
        SubmissionEngine::new(
            Arc::new(catalog),
            Grader::default(),
            Arc::new(NoStore),
            Arc::new(NoStore),
            EngineConfig {
                granularity,
                ..Default::default()
            },
        )
    }

    fn score(grades: &[Grade]) -> AttemptScore {
        let correct_count = grades.iter().filter(|g| g.is_correct()).count();
        AttemptScore {
            correct_count,
            graded_count: grades.len(),
            score: if grades.is_empty() {
                0.0
            } else {
                correct_count as f64 / grades.len() as f64
            },
            grades: grades
                .iter()
                .enumerate()
                .map(|(i, g)| (i as QuestionId + 1, *g))
                .collect(),
        }
    }

    #[test]
    fn per_attempt_threshold_is_strict() {
        let engine = engine(MasteryGranularity::PerAttempt);
        let two_of_three = score(&[Grade::Correct, Grade::Correct, Grade::Incorrect]);
        let obs = engine.observations("arrays", &two_of_three);
        assert_eq!(obs.len(), 1);
        assert!(!obs[0].correct);

        let all = score(&[Grade::Correct, Grade::Correct, Grade::Correct]);
        assert!(engine.observations("arrays", &all)[0].correct);

        let mut exactly = score(&[Grade::Correct]);
        exactly.score = 0.7;
        assert!(!engine.observations("arrays", &exactly)[0].correct);
    }

    #[test]
    fn per_attempt_on_empty_attempt() {
        let engine = engine(MasteryGranularity::PerAttempt);
        let obs = engine.observations("arrays", &score(&[]));
        assert_eq!(
            obs,
            vec![Observation {
                skill_id: "arrays".into(),
                correct: false
            }]
        );
    }

    #[test]
    fn per_question_follows_grades() {
        let engine = engine(MasteryGranularity::PerQuestion);
        let graded = score(&[Grade::Correct, Grade::PendingReview, Grade::Incorrect]);
        let correct: Vec<bool> = engine
            .observations("arrays", &graded)
            .into_iter()
            .map(|o| o.correct)
            .collect();
        assert_eq!(correct, vec![true, false, false]);
    }

    #[tokio::test]
    async fn unknown_quiz_cannot_be_started() {
        let engine = engine(MasteryGranularity::PerAttempt);
        let err = engine.start_attempt("alice", "missing").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<AttemptError>(),
            Some(&AttemptError::QuizNotFound("missing".into()))
        );
    }

    #[tokio::test]
    async fn observe_uses_prior_for_new_pair() {
        let engine = engine(MasteryGranularity::PerAttempt);
        let record = engine.observe("alice", "arrays", true).await.unwrap();
        assert_eq!(record.exposure_count, 1);
        assert!((record.p_know - 0.3571).abs() < 1e-4);
    }
}
