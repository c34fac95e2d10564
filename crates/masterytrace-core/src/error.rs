//! Domain error types.
//!
//! Storage traits and the submission engine return `anyhow::Result`; these
//! typed errors travel inside it so callers can downcast and tell a
//! lifecycle violation apart from a storage failure without string matching.

use thiserror::Error;
use uuid::Uuid;

use crate::model::QuestionId;

/// Illegal transitions and lookups in the attempt lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// No attempt with this id exists for the acting user.
    #[error("attempt not found: {0}")]
    AttemptNotFound(Uuid),

    /// The quiz is not part of the catalog.
    #[error("quiz not found: {0}")]
    QuizNotFound(String),

    /// The question does not belong to the attempt's quiz.
    #[error("question {question_id} is not part of quiz {quiz_id}")]
    UnknownQuestion {
        quiz_id: String,
        question_id: QuestionId,
    },

    /// The attempt has already been submitted.
    #[error("attempt already submitted: {0}")]
    AlreadySubmitted(Uuid),
}

impl AttemptError {
    /// Returns `true` if the error is caused by the caller's request rather
    /// than by missing data.
    pub fn is_conflict(&self) -> bool {
        matches!(self, AttemptError::AlreadySubmitted(_))
    }
}

/// Invalid BKT parameter values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("{name} must be within [0, 1], got {value}")]
    OutOfRange { name: &'static str, value: f64 },
}
