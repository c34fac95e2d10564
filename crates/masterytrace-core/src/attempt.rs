//! Quiz attempt lifecycle.
//!
//! `started → responses recorded (0 or more) → submitted`. Responses may be
//! overwritten until the attempt is submitted; submission grades every
//! recorded response in the quiz's authored question order and fixes the
//! score. An attempt can be submitted exactly once.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AttemptError;
use crate::grading::{Grade, Grader};
use crate::model::{QuestionId, Quiz, QuizId, UserId};

/// A learner's answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub question_id: QuestionId,
    pub answer: String,
    /// Set when the attempt is submitted.
    #[serde(default)]
    pub grade: Option<Grade>,
}

/// One user's pass through a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score: Option<f64>,
    /// At most one response per question.
    #[serde(default)]
    pub responses: Vec<Response>,
}

/// Grading result of a submitted attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptScore {
    pub correct_count: usize,
    pub graded_count: usize,
    /// `correct_count / graded_count`, or 0 without responses.
    pub score: f64,
    /// Grades in the order they were folded: quiz order first, then any
    /// responses to questions the quiz no longer contains.
    pub grades: Vec<(QuestionId, Grade)>,
}

impl Attempt {
    /// Start a new attempt of `quiz` for `user_id`.
    pub fn start(user_id: &str, quiz: &Quiz, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            quiz_id: quiz.id.clone(),
            started_at: now,
            submitted_at: None,
            score: None,
            responses: Vec::new(),
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }

    pub fn response(&self, question_id: QuestionId) -> Option<&Response> {
        self.responses.iter().find(|r| r.question_id == question_id)
    }

    /// Record an answer. A later answer to the same question replaces the
    /// earlier one.
    pub fn save_response(
        &mut self,
        quiz: &Quiz,
        question_id: QuestionId,
        answer: &str,
    ) -> Result<(), AttemptError> {
        if self.is_submitted() {
            return Err(AttemptError::AlreadySubmitted(self.id));
        }
        if quiz.question(question_id).is_none() {
            return Err(AttemptError::UnknownQuestion {
                quiz_id: quiz.id.clone(),
                question_id,
            });
        }

        match self
            .responses
            .iter_mut()
            .find(|r| r.question_id == question_id)
        {
            Some(existing) => existing.answer = answer.to_string(),
            None => self.responses.push(Response {
                question_id,
                answer: answer.to_string(),
                grade: None,
            }),
        }
        Ok(())
    }

    /// Grade every recorded response and close the attempt.
    pub fn submit(
        &mut self,
        quiz: &Quiz,
        grader: &Grader,
        now: DateTime<Utc>,
    ) -> Result<AttemptScore, AttemptError> {
        if self.is_submitted() {
            return Err(AttemptError::AlreadySubmitted(self.id));
        }

        let mut grades = Vec::with_capacity(self.responses.len());
        let mut seen = HashSet::with_capacity(quiz.questions.len());
        for question in &quiz.questions {
            // Only the first question carrying an id is graded.
            if !seen.insert(question.id) {
                continue;
            }
            if let Some(response) = self
                .responses
                .iter_mut()
                .find(|r| r.question_id == question.id)
            {
                let grade = grader.grade(question, &response.answer);
                response.grade = Some(grade);
                grades.push((question.id, grade));
            }
        }
        // The quiz may have been edited since the answer was saved.
        for response in self.responses.iter_mut().filter(|r| r.grade.is_none()) {
            response.grade = Some(Grade::Incorrect);
            grades.push((response.question_id, Grade::Incorrect));
        }

        let graded_count = grades.len();
        let correct_count = grades.iter().filter(|(_, g)| g.is_correct()).count();
        let score = if graded_count > 0 {
            correct_count as f64 / graded_count as f64
        } else {
            0.0
        };

        self.submitted_at = Some(now);
        self.score = Some(score);

        Ok(AttemptScore {
            correct_count,
            graded_count,
            score,
            grades,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Question, QuestionKind, QuestionOption};

    fn quiz() -> Quiz {
        let mcq = |id: u64, right: u64, wrong: u64| Question {
            id,
            kind: QuestionKind::MultipleChoice,
            prompt: format!("question {id}"),
            options: vec![
                QuestionOption {
                    id: right,
                    text: "right".into(),
                    is_correct: true,
                },
                QuestionOption {
                    id: wrong,
                    text: "wrong".into(),
                    is_correct: false,
                },
            ],
            accepted_answers: vec![],
        };
        Quiz {
            id: "arrays-basics".into(),
            title: "Array basics".into(),
            description: String::new(),
            skill_id: "arrays".into(),
            questions: vec![mcq(1, 11, 12), mcq(2, 21, 22), mcq(3, 31, 32)],
        }
    }

    #[test]
    fn two_of_three_correct() {
        let quiz = quiz();
        let mut attempt = Attempt::start("alice", &quiz, Utc::now());
        attempt.save_response(&quiz, 1, "11").unwrap();
        attempt.save_response(&quiz, 2, "21").unwrap();
        attempt.save_response(&quiz, 3, "32").unwrap();

        let score = attempt.submit(&quiz, &Grader::default(), Utc::now()).unwrap();
        assert_eq!(score.correct_count, 2);
        assert_eq!(score.graded_count, 3);
        assert!((score.score - 2.0 / 3.0).abs() < 1e-12);
        assert!(attempt.is_submitted());
        assert_eq!(attempt.score, Some(score.score));
        assert_eq!(attempt.response(3).unwrap().grade, Some(Grade::Incorrect));
    }

    #[test]
    fn last_write_wins_before_submit() {
        let quiz = quiz();
        let mut attempt = Attempt::start("alice", &quiz, Utc::now());
        attempt.save_response(&quiz, 1, "12").unwrap();
        attempt.save_response(&quiz, 1, "11").unwrap();
        assert_eq!(attempt.responses.len(), 1);

        let score = attempt.submit(&quiz, &Grader::default(), Utc::now()).unwrap();
        assert_eq!(score.correct_count, 1);
        assert_eq!(score.graded_count, 1);
        assert_eq!(score.score, 1.0);
    }

    #[test]
    fn grades_follow_quiz_order() {
        let quiz = quiz();
        let mut attempt = Attempt::start("alice", &quiz, Utc::now());
        attempt.save_response(&quiz, 3, "31").unwrap();
        attempt.save_response(&quiz, 1, "12").unwrap();

        let score = attempt.submit(&quiz, &Grader::default(), Utc::now()).unwrap();
        let order: Vec<QuestionId> = score.grades.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec![1, 3]);
    }

    #[test]
    fn empty_attempt_scores_zero() {
        let quiz = quiz();
        let mut attempt = Attempt::start("alice", &quiz, Utc::now());
        let score = attempt.submit(&quiz, &Grader::default(), Utc::now()).unwrap();
        assert_eq!(score.score, 0.0);
        assert_eq!(score.graded_count, 0);
    }

    #[test]
    fn submit_twice_is_rejected() {
        let quiz = quiz();
        let mut attempt = Attempt::start("alice", &quiz, Utc::now());
        attempt.submit(&quiz, &Grader::default(), Utc::now()).unwrap();
        let err = attempt
            .submit(&quiz, &Grader::default(), Utc::now())
            .unwrap_err();
        assert_eq!(err, AttemptError::AlreadySubmitted(attempt.id));
    }

    #[test]
    fn save_after_submit_is_rejected() {
        let quiz = quiz();
        let mut attempt = Attempt::start("alice", &quiz, Utc::now());
        attempt.submit(&quiz, &Grader::default(), Utc::now()).unwrap();
        let err = attempt.save_response(&quiz, 1, "11").unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn unknown_question_is_rejected() {
        let quiz = quiz();
        let mut attempt = Attempt::start("alice", &quiz, Utc::now());
        let err = attempt.save_response(&quiz, 42, "1").unwrap_err();
        assert!(matches!(
            err,
            AttemptError::UnknownQuestion {
                question_id: 42,
                ..
            }
        ));
    }

    #[test]
    fn responses_to_removed_questions_count_as_incorrect() {
        let mut quiz = quiz();
        let mut attempt = Attempt::start("alice", &quiz, Utc::now());
        attempt.save_response(&quiz, 1, "11").unwrap();
        attempt.save_response(&quiz, 3, "31").unwrap();
        quiz.questions.retain(|q| q.id != 3);

        let score = attempt.submit(&quiz, &Grader::default(), Utc::now()).unwrap();
        assert_eq!(score.graded_count, 2);
        assert_eq!(score.correct_count, 1);
        assert_eq!(score.grades.last(), Some(&(3, Grade::Incorrect)));
    }

    #[test]
    fn repeated_question_id_is_graded_once() {
        let mut quiz = quiz();
        let repeat = quiz.questions[0].clone();
        quiz.questions.insert(1, repeat);
        quiz.questions.truncate(3);
        let ids: Vec<QuestionId> = quiz.questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 1, 2]);

        let mut attempt = Attempt::start("alice", &quiz, Utc::now());
        attempt.save_response(&quiz, 1, "11").unwrap();
        attempt.save_response(&quiz, 2, "22").unwrap();

        let score = attempt.submit(&quiz, &Grader::default(), Utc::now()).unwrap();
        assert_eq!(score.graded_count, 2);
        assert_eq!(score.correct_count, 1);
        assert_eq!(score.score, 0.5);
        assert_eq!(score.grades, vec![(1, Grade::Correct), (2, Grade::Incorrect)]);
    }
}
