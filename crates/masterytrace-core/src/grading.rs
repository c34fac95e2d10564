//! Response grading.
//!
//! Turns a raw answer into a [`Grade`]. Grading never fails: malformed
//! answers and question kinds this crate cannot grade come back as
//! `Incorrect`, so submitting an attempt stays infallible as new kinds are
//! introduced. Short-answer correctness is delegated to an injected
//! [`AnswerMatcher`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::{OptionId, Question, QuestionKind};

/// Outcome of grading one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Correct,
    Incorrect,
    /// Not automatically gradable; waits for a human. Scores as not correct.
    PendingReview,
}

impl Grade {
    pub fn is_correct(self) -> bool {
        matches!(self, Grade::Correct)
    }

    pub fn from_bool(correct: bool) -> Self {
        if correct {
            Grade::Correct
        } else {
            Grade::Incorrect
        }
    }
}

// ---------------------------------------------------------------------------
// Short-answer matchers
// ---------------------------------------------------------------------------

/// Correctness oracle for free-text answers.
pub trait AnswerMatcher: Send + Sync {
    /// Human-readable matcher name (e.g. "exact").
    fn name(&self) -> &str;

    /// Judge `answer` against the question's reference answers.
    fn judge(&self, answer: &str, question: &Question) -> Grade;
}

/// Correct when the answer equals one of the accepted answers after
/// trimming and collapsing internal whitespace.
#[derive(Debug, Clone, Default)]
pub struct ExactMatch {
    pub case_sensitive: bool,
}

impl AnswerMatcher for ExactMatch {
    fn name(&self) -> &str {
        "exact"
    }

    fn judge(&self, answer: &str, question: &Question) -> Grade {
        if question.accepted_answers.is_empty() {
            return Grade::PendingReview;
        }
        let answer = normalize(answer, self.case_sensitive);
        if answer.is_empty() {
            return Grade::Incorrect;
        }
        Grade::from_bool(
            question
                .accepted_answers
                .iter()
                .any(|accepted| normalize(accepted, self.case_sensitive) == answer),
        )
    }
}

/// Correct when the normalized Levenshtein similarity to any accepted
/// answer reaches `min_similarity`.
#[derive(Debug, Clone)]
pub struct FuzzyMatch {
    pub min_similarity: f64,
}

impl Default for FuzzyMatch {
    fn default() -> Self {
        Self {
            min_similarity: 0.85,
        }
    }
}

impl AnswerMatcher for FuzzyMatch {
    fn name(&self) -> &str {
        "fuzzy"
    }

    fn judge(&self, answer: &str, question: &Question) -> Grade {
        if question.accepted_answers.is_empty() {
            return Grade::PendingReview;
        }
        let answer = normalize(answer, false);
        if answer.is_empty() {
            return Grade::Incorrect;
        }
        let best = question
            .accepted_answers
            .iter()
            .map(|accepted| similarity(&answer, &normalize(accepted, false)))
            .fold(0.0, f64::max);
        Grade::from_bool(best >= self.min_similarity)
    }
}

/// Leaves every answer for a human reviewer.
#[derive(Debug, Clone, Default)]
pub struct ManualReview;

impl AnswerMatcher for ManualReview {
    fn name(&self) -> &str {
        "manual"
    }

    fn judge(&self, _answer: &str, _question: &Question) -> Grade {
        Grade::PendingReview
    }
}

fn normalize(s: &str, case_sensitive: bool) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if case_sensitive {
        collapsed
    } else {
        collapsed.to_lowercase()
    }
}

/// Levenshtein distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Similarity in [0, 1]: `1 - distance / longest length`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

// ---------------------------------------------------------------------------
// Grader
// ---------------------------------------------------------------------------

/// Dispatches grading on the question kind.
#[derive(Clone)]
pub struct Grader {
    short_answer: Arc<dyn AnswerMatcher>,
}

impl Default for Grader {
    fn default() -> Self {
        Self::new(Arc::new(ManualReview))
    }
}

impl std::fmt::Debug for Grader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grader")
            .field("short_answer", &self.short_answer.name())
            .finish()
    }
}

impl Grader {
    pub fn new(short_answer: Arc<dyn AnswerMatcher>) -> Self {
        Self { short_answer }
    }

    /// Name of the injected short-answer matcher.
    pub fn short_answer_matcher(&self) -> &str {
        self.short_answer.name()
    }

    /// Grade a raw answer to `question`.
    pub fn grade(&self, question: &Question, raw_answer: &str) -> Grade {
        let grade = match &question.kind {
            QuestionKind::MultipleChoice => grade_multiple_choice(question, raw_answer),
            QuestionKind::ShortAnswer => self.short_answer.judge(raw_answer, question),
            QuestionKind::Unsupported(kind) => {
                tracing::warn!(
                    question = question.id,
                    kind = kind.as_str(),
                    "no grader for question kind, marking incorrect"
                );
                Grade::Incorrect
            }
        };
        tracing::debug!(question = question.id, ?grade, "graded response");
        grade
    }

    /// Whether a raw answer counts as a correct observation.
    pub fn is_correct(&self, question: &Question, raw_answer: &str) -> bool {
        self.grade(question, raw_answer).is_correct()
    }
}

/// The answer must be the id of one of this question's options; anything
/// else is incorrect.
pub fn grade_multiple_choice(question: &Question, raw_answer: &str) -> Grade {
    let Ok(option_id) = raw_answer.trim().parse::<OptionId>() else {
        return Grade::Incorrect;
    };
    match question.option(option_id) {
        Some(option) => Grade::from_bool(option.is_correct),
        None => Grade::Incorrect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionOption;

    fn mcq(id: u64, options: &[(u64, bool)]) -> Question {
        Question {
            id,
            kind: QuestionKind::MultipleChoice,
            prompt: "pick one".into(),
            options: options
                .iter()
                .map(|&(id, is_correct)| QuestionOption {
                    id,
                    text: format!("option {id}"),
                    is_correct,
                })
                .collect(),
            accepted_answers: vec![],
        }
    }

    fn short(accepted: &[&str]) -> Question {
        Question {
            id: 9,
            kind: QuestionKind::ShortAnswer,
            prompt: "name it".into(),
            options: vec![],
            accepted_answers: accepted.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn mcq_correct_and_incorrect_option() {
        let q = mcq(1, &[(11, true), (12, false)]);
        assert_eq!(grade_multiple_choice(&q, "11"), Grade::Correct);
        assert_eq!(grade_multiple_choice(&q, " 11 "), Grade::Correct);
        assert_eq!(grade_multiple_choice(&q, "12"), Grade::Incorrect);
    }

    #[test]
    fn mcq_option_of_another_question_is_incorrect() {
        let graded = mcq(1, &[(11, true), (12, false)]);
        let _other = mcq(2, &[(7, true)]);
        assert_eq!(grade_multiple_choice(&graded, "7"), Grade::Incorrect);
    }

    #[test]
    fn mcq_unparseable_answers_are_incorrect() {
        let q = mcq(1, &[(11, true)]);
        for answer in ["", "abc", "-1", "11.0", "1 1", "99999999999999999999999"] {
            assert_eq!(grade_multiple_choice(&q, answer), Grade::Incorrect, "{answer}");
        }
    }

    #[test]
    fn unsupported_kind_is_incorrect() {
        let mut q = mcq(1, &[(11, true)]);
        q.kind = QuestionKind::Unsupported("code".into());
        assert_eq!(Grader::default().grade(&q, "11"), Grade::Incorrect);
    }

    #[test]
    fn default_grader_leaves_short_answers_for_review() {
        let grader = Grader::default();
        let q = short(&["binary search"]);
        assert_eq!(grader.grade(&q, "binary search"), Grade::PendingReview);
        assert!(!grader.is_correct(&q, "binary search"));
        assert_eq!(grader.short_answer_matcher(), "manual");
    }

    #[test]
    fn exact_match_normalizes_whitespace_and_case() {
        let grader = Grader::new(Arc::new(ExactMatch::default()));
        let q = short(&["Binary Search"]);
        assert_eq!(grader.grade(&q, "  binary   search "), Grade::Correct);
        assert_eq!(grader.grade(&q, "linear search"), Grade::Incorrect);
        assert_eq!(grader.grade(&q, "   "), Grade::Incorrect);

        let strict = ExactMatch {
            case_sensitive: true,
        };
        assert_eq!(strict.judge("binary search", &q), Grade::Incorrect);
    }

    #[test]
    fn matchers_without_references_defer_to_review() {
        let q = short(&[]);
        assert_eq!(ExactMatch::default().judge("x", &q), Grade::PendingReview);
        assert_eq!(FuzzyMatch::default().judge("x", &q), Grade::PendingReview);
    }

    #[test]
    fn fuzzy_match_tolerates_typos() {
        let matcher = FuzzyMatch::default();
        let q = short(&["dynamic programming"]);
        assert_eq!(matcher.judge("dynamic programing", &q), Grade::Correct);
        assert_eq!(matcher.judge("greedy", &q), Grade::Incorrect);
    }

    #[test]
    fn levenshtein_distances() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
        assert!((similarity("", "") - 1.0).abs() < f64::EPSILON);
        assert!((similarity("abcd", "abce") - 0.75).abs() < 1e-12);
    }

    #[test]
    fn grading_is_idempotent() {
        let grader = Grader::new(Arc::new(FuzzyMatch::default()));
        let questions = [mcq(1, &[(11, true), (12, false)]), short(&["heap"])];
        for q in &questions {
            for answer in ["11", "12", "heap", "hepa", "x"] {
                assert_eq!(grader.grade(q, answer), grader.grade(q, answer));
            }
        }
    }
}
