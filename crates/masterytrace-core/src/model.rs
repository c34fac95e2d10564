//! Core data model types for masterytrace.
//!
//! These are the types the rest of the system is built on: skills and their
//! BKT parameters, quizzes and questions, and the per-(user, skill) mastery
//! record that the engine folds observations into.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

/// Identifier of a learner.
pub type UserId = String;
/// Identifier (slug) of a skill.
pub type SkillId = String;
/// Identifier of a quiz.
pub type QuizId = String;
/// Identifier of a question.
pub type QuestionId = u64;
/// Identifier of a multiple-choice option.
pub type OptionId = u64;

/// Prior belief for a (user, skill) pair that has never been observed.
pub const PRIOR_P_KNOW: f64 = 0.10;

/// BKT learning parameters for one skill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillParameters {
    /// Probability of learning the skill on a single exposure.
    pub p_transit: f64,
    /// Probability of answering incorrectly despite mastery.
    pub p_slip: f64,
    /// Probability of answering correctly without mastery.
    pub p_guess: f64,
}

impl Default for SkillParameters {
    fn default() -> Self {
        Self {
            p_transit: 0.1,
            p_slip: 0.1,
            p_guess: 0.25,
        }
    }
}

impl SkillParameters {
    /// Check that every parameter is a probability.
    pub fn validate(&self) -> Result<(), ParameterError> {
        for (name, value) in [
            ("p_transit", self.p_transit),
            ("p_slip", self.p_slip),
            ("p_guess", self.p_guess),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ParameterError::OutOfRange { name, value });
            }
        }
        Ok(())
    }

    /// Return a copy with any fields set in `overrides` replaced.
    pub fn with_overrides(&self, overrides: &ParameterOverrides) -> Self {
        Self {
            p_transit: overrides.p_transit.unwrap_or(self.p_transit),
            p_slip: overrides.p_slip.unwrap_or(self.p_slip),
            p_guess: overrides.p_guess.unwrap_or(self.p_guess),
        }
    }
}

/// A partial set of BKT parameters layered over a base set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_transit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_slip: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_guess: Option<f64>,
}

impl ParameterOverrides {
    pub fn is_empty(&self) -> bool {
        self.p_transit.is_none() && self.p_slip.is_none() && self.p_guess.is_none()
    }
}

/// The engine's belief that a user has mastered a skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryRecord {
    pub user_id: UserId,
    pub skill_id: SkillId,
    /// Probability of mastery, kept within the clamp range by the engine.
    pub p_know: f64,
    /// Number of observations folded into `p_know`.
    pub exposure_count: u32,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl MasteryRecord {
    /// A record for a pair that has not been observed yet.
    pub fn prior(user_id: &str, skill_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            skill_id: skill_id.to_string(),
            p_know: PRIOR_P_KNOW,
            exposure_count: 0,
            updated_at: now,
        }
    }
}

/// One correctness outcome for a skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub skill_id: SkillId,
    pub correct: bool,
}

/// Kinds of quiz questions.
///
/// Kinds this crate does not know how to grade are kept verbatim in
/// `Unsupported` so catalogs written for newer versions still load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionKind {
    MultipleChoice,
    ShortAnswer,
    Unsupported(String),
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::MultipleChoice => write!(f, "mcq"),
            QuestionKind::ShortAnswer => write!(f, "short_answer"),
            QuestionKind::Unsupported(kind) => write!(f, "{kind}"),
        }
    }
}

impl From<&str> for QuestionKind {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "mcq" | "multiple_choice" | "multiple-choice" => QuestionKind::MultipleChoice,
            "short_answer" | "short-answer" => QuestionKind::ShortAnswer,
            _ => QuestionKind::Unsupported(s.trim().to_string()),
        }
    }
}

impl From<String> for QuestionKind {
    fn from(s: String) -> Self {
        QuestionKind::from(s.as_str())
    }
}

impl From<QuestionKind> for String {
    fn from(kind: QuestionKind) -> Self {
        kind.to_string()
    }
}

/// A selectable answer of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: OptionId,
    pub text: String,
    pub is_correct: bool,
}

/// A question and the data needed to grade it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub kind: QuestionKind,
    pub prompt: String,
    /// Options of a multiple-choice question, in display order.
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    /// Reference answers for short-answer matchers.
    #[serde(default)]
    pub accepted_answers: Vec<String>,
}

impl Question {
    pub fn option(&self, id: OptionId) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.id == id)
    }

    pub fn has_correct_option(&self) -> bool {
        self.options.iter().any(|o| o.is_correct)
    }
}

/// A quiz targeting a single skill. Questions are kept in authored order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: QuizId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub skill_id: SkillId,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

/// A skill that should be learned before the one that lists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillPrerequisite {
    pub skill_id: SkillId,
    /// Relative importance of the dependency, in (0, 1].
    #[serde(default = "default_prerequisite_weight")]
    pub weight: f64,
}

fn default_prerequisite_weight() -> f64 {
    1.0
}

impl SkillPrerequisite {
    pub fn new(skill_id: impl Into<SkillId>) -> Self {
        Self {
            skill_id: skill_id.into(),
            weight: default_prerequisite_weight(),
        }
    }
}

/// A skill tracked by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: SkillId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<u32>,
    /// Per-skill parameter overrides.
    #[serde(default, skip_serializing_if = "ParameterOverrides::is_empty")]
    pub params: ParameterOverrides,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prerequisites: Vec<SkillPrerequisite>,
}

impl Skill {
    pub fn new(id: impl Into<SkillId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: None,
            difficulty: None,
            params: ParameterOverrides::default(),
            prerequisites: Vec::new(),
        }
    }
}

/// The skills and quizzes a deployment grades against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Catalog-wide overrides of the configured default parameters.
    #[serde(default, skip_serializing_if = "ParameterOverrides::is_empty")]
    pub defaults: ParameterOverrides,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub quizzes: Vec<Quiz>,
}

impl Catalog {
    pub fn skill(&self, id: &str) -> Option<&Skill> {
        self.skills.iter().find(|s| s.id == id)
    }

    pub fn quiz(&self, id: &str) -> Option<&Quiz> {
        self.quizzes.iter().find(|q| q.id == id)
    }

    /// Parameters for a skill: `base`, then catalog defaults, then the
    /// skill's own overrides. Unknown skills get the catalog defaults.
    pub fn effective_params(&self, skill_id: &str, base: &SkillParameters) -> SkillParameters {
        let params = base.with_overrides(&self.defaults);
        match self.skill(skill_id) {
            Some(skill) => params.with_overrides(&skill.params),
            None => params,
        }
    }

    /// First cycle in the prerequisite graph, as the skill path that closes
    /// it (`[a, b, a]`). Self-references and edges to unknown skills are
    /// ignored.
    pub fn prerequisite_cycle(&self) -> Option<Vec<SkillId>> {
        let edges: HashMap<&str, Vec<&str>> = self
            .skills
            .iter()
            .map(|s| {
                let deps = s
                    .prerequisites
                    .iter()
                    .map(|p| p.skill_id.as_str())
                    .filter(|id| *id != s.id && self.skill(id).is_some())
                    .collect();
                (s.id.as_str(), deps)
            })
            .collect();

        let mut done = HashSet::new();
        for skill in &self.skills {
            let mut path = Vec::new();
            if let Some(cycle) = find_cycle(skill.id.as_str(), &edges, &mut path, &mut done) {
                return Some(cycle.into_iter().map(str::to_string).collect());
            }
        }
        None
    }
}

fn find_cycle<'a>(
    node: &'a str,
    edges: &HashMap<&'a str, Vec<&'a str>>,
    path: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
) -> Option<Vec<&'a str>> {
    if let Some(start) = path.iter().position(|n| *n == node) {
        let mut cycle = path[start..].to_vec();
        cycle.push(node);
        return Some(cycle);
    }
    if done.contains(node) {
        return None;
    }

    path.push(node);
    for next in edges.get(node).into_iter().flatten() {
        if let Some(cycle) = find_cycle(*next, edges, path, done) {
            return Some(cycle);
        }
    }
    path.pop();
    done.insert(node);
    None
}
