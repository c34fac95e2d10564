//! TOML catalog and replay-session parser.
//!
//! Loads catalogs (skills and quizzes) from TOML files and directories,
//! validates them, and parses scripted replay sessions.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::MatcherConfig;
use crate::model::{
    Catalog, ParameterOverrides, Question, QuestionKind, QuestionOption, Quiz, Skill,
    SkillParameters, SkillPrerequisite,
};

/// Intermediate TOML structure for parsing catalog files.
#[derive(Debug, Deserialize)]
struct TomlCatalogFile {
    catalog: TomlCatalogHeader,
    #[serde(default)]
    defaults: ParameterOverrides,
    #[serde(default)]
    skills: Vec<TomlSkill>,
    #[serde(default)]
    quizzes: Vec<TomlQuiz>,
}

#[derive(Debug, Deserialize)]
struct TomlCatalogHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlSkill {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    difficulty: Option<u32>,
    #[serde(default)]
    params: ParameterOverrides,
    #[serde(default)]
    prerequisites: Vec<TomlPrerequisite>,
}

#[derive(Debug, Deserialize)]
struct TomlPrerequisite {
    skill: String,
    weight: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TomlQuiz {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    skill: String,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: u64,
    kind: String,
    prompt: String,
    #[serde(default)]
    options: Vec<TomlOption>,
    #[serde(default)]
    accepted_answers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TomlOption {
    id: u64,
    text: String,
    #[serde(default)]
    correct: bool,
}

/// Parse a single TOML file into a `Catalog`.
pub fn parse_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file: {}", path.display()))?;

    parse_catalog_str(&content, path)
}

/// Parse a TOML string into a `Catalog` (useful for testing).
pub fn parse_catalog_str(content: &str, source_path: &Path) -> Result<Catalog> {
    let parsed: TomlCatalogFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let skills = parsed
        .skills
        .into_iter()
        .map(|s| Skill {
            id: s.id,
            name: s.name,
            description: s.description,
            category: s.category,
            difficulty: s.difficulty,
            params: s.params,
            prerequisites: s
                .prerequisites
                .into_iter()
                .map(|p| {
                    let mut prereq = SkillPrerequisite::new(p.skill);
                    if let Some(weight) = p.weight {
                        prereq.weight = weight;
                    }
                    prereq
                })
                .collect(),
        })
        .collect();

    let quizzes = parsed
        .quizzes
        .into_iter()
        .map(|q| Quiz {
            id: q.id,
            title: q.title,
            description: q.description,
            skill_id: q.skill,
            questions: q
                .questions
                .into_iter()
                .map(|question| Question {
                    id: question.id,
                    kind: QuestionKind::from(question.kind),
                    prompt: question.prompt,
                    options: question
                        .options
                        .into_iter()
                        .map(|o| QuestionOption {
                            id: o.id,
                            text: o.text,
                            is_correct: o.correct,
                        })
                        .collect(),
                    accepted_answers: question.accepted_answers,
                })
                .collect(),
        })
        .collect();

    Ok(Catalog {
        id: parsed.catalog.id,
        name: parsed.catalog.name,
        description: parsed.catalog.description,
        defaults: parsed.defaults,
        skills,
        quizzes,
    })
}

/// Recursively load all `.toml` catalog files from a directory.
pub fn load_catalog_directory(dir: &Path) -> Result<Vec<Catalog>> {
    let mut catalogs = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            catalogs.extend(load_catalog_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_catalog(&path) {
                Ok(catalog) => catalogs.push(catalog),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(catalogs)
}

/// Load a catalog file, or every catalog under a directory.
pub fn load_catalogs(path: &Path) -> Result<Vec<Catalog>> {
    if path.is_dir() {
        load_catalog_directory(path)
    } else {
        Ok(vec![parse_catalog(path)?])
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A warning from catalog validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The quiz ID (if applicable).
    pub quiz_id: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn catalog(message: String) -> Self {
        Self {
            quiz_id: None,
            message,
        }
    }

    fn quiz(quiz_id: &str, message: String) -> Self {
        Self {
            quiz_id: Some(quiz_id.to_string()),
            message,
        }
    }
}

/// Validate a catalog for common issues.
///
/// `base` is the configured default parameter set the catalog layers its
/// overrides on. `matcher` is the configured short-answer matcher;
/// short-answer questions without accepted answers are only flagged when it
/// grades automatically.
pub fn validate_catalog(
    catalog: &Catalog,
    base: &SkillParameters,
    matcher: &MatcherConfig,
) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    // Catalog-wide parameters
    let base = base.with_overrides(&catalog.defaults);
    if let Err(e) = base.validate() {
        warnings.push(ValidationWarning::catalog(format!("defaults: {e}")));
    }

    // Duplicate skill IDs and per-skill parameters
    let mut seen_skills = HashSet::new();
    for skill in &catalog.skills {
        if !seen_skills.insert(skill.id.as_str()) {
            warnings.push(ValidationWarning::catalog(format!(
                "duplicate skill ID: {}",
                skill.id
            )));
        }
        if let Err(e) = base.with_overrides(&skill.params).validate() {
            warnings.push(ValidationWarning::catalog(format!(
                "skill {}: {e}",
                skill.id
            )));
        }

        for prereq in &skill.prerequisites {
            if prereq.skill_id == skill.id {
                warnings.push(ValidationWarning::catalog(format!(
                    "skill {} lists itself as a prerequisite",
                    skill.id
                )));
            } else if catalog.skill(&prereq.skill_id).is_none() {
                warnings.push(ValidationWarning::catalog(format!(
                    "skill {}: unknown prerequisite: {}",
                    skill.id, prereq.skill_id
                )));
            }
            if !(prereq.weight > 0.0 && prereq.weight <= 1.0) {
                warnings.push(ValidationWarning::catalog(format!(
                    "skill {}: prerequisite {} weight must be within (0, 1], got {}",
                    skill.id, prereq.skill_id, prereq.weight
                )));
            }
        }
    }

    if let Some(cycle) = catalog.prerequisite_cycle() {
        warnings.push(ValidationWarning::catalog(format!(
            "prerequisite cycle: {}",
            cycle.join(" -> ")
        )));
    }

    let mut seen_quizzes = HashSet::new();
    let mut seen_questions = HashSet::new();
    for quiz in &catalog.quizzes {
        if !seen_quizzes.insert(quiz.id.as_str()) {
            warnings.push(ValidationWarning::quiz(
                &quiz.id,
                format!("duplicate quiz ID: {}", quiz.id),
            ));
        }

        if catalog.skill(&quiz.skill_id).is_none() {
            warnings.push(ValidationWarning::quiz(
                &quiz.id,
                format!("unknown skill: {}", quiz.skill_id),
            ));
        }

        if quiz.questions.is_empty() {
            warnings.push(ValidationWarning::quiz(&quiz.id, "quiz has no questions".into()));
        }

        for question in &quiz.questions {
            // Question IDs are global so an MCQ answer can only ever match
            // options of the question it was given for.
            if !seen_questions.insert(question.id) {
                warnings.push(ValidationWarning::quiz(
                    &quiz.id,
                    format!("duplicate question ID: {}", question.id),
                ));
            }

            match &question.kind {
                QuestionKind::MultipleChoice => {
                    if question.options.is_empty() {
                        warnings.push(ValidationWarning::quiz(
                            &quiz.id,
                            format!("question {} has no options", question.id),
                        ));
                    } else if !question.has_correct_option() {
                        warnings.push(ValidationWarning::quiz(
                            &quiz.id,
                            format!("question {} has no correct option", question.id),
                        ));
                    }
                    let mut option_ids = HashSet::new();
                    for option in &question.options {
                        if !option_ids.insert(option.id) {
                            warnings.push(ValidationWarning::quiz(
                                &quiz.id,
                                format!(
                                    "question {} has duplicate option ID: {}",
                                    question.id, option.id
                                ),
                            ));
                        }
                    }
                }
                QuestionKind::ShortAnswer => {
                    if matcher.is_automatic() && question.accepted_answers.is_empty() {
                        warnings.push(ValidationWarning::quiz(
                            &quiz.id,
                            format!(
                                "question {} has no accepted_answers and will always await review",
                                question.id
                            ),
                        ));
                    }
                }
                QuestionKind::Unsupported(kind) => {
                    warnings.push(ValidationWarning::quiz(
                        &quiz.id,
                        format!(
                            "question {} has unsupported kind '{kind}' and will be graded incorrect",
                            question.id
                        ),
                    ));
                }
            }
        }
    }

    warnings
}

// ---------------------------------------------------------------------------
// Replay sessions
// ---------------------------------------------------------------------------

/// A scripted sequence of attempts.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub attempts: Vec<ScriptedAttempt>,
}

/// One scripted attempt: answers saved in order, then submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptedAttempt {
    pub user: String,
    pub quiz: String,
    #[serde(default)]
    pub responses: Vec<ScriptedResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptedResponse {
    pub question: u64,
    pub answer: String,
}

/// Parse a replay session file.
pub fn parse_session(path: &Path) -> Result<Session> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read session file: {}", path.display()))?;
    parse_session_str(&content, path)
}

/// Parse a replay session from a TOML string.
pub fn parse_session_str(content: &str, source_path: &Path) -> Result<Session> {
    toml::from_str(content)
        .with_context(|| format!("failed to parse session TOML: {}", source_path.display()))
}
