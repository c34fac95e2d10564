//! Configuration loading and matcher factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::{EngineConfig, MasteryGranularity};
use crate::grading::{AnswerMatcher, ExactMatch, FuzzyMatch, ManualReview};
use crate::model::SkillParameters;

/// Which oracle grades short-answer questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MatcherConfig {
    Exact {
        #[serde(default)]
        case_sensitive: bool,
    },
    Fuzzy {
        #[serde(default = "default_min_similarity")]
        min_similarity: f64,
    },
    Manual,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        MatcherConfig::Manual
    }
}

impl MatcherConfig {
    /// Whether this matcher can mark an answer correct without a human.
    pub fn is_automatic(&self) -> bool {
        !matches!(self, MatcherConfig::Manual)
    }
}

fn default_min_similarity() -> f64 {
    0.85
}

/// Top-level masterytrace configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteryConfig {
    /// BKT parameters for skills without overrides.
    #[serde(default)]
    pub defaults: SkillParameters,
    /// An attempt counts as a correct observation when its score exceeds this.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,
    /// `p_know` at or above which a skill is reported as mastered.
    #[serde(default = "default_mastered_threshold")]
    pub mastered_threshold: f64,
    /// How many observations a submitted attempt produces.
    #[serde(default)]
    pub granularity: MasteryGranularity,
    /// Short-answer matcher.
    #[serde(default)]
    pub short_answer: MatcherConfig,
    /// Output directory for replay reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_pass_threshold() -> f64 {
    0.7
}
fn default_mastered_threshold() -> f64 {
    0.95
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./masterytrace-results")
}

impl Default for MasteryConfig {
    fn default() -> Self {
        Self {
            defaults: SkillParameters::default(),
            pass_threshold: default_pass_threshold(),
            mastered_threshold: default_mastered_threshold(),
            granularity: MasteryGranularity::default(),
            short_answer: MatcherConfig::default(),
            output_dir: default_output_dir(),
        }
    }
}

impl MasteryConfig {
    /// Reject values outside their valid ranges.
    pub fn validate(&self) -> Result<()> {
        self.defaults
            .validate()
            .context("invalid default BKT parameters")?;
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.pass_threshold),
            "pass_threshold must be within [0, 1], got {}",
            self.pass_threshold
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.mastered_threshold),
            "mastered_threshold must be within [0, 1], got {}",
            self.mastered_threshold
        );
        if let MatcherConfig::Fuzzy { min_similarity } = self.short_answer {
            anyhow::ensure!(
                (0.0..=1.0).contains(&min_similarity),
                "min_similarity must be within [0, 1], got {min_similarity}"
            );
        }
        Ok(())
    }

    /// Engine settings derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            default_params: self.defaults,
            pass_threshold: self.pass_threshold,
            granularity: self.granularity,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Apply `MASTERYTRACE_*` overrides using `lookup` to read variables.
fn apply_env_overrides(
    config: &mut MasteryConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(value) = lookup("MASTERYTRACE_PASS_THRESHOLD") {
        config.pass_threshold = value
            .trim()
            .parse()
            .with_context(|| format!("invalid MASTERYTRACE_PASS_THRESHOLD: '{value}'"))?;
    }

    if let Some(value) = lookup("MASTERYTRACE_MATCHER") {
        config.short_answer = match value.trim().to_lowercase().as_str() {
            "exact" => MatcherConfig::Exact {
                case_sensitive: false,
            },
            "fuzzy" => MatcherConfig::Fuzzy {
                min_similarity: default_min_similarity(),
            },
            "manual" => MatcherConfig::Manual,
            other => anyhow::bail!("invalid MASTERYTRACE_MATCHER: '{other}'"),
        };
    }

    Ok(())
}

/// Load config from an explicit path, or search the default locations.
///
/// Search order:
/// 1. `masterytrace.toml` in the current directory
/// 2. `~/.config/masterytrace/config.toml`
///
/// Environment variable overrides: `MASTERYTRACE_PASS_THRESHOLD`, `MASTERYTRACE_MATCHER`.
pub fn load_config_from(path: Option<&Path>) -> Result<MasteryConfig> {
    load_config_with(path, |name| std::env::var(name).ok())
}

/// Like [`load_config_from`], reading override variables through `lookup`.
pub fn load_config_with(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<MasteryConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("masterytrace.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => MasteryConfig::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    config.validate()?;

    Ok(config)
}

/// Parse a configuration document and resolve `${VAR}` references.
pub fn parse_config_str(content: &str) -> Result<MasteryConfig> {
    let mut config: MasteryConfig = toml::from_str(content)?;
    let output_dir = config.output_dir.to_string_lossy().into_owned();
    config.output_dir = PathBuf::from(resolve_env_vars(&output_dir));
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("masterytrace"))
}

/// Create a short-answer matcher from its configuration.
pub fn create_matcher(config: &MatcherConfig) -> Arc<dyn AnswerMatcher> {
    match config {
        MatcherConfig::Exact { case_sensitive } => Arc::new(ExactMatch {
            case_sensitive: *case_sensitive,
        }),
        MatcherConfig::Fuzzy { min_similarity } => Arc::new(FuzzyMatch {
            min_similarity: *min_similarity,
        }),
        MatcherConfig::Manual => Arc::new(ManualReview),
    }
}
