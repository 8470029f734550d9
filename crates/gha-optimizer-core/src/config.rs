use crate::error::{OptimizerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Configuration for a gha-optimizer invocation.
///
/// Loaded once per process from a YAML or TOML file, then completed from the
/// environment. Every section and field has a default, so an empty file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// GitHub personal access token
    pub token: Option<String>,

    /// GitHub REST API base URL
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub provider: AiProvider,

    pub api_key: Option<String>,

    /// Model name; the provider default is used when unset.
    pub model: Option<String>,

    /// Override for the provider endpoint.
    pub api_url: Option<String>,

    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,

    /// Total LLM call attempts before falling back to static analysis.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    Anthropic,
    /// Legacy provider kept for older configuration files.
    #[serde(rename = "openai")]
    OpenAi,
}

impl AiProvider {
    pub fn api_key_env(&self) -> &'static str {
        match self {
            AiProvider::Anthropic => "ANTHROPIC_API_KEY",
            AiProvider::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            AiProvider::Anthropic => "claude-sonnet-4-20250514",
            AiProvider::OpenAi => "gpt-4o",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_max_history_days")]
    pub max_history_days: u32,

    /// Minimum confidence a recommendation needs before `apply` acts on it.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub default_format: OutputFormat,

    #[serde(default = "default_true")]
    pub include_code_examples: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Html,
    Json,
}

impl FromStr for OutputFormat {
    type Err = OptimizerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "html" => Ok(OutputFormat::Html),
            "json" => Ok(OutputFormat::Json),
            other => Err(OptimizerError::Config(format!(
                "unknown output format '{}' (expected markdown, html or json)",
                other
            ))),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_github_api_url(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProvider::default(),
            api_key: None,
            model: None,
            api_url: None,
            timeout_secs: default_ai_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_history_days: default_max_history_days(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_format: OutputFormat::default(),
            include_code_examples: true,
        }
    }
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_ai_timeout_secs() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    2
}

fn default_max_history_days() -> u32 {
    30
}

fn default_confidence_threshold() -> f64 {
    0.7
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from `path`, or from the first default location that exists.
    ///
    /// Returns defaults when no file is found. Environment variables are applied by
    /// [`Config::apply_env`], not here.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(OptimizerError::Config(format!(
                    "configuration file not found: {}",
                    path.display()
                )));
            }
            return Self::load_from_path(path);
        }

        for candidate in Self::default_locations() {
            if candidate.is_file() {
                log::debug!("Using configuration file {}", candidate.display());
                return Self::load_from_path(&candidate);
            }
        }

        Ok(Self::default())
    }

    fn default_locations() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("gha-optimizer.toml"),
            PathBuf::from("gha-optimizer.yml"),
            PathBuf::from("config.yml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("gha-optimizer").join("config.toml"));
            paths.push(dir.join("gha-optimizer").join("config.yml"));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".gha-optimizer").join("config.yml"));
        }
        paths
    }

    /// Load configuration from a specific file, choosing the format by extension.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;

        let extension = path.extension().and_then(|ext| ext.to_str());
        let parsed: std::result::Result<Self, String> = match extension {
            Some("toml") => toml::from_str(&contents).map_err(|e| e.to_string()),
            _ if contents.trim().is_empty() => Ok(Self::default()),
            _ => serde_yaml::from_str(&contents).map_err(|e| e.to_string()),
        };

        parsed.map_err(|e| {
            OptimizerError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Fill unset credentials from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Fill unset credentials using `lookup` for environment variables.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.github.token.is_none() {
            self.github.token = non_empty("GITHUB_TOKEN");
        }
        if self.ai.api_key.is_none() {
            self.ai.api_key = non_empty(self.ai.provider.api_key_env());
        }
    }

    pub fn ai_model(&self) -> &str {
        self.ai
            .model
            .as_deref()
            .unwrap_or_else(|| self.ai.provider.default_model())
    }

    pub fn require_github_token(&self) -> Result<&str> {
        self.github
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                OptimizerError::Config(
                    "GitHub token is required. Set GITHUB_TOKEN or github.token in the config file"
                        .to_string(),
                )
            })
    }

    pub fn require_ai_key(&self) -> Result<&str> {
        self.ai
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                OptimizerError::Config(format!(
                    "AI API key is required for analysis. Set {} or ai.api_key in the config file",
                    self.ai.provider.api_key_env()
                ))
            })
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.analysis.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(OptimizerError::Config(format!(
                "analysis.confidence_threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        if self.analysis.max_history_days == 0 {
            return Err(OptimizerError::Config(
                "analysis.max_history_days must be at least 1".to_string(),
            ));
        }
        if self.ai.max_attempts == 0 {
            return Err(OptimizerError::Config(
                "ai.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
