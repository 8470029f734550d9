use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of optimization a recommendation proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecommendationType {
    Caching,
    Parallelization,
    Docker,
    RunnerOptimization,
    Conditional,
    Artifact,
    Environment,
    Security,
    Other,
}

impl RecommendationType {
    pub const ALL: [RecommendationType; 9] = [
        RecommendationType::Caching,
        RecommendationType::Parallelization,
        RecommendationType::Docker,
        RecommendationType::RunnerOptimization,
        RecommendationType::Conditional,
        RecommendationType::Artifact,
        RecommendationType::Environment,
        RecommendationType::Security,
        RecommendationType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationType::Caching => "caching",
            RecommendationType::Parallelization => "parallelization",
            RecommendationType::Docker => "docker",
            RecommendationType::RunnerOptimization => "runner-optimization",
            RecommendationType::Conditional => "conditional",
            RecommendationType::Artifact => "artifact",
            RecommendationType::Environment => "environment",
            RecommendationType::Security => "security",
            RecommendationType::Other => "other",
        }
    }

    /// Recognise a normalised (trimmed, lower-cased) type name.
    pub fn from_normalized(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for RecommendationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority level for recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Sort rank; lower comes first.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Priority::Critical => "CRITICAL",
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn from_normalized(value: &str) -> Option<Self> {
        match value {
            "critical" => Some(Priority::Critical),
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }

    /// True when this priority is at least as urgent as `threshold`.
    pub fn at_least(&self, threshold: Priority) -> bool {
        self.rank() <= threshold.rank()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl Effort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effort::Low => "low",
            Effort::Medium => "medium",
            Effort::High => "high",
        }
    }

    pub fn from_normalized(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Effort::Low),
            "medium" => Some(Effort::Medium),
            "high" => Some(Effort::High),
            _ => None,
        }
    }
}

impl fmt::Display for Effort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated optimization recommendation with quantified impact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    pub priority: Priority,
    pub workflow_file: String,
    pub job_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    pub description: String,
    pub impact_time_minutes: f64,
    pub monthly_cost_savings: f64,
    pub confidence_score: f64,
    pub implementation_effort: Effort,
    pub implementation: String,
    pub code_example: String,
}

impl Recommendation {
    /// `workflow_file:line` when a line is known, otherwise the file alone.
    pub fn location(&self) -> String {
        match self.line_number {
            Some(line) => format!("{}:{}", self.workflow_file, line),
            None => self.workflow_file.clone(),
        }
    }
}

/// Where the recommendations of a scan came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum Provenance {
    /// Validated LLM output, obtained after `attempts` calls.
    Llm { attempts: u32 },
    /// Static pattern analysis, used because the LLM path failed.
    Fallback { reason: String },
}

impl Provenance {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Provenance::Fallback { .. })
    }

    /// One-line statement of the analysis source, shown in every report format.
    pub fn describe(&self) -> String {
        match self {
            Provenance::Llm { attempts: 1 } => "AI analysis".to_string(),
            Provenance::Llm { attempts } => format!("AI analysis (after {} attempts)", attempts),
            Provenance::Fallback { reason } => format!(
                "Fallback pattern analysis was used because AI analysis was unavailable: {}",
                reason
            ),
        }
    }
}

/// Complete result of one repository scan, as rendered and exported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub repository: String,
    pub generator_version: String,
    pub generated_at: DateTime<Utc>,
    pub provenance: Provenance,
    pub workflow_count: usize,
    pub runs_observed: usize,
    pub analysis_days: u32,
    pub runs_per_month: f64,
    pub recommendations: Vec<Recommendation>,
}

impl ScanReport {
    pub fn total_monthly_savings(&self) -> f64 {
        self.recommendations
            .iter()
            .map(|r| r.monthly_cost_savings)
            .sum()
    }

    pub fn total_time_minutes(&self) -> f64 {
        self.recommendations
            .iter()
            .map(|r| r.impact_time_minutes)
            .sum()
    }

    pub fn count(&self, priority: Priority) -> usize {
        self.recommendations
            .iter()
            .filter(|r| r.priority == priority)
            .count()
    }
}

/// Format minutes for display (`3.5 min`, `1h 05m`).
pub fn format_minutes(minutes: f64) -> String {
    if minutes >= 60.0 {
        let total = minutes.round() as u64;
        format!("{}h {:02}m", total / 60, total % 60)
    } else {
        format!("{:.1} min", minutes)
    }
}

pub fn format_usd(amount: f64) -> String {
    format!("${:.2}", amount)
}
