//! Builds the analysis prompt sent to the LLM.
//!
//! Output depends only on the repository context and the docs mode: the same input
//! always produces the same prompt.

use crate::collector::{ActivitySource, RepositoryContext};

/// Bundled optimization patterns reference.
pub const OPTIMIZATION_PATTERNS: &str = include_str!("../docs/optimization-patterns.md");

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How the patterns reference is included in the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocsMode {
    /// Point at the versioned online copy and list the key patterns.
    #[default]
    Reference,
    /// Embed the bundled document in full.
    Embedded,
}

/// Versioned URL of the published patterns document.
pub fn docs_url() -> String {
    format!(
        "https://github.com/BohdanBykov/gha-optimizer/blob/v{}/docs/optimization-patterns.md",
        VERSION
    )
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    docs: DocsMode,
}

impl PromptBuilder {
    pub fn new(docs: DocsMode) -> Self {
        Self { docs }
    }

    pub fn build(&self, context: &RepositoryContext) -> String {
        let activity = &context.activity;
        let runs_per_week = match activity.source {
            ActivitySource::Observed => activity.runs_per_week(),
            ActivitySource::Default => activity.runs_per_month / crate::cost::WEEKS_PER_MONTH,
        };

        let (full_name, language) = match &context.metadata {
            Some(meta) => (
                meta.full_name.clone(),
                meta.language.clone().unwrap_or_else(|| "Unknown".to_string()),
            ),
            None => (context.repo.full_name(), "Unknown".to_string()),
        };

        let history = match context.run_summary() {
            Some(summary) => {
                let mut line = format!(
                    "- **Run History**: {:.0}% of runs succeeded",
                    summary.success_rate * 100.0
                );
                if let Some(minutes) = summary.average_minutes {
                    line.push_str(&format!(", average duration {:.1} min", minutes));
                }
                line.push('\n');
                line
            }
            None => String::new(),
        };

        let mut workflows = String::new();
        for (idx, workflow) in context.workflow_files.iter().enumerate() {
            workflows.push_str(&format!(
                "\n### Workflow WF{:02}: `{}`\n```yaml\n{}\n```\n",
                idx + 1,
                workflow.path,
                number_lines(&workflow.raw_yaml)
            ));
        }

        format!(
            r#"You are an expert GitHub Actions optimization analyst powered by gha-optimizer v{version}.

ANALYSIS TASK: Analyze ALL workflows below for optimization opportunities using the optimization patterns documentation provided.

## Repository Context
- **Repository**: {full_name}
- **Language**: {language}
- **Activity**: {runs} runs in {days} days (~{per_week:.0}/week)
{history}- **Total Workflows**: {workflow_count}

## Optimization Patterns Documentation
{docs}
## Workflows to Analyze
{workflows}
## Critical Instructions

### 1. Workflow Identification
- Each workflow has an ID (WF01, WF02, etc.) and file path
- Use the exact workflow_file path in your response

### 2. Line Number Requirements
- Provide exact line numbers relative to the start of each workflow file
- Example: if an optimization applies to line 25 of WF02, use "25"

### 3. Impact Calculation
- Time savings per run (realistic minutes)
- Monthly cost: cost_per_minute × time_saved × {per_week:.0} runs/week × 4.33 weeks (ubuntu-latest is $0.008/minute)
- Implementation effort: low/medium/high
- Confidence: 0.0-1.0 based on pattern clarity

### 4. Required Output
Return ONLY a JSON array with ALL optimizations found across ALL workflows. Each element has the fields
title, type, priority, workflow_file, job_name, line_number, description, impact_time_minutes,
monthly_cost_savings, confidence_score, implementation_effort, implementation and code_example.
Return an empty array if nothing can be improved.
"#,
            version = VERSION,
            full_name = full_name,
            language = language,
            runs = activity.observed_runs,
            days = activity.window_days,
            per_week = runs_per_week,
            history = history,
            workflow_count = context.workflow_files.len(),
            docs = self.documentation(),
            workflows = workflows,
        )
    }

    fn documentation(&self) -> String {
        match self.docs {
            DocsMode::Embedded => {
                if !OPTIMIZATION_PATTERNS.contains(&format!("**Version:** {}", VERSION)) {
                    log::warn!(
                        "Bundled patterns documentation does not match version {}",
                        VERSION
                    );
                }
                format!(
                    "Version: {}\nSource: bundled documentation\n\n{}\n",
                    VERSION, OPTIMIZATION_PATTERNS
                )
            }
            DocsMode::Reference => format!(
                r#"**Version:** {version}
**Documentation URL:** {url}

The optimization patterns documentation at the URL above contains the detailed patterns,
confidence scoring guidelines, impact calculations and implementation examples.

**KEY PATTERNS TO DETECT:**
- Dependency caching (Node.js, Python, Java/Maven, Docker)
- Job parallelization opportunities
- Runner optimization (right-sizing)
- Conditional execution improvements
- Artifact optimization

Use exact pattern matches for high confidence (0.8-1.0) and conservative scores when a pattern is unclear.
"#,
                version = VERSION,
                url = docs_url(),
            ),
        }
    }
}

/// Prefix each line with its 1-based number, right-aligned to three columns.
pub fn number_lines(yaml: &str) -> String {
    yaml.split('\n')
        .enumerate()
        .map(|(i, line)| format!("{:3}| {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}
