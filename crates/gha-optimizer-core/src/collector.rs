//! Gathers everything one scan needs from GitHub into a [`RepositoryContext`].

use crate::cost::{observed_runs_per_month, DEFAULT_RUNS_PER_MONTH};
use crate::error::{OptimizerError, Result};
use crate::parser::github::GitHubActionsParser;
use crate::parser::model::WorkflowFile;
use crate::providers::github_api::{GitHubClient, RepositoryMetadata, WorkflowEntry, WorkflowRun};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MAX_RUNS: usize = 1000;
const WORKFLOW_DIR: &str = ".github/workflows/";

/// `owner/repo` reference to a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(value: &str) -> Result<Self> {
        let mut parts = value.trim().split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None)
                if valid_segment(owner) && valid_segment(name) =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(OptimizerError::InvalidRepository(value.to_string())),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.chars().any(char::is_whitespace)
}

impl FromStr for RepoRef {
    type Err = OptimizerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivitySource {
    /// Extrapolated from runs in the lookback window.
    Observed,
    /// Too few runs observed; conservative default used.
    Default,
}

/// Estimated monthly workflow runs for cost extrapolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEstimate {
    pub observed_runs: usize,
    pub window_days: u32,
    pub runs_per_month: f64,
    pub source: ActivitySource,
}

impl ActivityEstimate {
    pub fn from_observed(observed_runs: usize, window_days: u32) -> Self {
        match observed_runs_per_month(observed_runs, window_days) {
            Some(runs_per_month) => Self {
                observed_runs,
                window_days,
                runs_per_month,
                source: ActivitySource::Observed,
            },
            None => Self {
                observed_runs,
                window_days,
                runs_per_month: DEFAULT_RUNS_PER_MONTH,
                source: ActivitySource::Default,
            },
        }
    }

    /// Observed runs per week, for display. Zero without a window.
    pub fn runs_per_week(&self) -> f64 {
        if self.window_days == 0 {
            0.0
        } else {
            self.observed_runs as f64 * 7.0 / self.window_days as f64
        }
    }
}

/// Everything gathered for one scan. Read-only once built.
#[derive(Debug, Clone)]
pub struct RepositoryContext {
    pub repo: RepoRef,
    pub metadata: Option<RepositoryMetadata>,
    pub workflow_files: Vec<WorkflowFile>,
    pub run_history: Vec<WorkflowRun>,
    pub activity: ActivityEstimate,
}

impl RepositoryContext {
    /// Find a workflow by path, or by file name when no path matches.
    pub fn workflow(&self, path_or_name: &str) -> Option<&WorkflowFile> {
        self.workflow_files
            .iter()
            .find(|w| w.path == path_or_name)
            .or_else(|| {
                self.workflow_files
                    .iter()
                    .find(|w| w.file_name() == path_or_name)
            })
    }

    /// Runner label to price a recommendation against.
    pub fn pricing_runner(&self, workflow_file: &str, job_name: &str) -> &str {
        self.workflow(workflow_file)
            .and_then(|w| w.job(job_name))
            .map(|j| j.pricing_runner())
            .unwrap_or("ubuntu-latest")
    }

    /// Outcome and duration figures over the collected runs; `None` without history.
    pub fn run_summary(&self) -> Option<RunSummary> {
        if self.run_history.is_empty() {
            return None;
        }
        let succeeded = self.run_history.iter().filter(|r| r.succeeded()).count();
        let durations: Vec<f64> = self
            .run_history
            .iter()
            .filter_map(|r| r.duration_secs())
            .collect();
        let average_minutes = (!durations.is_empty())
            .then(|| durations.iter().sum::<f64>() / durations.len() as f64 / 60.0);

        Some(RunSummary {
            success_rate: succeeded as f64 / self.run_history.len() as f64,
            average_minutes,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Fraction of runs that concluded `success`.
    pub success_rate: f64,
    /// Mean wall-clock minutes of runs with timing data.
    pub average_minutes: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub max_history_days: u32,
    /// Workflow file names to restrict the scan to; empty means all.
    pub workflow_filter: Vec<String>,
    pub max_runs: usize,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            max_history_days: 30,
            workflow_filter: Vec::new(),
            max_runs: MAX_RUNS,
        }
    }
}

/// Collect workflows, run history and repository metadata for `repo`.
///
/// GitHub failures abort the collection. Workflow files that cannot be fetched or
/// parsed are skipped with a warning.
pub async fn collect(
    client: &GitHubClient,
    repo: &RepoRef,
    options: &CollectOptions,
) -> Result<RepositoryContext> {
    client.authenticated_user().await?;

    log::info!("Collecting workflow data for {}", repo);
    let metadata = client.repository_metadata(&repo.owner, &repo.name).await?;

    let entries = client.list_workflows(&repo.owner, &repo.name).await?;
    let selected = select_workflows(&entries, &options.workflow_filter)?;

    let mut workflow_files = Vec::with_capacity(selected.len());
    for entry in selected {
        let file = match client
            .fetch_file(&repo.owner, &repo.name, &entry.path, Some(&metadata.default_branch))
            .await
        {
            Ok(file) => file,
            Err(OptimizerError::NotFound(_)) => {
                log::warn!("Skipping {}: file not found on {}", entry.path, metadata.default_branch);
                continue;
            }
            Err(e) => return Err(e),
        };

        match GitHubActionsParser::parse(&file.content, &entry.path) {
            Ok(workflow) => {
                for (job, missing) in workflow.dangling_needs() {
                    log::warn!(
                        "{}: job '{}' needs unknown job '{}'",
                        workflow.path,
                        job,
                        missing
                    );
                }
                log::debug!(
                    "Parsed {} ({} jobs, {} steps)",
                    workflow.path,
                    workflow.job_count(),
                    workflow.step_count()
                );
                workflow_files.push(workflow);
            }
            Err(e) => log::warn!("Skipping {}: {}", entry.path, e),
        }
    }

    let since = Utc::now() - chrono::Duration::days(i64::from(options.max_history_days));
    let run_history = client
        .fetch_workflow_runs(&repo.owner, &repo.name, since, options.max_runs)
        .await?;
    let activity = ActivityEstimate::from_observed(run_history.len(), options.max_history_days);

    log::info!(
        "Collected {} workflows and {} runs over {} days",
        workflow_files.len(),
        run_history.len(),
        options.max_history_days
    );
    if activity.source == ActivitySource::Default {
        log::info!(
            "Too few runs observed; assuming {:.1} runs/month",
            activity.runs_per_month
        );
    }

    Ok(RepositoryContext {
        repo: repo.clone(),
        metadata: Some(metadata),
        workflow_files,
        run_history,
        activity,
    })
}

/// Keep workflow definitions under `.github/workflows/`, restricted to `filter` file
/// names when given. Unknown names are an error naming the closest match.
pub fn select_workflows<'a>(
    entries: &'a [WorkflowEntry],
    filter: &[String],
) -> Result<Vec<&'a WorkflowEntry>> {
    let files: Vec<&WorkflowEntry> = entries
        .iter()
        .filter(|e| {
            e.path.starts_with(WORKFLOW_DIR)
                && (e.path.ends_with(".yml") || e.path.ends_with(".yaml"))
        })
        .collect();

    if filter.is_empty() {
        return Ok(files);
    }

    for wanted in filter {
        if !files.iter().any(|e| e.file_name() == wanted.as_str()) {
            let available: Vec<&str> = files.iter().map(|e| e.file_name()).collect();
            let mut message = format!("workflow '{}' not found", wanted);
            if let Some(closest) = closest_match(wanted, &available) {
                message.push_str(&format!(" (did you mean '{}'?)", closest));
            }
            if !available.is_empty() {
                message.push_str(&format!("; available: {}", available.join(", ")));
            }
            return Err(OptimizerError::Config(message));
        }
    }

    Ok(files
        .into_iter()
        .filter(|e| filter.iter().any(|f| f == e.file_name()))
        .collect())
}

fn closest_match<'a>(wanted: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, strsim::damerau_levenshtein(wanted, c)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(c, _)| c)
}
