use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Represents a single step within a workflow job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub uses: Option<String>,
    pub run: Option<String>,
    /// Scalar `with:` inputs, stringified.
    #[serde(default)]
    pub with: BTreeMap<String, String>,
}

impl Step {
    /// True when the step references an action whose name starts with `prefix`.
    pub fn uses_action(&self, prefix: &str) -> bool {
        self.uses.as_deref().is_some_and(|u| u.starts_with(prefix))
    }

    /// The lower-cased shell command of a `run:` step.
    pub fn command(&self) -> Option<String> {
        self.run.as_ref().map(|r| r.to_lowercase())
    }

    pub fn input(&self, key: &str) -> Option<&str> {
        self.with.get(key).map(String::as_str)
    }
}

/// A job in a GitHub Actions workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Job key under `jobs:`.
    pub name: String,
    pub steps: Vec<Step>,
    /// Runner labels joined with `,`.
    pub runs_on: String,
    /// Jobs this job waits for. May reference jobs missing from the workflow.
    pub needs: BTreeSet<String>,
    pub condition: Option<String>,
    pub has_matrix: bool,
}

impl Job {
    pub fn new(name: String) -> Self {
        Self {
            name,
            steps: Vec::new(),
            runs_on: "ubuntu-latest".to_string(),
            needs: BTreeSet::new(),
            condition: None,
            has_matrix: false,
        }
    }

    /// The runner label used for per-minute pricing.
    pub fn pricing_runner(&self) -> &str {
        self.runs_on
            .split(',')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("ubuntu-latest")
    }
}

/// Trigger event for the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTrigger {
    pub event: String,
    pub branches: Vec<String>,
    pub paths: Vec<String>,
}

/// One workflow definition fetched from a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowFile {
    pub path: String,
    pub raw_yaml: String,
    pub name: String,
    pub triggers: Vec<WorkflowTrigger>,
    pub jobs: Vec<Job>,
}

impl WorkflowFile {
    pub fn job(&self, name: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.name == name)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn step_count(&self) -> usize {
        self.jobs.iter().map(|j| j.steps.len()).sum()
    }

    /// File name component of the workflow path (`ci.yml` for `.github/workflows/ci.yml`).
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// `(job, missing dependency)` pairs for `needs` entries naming no job in this workflow.
    pub fn dangling_needs(&self) -> Vec<(String, String)> {
        let mut dangling = Vec::new();
        for job in &self.jobs {
            for dep in &job.needs {
                if self.job(dep).is_none() {
                    dangling.push((job.name.clone(), dep.clone()));
                }
            }
        }
        dangling
    }
}
