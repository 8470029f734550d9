use crate::analyzer::report::{Effort, Priority, Recommendation, RecommendationType};
use crate::cost::calculate_monthly_savings;
use crate::optimizer::cache_gen;
use crate::parser::model::{Job, Step, WorkflowFile};
use regex::Regex;
use std::sync::LazyLock;

static NPM_INSTALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bnpm\s+(ci|install)\b").expect("valid npm pattern"));
static PIP_INSTALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bpip3?\s+install\b").expect("valid pip pattern"));
static DOCKER_BUILD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bdocker\s+build\b").expect("valid docker pattern"));

/// A dependency or build pattern the static analyzer recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyPattern {
    Npm,
    Pip,
    Docker,
}

impl DependencyPattern {
    pub const ALL: [DependencyPattern; 3] = [
        DependencyPattern::Npm,
        DependencyPattern::Pip,
        DependencyPattern::Docker,
    ];

    /// True when a (lower-cased) shell command triggers this pattern.
    pub fn matches_command(&self, cmd: &str) -> bool {
        match self {
            DependencyPattern::Npm => NPM_INSTALL.is_match(cmd),
            DependencyPattern::Pip => PIP_INSTALL.is_match(cmd),
            DependencyPattern::Docker => {
                DOCKER_BUILD.is_match(cmd) && !cmd.contains("--cache-from")
            }
        }
    }

    /// True when `step` provides caching for this pattern to the steps after it.
    pub fn is_cache_step(&self, step: &Step) -> bool {
        if step.uses_action("actions/cache") {
            return *self != DependencyPattern::Docker;
        }
        match self {
            DependencyPattern::Npm => {
                step.uses_action("actions/setup-node") && step.input("cache").is_some()
            }
            DependencyPattern::Pip => {
                step.uses_action("actions/setup-python") && step.input("cache").is_some()
            }
            DependencyPattern::Docker => {
                step.uses_action("docker/setup-buildx-action")
                    || step.uses_action("docker/build-push-action")
                    || step
                        .command()
                        .is_some_and(|c| c.contains("buildx") || c.contains("--cache-from"))
            }
        }
    }

    fn confidence(&self) -> f64 {
        match self {
            DependencyPattern::Npm => 0.9,
            DependencyPattern::Pip => 0.85,
            DependencyPattern::Docker => 0.85,
        }
    }

    fn time_saved_minutes(&self) -> f64 {
        match self {
            DependencyPattern::Npm => 3.0,
            DependencyPattern::Pip => 2.0,
            DependencyPattern::Docker => 4.0,
        }
    }

    fn priority(&self) -> Priority {
        match self {
            DependencyPattern::Npm | DependencyPattern::Pip => Priority::High,
            DependencyPattern::Docker => Priority::Medium,
        }
    }

    fn kind(&self) -> RecommendationType {
        match self {
            DependencyPattern::Npm | DependencyPattern::Pip => RecommendationType::Caching,
            DependencyPattern::Docker => RecommendationType::Docker,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            DependencyPattern::Npm => "Add npm dependency caching",
            DependencyPattern::Pip => "Add pip dependency caching",
            DependencyPattern::Docker => "Enable Docker layer caching with Buildx",
        }
    }

    fn implementation(&self) -> &'static str {
        match self {
            DependencyPattern::Npm => {
                "Add an actions/cache step for ~/.npm keyed on package-lock.json before the \
                 install step, or set `cache: npm` on actions/setup-node."
            }
            DependencyPattern::Pip => {
                "Add an actions/cache step for ~/.cache/pip keyed on the requirements files \
                 before the install step, or set `cache: pip` on actions/setup-python."
            }
            DependencyPattern::Docker => {
                "Set up Docker Buildx and build with cache-from/cache-to (for example \
                 `type=gha`) so unchanged layers are reused."
            }
        }
    }
}

/// Static recommendations for when LLM analysis is unavailable.
///
/// Walks each job's steps in order and reports, at most once per job and pattern,
/// an install or build step that no earlier step caches for.
pub fn analyze(workflows: &[WorkflowFile], runs_per_month: f64) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();
    for workflow in workflows {
        for job in &workflow.jobs {
            for (pattern, step) in uncached_steps(job) {
                recommendations.push(build_recommendation(workflow, job, step, pattern, runs_per_month));
            }
        }
    }
    log::info!(
        "Fallback analysis produced {} recommendations",
        recommendations.len()
    );
    recommendations
}

/// Install or build steps with no earlier cache step, at most one per pattern.
pub fn uncached_steps(job: &Job) -> Vec<(DependencyPattern, &Step)> {
    let mut cached = [false; DependencyPattern::ALL.len()];
    let mut reported = [false; DependencyPattern::ALL.len()];
    let mut found = Vec::new();

    for step in &job.steps {
        let cmd = step.command();
        for (i, pattern) in DependencyPattern::ALL.iter().enumerate() {
            if let Some(cmd) = &cmd {
                if !cached[i] && !reported[i] && pattern.matches_command(cmd) {
                    reported[i] = true;
                    found.push((*pattern, step));
                }
            }
            if pattern.is_cache_step(step) {
                cached[i] = true;
            }
        }
    }
    found
}

fn build_recommendation(
    workflow: &WorkflowFile,
    job: &Job,
    step: &Step,
    pattern: DependencyPattern,
    runs_per_month: f64,
) -> Recommendation {
    let command = step
        .run
        .as_deref()
        .and_then(|r| r.lines().map(str::trim).find(|l| pattern.matches_command(&l.to_lowercase())))
        .unwrap_or(step.name.as_str());
    let time = pattern.time_saved_minutes();

    Recommendation {
        title: pattern.title().to_string(),
        kind: pattern.kind(),
        priority: pattern.priority(),
        workflow_file: workflow.path.clone(),
        job_name: job.name.clone(),
        line_number: cache_gen::locate_pattern_line(&workflow.raw_yaml, &job.name, pattern),
        description: format!(
            "Job '{}' runs '{}' without a preceding cache step, so the work is repeated from scratch on every run.",
            job.name, command
        ),
        impact_time_minutes: time,
        monthly_cost_savings: calculate_monthly_savings(time, job.pricing_runner(), runs_per_month),
        confidence_score: pattern.confidence(),
        implementation_effort: Effort::Low,
        implementation: pattern.implementation().to_string(),
        code_example: cache_gen::code_example(pattern),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::DEFAULT_RUNS_PER_MONTH;
    use crate::parser::github::GitHubActionsParser;

    fn parse(yaml: &str) -> WorkflowFile {
        GitHubActionsParser::parse(yaml, ".github/workflows/ci.yml").unwrap()
    }

    #[test]
    fn test_detect_missing_npm_cache() {
        let wf = parse(
            r#"
name: CI
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - run: npm ci
      - run: npm run build
"#,
        );
        let recs = analyze(&[wf], DEFAULT_RUNS_PER_MONTH);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].kind, RecommendationType::Caching);
        assert_eq!(recs[0].confidence_score, 0.9);
        assert_eq!(recs[0].job_name, "build");
        assert_eq!(recs[0].line_number, Some(9));
        assert!((recs[0].monthly_cost_savings - 3.0 * 216.5 * 0.008).abs() < 1e-9);
    }

    #[test]
    fn test_no_recommendation_when_cache_precedes_install() {
        let wf = parse(
            r#"
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/setup-node@v4
        with:
          cache: npm
      - run: npm ci
      - uses: actions/cache@v4
        with:
          path: ~/.cache/pip
          key: pip
      - run: pip install -r requirements.txt
"#,
        );
        assert!(analyze(&[wf], 100.0).is_empty());
    }

    #[test]
    fn test_cache_after_install_does_not_count() {
        let wf = parse(
            r#"
on: push
jobs:
  test:
    runs-on: macos-latest
    steps:
      - run: pip install -r requirements.txt
      - uses: actions/cache@v4
        with:
          path: ~/.cache/pip
          key: pip
"#,
        );
        let recs = analyze(&[wf], 100.0);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].confidence_score, 0.85);
        assert!((recs[0].monthly_cost_savings - 2.0 * 100.0 * 0.08).abs() < 1e-9);
    }

    #[test]
    fn test_one_recommendation_per_job_and_pattern() {
        let wf = parse(
            r#"
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - run: npm install
      - run: npm ci
      - run: docker build -t app .
  image:
    runs-on: ubuntu-latest
    steps:
      - uses: docker/setup-buildx-action@v3
      - run: docker build -t app .
      - run: docker buildx build --cache-from type=gha -t app .
"#,
        );
        let recs = analyze(&[wf], 100.0);
        let summary: Vec<(&str, RecommendationType)> =
            recs.iter().map(|r| (r.job_name.as_str(), r.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("build", RecommendationType::Caching),
                ("build", RecommendationType::Docker)
            ]
        );
        assert_eq!(recs[1].priority, Priority::Medium);
    }

    #[test]
    fn test_pattern_matching() {
        assert!(DependencyPattern::Npm.matches_command("npm ci --prefer-offline"));
        assert!(!DependencyPattern::Npm.matches_command("npm run build"));
        assert!(DependencyPattern::Pip.matches_command("python -m pip3 install ."));
        assert!(DependencyPattern::Docker.matches_command("docker build ."));
        assert!(!DependencyPattern::Docker.matches_command("docker buildx build ."));
        assert!(!DependencyPattern::Docker.matches_command("docker build --cache-from img ."));
    }
}
