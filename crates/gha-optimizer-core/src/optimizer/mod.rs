//! Turns recommendations into workflow patches and pull requests.

pub mod cache_gen;

use crate::analyzer::fallback::{uncached_steps, DependencyPattern};
use crate::analyzer::report::{format_minutes, format_usd, Priority, Recommendation, RecommendationType};
use crate::collector::{RepoRef, RepositoryContext};
use crate::error::{OptimizerError, Result};
use crate::providers::github_api::{GitHubClient, PullRequest};
use std::str::FromStr;

const BRANCH_PREFIX: &str = "gha-optimizer/";
const MAX_SLUG_LEN: usize = 48;

/// Minimum priority selected by `apply --priority`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriorityFilter {
    /// Critical and high.
    #[default]
    High,
    Medium,
    Low,
    All,
}

impl PriorityFilter {
    fn threshold(&self) -> Priority {
        match self {
            PriorityFilter::High => Priority::High,
            PriorityFilter::Medium => Priority::Medium,
            PriorityFilter::Low | PriorityFilter::All => Priority::Low,
        }
    }

    pub fn accepts(&self, priority: Priority) -> bool {
        priority.at_least(self.threshold())
    }
}

impl FromStr for PriorityFilter {
    type Err = OptimizerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(PriorityFilter::High),
            "medium" => Ok(PriorityFilter::Medium),
            "low" => Ok(PriorityFilter::Low),
            "all" => Ok(PriorityFilter::All),
            other => Err(OptimizerError::Config(format!(
                "unknown priority '{}' (expected high, medium, low or all)",
                other
            ))),
        }
    }
}

/// Recommendations at or above `filter` and `confidence_threshold`, in input order.
pub fn select_for_apply(
    recommendations: &[Recommendation],
    filter: PriorityFilter,
    confidence_threshold: f64,
) -> Vec<&Recommendation> {
    recommendations
        .iter()
        .filter(|r| filter.accepts(r.priority) && r.confidence_score >= confidence_threshold)
        .collect()
}

/// A single-file change ready to become a pull request.
#[derive(Debug, Clone)]
pub struct WorkflowPatch {
    pub recommendation: Recommendation,
    pub workflow_path: String,
    pub original: String,
    pub patched: String,
    pub branch: String,
}

impl WorkflowPatch {
    pub fn commit_message(&self) -> String {
        format!("ci: {}", self.recommendation.title)
    }

    pub fn pr_title(&self) -> String {
        format!(
            "[gha-optimizer] {} ({})",
            self.recommendation.title, self.recommendation.job_name
        )
    }

    pub fn pr_body(&self) -> String {
        let rec = &self.recommendation;
        let mut body = format!(
            "## {}\n\n{}\n\n### Impact\n\n- Time saved per run: {}\n- Estimated monthly savings: {}\n- Confidence: {:.0}%\n- Effort: {}\n\n",
            rec.title,
            rec.description,
            format_minutes(rec.impact_time_minutes),
            format_usd(rec.monthly_cost_savings),
            rec.confidence_score * 100.0,
            rec.implementation_effort,
        );
        if !rec.implementation.is_empty() {
            body.push_str(&format!("### Implementation\n\n{}\n\n", rec.implementation));
        }
        if !rec.code_example.trim().is_empty() {
            body.push_str(&format!("```yaml\n{}\n```\n\n", rec.code_example.trim_end()));
        }
        body.push_str(&format!(
            "---\nGenerated by gha-optimizer v{}. Review the change before merging.\n",
            env!("CARGO_PKG_VERSION")
        ));
        body
    }
}

/// What `apply` will do with one recommendation.
#[derive(Debug, Clone)]
pub enum PatchPlan {
    Patch(WorkflowPatch),
    Manual {
        recommendation: Recommendation,
        reason: String,
    },
}

/// Plan a patch for each recommendation against the collected workflows.
///
/// Caching recommendations for npm/pip and docker recommendations are patched
/// automatically; everything else is left for manual follow-up.
pub fn plan_patches(context: &RepositoryContext, recommendations: &[&Recommendation]) -> Vec<PatchPlan> {
    recommendations
        .iter()
        .map(|rec| plan_one(context, rec))
        .collect()
}

fn plan_one(context: &RepositoryContext, rec: &Recommendation) -> PatchPlan {
    let manual = |reason: &str| PatchPlan::Manual {
        recommendation: rec.clone(),
        reason: reason.to_string(),
    };

    let candidates: &[DependencyPattern] = match rec.kind {
        RecommendationType::Caching => &[DependencyPattern::Npm, DependencyPattern::Pip],
        RecommendationType::Docker => &[DependencyPattern::Docker],
        _ => return manual("no automatic fix for this recommendation type"),
    };

    let Some(workflow) = context.workflow(&rec.workflow_file) else {
        return manual("workflow file not found in repository");
    };
    let Some(job) = workflow.job(&rec.job_name) else {
        return manual("job not found in workflow");
    };

    let uncached: Vec<DependencyPattern> = uncached_steps(job).into_iter().map(|(p, _)| p).collect();
    let Some(pattern) = candidates.iter().copied().find(|p| uncached.contains(p)) else {
        return manual("no uncached install or build step found in job");
    };

    match cache_gen::insert_cache_step(&workflow.raw_yaml, &job.name, pattern) {
        Some(patched) => PatchPlan::Patch(WorkflowPatch {
            recommendation: rec.clone(),
            workflow_path: workflow.path.clone(),
            original: workflow.raw_yaml.clone(),
            patched,
            branch: branch_name(&rec.title, &job.name),
        }),
        None => manual("could not locate the step to patch in the workflow text"),
    }
}

/// `gha-optimizer/<slug>` built from the title and job.
pub fn branch_name(title: &str, job: &str) -> String {
    let mut slug = String::new();
    for c in format!("{} {}", title, job).chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let mut slug: String = slug.chars().take(MAX_SLUG_LEN).collect();
    while slug.ends_with('-') {
        slug.pop();
    }
    format!("{}{}", BRANCH_PREFIX, slug)
}

/// Create a branch, commit the patch and open a pull request against `base_branch`.
pub async fn open_pull_request(
    client: &GitHubClient,
    repo: &RepoRef,
    base_branch: &str,
    patch: &WorkflowPatch,
) -> Result<PullRequest> {
    let base_sha = client
        .branch_head_sha(&repo.owner, &repo.name, base_branch)
        .await?;
    client
        .create_branch(&repo.owner, &repo.name, &patch.branch, &base_sha)
        .await?;
    log::info!("Created branch {} from {}", patch.branch, base_branch);

    let current = client
        .fetch_file(&repo.owner, &repo.name, &patch.workflow_path, Some(&patch.branch))
        .await?;
    if current.content != patch.original {
        log::warn!(
            "{} changed since it was analyzed; committing the patch anyway",
            patch.workflow_path
        );
    }

    client
        .update_file(
            &repo.owner,
            &repo.name,
            &patch.workflow_path,
            &patch.branch,
            &current.sha,
            &patch.patched,
            &patch.commit_message(),
        )
        .await?;

    let pr = client
        .create_pull_request(
            &repo.owner,
            &repo.name,
            &patch.pr_title(),
            &patch.branch,
            base_branch,
            &patch.pr_body(),
        )
        .await?;
    log::info!("Opened pull request #{}: {}", pr.number, pr.html_url);
    Ok(pr)
}
