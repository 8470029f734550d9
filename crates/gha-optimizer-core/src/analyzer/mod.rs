pub mod fallback;
pub mod html_report;
pub mod markdown_report;
pub mod ordering;
pub mod report;
pub mod validate;

use crate::collector::RepositoryContext;
use crate::cost::{check_cost, CostCheck, COST_ADJUSTED_NOTE};
use crate::llm::response::parse_recommendation_array;
use crate::llm::{LlmClient, LlmError};
use chrono::Utc;
use report::{Provenance, Recommendation, ScanReport};
use serde_json::Value;
use std::time::Duration;

/// Retry budget and pacing for LLM calls.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Total calls before falling back; at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry, doubled for each later one.
    pub initial_backoff: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

/// Result of running the engine over one repository.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub recommendations: Vec<Recommendation>,
    pub provenance: Provenance,
    pub runs_per_month: f64,
    /// Last completion text received, if any.
    pub raw_response: Option<String>,
}

enum State {
    Attempt(u32),
    Retry { attempt: u32, error: LlmError },
    Success { attempts: u32, entries: Vec<Value> },
    Fallback { reason: String },
}

/// Turns a prompt into an ordered list of recommendations.
///
/// The LLM is tried up to `max_attempts` times on transport and API errors. A
/// response that is not a JSON array, or exhausting the retries, switches to static
/// pattern analysis. Both paths yield the same [`ScanOutcome`] shape.
pub struct RecommendationEngine<C> {
    client: C,
    settings: EngineSettings,
}

impl<C: LlmClient> RecommendationEngine<C> {
    pub fn new(client: C, settings: EngineSettings) -> Self {
        Self { client, settings }
    }

    pub async fn run(&self, prompt: &str, context: &RepositoryContext) -> ScanOutcome {
        let max_attempts = self.settings.max_attempts.max(1);
        let runs_per_month = context.activity.runs_per_month;
        let mut raw_response = None;
        let mut state = State::Attempt(1);

        let (mut recommendations, provenance) = loop {
            state = match state {
                State::Attempt(attempt) => {
                    log::info!(
                        "Requesting analysis from {} (attempt {}/{})",
                        self.client.describe(),
                        attempt,
                        max_attempts
                    );
                    match self.client.complete(prompt).await {
                        Ok(text) => {
                            let parsed = parse_recommendation_array(&text);
                            raw_response = Some(text);
                            match parsed {
                                Ok(entries) => State::Success {
                                    attempts: attempt,
                                    entries,
                                },
                                Err(e) => State::Fallback {
                                    reason: format!("malformed AI response ({})", e),
                                },
                            }
                        }
                        Err(error) if attempt < max_attempts => State::Retry { attempt, error },
                        Err(error) => State::Fallback {
                            reason: format!("{} (after {} attempts)", error, attempt),
                        },
                    }
                }
                State::Retry { attempt, error } => {
                    let delay = self.settings.initial_backoff * 2u32.saturating_pow(attempt - 1);
                    log::warn!("{}; retrying in {:?}", error, delay);
                    tokio::time::sleep(delay).await;
                    State::Attempt(attempt + 1)
                }
                State::Success { attempts, entries } => {
                    let mut recs = validate::validate_recommendations(&entries);
                    reconcile_costs(&mut recs, context);
                    break (recs, Provenance::Llm { attempts });
                }
                State::Fallback { reason } => {
                    log::warn!("AI analysis unavailable, using fallback analysis: {}", reason);
                    let recs = fallback::analyze(&context.workflow_files, runs_per_month);
                    break (recs, Provenance::Fallback { reason });
                }
            };
        };

        ordering::sort_recommendations(&mut recommendations);

        ScanOutcome {
            recommendations,
            provenance,
            runs_per_month,
            raw_response,
        }
    }
}

/// Replace implausible LLM cost figures with calculator values.
pub fn reconcile_costs(recommendations: &mut [Recommendation], context: &RepositoryContext) {
    let runs_per_month = context.activity.runs_per_month;
    let mut adjusted = 0;

    for rec in recommendations.iter_mut() {
        let runner = context.pricing_runner(&rec.workflow_file, &rec.job_name);
        match check_cost(rec.monthly_cost_savings, rec.impact_time_minutes, runner, runs_per_month) {
            CostCheck::Accepted => {}
            CostCheck::Derived { computed } => rec.monthly_cost_savings = computed,
            CostCheck::Adjusted { supplied, computed } => {
                log::warn!(
                    "Cost for '{}' adjusted from ${:.2} to ${:.2}/month",
                    rec.title,
                    supplied,
                    computed
                );
                rec.monthly_cost_savings = computed;
                if !rec.description.ends_with(COST_ADJUSTED_NOTE) {
                    rec.description.push_str(COST_ADJUSTED_NOTE);
                }
                adjusted += 1;
            }
        }
    }

    log::info!(
        "Cost validation complete: {} checked, {} adjusted",
        recommendations.len(),
        adjusted
    );
}

/// Assemble the exportable report for a finished scan.
pub fn build_report(context: &RepositoryContext, outcome: &ScanOutcome) -> ScanReport {
    ScanReport {
        repository: context.repo.full_name(),
        generator_version: env!("CARGO_PKG_VERSION").to_string(),
        generated_at: Utc::now(),
        provenance: outcome.provenance.clone(),
        workflow_count: context.workflow_files.len(),
        runs_observed: context.activity.observed_runs,
        analysis_days: context.activity.window_days,
        runs_per_month: outcome.runs_per_month,
        recommendations: outcome.recommendations.clone(),
    }
}
