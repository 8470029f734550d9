pub mod analyzer;
pub mod collector;
pub mod config;
pub mod cost;
pub mod error;
pub mod llm;
pub mod optimizer;
pub mod parser;
pub mod prompt;
pub mod providers;

pub use analyzer::report::{
    Effort, Priority, Provenance, Recommendation, RecommendationType, ScanReport,
};
pub use analyzer::{build_report, EngineSettings, RecommendationEngine, ScanOutcome};
pub use collector::{collect, ActivityEstimate, CollectOptions, RepoRef, RepositoryContext};
pub use config::{Config, OutputFormat};
pub use error::{OptimizerError, Result};
pub use llm::{ConfiguredClient, LlmClient, LlmError};
pub use parser::github::GitHubActionsParser;
pub use parser::model::{Job, Step, WorkflowFile};
pub use prompt::{DocsMode, PromptBuilder};
pub use providers::github_api::GitHubClient;
