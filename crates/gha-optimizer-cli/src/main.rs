mod display;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gha_optimizer_core::analyzer::html_report::generate_html_report;
use gha_optimizer_core::analyzer::markdown_report::format_markdown_report;
use gha_optimizer_core::optimizer::{self, PatchPlan, PriorityFilter};
use gha_optimizer_core::{
    build_report, collect, CollectOptions, Config, ConfiguredClient, DocsMode, EngineSettings,
    GitHubClient, LlmClient, OutputFormat, PromptBuilder, Recommendation, RecommendationEngine,
    RepoRef, RepositoryContext, ScanReport,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "gha-optimizer",
    version,
    about = "AI-assisted GitHub Actions workflow optimizer",
    long_about = "Analyze a repository's GitHub Actions workflows and run history, produce prioritized\nrecommendations with time and cost impact, and open pull requests for the fixes that can be\napplied automatically."
)]
struct Cli {
    /// Path to a YAML or TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a repository's workflows and report optimization opportunities
    Scan {
        /// Repository in owner/repo form
        repository: String,

        /// Days of workflow run history to analyze
        #[arg(long)]
        max_history_days: Option<u32>,

        /// Only analyze these workflow files (repeatable)
        #[arg(short, long = "workflow")]
        workflows: Vec<String>,

        /// Write the report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report format (markdown, html, json)
        #[arg(short, long)]
        format: Option<String>,

        /// Write the generated prompt to this file and stop before calling the AI
        #[arg(long)]
        output_prompt_file: Option<PathBuf>,

        /// Write the raw AI response to this file
        #[arg(long)]
        output_ai_response: Option<PathBuf>,

        /// Embed the bundled optimization patterns document in the prompt
        #[arg(long)]
        local_docs: bool,
    },

    /// Open pull requests for recommendations that can be applied automatically
    Apply {
        /// Repository in owner/repo form
        repository: String,

        /// Minimum priority to apply (high, medium, low, all)
        #[arg(long, default_value = "high")]
        priority: String,

        /// Show the changes without creating branches or pull requests
        #[arg(long)]
        dry_run: bool,

        /// Use recommendations from a JSON report instead of running a new scan
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.apply_env();
    config.validate()?;

    match cli.command {
        Commands::Scan {
            repository,
            max_history_days,
            workflows,
            output,
            format,
            output_prompt_file,
            output_ai_response,
            local_docs,
        } => {
            let format = match format {
                Some(f) => f.parse::<OutputFormat>()?,
                None => config.output.default_format,
            };
            let opts = ScanOptions {
                max_history_days: max_history_days.unwrap_or(config.analysis.max_history_days),
                workflows,
                output,
                format,
                output_prompt_file,
                output_ai_response,
                docs: if local_docs {
                    DocsMode::Embedded
                } else {
                    DocsMode::Reference
                },
            };
            cmd_scan(&config, &repository, &opts).await
        }
        Commands::Apply {
            repository,
            priority,
            dry_run,
            report,
        } => {
            let filter = priority.parse::<PriorityFilter>()?;
            cmd_apply(&config, &repository, filter, dry_run, report.as_deref()).await
        }
    }
}

struct ScanOptions {
    max_history_days: u32,
    workflows: Vec<String>,
    output: Option<PathBuf>,
    format: OutputFormat,
    output_prompt_file: Option<PathBuf>,
    output_ai_response: Option<PathBuf>,
    docs: DocsMode,
}

fn github_client(config: &Config) -> Result<GitHubClient> {
    let token = config.require_github_token()?;
    GitHubClient::new(&config.github.api_url, token).context("Failed to create GitHub client")
}

async fn collect_context(
    client: &GitHubClient,
    repo: &RepoRef,
    max_history_days: u32,
    workflows: Vec<String>,
) -> Result<RepositoryContext> {
    let options = CollectOptions {
        max_history_days,
        workflow_filter: workflows,
        ..CollectOptions::default()
    };
    let context = collect(client, repo, &options)
        .await
        .with_context(|| format!("Failed to collect workflow data for {}", repo))?;
    if context.workflow_files.is_empty() {
        log::warn!("No workflow files found in {}", repo);
    }
    Ok(context)
}

fn engine(config: &Config) -> Result<RecommendationEngine<ConfiguredClient>> {
    let client = ConfiguredClient::from_config(config)?;
    log::info!("Analyzing with {}", client.describe());
    Ok(RecommendationEngine::new(
        client,
        EngineSettings {
            max_attempts: config.ai.max_attempts,
            ..EngineSettings::default()
        },
    ))
}

/// How a command obtains its recommendations.
enum Analysis<'a> {
    /// No LLM call; the path is the prompt file (scan) or saved report (apply).
    Skip(&'a Path),
    Run(RecommendationEngine<ConfiguredClient>),
}

/// Resolve the AI client up front so a missing key fails before any GitHub request.
fn analysis<'a>(config: &Config, skip: Option<&'a Path>) -> Result<Analysis<'a>> {
    match skip {
        Some(path) => Ok(Analysis::Skip(path)),
        None => Ok(Analysis::Run(engine(config)?)),
    }
}

async fn cmd_scan(config: &Config, repository: &str, opts: &ScanOptions) -> Result<()> {
    let repo = RepoRef::parse(repository)?;
    let client = github_client(config)?;
    let source = analysis(config, opts.output_prompt_file.as_deref())?;
    let context = collect_context(
        &client,
        &repo,
        opts.max_history_days,
        opts.workflows.clone(),
    )
    .await?;

    let prompt = PromptBuilder::new(opts.docs).build(&context);
    log::debug!("Prompt is {} bytes", prompt.len());

    let engine = match source {
        Analysis::Skip(path) => {
            write_file(path, &prompt)?;
            println!(
                "Prompt written to {}; skipping AI analysis",
                path.display()
            );
            return Ok(());
        }
        Analysis::Run(engine) => engine,
    };

    let outcome = engine.run(&prompt, &context).await;

    if let Some(path) = &opts.output_ai_response {
        match &outcome.raw_response {
            Some(raw) => write_file(path, raw)?,
            None => log::warn!("No AI response received; {} not written", path.display()),
        }
    }

    let report = build_report(&context, &outcome);
    display::print_scan_report(&report);

    if let Some(path) = &opts.output {
        let rendered = render_report(&report, opts.format, config.output.include_code_examples)?;
        write_file(path, &rendered)?;
        println!(" Report written to {}", path.display());
    }

    Ok(())
}

fn render_report(report: &ScanReport, format: OutputFormat, include_code: bool) -> Result<String> {
    Ok(match format {
        OutputFormat::Markdown => format_markdown_report(report, include_code),
        OutputFormat::Html => generate_html_report(report, include_code),
        OutputFormat::Json => {
            serde_json::to_string_pretty(report).context("Failed to serialize report")?
        }
    })
}

async fn cmd_apply(
    config: &Config,
    repository: &str,
    filter: PriorityFilter,
    dry_run: bool,
    report_path: Option<&Path>,
) -> Result<()> {
    let repo = RepoRef::parse(repository)?;
    let client = github_client(config)?;
    let source = analysis(config, report_path)?;
    let context = collect_context(
        &client,
        &repo,
        config.analysis.max_history_days,
        Vec::new(),
    )
    .await?;

    let recommendations: Vec<Recommendation> = match source {
        Analysis::Skip(path) => load_report(path, &repo)?.recommendations,
        Analysis::Run(engine) => {
            let prompt = PromptBuilder::default().build(&context);
            let outcome = engine.run(&prompt, &context).await;
            if outcome.provenance.is_fallback() {
                log::warn!("{}", outcome.provenance.describe());
            }
            outcome.recommendations
        }
    };

    let selected = optimizer::select_for_apply(
        &recommendations,
        filter,
        config.analysis.confidence_threshold,
    );
    log::info!(
        "{} of {} recommendations selected for apply",
        selected.len(),
        recommendations.len()
    );

    let plans = optimizer::plan_patches(&context, &selected);
    let base_branch = context
        .metadata
        .as_ref()
        .map(|m| m.default_branch.clone())
        .unwrap_or_else(|| "main".to_string());

    let mut opened = Vec::new();
    for plan in &plans {
        let PatchPlan::Patch(patch) = plan else {
            continue;
        };
        if dry_run {
            display::print_diff(&patch.original, &patch.patched, &patch.workflow_path, &patch.branch);
            continue;
        }
        let pr = optimizer::open_pull_request(&client, &repo, &base_branch, patch)
            .await
            .with_context(|| format!("Failed to open pull request for '{}'", patch.recommendation.title))?;
        opened.push(pr);
    }

    display::print_apply_summary(&plans, &opened, dry_run);
    Ok(())
}

fn load_report(path: &Path, repo: &RepoRef) -> Result<ScanReport> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read report {}", path.display()))?;
    let report: ScanReport = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON report {}", path.display()))?;
    if report.repository != repo.full_name() {
        log::warn!(
            "Report {} was generated for {}, applying to {}",
            path.display(),
            report.repository,
            repo
        );
    }
    Ok(report)
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_without_ai_key(api_url: &str) -> Config {
        let mut config = Config::default();
        config.github.token = Some("test-token".to_string());
        config.github.api_url = api_url.to_string();
        config
    }

    fn scan_options(prompt_file: Option<PathBuf>) -> ScanOptions {
        ScanOptions {
            max_history_days: 30,
            workflows: Vec::new(),
            output: None,
            format: OutputFormat::Markdown,
            output_prompt_file: prompt_file,
            output_ai_response: None,
            docs: DocsMode::Reference,
        }
    }

    #[tokio::test]
    async fn test_scan_missing_ai_key_fails_before_github() {
        let mut server = mockito::Server::new_async().await;
        let user = server
            .mock("GET", "/user")
            .with_status(200)
            .with_body(r#"{"login":"octocat"}"#)
            .expect(0)
            .create_async()
            .await;

        let config = config_without_ai_key(&server.url());
        let err = cmd_scan(&config, "acme/app", &scan_options(None))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("AI API key is required"), "{:#}", err);
        user.assert_async().await;
    }

    #[tokio::test]
    async fn test_apply_missing_ai_key_fails_before_github() {
        let mut server = mockito::Server::new_async().await;
        let user = server
            .mock("GET", "/user")
            .with_status(200)
            .with_body(r#"{"login":"octocat"}"#)
            .expect(0)
            .create_async()
            .await;

        let config = config_without_ai_key(&server.url());
        let err = cmd_apply(&config, "acme/app", PriorityFilter::High, true, None)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("AI API key is required"), "{:#}", err);
        user.assert_async().await;
    }

    #[test]
    fn test_prompt_file_or_report_needs_no_ai_key() {
        let config = config_without_ai_key("http://127.0.0.1:9");
        let path = Path::new("prompt.md");
        assert!(matches!(analysis(&config, Some(path)), Ok(Analysis::Skip(p)) if p == path));
        assert!(analysis(&config, None).is_err());
    }
}
