use base64::Engine as _;
use gha_optimizer_core::analyzer::fallback::{self, DependencyPattern};
use gha_optimizer_core::analyzer::markdown_report::format_markdown_report;
use gha_optimizer_core::collector::ActivitySource;
use gha_optimizer_core::optimizer::{self, cache_gen, PatchPlan, PriorityFilter};
use gha_optimizer_core::{
    build_report, collect, ActivityEstimate, CollectOptions, EngineSettings, GitHubActionsParser,
    GitHubClient, LlmClient, LlmError, OptimizerError, Priority, PromptBuilder, Provenance,
    RecommendationEngine, RecommendationType, RepoRef, RepositoryContext, ScanReport,
    WorkflowFile,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the workspace root (two levels up from CARGO_MANIFEST_DIR of gha-optimizer-core).
fn fixtures_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir)
        .parent()
        .unwrap() // crates/
        .parent()
        .unwrap() // workspace root
        .join("tests/fixtures")
}

fn github_fixture(name: &str) -> String {
    let path = fixtures_dir().join("github-actions").join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
}

fn parse_fixture(name: &str) -> WorkflowFile {
    GitHubActionsParser::parse(&github_fixture(name), &format!(".github/workflows/{}", name))
        .unwrap()
}

fn context(workflows: Vec<WorkflowFile>) -> RepositoryContext {
    RepositoryContext {
        repo: RepoRef::parse("acme/app").unwrap(),
        metadata: None,
        workflow_files: workflows,
        run_history: Vec::new(),
        activity: ActivityEstimate::from_observed(0, 30),
    }
}

struct UnavailableLlm;

impl LlmClient for UnavailableLlm {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Transport("connection refused".to_string()))
    }

    fn describe(&self) -> String {
        "test/unavailable".to_string()
    }
}

struct FixedLlm(&'static str);

impl LlmClient for FixedLlm {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Ok(self.0.to_string())
    }

    fn describe(&self) -> String {
        "test/fixed".to_string()
    }
}

fn fast_settings() -> EngineSettings {
    EngineSettings {
        max_attempts: 2,
        initial_backoff: Duration::from_millis(1),
    }
}

// ─── Workflow parsing ───

#[test]
fn test_parse_node_fixture() {
    let wf = parse_fixture("node-ci.yml");
    assert_eq!(wf.name, "Node CI");
    assert_eq!(wf.job_count(), 3);
    assert_eq!(wf.step_count(), 10);
    assert_eq!(wf.triggers.len(), 2);
    assert_eq!(wf.triggers[0].branches, vec!["main".to_string()]);
    assert_eq!(wf.triggers[1].paths.len(), 2);

    let image = wf.job("image").unwrap();
    assert!(image.needs.contains("lint"));
    assert!(image.needs.contains("test"));
    assert!(wf.dangling_needs().is_empty());
}

#[test]
fn test_parse_python_fixture_runner_labels() {
    let wf = parse_fixture("python-ci.yml");
    let test = wf.job("test").unwrap();
    assert_eq!(test.runs_on, "self-hosted,linux");
    assert!(test.has_matrix);
    assert_eq!(wf.job("package").unwrap().pricing_runner(), "macos-latest");
    assert!(wf.job("package").unwrap().condition.is_some());
}

#[test]
fn test_parse_malformed_fixture_fails() {
    let err = GitHubActionsParser::parse(&github_fixture("malformed.yml"), "malformed.yml")
        .unwrap_err();
    assert!(matches!(err, OptimizerError::Yaml { .. }));
}

// ─── Fallback analysis ───

#[test]
fn test_fallback_over_fixtures() {
    let workflows = vec![
        parse_fixture("node-ci.yml"),
        parse_fixture("python-ci.yml"),
        parse_fixture("cached.yml"),
    ];
    let recs = fallback::analyze(&workflows, 216.5);

    let summary: Vec<(&str, &str, RecommendationType)> = recs
        .iter()
        .map(|r| (r.workflow_file.as_str(), r.job_name.as_str(), r.kind))
        .collect();
    assert_eq!(
        summary,
        vec![
            (".github/workflows/node-ci.yml", "lint", RecommendationType::Caching),
            (".github/workflows/node-ci.yml", "test", RecommendationType::Caching),
            (".github/workflows/node-ci.yml", "image", RecommendationType::Docker),
            (".github/workflows/python-ci.yml", "test", RecommendationType::Caching),
            (".github/workflows/python-ci.yml", "package", RecommendationType::Caching),
        ]
    );

    // macOS minutes cost ten times as much as Linux minutes.
    let package = &recs[4];
    assert!((package.monthly_cost_savings - 2.0 * 216.5 * 0.08).abs() < 1e-9);
    assert!(recs.iter().all(|r| r.line_number.is_some()));
}

#[test]
fn test_cached_fixture_has_no_findings() {
    let recs = fallback::analyze(&[parse_fixture("cached.yml")], 100.0);
    assert!(recs.is_empty(), "unexpected recommendations: {:?}", recs);
}

// ─── Engine end to end ───

#[tokio::test]
async fn test_engine_falls_back_and_reports_it() {
    let ctx = context(vec![parse_fixture("node-ci.yml")]);
    let prompt = PromptBuilder::default().build(&ctx);
    assert!(prompt.contains("WF01"));

    let engine = RecommendationEngine::new(UnavailableLlm, fast_settings());
    let outcome = engine.run(&prompt, &ctx).await;

    assert!(outcome.provenance.is_fallback());
    assert_eq!(outcome.recommendations.len(), 3);
    assert_eq!(outcome.recommendations[0].priority, Priority::High);
    assert_eq!(outcome.recommendations[2].kind, RecommendationType::Docker);

    let report = build_report(&ctx, &outcome);
    let md = format_markdown_report(&report, true);
    assert!(md.contains("> **Note:** Fallback pattern analysis was used"));
    assert!(md.contains("actions/cache@v4"));

    let json = serde_json::to_string(&report).unwrap();
    let back: ScanReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back.recommendations, report.recommendations);
    assert!(matches!(back.provenance, Provenance::Fallback { .. }));
}

#[tokio::test]
async fn test_engine_validates_and_orders_llm_output() {
    let ctx = context(vec![parse_fixture("python-ci.yml")]);
    let engine = RecommendationEngine::new(
        FixedLlm(
            r#"Here is my analysis:
```json
[
  {"title": "Cache pip", "type": "caching", "priority": "HIGH",
   "workflow_file": ".github/workflows/python-ci.yml", "job_name": "package",
   "impact_time_minutes": 2, "monthly_cost_savings": 34.64, "confidence_score": 0.9},
  {"title": "Skip tests on docs-only changes", "type": "conditional", "priority": "critical",
   "workflow_file": ".github/workflows/python-ci.yml", "job_name": "test",
   "impact_time_minutes": "1.5", "confidence_score": 1.7},
  {"type": "caching", "priority": "low"}
]
```"#,
        ),
        fast_settings(),
    );
    let outcome = engine.run("prompt", &ctx).await;

    assert_eq!(outcome.provenance, Provenance::Llm { attempts: 1 });
    assert_eq!(outcome.recommendations.len(), 2);

    let first = &outcome.recommendations[0];
    assert_eq!(first.title, "Skip tests on docs-only changes");
    assert_eq!(first.kind, RecommendationType::Conditional);
    assert_eq!(first.confidence_score, 1.0);
    // Derived from the calculator for the self-hosted (Linux-priced) runner.
    assert!((first.monthly_cost_savings - 1.5 * 216.5 * 0.008).abs() < 1e-9);

    let second = &outcome.recommendations[1];
    assert_eq!(second.priority, Priority::High);
    assert!((second.monthly_cost_savings - 34.64).abs() < 1e-9);
}

// ─── Patch generation ───

#[test]
fn test_patch_node_fixture_removes_finding() {
    let wf = parse_fixture("node-ci.yml");
    let patched = cache_gen::insert_cache_step(&wf.raw_yaml, "lint", DependencyPattern::Npm).unwrap();
    assert!(patched.ends_with('\n'));
    assert!(patched.contains("hashFiles('**/package-lock.json')"));

    let reparsed = GitHubActionsParser::parse(&patched, &wf.path).unwrap();
    assert_eq!(reparsed.job("lint").unwrap().steps.len(), 5);
    let recs = fallback::analyze(&[reparsed], 100.0);
    assert!(recs.iter().all(|r| r.job_name != "lint"));
    assert_eq!(recs.len(), 2);
}

#[test]
fn test_plan_patches_for_fixture() {
    let ctx = context(vec![parse_fixture("node-ci.yml")]);
    let recs = fallback::analyze(&ctx.workflow_files, ctx.activity.runs_per_month);

    let selected = optimizer::select_for_apply(&recs, PriorityFilter::All, 0.7);
    let plans = optimizer::plan_patches(&ctx, &selected);
    assert_eq!(plans.len(), 3);
    for plan in &plans {
        let PatchPlan::Patch(patch) = plan else {
            panic!("expected every fallback finding to be patchable: {:?}", plan);
        };
        assert!(patch.branch.starts_with("gha-optimizer/"));
        assert_ne!(patch.original, patch.patched);
        assert!(GitHubActionsParser::parse(&patch.patched, &patch.workflow_path).is_ok());
    }

    let high_only = optimizer::select_for_apply(&recs, PriorityFilter::High, 0.7);
    assert_eq!(high_only.len(), 2);
}

// ─── GitHub collection ───

fn encoded(content: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(content)
}

#[tokio::test]
async fn test_collect_against_mock_github() {
    let mut server = mockito::Server::new_async().await;
    let _user = server
        .mock("GET", "/user")
        .with_status(200)
        .with_body(r#"{"login":"octocat"}"#)
        .create_async()
        .await;
    let _repo = server
        .mock("GET", "/repos/acme/app")
        .with_status(200)
        .with_body(
            r#"{"name":"app","full_name":"acme/app","language":"TypeScript","default_branch":"main","stargazers_count":12}"#,
        )
        .create_async()
        .await;
    let _workflows = server
        .mock("GET", "/repos/acme/app/actions/workflows")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"total_count":3,"workflows":[
                {"id":1,"name":"Node CI","path":".github/workflows/node-ci.yml","state":"active"},
                {"id":2,"name":"Broken","path":".github/workflows/malformed.yml","state":"active"},
                {"id":3,"name":"Dependabot","path":"dynamic/dependabot/dependabot-updates","state":"active"}
            ]}"#,
        )
        .create_async()
        .await;
    let _node = server
        .mock("GET", "/repos/acme/app/contents/.github/workflows/node-ci.yml")
        .match_query(mockito::Matcher::UrlEncoded("ref".into(), "main".into()))
        .with_status(200)
        .with_body(
            serde_json::json!({
                "sha": "n1",
                "encoding": "base64",
                "content": encoded(&github_fixture("node-ci.yml")),
            })
            .to_string(),
        )
        .create_async()
        .await;
    let _broken = server
        .mock("GET", "/repos/acme/app/contents/.github/workflows/malformed.yml")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(
            serde_json::json!({
                "sha": "m1",
                "encoding": "base64",
                "content": encoded(&github_fixture("malformed.yml")),
            })
            .to_string(),
        )
        .create_async()
        .await;
    let _runs = server
        .mock("GET", "/repos/acme/app/actions/runs")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(r#"{"total_count":0,"workflow_runs":[]}"#)
        .create_async()
        .await;

    let client = GitHubClient::new(&server.url(), "test-token")
        .unwrap()
        .with_retry_delay(Duration::from_millis(1));
    let repo = RepoRef::parse("acme/app").unwrap();
    let ctx = collect(&client, &repo, &CollectOptions::default())
        .await
        .unwrap();

    assert_eq!(ctx.workflow_files.len(), 1);
    assert_eq!(ctx.workflow_files[0].path, ".github/workflows/node-ci.yml");
    assert_eq!(ctx.metadata.as_ref().unwrap().default_branch, "main");
    assert_eq!(ctx.activity.source, ActivitySource::Default);
    assert!((ctx.activity.runs_per_month - 216.5).abs() < 1e-9);

    let prompt = PromptBuilder::default().build(&ctx);
    assert!(prompt.contains("acme/app"));
    assert!(prompt.contains("TypeScript"));
    assert!(prompt.contains(" 20|         run: npm ci"));
}

#[tokio::test]
async fn test_collect_rejects_unknown_workflow_filter() {
    let mut server = mockito::Server::new_async().await;
    let _user = server
        .mock("GET", "/user")
        .with_status(200)
        .with_body(r#"{"login":"octocat"}"#)
        .create_async()
        .await;
    let _repo = server
        .mock("GET", "/repos/acme/app")
        .with_status(200)
        .with_body(r#"{"name":"app","full_name":"acme/app","language":null,"default_branch":"main"}"#)
        .create_async()
        .await;
    let _workflows = server
        .mock("GET", "/repos/acme/app/actions/workflows")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"total_count":1,"workflows":[{"id":1,"name":"CI","path":".github/workflows/node-ci.yml"}]}"#,
        )
        .create_async()
        .await;

    let client = GitHubClient::new(&server.url(), "test-token").unwrap();
    let options = CollectOptions {
        workflow_filter: vec!["node-cl.yml".to_string()],
        ..CollectOptions::default()
    };
    let err = collect(&client, &RepoRef::parse("acme/app").unwrap(), &options)
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("did you mean 'node-ci.yml'"), "{}", message);
}

#[tokio::test]
async fn test_open_pull_request_against_mock_github() {
    let ctx = context(vec![parse_fixture("python-ci.yml")]);
    let recs = fallback::analyze(&ctx.workflow_files, ctx.activity.runs_per_month);
    let selected = optimizer::select_for_apply(&recs, PriorityFilter::High, 0.7);
    let plans = optimizer::plan_patches(&ctx, &selected);
    let PatchPlan::Patch(patch) = &plans[0] else {
        panic!("expected a patch: {:?}", plans[0]);
    };

    let mut server = mockito::Server::new_async().await;
    let _head = server
        .mock("GET", "/repos/acme/app/git/ref/heads/main")
        .with_status(200)
        .with_body(r#"{"ref":"refs/heads/main","object":{"sha":"base123","type":"commit"}}"#)
        .create_async()
        .await;
    let branch = server
        .mock("POST", "/repos/acme/app/git/refs")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "ref": format!("refs/heads/{}", patch.branch),
            "sha": "base123",
        })))
        .with_status(201)
        .with_body(r#"{"ref":"refs/heads/x","object":{"sha":"base123"}}"#)
        .create_async()
        .await;
    let _current = server
        .mock("GET", "/repos/acme/app/contents/.github/workflows/python-ci.yml")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(
            serde_json::json!({
                "sha": "blob1",
                "encoding": "base64",
                "content": encoded(&patch.original),
            })
            .to_string(),
        )
        .create_async()
        .await;
    let update = server
        .mock("PUT", "/repos/acme/app/contents/.github/workflows/python-ci.yml")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "sha": "blob1",
            "branch": patch.branch,
            "content": encoded(&patch.patched),
        })))
        .with_status(200)
        .with_body(r#"{"commit":{"sha":"c1"}}"#)
        .create_async()
        .await;
    let pulls = server
        .mock("POST", "/repos/acme/app/pulls")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "head": patch.branch,
            "base": "main",
        })))
        .with_status(201)
        .with_body(r#"{"number":42,"html_url":"https://github.com/acme/app/pull/42"}"#)
        .create_async()
        .await;

    let client = GitHubClient::new(&server.url(), "test-token").unwrap();
    let pr = optimizer::open_pull_request(&client, &ctx.repo, "main", patch)
        .await
        .unwrap();
    assert_eq!(pr.number, 42);

    branch.assert_async().await;
    update.assert_async().await;
    pulls.assert_async().await;
}
