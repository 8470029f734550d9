use crate::analyzer::report::{format_minutes, format_usd, Priority, Recommendation, ScanReport};

/// Generate a self-contained HTML report.
///
/// All recommendation text comes from an LLM and is escaped.
pub fn generate_html_report(report: &ScanReport, include_code_examples: bool) -> String {
    let cards: String = report
        .recommendations
        .iter()
        .enumerate()
        .map(|(i, rec)| recommendation_card(i + 1, rec, include_code_examples))
        .collect();

    let body = if report.recommendations.is_empty() {
        r#"<p class="empty">No optimization opportunities found.</p>"#.to_string()
    } else {
        cards
    };

    let provenance_class = if report.provenance.is_fallback() {
        "notice fallback"
    } else {
        "notice"
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>gha-optimizer report - {repository}</title>
    <style>
        * {{ margin: 0; padding: 0; box-sizing: border-box; }}
        :root {{
            --bg-primary: #ffffff;
            --bg-secondary: #f8fafc;
            --text-primary: #1e293b;
            --text-secondary: #64748b;
            --border-color: #e2e8f0;
            --accent-color: #3b82f6;
            --success-color: #22c55e;
            --warning-color: #f59e0b;
            --danger-color: #ef4444;
        }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Ubuntu, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            line-height: 1.6;
            padding: 2rem;
        }}
        .container {{ max-width: 1100px; margin: 0 auto; }}
        .header {{ margin-bottom: 1.5rem; padding-bottom: 1rem; border-bottom: 2px solid var(--border-color); }}
        .header h1 {{ font-size: 1.8rem; }}
        .meta {{ color: var(--text-secondary); font-size: 0.9rem; }}
        .notice {{ padding: 0.75rem 1rem; border-radius: 6px; background: var(--bg-secondary); margin-bottom: 1.5rem; }}
        .notice.fallback {{ border-left: 4px solid var(--warning-color); }}
        .stats {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(180px, 1fr)); gap: 1rem; margin-bottom: 2rem; }}
        .stat {{ background: var(--bg-secondary); border: 1px solid var(--border-color); border-radius: 8px; padding: 1rem; }}
        .stat .value {{ font-size: 1.5rem; font-weight: 700; }}
        .stat .label {{ color: var(--text-secondary); font-size: 0.85rem; }}
        .card {{ border: 1px solid var(--border-color); border-radius: 8px; padding: 1.25rem; margin-bottom: 1rem; }}
        .card h3 {{ font-size: 1.1rem; margin-bottom: 0.5rem; }}
        .badge {{ display: inline-block; padding: 0.1rem 0.5rem; border-radius: 4px; font-size: 0.75rem; font-weight: 600; color: #fff; margin-right: 0.5rem; }}
        .badge.critical {{ background: var(--danger-color); }}
        .badge.high {{ background: var(--warning-color); }}
        .badge.medium {{ background: var(--accent-color); }}
        .badge.low {{ background: var(--text-secondary); }}
        .kind {{ color: var(--text-secondary); font-size: 0.85rem; }}
        .impact {{ display: flex; gap: 1.5rem; margin: 0.75rem 0; font-size: 0.9rem; }}
        .impact strong {{ color: var(--success-color); }}
        pre {{ background: #0f172a; color: #e2e8f0; padding: 1rem; border-radius: 6px; overflow-x: auto; font-size: 0.85rem; }}
        .empty {{ color: var(--text-secondary); }}
    </style>
</head>
<body>
<div class="container">
    <div class="header">
        <h1>GitHub Actions Optimization Report</h1>
        <div class="meta">{repository} &middot; generated {generated_at} by gha-optimizer v{version}</div>
    </div>
    <div class="{provenance_class}">{provenance}</div>
    <div class="stats">
        <div class="stat"><div class="value">{total}</div><div class="label">Recommendations</div></div>
        <div class="stat"><div class="value">{savings}</div><div class="label">Potential monthly savings</div></div>
        <div class="stat"><div class="value">{time}</div><div class="label">Time saved per run</div></div>
        <div class="stat"><div class="value">{runs_per_month:.1}</div><div class="label">Runs per month ({workflows} workflows)</div></div>
    </div>
    {body}
</div>
</body>
</html>
"#,
        repository = escape_html(&report.repository),
        generated_at = report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        version = escape_html(&report.generator_version),
        provenance_class = provenance_class,
        provenance = escape_html(&report.provenance.describe()),
        total = report.recommendations.len(),
        savings = format_usd(report.total_monthly_savings()),
        time = format_minutes(report.total_time_minutes()),
        runs_per_month = report.runs_per_month,
        workflows = report.workflow_count,
        body = body,
    )
}

fn recommendation_card(index: usize, rec: &Recommendation, include_code_examples: bool) -> String {
    let code = if include_code_examples && !rec.code_example.trim().is_empty() {
        format!("<pre><code>{}</code></pre>", escape_html(&rec.code_example))
    } else {
        String::new()
    };
    let implementation = if rec.implementation.trim().is_empty() {
        String::new()
    } else {
        format!(
            "<p><em>Implementation:</em> {}</p>",
            escape_html(&rec.implementation)
        )
    };

    format!(
        r#"
    <div class="card">
        <h3>{index}. <span class="badge {priority_class}">{priority}</span>{title}</h3>
        <div class="kind">{kind} &middot; {location} &middot; job <code>{job}</code></div>
        <p>{description}</p>
        <div class="impact">
            <span>Time saved: <strong>{time}</strong></span>
            <span>Monthly savings: <strong>{savings}</strong></span>
            <span>Confidence: {confidence:.0}%</span>
            <span>Effort: {effort}</span>
        </div>
        {implementation}
        {code}
    </div>"#,
        index = index,
        priority_class = priority_class(rec.priority),
        priority = rec.priority.symbol(),
        title = escape_html(&rec.title),
        kind = rec.kind,
        location = escape_html(&rec.location()),
        job = escape_html(&rec.job_name),
        description = escape_html(&rec.description),
        time = format_minutes(rec.impact_time_minutes),
        savings = format_usd(rec.monthly_cost_savings),
        confidence = rec.confidence_score * 100.0,
        effort = rec.implementation_effort,
        implementation = implementation,
        code = code,
    )
}

fn priority_class(priority: Priority) -> &'static str {
    priority.as_str()
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
