use crate::analyzer::report::{format_minutes, format_usd, Priority, ScanReport};

pub fn format_markdown_report(report: &ScanReport, include_code_examples: bool) -> String {
    let mut md = String::new();

    md.push_str(&format!(
        "# GitHub Actions Optimization Report: {}\n\n",
        report.repository
    ));
    md.push_str(&format!(
        "_Generated {} by gha-optimizer v{}_\n\n",
        report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        report.generator_version
    ));

    if report.provenance.is_fallback() {
        md.push_str(&format!("> **Note:** {}\n\n", report.provenance.describe()));
    } else {
        md.push_str(&format!("Source: {}\n\n", report.provenance.describe()));
    }

    md.push_str("## Summary\n\n");
    md.push_str(&format!(
        "| Metric | Value |\n|--------|-------|\n| Workflows analyzed | {} |\n| Runs observed | {} in {} days |\n| Estimated runs/month | {:.1} |\n| Recommendations | {} |\n| Potential monthly savings | {} |\n| Time saved per run | {} |\n\n",
        report.workflow_count,
        report.runs_observed,
        report.analysis_days,
        report.runs_per_month,
        report.recommendations.len(),
        format_usd(report.total_monthly_savings()),
        format_minutes(report.total_time_minutes()),
    ));

    if report.recommendations.is_empty() {
        md.push_str("No optimization opportunities found.\n");
        return md;
    }

    md.push_str("## Recommendations\n\n");
    md.push_str("| Priority | Recommendation | Workflow | Time/run | Monthly savings | Confidence |\n");
    md.push_str("|----------|----------------|----------|----------|-----------------|------------|\n");
    for rec in &report.recommendations {
        md.push_str(&format!(
            "| {} | {} | `{}` | {} | {} | {:.0}% |\n",
            priority_label(rec.priority),
            escape_cell(&rec.title),
            rec.location(),
            format_minutes(rec.impact_time_minutes),
            format_usd(rec.monthly_cost_savings),
            rec.confidence_score * 100.0,
        ));
    }
    md.push('\n');

    md.push_str("### Details\n\n");
    for (i, rec) in report.recommendations.iter().enumerate() {
        md.push_str(&format!(
            "#### {}. {} ({})\n\n",
            i + 1,
            rec.title,
            rec.priority.symbol()
        ));
        md.push_str(&format!(
            "- **Type:** {}\n- **Location:** `{}`, job `{}`\n- **Effort:** {}\n\n",
            rec.kind,
            rec.location(),
            rec.job_name,
            rec.implementation_effort
        ));
        if !rec.description.is_empty() {
            md.push_str(&format!("{}\n\n", rec.description));
        }
        if !rec.implementation.is_empty() {
            md.push_str(&format!("**Implementation:** {}\n\n", rec.implementation));
        }
        if include_code_examples && !rec.code_example.trim().is_empty() {
            md.push_str(&format!("```yaml\n{}\n```\n\n", rec.code_example.trim_end()));
        }
    }

    md
}

fn priority_label(priority: Priority) -> &'static str {
    match priority {
        Priority::Critical => "🔴 CRITICAL",
        Priority::High => "🟡 HIGH",
        Priority::Medium => "🔵 MEDIUM",
        Priority::Low => "⚪ LOW",
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
