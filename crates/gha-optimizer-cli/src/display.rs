use colored::*;
use gha_optimizer_core::analyzer::report::{format_minutes, format_usd};
use gha_optimizer_core::optimizer::PatchPlan;
use gha_optimizer_core::providers::github_api::PullRequest;
use gha_optimizer_core::{Priority, Recommendation, ScanReport};
use similar::{ChangeTag, TextDiff};

/// Print a scan report to the terminal.
pub fn print_scan_report(report: &ScanReport) {
    println!();
    println!(
        "{}",
        format!(
            " gha-optimizer v{} - Analyzing {}",
            report.generator_version, report.repository
        )
        .bold()
    );
    println!();

    println!(" {}", "Repository Activity".bold().underline());
    println!(
        " {} {} workflows analyzed",
        "|-".dimmed(),
        report.workflow_count
    );
    println!(
        " {} {} runs in the last {} days ({:.1} runs/month)",
        "|-".dimmed(),
        report.runs_observed,
        report.analysis_days,
        report.runs_per_month
    );
    if report.provenance.is_fallback() {
        println!(
            " {} {}",
            "!!".yellow().bold(),
            report.provenance.describe().yellow()
        );
    } else {
        println!(" {} {}", "|-".dimmed(), report.provenance.describe().cyan());
    }
    println!();

    println!(" {}", "=".repeat(60).dimmed());
    println!();

    if report.recommendations.is_empty() {
        println!(
            " {} No optimization opportunities found. Your workflows look good!",
            "OK".green().bold()
        );
    } else {
        for (i, rec) in report.recommendations.iter().enumerate() {
            print_recommendation(i + 1, rec);
            println!();
        }
    }

    println!(" {}", "=".repeat(60).dimmed());
    println!();

    println!(" {}", "Summary".bold().underline());
    println!(
        " {} Potential monthly savings:  {}",
        "|-".dimmed(),
        format_usd(report.total_monthly_savings()).green().bold()
    );
    println!(
        " {} Time saved per run:         {}",
        "|-".dimmed(),
        format_minutes(report.total_time_minutes()).green()
    );

    let critical = report.count(Priority::Critical);
    let high = report.count(Priority::High);
    println!(
        " {} Recommendations: {} critical, {} high, {} medium, {} low",
        "|-".dimmed(),
        if critical > 0 {
            critical.to_string().red().bold().to_string()
        } else {
            "0".to_string()
        },
        if high > 0 {
            high.to_string().yellow().bold().to_string()
        } else {
            "0".to_string()
        },
        report.count(Priority::Medium),
        report.count(Priority::Low),
    );
    println!();

    if !report.recommendations.is_empty() {
        println!(
            " Run {} to open pull requests for the automatic fixes",
            format!("gha-optimizer apply {}", report.repository).cyan()
        );
        println!();
    }
}

fn print_recommendation(index: usize, rec: &Recommendation) {
    let tag = format!(" {} ", rec.priority.symbol());
    let tag = match rec.priority {
        Priority::Critical => tag.on_red().white().bold().to_string(),
        Priority::High => tag.on_yellow().black().bold().to_string(),
        Priority::Medium => tag.on_blue().white().bold().to_string(),
        Priority::Low => tag.dimmed().to_string(),
    };

    println!(" {} {}. {}", tag, index, rec.title.bold());
    println!(
        "   {} {} in {} (job {})",
        "|".dimmed(),
        rec.kind,
        rec.location().cyan(),
        rec.job_name
    );
    if !rec.description.is_empty() {
        println!("   {} {}", "|".dimmed(), rec.description);
    }
    println!(
        "   {} Saves {}/run, {} per month | Confidence: {:.0}% | Effort: {}",
        "|".dimmed(),
        format_minutes(rec.impact_time_minutes).green(),
        format_usd(rec.monthly_cost_savings).green(),
        rec.confidence_score * 100.0,
        rec.implementation_effort
    );
    if !rec.implementation.is_empty() {
        println!("   {} {}", "|".dimmed(), rec.implementation.dimmed());
    }
}

/// Print a unified diff of one workflow patch.
pub fn print_diff(original: &str, patched: &str, filename: &str, branch: &str) {
    println!();
    println!(
        "{}",
        format!(" Diff for {} (branch {})", filename, branch).bold()
    );
    println!();

    let diff = TextDiff::from_lines(original, patched);
    let mut has_changes = false;

    for group in diff.grouped_ops(3) {
        for op in &group {
            for change in diff.iter_changes(op) {
                match change.tag() {
                    ChangeTag::Delete => {
                        has_changes = true;
                        print!("{}", format!("- {}", change).red());
                    }
                    ChangeTag::Insert => {
                        has_changes = true;
                        print!("{}", format!("+ {}", change).green());
                    }
                    ChangeTag::Equal => {
                        print!("  {}", change);
                    }
                }
            }
        }
        println!("{}", "  ...".dimmed());
    }

    if !has_changes {
        println!(" {}", "No changes for this workflow.".dimmed());
    }
    println!();
}

/// Summarize what `apply` did, or would do in a dry run.
pub fn print_apply_summary(plans: &[PatchPlan], opened: &[PullRequest], dry_run: bool) {
    println!(" {}", "Apply Summary".bold().underline());

    let patches = plans
        .iter()
        .filter(|p| matches!(p, PatchPlan::Patch(_)))
        .count();

    if plans.is_empty() {
        println!(
            " {} No recommendations matched the selected priority and confidence threshold.",
            "|-".dimmed()
        );
        println!();
        return;
    }

    if dry_run {
        println!(
            " {} {} automatic fixes would be opened as pull requests (dry run)",
            "|-".dimmed(),
            patches.to_string().bold()
        );
    } else {
        println!(
            " {} {} pull requests opened",
            "|-".dimmed(),
            opened.len().to_string().green().bold()
        );
        for pr in opened {
            println!("   {} #{} {}", "|".dimmed(), pr.number, pr.html_url.cyan());
        }
    }

    let manual: Vec<_> = plans
        .iter()
        .filter_map(|p| match p {
            PatchPlan::Manual {
                recommendation,
                reason,
            } => Some((recommendation, reason)),
            PatchPlan::Patch(_) => None,
        })
        .collect();
    if !manual.is_empty() {
        println!(
            " {} {} recommendations need manual changes:",
            "|-".dimmed(),
            manual.len().to_string().yellow().bold()
        );
        for (rec, reason) in manual {
            println!(
                "   {} {} ({}): {}",
                "|".dimmed(),
                rec.title,
                rec.location(),
                reason.dimmed()
            );
        }
    }
    println!();
}
