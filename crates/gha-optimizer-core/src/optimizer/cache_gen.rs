use crate::analyzer::fallback::DependencyPattern;

/// Step lines inserted for a pattern, relative to the step list indentation.
fn step_lines(pattern: DependencyPattern) -> &'static [&'static str] {
    match pattern {
        DependencyPattern::Npm => &[
            "- name: Cache npm dependencies",
            "  uses: actions/cache@v4",
            "  with:",
            "    path: ~/.npm",
            "    key: ${{ runner.os }}-node-${{ hashFiles('**/package-lock.json') }}",
            "    restore-keys: |",
            "      ${{ runner.os }}-node-",
        ],
        DependencyPattern::Pip => &[
            "- name: Cache pip packages",
            "  uses: actions/cache@v4",
            "  with:",
            "    path: ~/.cache/pip",
            "    key: ${{ runner.os }}-pip-${{ hashFiles('**/requirements*.txt') }}",
            "    restore-keys: |",
            "      ${{ runner.os }}-pip-",
        ],
        DependencyPattern::Docker => &[
            "- name: Set up Docker Buildx",
            "  uses: docker/setup-buildx-action@v3",
        ],
    }
}

/// YAML snippet of the step that fixes `pattern`.
pub fn code_example(pattern: DependencyPattern) -> String {
    step_lines(pattern).join("\n")
}

/// Insert the caching step for `pattern` directly before the first matching step of
/// `job_name`. Everything else in the document is kept byte for byte, including CRLF
/// line endings.
///
/// Returns `None` when the job or a matching step cannot be located.
pub fn insert_cache_step(raw_yaml: &str, job_name: &str, pattern: DependencyPattern) -> Option<String> {
    let lines: Vec<&str> = raw_yaml.lines().collect();
    let job = find_job_block(&lines, job_name)?;
    let target = find_pattern_line(&lines, &job, pattern)?;
    let step_indent = job.step_indent?;

    let step_start = (job.start..=target)
        .rev()
        .find(|&i| indent_of(lines[i]) == step_indent && lines[i].trim_start().starts_with('-'))?;

    let pad = " ".repeat(step_indent);
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 8);
    out.extend(lines[..step_start].iter().map(|l| l.to_string()));
    out.extend(step_lines(pattern).iter().map(|l| format!("{}{}", pad, l)));
    out.extend(lines[step_start..].iter().map(|l| l.to_string()));

    let newline = if raw_yaml.contains("\r\n") { "\r\n" } else { "\n" };
    let mut patched = out.join(newline);
    if raw_yaml.ends_with('\n') {
        patched.push_str(newline);
    }
    Some(patched)
}

/// 1-based line of the first command matching `pattern` inside `job_name`.
pub fn locate_pattern_line(raw_yaml: &str, job_name: &str, pattern: DependencyPattern) -> Option<u32> {
    let lines: Vec<&str> = raw_yaml.lines().collect();
    let job = find_job_block(&lines, job_name)?;
    let index = find_pattern_line(&lines, &job, pattern)?;
    u32::try_from(index + 1).ok()
}

struct JobBlock {
    /// Line of the `<job>:` key.
    start: usize,
    /// One past the last line of the job.
    end: usize,
    step_indent: Option<usize>,
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn is_content(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

fn is_key(line: &str, key: &str) -> bool {
    let trimmed = line.trim();
    let unquoted = trimmed
        .strip_prefix(key)
        .or_else(|| trimmed.strip_prefix(&format!("\"{}\"", key)))
        .or_else(|| trimmed.strip_prefix(&format!("'{}'", key)));
    matches!(unquoted, Some(rest) if rest.starts_with(':'))
}

fn find_job_block(lines: &[&str], job_name: &str) -> Option<JobBlock> {
    let jobs_line = lines
        .iter()
        .position(|l| indent_of(l) == 0 && is_key(l, "jobs"))?;
    let job_indent = lines[jobs_line + 1..]
        .iter()
        .find(|l| is_content(l))
        .map(|l| indent_of(l))
        .filter(|&i| i > 0)?;

    let mut start = None;
    for (i, line) in lines.iter().enumerate().skip(jobs_line + 1) {
        if !is_content(line) {
            continue;
        }
        let indent = indent_of(line);
        if indent < job_indent {
            break;
        }
        if indent == job_indent && is_key(line, job_name) {
            start = Some(i);
            break;
        }
    }
    let start = start?;

    let end = lines
        .iter()
        .enumerate()
        .skip(start + 1)
        .find(|(_, l)| is_content(l) && indent_of(l) <= job_indent)
        .map(|(i, _)| i)
        .unwrap_or(lines.len());

    let step_indent = (start + 1..end)
        .find(|&i| is_key(lines[i], "steps"))
        .and_then(|steps| {
            lines[steps + 1..end]
                .iter()
                .find(|l| is_content(l))
                .filter(|l| l.trim_start().starts_with('-'))
                .map(|l| indent_of(l))
        });

    Some(JobBlock {
        start,
        end,
        step_indent,
    })
}

fn find_pattern_line(lines: &[&str], job: &JobBlock, pattern: DependencyPattern) -> Option<usize> {
    (job.start + 1..job.end)
        .find(|&i| is_content(lines[i]) && pattern.matches_command(&lines[i].to_lowercase()))
}
