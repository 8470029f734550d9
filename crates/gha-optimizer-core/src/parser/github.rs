use crate::error::{OptimizerError, Result};
use crate::parser::model::*;
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Parser for GitHub Actions workflow YAML documents.
pub struct GitHubActionsParser;

impl GitHubActionsParser {
    /// Parse GitHub Actions YAML content into a [`WorkflowFile`].
    ///
    /// Pure: no I/O. A document that is not a mapping or has no `jobs` mapping is
    /// rejected; individual malformed jobs are skipped.
    pub fn parse(content: &str, path: &str) -> Result<WorkflowFile> {
        let yaml: Value = serde_yaml::from_str(content).map_err(|e| OptimizerError::Yaml {
            path: path.to_string(),
            message: e.to_string(),
        })?;

        if !yaml.is_mapping() {
            return Err(OptimizerError::Yaml {
                path: path.to_string(),
                message: "workflow document is not a mapping".to_string(),
            });
        }

        let name = yaml
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("Unnamed Workflow")
            .to_string();

        let jobs_map = yaml
            .get("jobs")
            .and_then(|v| v.as_mapping())
            .ok_or_else(|| OptimizerError::Yaml {
                path: path.to_string(),
                message: "no 'jobs' section found".to_string(),
            })?;

        let mut jobs = Vec::new();
        for (job_id, job_config) in jobs_map {
            let Some(job_id) = job_id.as_str() else {
                continue;
            };
            if !job_config.is_mapping() {
                log::debug!("Skipping job '{}' in {}: not a mapping", job_id, path);
                continue;
            }
            jobs.push(Self::parse_job(job_id, job_config));
        }

        Ok(WorkflowFile {
            path: path.to_string(),
            raw_yaml: content.to_string(),
            name,
            triggers: Self::parse_triggers(&yaml),
            jobs,
        })
    }

    fn parse_triggers(yaml: &Value) -> Vec<WorkflowTrigger> {
        let on = match yaml.get("on") {
            Some(v) => v,
            None => return Vec::new(),
        };

        let bare = |event: &str| WorkflowTrigger {
            event: event.to_string(),
            branches: Vec::new(),
            paths: Vec::new(),
        };

        match on {
            Value::String(event) => vec![bare(event)],
            Value::Sequence(events) => events.iter().filter_map(|e| e.as_str()).map(bare).collect(),
            Value::Mapping(map) => map
                .iter()
                .filter_map(|(event, config)| {
                    let event = event.as_str()?;
                    Some(WorkflowTrigger {
                        event: event.to_string(),
                        branches: string_list(config.get("branches")),
                        paths: string_list(config.get("paths")),
                    })
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn parse_job(job_id: &str, config: &Value) -> Job {
        let mut job = Job::new(job_id.to_string());

        match config.get("runs-on") {
            Some(Value::String(label)) => job.runs_on = label.clone(),
            Some(Value::Sequence(labels)) => {
                let labels: Vec<&str> = labels.iter().filter_map(|l| l.as_str()).collect();
                if !labels.is_empty() {
                    job.runs_on = labels.join(",");
                }
            }
            _ => {}
        }

        if let Some(needs) = config.get("needs") {
            job.needs = Self::parse_needs(needs);
        }

        if let Some(cond) = config.get("if").and_then(|v| v.as_str()) {
            job.condition = Some(cond.to_string());
        }

        job.has_matrix = config
            .get("strategy")
            .and_then(|s| s.get("matrix"))
            .is_some();

        if let Some(steps) = config.get("steps").and_then(|v| v.as_sequence()) {
            job.steps = steps.iter().map(Self::parse_step).collect();
        }

        job
    }

    fn parse_needs(needs: &Value) -> BTreeSet<String> {
        match needs {
            Value::String(s) => BTreeSet::from([s.clone()]),
            Value::Sequence(seq) => seq
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => BTreeSet::new(),
        }
    }

    fn parse_step(step: &Value) -> Step {
        let uses = step.get("uses").and_then(|v| v.as_str()).map(String::from);
        let run = step.get("run").and_then(|v| v.as_str()).map(String::from);

        let name = step
            .get("name")
            .and_then(|v| v.as_str())
            .map(String::from)
            .or_else(|| uses.clone())
            .or_else(|| run.as_ref().and_then(|r| r.lines().next()).map(|l| l.trim().to_string()))
            .unwrap_or_else(|| "Unnamed step".to_string());

        let mut with = BTreeMap::new();
        if let Some(inputs) = step.get("with").and_then(|v| v.as_mapping()) {
            for (k, v) in inputs {
                let Some(key) = k.as_str() else { continue };
                let value = match v {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => continue,
                };
                with.insert(key.to_string(), value);
            }
        }

        Step {
            name,
            uses,
            run,
            with,
        }
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}
