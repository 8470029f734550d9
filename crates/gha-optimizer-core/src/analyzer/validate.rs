use crate::analyzer::report::{Effort, Priority, Recommendation, RecommendationType};
use serde_json::{Map, Value};

const DEFAULT_CONFIDENCE: f64 = 0.5;
const UNKNOWN: &str = "unknown";

/// Convert untrusted recommendation mappings into canonical [`Recommendation`]s.
///
/// Never fails. Entries that are not objects, or that lack `title`, `type` or
/// `priority`, are dropped; every other field is coerced into range or defaulted.
/// Input order is preserved among kept entries, and running this on the serialized
/// output yields the same records.
pub fn validate_recommendations(raw: &[Value]) -> Vec<Recommendation> {
    let mut kept = Vec::with_capacity(raw.len());
    for (index, entry) in raw.iter().enumerate() {
        match validate_one(entry) {
            Ok(rec) => kept.push(rec),
            Err(reason) => log::warn!("Dropping recommendation #{}: {}", index + 1, reason),
        }
    }
    if kept.len() < raw.len() {
        log::info!(
            "Kept {} of {} recommendations after validation",
            kept.len(),
            raw.len()
        );
    }
    kept
}

fn validate_one(entry: &Value) -> Result<Recommendation, &'static str> {
    let obj = entry.as_object().ok_or("entry is not an object")?;

    let title = text(obj, "title")
        .filter(|s| !s.trim().is_empty())
        .ok_or("missing or empty 'title'")?;
    let kind = present(obj, "type").ok_or("missing 'type'")?;
    let priority = present(obj, "priority").ok_or("missing 'priority'")?;

    let kind = normalized(kind)
        .and_then(|s| RecommendationType::from_normalized(&s))
        .unwrap_or(RecommendationType::Other);
    let priority = normalized(priority)
        .and_then(|s| Priority::from_normalized(&s))
        .unwrap_or(Priority::Medium);
    let implementation_effort = present(obj, "implementation_effort")
        .and_then(normalized)
        .and_then(|s| Effort::from_normalized(&s))
        .unwrap_or(Effort::Medium);

    let workflow_file = text(obj, "workflow_file")
        .or_else(|| text(obj, "workflow"))
        .unwrap_or_else(|| UNKNOWN.to_string());

    Ok(Recommendation {
        title,
        kind,
        priority,
        workflow_file,
        job_name: text(obj, "job_name").unwrap_or_else(|| UNKNOWN.to_string()),
        line_number: present(obj, "line_number").and_then(line_number),
        description: text(obj, "description").unwrap_or_default(),
        impact_time_minutes: non_negative(obj.get("impact_time_minutes")),
        monthly_cost_savings: non_negative(obj.get("monthly_cost_savings")),
        confidence_score: number(obj.get("confidence_score"))
            .unwrap_or(DEFAULT_CONFIDENCE)
            .clamp(0.0, 1.0),
        implementation_effort,
        implementation: text(obj, "implementation").unwrap_or_default(),
        code_example: text(obj, "code_example").unwrap_or_default(),
    })
}

fn present<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

/// Lower-cased, trimmed enum label with `_` treated as `-`. Non-strings yield `None`.
fn normalized(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(|s| s.trim().to_lowercase().replace('_', "-"))
}

fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A finite number from a JSON number or numeric string.
fn number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn non_negative(value: Option<&Value>) -> f64 {
    match number(value) {
        Some(n) if n > 0.0 => n,
        _ => 0.0,
    }
}

fn line_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
    .filter(|n| *n > 0)
}
