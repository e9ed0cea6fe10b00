//! Target schema for generated suites: the format instructions embedded in
//! prompts, raw-output cleanup, and field-by-field validation.
//!
//! Validation reports the first violation with an exact field path so the
//! repair prompt can quote a precise correction.

use serde_json::Value;

use crate::error::SchemaViolation;
use crate::models::{CaseKind, TestCase};

/// Status value a model may set when the retrieved context is insufficient.
pub const STATUS_MISSING_INFO: &str = "missing_info";

/// JSON shape the generator is instructed to produce. Embedded verbatim in
/// the generation prompt.
pub const FORMAT_INSTRUCTIONS: &str = r#"Respond with a single JSON object and nothing else. Shape:

{
  "status": "ok" | "missing_info",
  "missing_info_questions": ["question for the requirements author", ...],
  "test_cases": [
    {
      "title": "short descriptive name",
      "goal": "what this case verifies",
      "preconditions": "state required before execution",
      "test_data": "input values, or null",
      "steps": ["numbered action", ...],
      "expected_results": "observable outcome that passes the case",
      "type": "positive" | "negative" | "boundary",
      "negative_cases": ["related failure scenario", ...],
      "boundary_cases": ["related edge value", ...]
    }
  ]
}

Rules:
- "test_cases" must contain at least one case unless "status" is "missing_info".
- "title", "goal", "preconditions", "expected_results" must be non-empty strings.
- "steps" must be a non-empty array of non-empty strings.
- "type" must be exactly one of: positive, negative, boundary.
- If the context does not contain enough information, set "status" to
  "missing_info", leave "test_cases" empty, and list the questions you would
  ask in "missing_info_questions". Do not invent requirements."#;

/// A suite payload that passed schema validation.
#[derive(Debug, Clone)]
pub struct ValidatedPayload {
    pub cases: Vec<TestCase>,
    pub status: Option<String>,
    pub missing_info_questions: Vec<String>,
}

/// Parse one raw model output into a validated payload.
///
/// Tolerates the usual model noise (reasoning tags, prose around the JSON,
/// fenced code blocks) but is strict about the schema itself.
pub fn parse_and_validate(raw: &str) -> Result<ValidatedPayload, SchemaViolation> {
    let cleaned = clean_output(raw);
    let value: Value = serde_json::from_str(&cleaned).map_err(|e| {
        SchemaViolation::new("$", "a valid JSON object", format!("JSON parse error: {e}"))
    })?;

    validate(&value)
}

/// Strip reasoning tags and surrounding prose, leaving the outermost JSON
/// object. Models fond of chain-of-thought wrap their answer in
/// `<think>...</think>`; others add markdown fences or a lead-in sentence.
fn clean_output(raw: &str) -> String {
    let mut text = raw;
    if let Some(start) = text.find("<think>") {
        if let Some(end) = text.find("</think>") {
            if end > start {
                return clean_output(&format!("{}{}", &text[..start], &text[end + 8..]));
            }
        }
        text = &text[..start];
    }

    let open = match text.find('{') {
        Some(i) => i,
        None => return text.trim().to_string(),
    };
    let close = match text.rfind('}') {
        Some(i) if i > open => i,
        _ => return text.trim().to_string(),
    };
    text[open..=close].to_string()
}

fn validate(value: &Value) -> Result<ValidatedPayload, SchemaViolation> {
    let root = value
        .as_object()
        .ok_or_else(|| SchemaViolation::new("$", "a JSON object", "found a non-object value"))?;

    let status = match root.get("status") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            return Err(SchemaViolation::new(
                "status",
                "a string or null",
                format!("found {}", type_name(other)),
            ))
        }
    };

    let missing_info_questions =
        optional_string_array(root.get("missing_info_questions"), "missing_info_questions")?;

    let raw_cases = root
        .get("test_cases")
        .ok_or_else(|| {
            SchemaViolation::new("test_cases", "an array of test cases", "field is missing")
        })?
        .as_array()
        .ok_or_else(|| {
            SchemaViolation::new("test_cases", "an array of test cases", "found a non-array")
        })?;

    let missing_info = status.as_deref() == Some(STATUS_MISSING_INFO);
    if raw_cases.is_empty() && !missing_info {
        return Err(SchemaViolation::new(
            "test_cases",
            "at least one test case",
            "array is empty and status is not missing_info",
        ));
    }

    let mut cases = Vec::with_capacity(raw_cases.len());
    for (i, case) in raw_cases.iter().enumerate() {
        cases.push(validate_case(case, i)?);
    }

    Ok(ValidatedPayload {
        cases,
        status,
        missing_info_questions,
    })
}

fn validate_case(value: &Value, index: usize) -> Result<TestCase, SchemaViolation> {
    let path = |field: &str| format!("test_cases[{index}].{field}");

    let obj = value.as_object().ok_or_else(|| {
        SchemaViolation::new(
            format!("test_cases[{index}]"),
            "a test-case object",
            format!("found {}", type_name(value)),
        )
    })?;

    let title = required_string(obj.get("title"), &path("title"))?;
    let goal = required_string(obj.get("goal"), &path("goal"))?;
    let preconditions = required_string(obj.get("preconditions"), &path("preconditions"))?;
    let expected_results = required_string(obj.get("expected_results"), &path("expected_results"))?;

    let test_data = match obj.get("test_data") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            return Err(SchemaViolation::new(
                path("test_data"),
                "a string or null",
                format!("found {}", type_name(other)),
            ))
        }
    };

    let steps = required_string_array(obj.get("steps"), &path("steps"))?;

    let kind_str = required_string(obj.get("type"), &path("type"))?;
    let kind = match kind_str.as_str() {
        "positive" => CaseKind::Positive,
        "negative" => CaseKind::Negative,
        "boundary" => CaseKind::Boundary,
        other => {
            return Err(SchemaViolation::new(
                path("type"),
                "one of: positive, negative, boundary",
                format!("found \"{other}\""),
            ))
        }
    };

    let negative_cases = optional_string_array(obj.get("negative_cases"), &path("negative_cases"))?;
    let boundary_cases = optional_string_array(obj.get("boundary_cases"), &path("boundary_cases"))?;

    Ok(TestCase {
        title,
        goal,
        preconditions,
        test_data,
        steps,
        expected_results,
        kind,
        negative_cases,
        boundary_cases,
    })
}

fn required_string(value: Option<&Value>, path: &str) -> Result<String, SchemaViolation> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(SchemaViolation::new(
            path,
            "a non-empty string",
            "string is empty",
        )),
        Some(other) => Err(SchemaViolation::new(
            path,
            "a non-empty string",
            format!("found {}", type_name(other)),
        )),
        None => Err(SchemaViolation::new(
            path,
            "a non-empty string",
            "field is missing",
        )),
    }
}

fn required_string_array(value: Option<&Value>, path: &str) -> Result<Vec<String>, SchemaViolation> {
    let items = optional_string_array(value, path)?;
    if items.is_empty() {
        return Err(SchemaViolation::new(
            path,
            "a non-empty array of strings",
            "array is missing or empty",
        ));
    }
    Ok(items)
}

fn optional_string_array(value: Option<&Value>, path: &str) -> Result<Vec<String>, SchemaViolation> {
    let arr = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(a)) => a,
        Some(other) => {
            return Err(SchemaViolation::new(
                path,
                "an array of strings",
                format!("found {}", type_name(other)),
            ))
        }
    };

    let mut out = Vec::with_capacity(arr.len());
    for (i, item) in arr.iter().enumerate() {
        match item {
            Value::String(s) if !s.trim().is_empty() => out.push(s.clone()),
            Value::String(_) => {
                return Err(SchemaViolation::new(
                    format!("{path}[{i}]"),
                    "a non-empty string",
                    "string is empty",
                ))
            }
            other => {
                return Err(SchemaViolation::new(
                    format!("{path}[{i}]"),
                    "a string",
                    format!("found {}", type_name(other)),
                ))
            }
        }
    }
    Ok(out)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_payload() -> String {
        serde_json::json!({
            "test_cases": [{
                "title": "Successful login",
                "goal": "Verify login with valid credentials",
                "preconditions": "A registered account exists",
                "test_data": "user@example.com / hunter2",
                "steps": ["Open the login page", "Enter credentials", "Click Log in"],
                "expected_results": "User lands on the dashboard",
                "type": "positive",
                "negative_cases": ["Wrong password shows an error"],
                "boundary_cases": []
            }]
        })
        .to_string()
    }

    #[test]
    fn test_valid_payload_parses() {
        let payload = parse_and_validate(&valid_payload()).unwrap();
        assert_eq!(payload.cases.len(), 1);
        assert_eq!(payload.cases[0].kind, CaseKind::Positive);
        assert_eq!(payload.cases[0].steps.len(), 3);
        assert!(payload.status.is_none());
    }

    #[test]
    fn test_think_tags_and_prose_are_stripped() {
        let raw = format!(
            "<think>let me reason about this</think>Here is the suite:\n```json\n{}\n```",
            valid_payload()
        );
        let payload = parse_and_validate(&raw).unwrap();
        assert_eq!(payload.cases.len(), 1);
    }

    #[test]
    fn test_missing_steps_reports_exact_path() {
        let raw = serde_json::json!({
            "test_cases": [{
                "title": "t", "goal": "g", "preconditions": "p",
                "steps": [],
                "expected_results": "e", "type": "positive"
            }]
        })
        .to_string();
        let err = parse_and_validate(&raw).unwrap_err();
        assert_eq!(err.path, "test_cases[0].steps");
    }

    #[test]
    fn test_unknown_case_type_is_rejected() {
        let raw = serde_json::json!({
            "test_cases": [{
                "title": "t", "goal": "g", "preconditions": "p",
                "steps": ["s"],
                "expected_results": "e", "type": "exploratory"
            }]
        })
        .to_string();
        let err = parse_and_validate(&raw).unwrap_err();
        assert_eq!(err.path, "test_cases[0].type");
        assert!(err.message.contains("exploratory"));
    }

    #[test]
    fn test_empty_cases_require_missing_info_status() {
        let bare = serde_json::json!({ "test_cases": [] }).to_string();
        assert!(parse_and_validate(&bare).is_err());

        let flagged = serde_json::json!({
            "status": "missing_info",
            "missing_info_questions": ["Which roles can log in?"],
            "test_cases": []
        })
        .to_string();
        let payload = parse_and_validate(&flagged).unwrap();
        assert!(payload.cases.is_empty());
        assert_eq!(payload.status.as_deref(), Some(STATUS_MISSING_INFO));
        assert_eq!(payload.missing_info_questions.len(), 1);
    }

    #[test]
    fn test_non_json_output_is_a_root_violation() {
        let err = parse_and_validate("I cannot produce test cases.").unwrap_err();
        assert_eq!(err.path, "$");
    }
}
