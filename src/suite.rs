//! Final suite assembly: validated cases + query + provenance metadata.
//! Pure aggregation, no external calls.

use chrono::Utc;

use crate::models::{GuardrailVerdict, TestSuite};
use crate::schema::ValidatedPayload;

/// Assemble the suite returned to the caller. Case order is preserved as
/// generated; metadata records the model, the attempt count and every
/// guardrail verdict observed on the way.
pub fn assemble(
    payload: ValidatedPayload,
    query: &str,
    model: &str,
    attempts: u32,
    verdicts: Vec<GuardrailVerdict>,
) -> TestSuite {
    TestSuite {
        cases: payload.cases,
        query: query.to_string(),
        status: payload.status,
        missing_info_questions: payload.missing_info_questions,
        meta: crate::models::GenerationMeta {
            model: model.to_string(),
            attempts,
            verdicts,
            generated_at: Utc::now(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaseKind, TestCase};

    fn case(title: &str) -> TestCase {
        TestCase {
            title: title.to_string(),
            goal: "g".to_string(),
            preconditions: "p".to_string(),
            test_data: None,
            steps: vec!["s".to_string()],
            expected_results: "e".to_string(),
            kind: CaseKind::Positive,
            negative_cases: Vec::new(),
            boundary_cases: Vec::new(),
        }
    }

    #[test]
    fn test_preserves_case_order_and_records_meta() {
        let payload = ValidatedPayload {
            cases: vec![case("first"), case("second")],
            status: None,
            missing_info_questions: Vec::new(),
        };
        let suite = assemble(
            payload,
            "login tests",
            "stub-model",
            2,
            vec![GuardrailVerdict::allow("ok")],
        );
        assert_eq!(suite.cases[0].title, "first");
        assert_eq!(suite.cases[1].title, "second");
        assert_eq!(suite.query, "login tests");
        assert_eq!(suite.meta.attempts, 2);
        assert_eq!(suite.meta.model, "stub-model");
        assert_eq!(suite.meta.verdicts.len(), 1);
    }

    #[test]
    fn test_missing_info_payload_yields_an_empty_suite_with_questions() {
        let payload = ValidatedPayload {
            cases: Vec::new(),
            status: Some("missing_info".to_string()),
            missing_info_questions: vec!["Which roles exist?".to_string()],
        };
        let suite = assemble(payload, "q", "m", 1, Vec::new());
        assert!(suite.cases.is_empty());
        assert_eq!(suite.status.as_deref(), Some("missing_info"));
        assert_eq!(suite.missing_info_questions.len(), 1);
    }
}
