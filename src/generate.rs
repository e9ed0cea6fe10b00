//! Structured suite generation with a bounded repair loop.
//!
//! Drives the generation capability through an explicit state machine:
//!
//! ```text
//! Requesting -> Validating -> Done
//!                  |
//!                  v
//!              Repairing -> Requesting        (while attempts remain)
//!                  |
//!                  v
//!               Failed
//! ```
//!
//! For a configured limit of N repair attempts, at most N + 1 generation
//! calls are made. A transport failure consumes an attempt the same way a
//! schema violation does.

use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::error::{PipelineError, SchemaViolation};
use crate::models::RetrievedContext;
use crate::pipeline::Deadline;
use crate::prompt::{self, Prompt};
use crate::providers::TextGenerator;
use crate::schema::{self, ValidatedPayload};

/// A validated payload plus how many generation calls it took.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub payload: ValidatedPayload,
    pub attempts: u32,
}

enum State {
    Requesting(Prompt),
    Validating(String),
    Repairing { raw: String, violation: SchemaViolation },
}

/// Generate a schema-valid payload for `query` over `context`.
///
/// # Errors
///
/// [`PipelineError::GenerationFailed`] once the attempt budget is exhausted,
/// carrying the last violation. [`PipelineError::Timeout`] if the deadline
/// expires before a call is issued.
pub async fn generate_suite(
    generator: &dyn TextGenerator,
    context: &RetrievedContext,
    query: &str,
    config: &GenerationConfig,
    deadline: &Deadline,
) -> Result<GenerationOutcome, PipelineError> {
    let max_calls = config.max_repair_attempts + 1;
    let mut attempts: u32 = 0;
    let mut state = State::Requesting(prompt::assemble(
        context,
        query,
        config.input_budget_chars,
    ));

    loop {
        state = match state {
            State::Requesting(p) => {
                deadline.check("generation")?;
                attempts += 1;
                debug!(attempt = attempts, "requesting generation");
                match generator.generate(&p.system, &p.user).await {
                    Ok(raw) => State::Validating(raw),
                    Err(e) => {
                        let violation = SchemaViolation::new(
                            "$",
                            "a model response",
                            format!("generation call failed: {e}"),
                        );
                        if attempts >= max_calls {
                            return Err(PipelineError::GenerationFailed {
                                attempts,
                                last: violation,
                            });
                        }
                        warn!(attempt = attempts, error = %e, "generation call failed, retrying");
                        State::Requesting(prompt::assemble(
                            context,
                            query,
                            config.input_budget_chars,
                        ))
                    }
                }
            }
            State::Validating(raw) => match schema::parse_and_validate(&raw) {
                Ok(payload) => {
                    debug!(attempts, cases = payload.cases.len(), "generation validated");
                    return Ok(GenerationOutcome { payload, attempts });
                }
                Err(violation) => State::Repairing { raw, violation },
            },
            State::Repairing { raw, violation } => {
                if attempts >= max_calls {
                    return Err(PipelineError::GenerationFailed {
                        attempts,
                        last: violation,
                    });
                }
                warn!(attempt = attempts, %violation, "schema violation, repairing");
                State::Requesting(prompt::assemble_repair(
                    context,
                    query,
                    config.input_budget_chars,
                    &raw,
                    &violation,
                ))
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CapabilityError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Returns scripted responses in order; counts calls. `Err` strings
    /// become transport errors. The last entry repeats if calls run past it.
    struct Scripted {
        responses: Vec<Result<String, String>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(responses: Vec<Result<String, String>>) -> Self {
            Self {
                responses,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _system: &str, _user: &str) -> Result<String, CapabilityError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            self.responses[i.min(self.responses.len() - 1)]
                .clone()
                .map_err(CapabilityError)
        }
    }

    fn valid_json() -> String {
        serde_json::json!({
            "test_cases": [{
                "title": "t", "goal": "g", "preconditions": "p",
                "steps": ["s"], "expected_results": "e", "type": "positive"
            }]
        })
        .to_string()
    }

    fn config(max_repair_attempts: u32) -> GenerationConfig {
        GenerationConfig {
            max_repair_attempts,
            ..GenerationConfig::default()
        }
    }

    #[tokio::test]
    async fn test_first_valid_response_finishes_in_one_attempt() {
        let gen = Scripted::new(vec![Ok(valid_json())]);
        let out = generate_suite(
            &gen,
            &RetrievedContext::default(),
            "q",
            &config(2),
            &Deadline::none(),
        )
        .await
        .unwrap();
        assert_eq!(out.attempts, 1);
        assert_eq!(gen.calls(), 1);
        assert_eq!(out.payload.cases.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_then_valid_uses_one_repair() {
        let gen = Scripted::new(vec![Ok("not json".to_string()), Ok(valid_json())]);
        let out = generate_suite(
            &gen,
            &RetrievedContext::default(),
            "q",
            &config(2),
            &Deadline::none(),
        )
        .await
        .unwrap();
        assert_eq!(out.attempts, 2);
        assert_eq!(gen.calls(), 2);
    }

    #[tokio::test]
    async fn test_attempt_budget_is_never_exceeded() {
        let gen = Scripted::new(vec![Ok("garbage".to_string())]);
        let err = generate_suite(
            &gen,
            &RetrievedContext::default(),
            "q",
            &config(2),
            &Deadline::none(),
        )
        .await
        .unwrap_err();
        // 2 repair attempts permit at most 3 calls.
        assert_eq!(gen.calls(), 3);
        match err {
            PipelineError::GenerationFailed { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(last.path, "$");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_consumes_an_attempt() {
        let gen = Scripted::new(vec![Err("503".to_string()), Ok(valid_json())]);
        let out = generate_suite(
            &gen,
            &RetrievedContext::default(),
            "q",
            &config(1),
            &Deadline::none(),
        )
        .await
        .unwrap();
        assert_eq!(out.attempts, 2);
    }

    #[tokio::test]
    async fn test_repair_call_still_carries_query_and_context() {
        use crate::models::{MediaKind, ScoredChunk};
        use std::sync::Mutex;

        struct Recording {
            prompts: Mutex<Vec<String>>,
        }

        #[async_trait]
        impl TextGenerator for Recording {
            fn model_name(&self) -> &str {
                "recording"
            }

            async fn generate(&self, _system: &str, user: &str) -> Result<String, CapabilityError> {
                let mut prompts = self.prompts.lock().unwrap();
                prompts.push(user.to_string());
                if prompts.len() == 1 {
                    Ok("not json".to_string())
                } else {
                    Ok(valid_json())
                }
            }
        }

        let context = RetrievedContext {
            chunks: vec![ScoredChunk {
                chunk_id: "c1".to_string(),
                artifact_id: "doc".to_string(),
                seq: 0,
                kind: MediaKind::Text,
                text: "Accounts lock after three failed logins.".to_string(),
                score: 0.9,
            }],
        };
        let gen = Recording {
            prompts: Mutex::new(Vec::new()),
        };
        generate_suite(&gen, &context, "test cases for login", &config(2), &Deadline::none())
            .await
            .unwrap();

        let prompts = gen.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("Task: test cases for login"));
        assert!(prompts[1].contains("Accounts lock after three failed logins."));
        assert!(prompts[1].contains("not json"));
    }

    #[tokio::test]
    async fn test_zero_repairs_means_a_single_call() {
        let gen = Scripted::new(vec![Ok("garbage".to_string())]);
        let err = generate_suite(
            &gen,
            &RetrievedContext::default(),
            "q",
            &config(0),
            &Deadline::none(),
        )
        .await
        .unwrap_err();
        assert_eq!(gen.calls(), 1);
        assert!(matches!(err, PipelineError::GenerationFailed { attempts: 1, .. }));
    }
}
