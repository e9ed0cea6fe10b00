//! Guardrail checkpoints around generation.
//!
//! Two checkpoints: the user query before any retrieval work, and the
//! validated suite text before it is returned. A block is a refusal
//! outcome, not an error. When the classifier itself fails, the checkpoint
//! fails open: generation quality gates should not take the product down
//! with them.

use tracing::warn;

use crate::models::{GuardrailVerdict, TestSuite};
use crate::providers::SafetyClassifier;

/// Wraps the optional safety classifier. With no classifier configured,
/// every checkpoint allows without an external call.
pub struct GuardrailFilter {
    classifier: Option<Box<dyn SafetyClassifier>>,
}

impl GuardrailFilter {
    pub fn new(classifier: Option<Box<dyn SafetyClassifier>>) -> Self {
        Self { classifier }
    }

    pub fn disabled() -> Self {
        Self { classifier: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.classifier.is_some()
    }

    /// Pre-generation checkpoint on the raw user query.
    pub async fn check_query(&self, query: &str) -> GuardrailVerdict {
        self.check(query, "query").await
    }

    /// Post-generation checkpoint on the validated suite content. Every
    /// generated field is screened, including test data and the
    /// negative/boundary elaboration lists.
    pub async fn check_suite(&self, suite: &TestSuite) -> GuardrailVerdict {
        let mut text = serde_json::to_string(&suite.cases).unwrap_or_default();
        for question in &suite.missing_info_questions {
            text.push('\n');
            text.push_str(question);
        }
        self.check(&text, "suite").await
    }

    async fn check(&self, text: &str, checkpoint: &str) -> GuardrailVerdict {
        let classifier = match &self.classifier {
            Some(c) => c,
            None => return GuardrailVerdict::allow("guardrail disabled"),
        };

        match classifier.classify(text).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(checkpoint, error = %e, "safety classifier unavailable, allowing");
                GuardrailVerdict::allow(format!("classifier unavailable: {e}"))
            }
        }
    }
}
