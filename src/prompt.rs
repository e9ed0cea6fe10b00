//! Prompt assembly for suite generation. Pure string work, no I/O.
//!
//! Produces the system/user message pair for the first generation attempt
//! and a correction pair for each repair round. Oversized context is cut by
//! dropping whole lowest-scored chunks; the query is never truncated.

use crate::error::SchemaViolation;
use crate::models::RetrievedContext;
use crate::schema;

const SYSTEM_PROMPT: &str = "You are a QA Test Engineer. You write precise, executable \
manual test cases from software requirements. Use ONLY the provided context to derive \
cases; do not invent behavior the context does not state. Cover the happy path, failure \
modes, and boundary values the context supports.";

/// A system/user message pair ready for the generation capability.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Assemble the initial generation prompt.
///
/// `budget_chars` bounds the user message. Chunks are dropped from the
/// low-score end until the message fits; the query and format instructions
/// always survive. With an empty context the model is told so and works
/// from the query alone.
pub fn assemble(context: &RetrievedContext, query: &str, budget_chars: usize) -> Prompt {
    build(context, query, budget_chars, None)
}

/// Assemble a repair prompt. Generation calls are stateless, so the repair
/// message carries the same context and task as the first attempt plus a
/// correction section quoting the previous malformed output and the exact
/// violation.
pub fn assemble_repair(
    context: &RetrievedContext,
    query: &str,
    budget_chars: usize,
    previous_output: &str,
    violation: &SchemaViolation,
) -> Prompt {
    build(context, query, budget_chars, Some((previous_output, violation)))
}

fn build(
    context: &RetrievedContext,
    query: &str,
    budget_chars: usize,
    repair: Option<(&str, &SchemaViolation)>,
) -> Prompt {
    let fixed = fixed_sections_len(query)
        + repair.map_or(0, |(prev, violation)| {
            prev.len() + violation.to_string().len() + 256
        });
    let mut kept = context.chunks.len();

    // Chunks arrive sorted by score descending, so trimming from the tail
    // always removes the weakest match first.
    while kept > 0 && fixed + context_section_len(context, kept) > budget_chars {
        kept -= 1;
    }

    let mut user = String::new();
    if kept == 0 {
        user.push_str(
            "No relevant context was found in the knowledge base. State any assumptions \
             you make and prefer status \"missing_info\" over inventing requirements.\n\n",
        );
    } else {
        user.push_str("Context from the knowledge base:\n\n");
        for scored in &context.chunks[..kept] {
            user.push_str(&format!(
                "--- [source: {} | chunk {} | kind: {} | score: {:.3}]\n{}\n\n",
                scored.artifact_id, scored.seq, scored.kind, scored.score, scored.text
            ));
        }
    }

    user.push_str(&format!("Task: {query}\n\n"));

    if let Some((previous_output, violation)) = repair {
        user.push_str(&format!(
            "Your previous response did not conform to the required JSON schema.\n\n\
             Violation: {violation}\n\n\
             Previous response:\n{previous_output}\n\n\
             Produce a corrected response. Keep the test cases you already wrote where they \
             were valid; fix only what the violation describes.\n\n"
        ));
    }

    user.push_str(schema::FORMAT_INSTRUCTIONS);

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

fn fixed_sections_len(query: &str) -> usize {
    // Header, task line, format instructions. Slightly generous is fine;
    // the budget is a soft cap on request size, not a wire limit.
    64 + query.len() + schema::FORMAT_INSTRUCTIONS.len()
}

fn context_section_len(context: &RetrievedContext, kept: usize) -> usize {
    context.chunks[..kept]
        .iter()
        .map(|c| c.text.len() + c.artifact_id.len() + 64)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaKind, ScoredChunk};

    fn chunk(id: &str, score: f32, text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk_id: id.to_string(),
            artifact_id: "doc".to_string(),
            seq: 0,
            kind: MediaKind::Text,
            text: text.to_string(),
            score,
        }
    }

    #[test]
    fn test_prompt_contains_context_query_and_instructions() {
        let context = RetrievedContext {
            chunks: vec![chunk("c1", 0.9, "Users must verify their email.")],
        };
        let prompt = assemble(&context, "test cases for signup", 10_000);
        assert!(prompt.user.contains("Users must verify their email."));
        assert!(prompt.user.contains("Task: test cases for signup"));
        assert!(prompt.user.contains("\"test_cases\""));
        assert!(prompt.system.contains("QA Test Engineer"));
    }

    #[test]
    fn test_lowest_scored_chunks_are_dropped_first() {
        let big = "x".repeat(600);
        let context = RetrievedContext {
            chunks: vec![
                chunk("c1", 0.9, &big),
                chunk("c2", 0.5, &big),
                chunk("c3", 0.1, &big),
            ],
        };
        let budget = fixed_sections_len("q") + 2 * (big.len() + 3 + 64) + 1;
        let prompt = assemble(&context, "q", budget);
        // Two chunks fit; the weakest one is gone.
        assert_eq!(prompt.user.matches("--- [source:").count(), 2);
        assert!(prompt.user.contains("score: 0.900"));
        assert!(prompt.user.contains("score: 0.500"));
        assert!(!prompt.user.contains("score: 0.100"));
    }

    #[test]
    fn test_query_survives_even_a_tiny_budget() {
        let context = RetrievedContext {
            chunks: vec![chunk("c1", 0.9, "some context")],
        };
        let prompt = assemble(&context, "the query", 10);
        assert!(prompt.user.contains("Task: the query"));
        assert!(!prompt.user.contains("some context"));
    }

    #[test]
    fn test_empty_context_notes_the_absence() {
        let prompt = assemble(&RetrievedContext::default(), "anything", 10_000);
        assert!(prompt.user.contains("No relevant context"));
    }

    #[test]
    fn test_repair_prompt_quotes_violation_and_previous_output() {
        let violation = crate::error::SchemaViolation::new(
            "test_cases[0].steps",
            "a non-empty array of strings",
            "array is missing or empty",
        );
        let prompt = assemble_repair(
            &RetrievedContext::default(),
            "the query",
            10_000,
            "{\"test_cases\": [{}]}",
            &violation,
        );
        assert!(prompt.user.contains("test_cases[0].steps"));
        assert!(prompt.user.contains("{\"test_cases\": [{}]}"));
    }

    #[test]
    fn test_repair_prompt_carries_context_and_task() {
        let context = RetrievedContext {
            chunks: vec![chunk("c1", 0.9, "Users must verify their email.")],
        };
        let violation = crate::error::SchemaViolation::new(
            "$",
            "a valid JSON object",
            "JSON parse error",
        );
        let prompt = assemble_repair(
            &context,
            "test cases for signup",
            10_000,
            "I would rather write prose.",
            &violation,
        );
        // A repair call is as stateless as the first one.
        assert!(prompt.user.contains("Users must verify their email."));
        assert!(prompt.user.contains("Task: test cases for signup"));
        assert!(prompt.user.contains("I would rather write prose."));
        assert!(prompt.user.contains("\"test_cases\""));
    }

    #[test]
    fn test_repair_prompt_respects_the_context_budget() {
        let big = "x".repeat(600);
        let context = RetrievedContext {
            chunks: vec![chunk("c1", 0.9, &big), chunk("c2", 0.1, &big)],
        };
        let violation =
            crate::error::SchemaViolation::new("$", "a valid JSON object", "JSON parse error");
        let previous = "garbage";
        let budget = fixed_sections_len("q")
            + previous.len()
            + violation.to_string().len()
            + 256
            + (big.len() + 3 + 64)
            + 1;
        let prompt = assemble_repair(&context, "q", budget, previous, &violation);
        assert!(prompt.user.contains("score: 0.900"));
        assert!(!prompt.user.contains("score: 0.100"));
        assert!(prompt.user.contains("Task: q"));
    }
}
