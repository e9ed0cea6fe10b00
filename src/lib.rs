//! casegen: retrieval-augmented test-case generation over a local
//! knowledge base.
//!
//! Requirement documents, API specs, and UI screenshots are normalized to
//! text, chunked, embedded, and stored in a SQLite-backed vector index.
//! Queries retrieve the most relevant chunks and drive an LLM to produce a
//! schema-validated suite of manual test cases, with optional guardrail
//! checkpoints before and after generation.
//!
//! | Module | Role |
//! |--------|------|
//! | [`models`] | Data types flowing through the pipeline |
//! | [`config`] | TOML configuration and fail-fast validation |
//! | [`error`] | The [`error::PipelineError`] taxonomy |
//! | [`extract`] | Format readers (plain text, PDF, DOCX) |
//! | [`normalize`] | Artifact → plain text, vision for images |
//! | [`chunk`] | Bounded overlapping segmentation |
//! | [`index`] | Batch embedding and atomic index writes |
//! | [`store`] | [`store::VectorStore`] trait, SQLite and in-memory impls |
//! | [`retrieve`] | Query embedding and top-K ranking |
//! | [`prompt`] | Prompt assembly and context budgeting |
//! | [`schema`] | Output schema validation and cleanup |
//! | [`generate`] | Generation with a bounded repair loop |
//! | [`guardrail`] | Safety checkpoints around generation |
//! | [`suite`] | Final suite assembly |
//! | [`pipeline`] | The [`pipeline::Pipeline`] facade |
//! | [`ingest`] | Filesystem scanning for the CLI |
//! | [`providers`] | Capability traits and HTTP backends |

pub mod chunk;
pub mod config;
pub mod error;
pub mod extract;
pub mod generate;
pub mod guardrail;
pub mod index;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod retrieve;
pub mod schema;
pub mod store;
pub mod suite;
