use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use casegen::config::{self, Config};
use casegen::ingest;
use casegen::models::{MediaKind, Query};
use casegen::pipeline::{Deadline, Pipeline, QueryOutcome};

#[derive(Parser)]
#[command(name = "casegen", version, about = "Generate test-case suites from a requirements knowledge base")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "casegen.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a starter config file.
    Init,
    /// Ingest a file or directory into the knowledge base.
    Ingest {
        path: PathBuf,
    },
    /// Remove an artifact from the knowledge base.
    Delete {
        artifact_id: String,
    },
    /// Generate a test-case suite for a question.
    Query {
        text: String,
        /// Number of chunks to retrieve.
        #[arg(long)]
        top_k: Option<usize>,
        /// Restrict retrieval to these media kinds (text, structured, image).
        #[arg(long = "kind")]
        kinds: Vec<MediaKind>,
        /// Restrict retrieval to one artifact id.
        #[arg(long)]
        artifact: Option<String>,
        /// Overall wall-clock budget in seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

const STARTER_CONFIG: &str = r#"[db]
path = "casegen.sqlite"

[chunking]
max_chars = 1000
overlap_chars = 200

[retrieval]
top_k = 5

[embedding]
# provider = "ollama"
# model = "nomic-embed-text"
# dims = 768

[generation]
provider = "openai"
model = "llama-3.3-70b-versatile"
# url = "https://api.groq.com/openai/v1"

[guardrail]
enabled = false
# model = "meta-llama/llama-guard-4-12b"

[vision]
# model = "meta-llama/llama-4-scout-17b-16e-instruct"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Init => init(&cli.config),
        Command::Ingest { path } => run_ingest(&cli.config, &path).await,
        Command::Delete { artifact_id } => run_delete(&cli.config, &artifact_id).await,
        Command::Query {
            text,
            top_k,
            kinds,
            artifact,
            timeout_secs,
        } => run_query(&cli.config, text, top_k, kinds, artifact, timeout_secs).await,
    }
}

fn init(config_path: &PathBuf) -> Result<()> {
    if config_path.exists() {
        bail!("config file already exists: {}", config_path.display());
    }
    std::fs::write(config_path, STARTER_CONFIG)
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    println!("wrote {}", config_path.display());
    Ok(())
}

async fn load(config_path: &PathBuf) -> Result<(Config, Pipeline)> {
    let config = config::load_config(config_path)?;
    let pipeline = Pipeline::connect(config.clone()).await?;
    Ok((config, pipeline))
}

async fn run_ingest(config_path: &PathBuf, path: &PathBuf) -> Result<()> {
    let (_, pipeline) = load(config_path).await?;
    let artifacts = ingest::scan(path)?;
    if artifacts.is_empty() {
        bail!("no ingestible files under {}", path.display());
    }

    let mut total_chunks = 0;
    for artifact in &artifacts {
        let report = pipeline.ingest(artifact, Deadline::none()).await?;
        println!("{}: {} chunk(s)", report.artifact_id, report.chunks);
        total_chunks += report.chunks;
    }
    println!("{} artifact(s), {} chunk(s) indexed", artifacts.len(), total_chunks);
    Ok(())
}

async fn run_delete(config_path: &PathBuf, artifact_id: &str) -> Result<()> {
    let (_, pipeline) = load(config_path).await?;
    pipeline.delete(artifact_id).await?;
    println!("deleted {artifact_id}");
    Ok(())
}

async fn run_query(
    config_path: &PathBuf,
    text: String,
    top_k: Option<usize>,
    kinds: Vec<MediaKind>,
    artifact: Option<String>,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let (config, pipeline) = load(config_path).await?;

    let query = Query {
        top_k: top_k.unwrap_or(config.retrieval.top_k),
        kinds,
        artifact_id: artifact,
        text,
    };
    let deadline = match timeout_secs {
        Some(secs) => Deadline::after(std::time::Duration::from_secs(secs)),
        None => Deadline::none(),
    };

    match pipeline.query(&query, deadline).await? {
        QueryOutcome::Suite(suite) => {
            println!("{}", serde_json::to_string_pretty(&suite)?);
            Ok(())
        }
        QueryOutcome::Refused(verdict) => {
            eprintln!(
                "query refused ({}): {}",
                verdict.category.as_deref().unwrap_or("unspecified"),
                verdict.rationale
            );
            std::process::exit(2);
        }
    }
}
