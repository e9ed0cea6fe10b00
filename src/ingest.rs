//! Filesystem ingestion: walk a directory (or take a single file) and turn
//! supported files into [`Artifact`]s for the pipeline.
//!
//! The artifact id is the path relative to the scan root, so re-running
//! ingest over the same tree replaces rather than duplicates.

use std::path::Path;

use tracing::warn;
use walkdir::WalkDir;

use crate::error::PipelineError;
use crate::models::{Artifact, ArtifactContent, MediaKind};

/// Extension → (media kind, content type). Everything else is skipped with
/// a warning.
fn classify(extension: &str) -> Option<(MediaKind, &'static str)> {
    match extension {
        "txt" => Some((MediaKind::Text, "text/plain")),
        "md" => Some((MediaKind::Text, "text/markdown")),
        "pdf" => Some((MediaKind::Text, "application/pdf")),
        "docx" => Some((
            MediaKind::Text,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        )),
        "json" => Some((MediaKind::Structured, "application/json")),
        "yaml" | "yml" => Some((MediaKind::Structured, "application/yaml")),
        "csv" => Some((MediaKind::Structured, "text/csv")),
        "png" => Some((MediaKind::Image, "image/png")),
        "jpg" | "jpeg" => Some((MediaKind::Image, "image/jpeg")),
        _ => None,
    }
}

/// Collect the ingestible artifacts under `path`. A single supported file
/// yields exactly one artifact. Unsupported files are skipped, not errors.
pub fn scan(path: &Path) -> Result<Vec<Artifact>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::config(format!(
            "ingest path does not exist: {}",
            path.display()
        )));
    }

    let root = if path.is_file() {
        path.parent().unwrap_or(path)
    } else {
        path
    };

    let mut artifacts = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            PipelineError::Extraction {
                artifact: path.display().to_string(),
                reason: format!("walk failed: {e}"),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        match artifact_from_path(root, entry.path())? {
            Some(artifact) => artifacts.push(artifact),
            None => warn!(file = %entry.path().display(), "skipping unsupported file"),
        }
    }
    Ok(artifacts)
}

fn artifact_from_path(root: &Path, path: &Path) -> Result<Option<Artifact>, PipelineError> {
    let extension = match path.extension().and_then(|e| e.to_str()) {
        Some(e) => e.to_ascii_lowercase(),
        None => return Ok(None),
    };
    let (kind, content_type) = match classify(&extension) {
        Some(c) => c,
        None => return Ok(None),
    };

    let data = std::fs::read(path).map_err(|e| PipelineError::Extraction {
        artifact: path.display().to_string(),
        reason: format!("read failed: {e}"),
    })?;

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();

    // Relative path with stable separators, so the same tree produces the
    // same ids on any platform.
    let id = path
        .strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    Ok(Some(Artifact {
        id,
        filename,
        kind,
        content: ArtifactContent::Bytes {
            content_type: content_type.to_string(),
            data,
        },
    }))
}
