//! Artifact normalization: raw artifact → plain-text [`NormalizedText`].
//!
//! Text-like artifacts go through the format readers in [`crate::extract`];
//! image artifacts are sent to the vision capability with a fixed
//! instruction template and the returned description becomes the artifact's
//! content, tagged as vision-derived. This stage only computes; no partial
//! state is persisted on failure.

use tracing::debug;

use crate::error::PipelineError;
use crate::extract;
use crate::models::{Artifact, ArtifactContent, MediaKind, NormalizedText, Provenance};
use crate::providers::VisionDescriber;

/// Instruction sent with every image artifact. Fixed so vision output is
/// consistent across the knowledge base.
pub const VISION_INSTRUCTION: &str = "Describe this UI screenshot or diagram in technical \
detail for a QA engineer. List all visible buttons, fields, error messages, and layout elements.";

/// Normalize one artifact.
///
/// # Errors
///
/// - [`PipelineError::Extraction`] when a format reader cannot parse the
///   artifact (corrupt file, unsupported encoding or content type).
/// - [`PipelineError::VisionUnavailable`] when the artifact is an image and
///   the vision capability is missing, errors, or times out.
pub async fn normalize(
    artifact: &Artifact,
    vision: Option<&dyn VisionDescriber>,
) -> Result<NormalizedText, PipelineError> {
    match artifact.kind {
        MediaKind::Text | MediaKind::Structured => normalize_textual(artifact),
        MediaKind::Image => normalize_image(artifact, vision).await,
    }
}

fn normalize_textual(artifact: &Artifact) -> Result<NormalizedText, PipelineError> {
    let (text, format) = match &artifact.content {
        ArtifactContent::Text(s) => (s.clone(), "verbatim".to_string()),
        ArtifactContent::Bytes { content_type, data } => {
            let (text, via) = extract::extract_text(data, content_type).map_err(|e| {
                PipelineError::Extraction {
                    artifact: artifact.filename.clone(),
                    reason: e.to_string(),
                }
            })?;
            (text, via.to_string())
        }
    };

    debug!(artifact = %artifact.id, format = %format, chars = text.len(), "normalized text artifact");

    Ok(NormalizedText {
        artifact_id: artifact.id.clone(),
        text,
        provenance: Provenance::Reader { format },
    })
}

async fn normalize_image(
    artifact: &Artifact,
    vision: Option<&dyn VisionDescriber>,
) -> Result<NormalizedText, PipelineError> {
    let vision = vision.ok_or_else(|| PipelineError::VisionUnavailable {
        artifact: artifact.filename.clone(),
        reason: "no vision capability configured".to_string(),
    })?;

    let (content_type, data) = match &artifact.content {
        ArtifactContent::Bytes { content_type, data } => (content_type.as_str(), data.as_slice()),
        ArtifactContent::Text(_) => {
            return Err(PipelineError::Extraction {
                artifact: artifact.filename.clone(),
                reason: "image artifact requires raw bytes".to_string(),
            })
        }
    };

    let description = vision
        .describe(data, content_type, VISION_INSTRUCTION)
        .await
        .map_err(|e| PipelineError::VisionUnavailable {
            artifact: artifact.filename.clone(),
            reason: e.to_string(),
        })?;

    debug!(artifact = %artifact.id, model = vision.model_name(), "described image artifact");

    // Keep the source filename in the text so retrieval hits can be traced
    // back to the screenshot they came from.
    let text = format!(
        "[IMAGE SOURCE: {}]\nDescription: {}",
        artifact.filename, description
    );

    Ok(NormalizedText {
        artifact_id: artifact.id.clone(),
        text,
        provenance: Provenance::Vision {
            model: vision.model_name().to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CapabilityError;
    use async_trait::async_trait;

    struct FixedVision(&'static str);

    #[async_trait]
    impl VisionDescriber for FixedVision {
        fn model_name(&self) -> &str {
            "stub-vision"
        }

        async fn describe(
            &self,
            _image: &[u8],
            _content_type: &str,
            _instruction: &str,
        ) -> Result<String, CapabilityError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingVision;

    #[async_trait]
    impl VisionDescriber for FailingVision {
        fn model_name(&self) -> &str {
            "stub-vision"
        }

        async fn describe(
            &self,
            _image: &[u8],
            _content_type: &str,
            _instruction: &str,
        ) -> Result<String, CapabilityError> {
            Err(CapabilityError("connection refused".to_string()))
        }
    }

    fn text_artifact(body: &str) -> Artifact {
        Artifact {
            id: "a1".to_string(),
            filename: "req.txt".to_string(),
            kind: MediaKind::Text,
            content: ArtifactContent::Text(body.to_string()),
        }
    }

    fn image_artifact() -> Artifact {
        Artifact {
            id: "a2".to_string(),
            filename: "login.png".to_string(),
            kind: MediaKind::Image,
            content: ArtifactContent::Bytes {
                content_type: "image/png".to_string(),
                data: vec![0x89, 0x50, 0x4e, 0x47],
            },
        }
    }

    #[tokio::test]
    async fn test_text_artifact_passes_through_verbatim() {
        let norm = normalize(&text_artifact("Users must log in."), None)
            .await
            .unwrap();
        assert_eq!(norm.text, "Users must log in.");
        assert_eq!(
            norm.provenance,
            Provenance::Reader {
                format: "verbatim".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_image_artifact_is_tagged_vision_derived() {
        let vision = FixedVision("A login form with two fields.");
        let norm = normalize(&image_artifact(), Some(&vision)).await.unwrap();
        assert!(norm.text.contains("[IMAGE SOURCE: login.png]"));
        assert!(norm.text.contains("A login form with two fields."));
        assert_eq!(
            norm.provenance,
            Provenance::Vision {
                model: "stub-vision".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_image_without_vision_capability_fails() {
        let err = normalize(&image_artifact(), None).await.unwrap_err();
        assert!(matches!(err, PipelineError::VisionUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_vision_transport_error_surfaces_as_unavailable() {
        let err = normalize(&image_artifact(), Some(&FailingVision))
            .await
            .unwrap_err();
        match err {
            PipelineError::VisionUnavailable { artifact, reason } => {
                assert_eq!(artifact, "login.png");
                assert!(reason.contains("connection refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_corrupt_pdf_fails_with_extraction_error() {
        let artifact = Artifact {
            id: "a3".to_string(),
            filename: "spec.pdf".to_string(),
            kind: MediaKind::Text,
            content: ArtifactContent::Bytes {
                content_type: "application/pdf".to_string(),
                data: b"not a pdf".to_vec(),
            },
        };
        let err = normalize(&artifact, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Extraction { .. }));
    }
}
