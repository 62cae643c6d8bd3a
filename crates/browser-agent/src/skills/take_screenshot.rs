//! take_screenshot: capture the page or an element to a deterministic file
//! and register it for download.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use browser_driver::{ImageFormat, ScreenshotOptions};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::args;
use super::click::normalize_selector;
use super::schema::{ParamField, ParamKind, ParamSchema, SkillDescriptor};
use super::{RequestContext, Skill};
use crate::artifacts::ArtifactStore;
use crate::error::{AgentError, Result};
use crate::session::SessionManager;

const IMAGE_TYPES: &[&str] = &["png", "jpeg"];

pub struct TakeScreenshot {
    sessions: Arc<SessionManager>,
    artifacts: Arc<ArtifactStore>,
    artifact_base_url: String,
    descriptor: SkillDescriptor,
}

impl TakeScreenshot {
    pub fn new(
        sessions: Arc<SessionManager>,
        artifacts: Arc<ArtifactStore>,
        artifact_base_url: String,
    ) -> Self {
        let descriptor = SkillDescriptor {
            name: "take_screenshot",
            description:
                "Capture a screenshot of the current page or specific element with deterministic file naming",
            parameters: ParamSchema::new(
                vec![
                    ParamField::new(
                        "full_page",
                        ParamKind::Boolean,
                        "Capture the entire scrollable page",
                    )
                    .with_default(json!(false)),
                    ParamField::new(
                        "selector",
                        ParamKind::String,
                        "Optional selector to screenshot specific element",
                    ),
                    ParamField::new("type", ParamKind::String, "Image format")
                        .with_default(json!("png"))
                        .with_enum(IMAGE_TYPES),
                    ParamField::new("quality", ParamKind::Integer, "Quality for jpeg images (0-100)")
                        .with_default(json!(80)),
                ],
                vec![],
            ),
        };
        Self {
            sessions,
            artifacts,
            artifact_base_url,
            descriptor,
        }
    }
}

/// Deterministic screenshot filename: capture-type prefix, timestamp,
/// image extension.
pub fn screenshot_filename(
    full_page: bool,
    selector: Option<&str>,
    format: ImageFormat,
    timestamp: &str,
) -> String {
    let ext = format.extension();
    if full_page {
        format!("fullpage_{timestamp}.{ext}")
    } else if let Some(selector) = selector.filter(|s| !s.is_empty()) {
        let safe: String = selector
            .rsplit('/')
            .next()
            .unwrap_or(selector)
            .chars()
            .take(20)
            .collect();
        format!("element_{safe}_{timestamp}.{ext}")
    } else {
        format!("viewport_{timestamp}.{ext}")
    }
}

#[async_trait]
impl Skill for TakeScreenshot {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn call(&self, ctx: &RequestContext, args: &Map<String, Value>) -> Result<String> {
        let full_page = args::opt_bool(args, "full_page", false)?;
        let selector = args::opt_str(args, "selector")?.map(str::to_string);
        let image_type = args::str_enum(args, "type", IMAGE_TYPES, "png")?;
        let quality = args::any_i64(args, "quality", 80)?;

        let format = match image_type {
            "jpeg" => ImageFormat::Jpeg,
            _ => ImageFormat::Png,
        };
        if format == ImageFormat::Jpeg && !(0..=100).contains(&quality) {
            return Err(AgentError::invalid(
                "quality",
                format!("must be between 0 and 100 for JPEG images, got {quality}"),
            ));
        }

        let timestamp = crate::artifacts::filename_timestamp();
        let filename = screenshot_filename(full_page, selector.as_deref(), format, &timestamp);
        let path: PathBuf = self.artifacts.data_dir().join(&filename);
        tokio::fs::create_dir_all(self.artifacts.data_dir()).await?;

        info!(
            target = "agent.skills",
            path = %path.display(),
            full_page,
            image_type,
            quality,
            selector = selector.as_deref().unwrap_or(""),
            "taking screenshot"
        );

        let session = self.sessions.task_session(ctx).await?;
        let options = ScreenshotOptions {
            full_page,
            selector: selector
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(normalize_selector),
            format,
            quality: Some(quality.clamp(0, 100) as u32),
        };

        session
            .page
            .screenshot(&path, &options)
            .await
            .map_err(|e| AgentError::driver("take_screenshot", e))?;

        let bytes = tokio::fs::read(&path).await?;
        let capture_type = if full_page {
            "full_page"
        } else if options.selector.is_some() {
            "element"
        } else {
            "viewport"
        };

        let mut metadata = serde_json::Map::new();
        metadata.insert("file_size".into(), json!(bytes.len()));
        metadata.insert("capture_type".into(), json!(capture_type));
        metadata.insert("image_type".into(), json!(image_type));
        metadata.insert("quality".into(), json!(quality));
        if let Some(selector) = &selector {
            metadata.insert("selector".into(), json!(selector));
        }

        let artifact = self
            .artifacts
            .register_file(
                &path,
                format.mime_type(),
                Some(format!("Screenshot: {filename}")),
                Some(format!(
                    "Screenshot captured from browser session {}",
                    session.id
                )),
                metadata,
            )
            .await;

        let mut response = json!({
            "success": true,
            "path": path.display().to_string(),
            "filename": filename,
            "full_page": full_page,
            "type": image_type,
            "quality": quality,
            "selector": selector.unwrap_or_default(),
            "session_id": session.id,
            "file_size": bytes.len(),
            "timestamp": crate::artifacts::rfc3339_now(),
            "message": "Screenshot captured successfully and stored as artifact",
        });

        match artifact {
            Ok(entry) => {
                response["artifact_id"] = json!(entry.id);
                response["download_url"] =
                    json!(format!("{}/artifacts/{}", self.artifact_base_url, entry.id));
            }
            Err(err) => {
                // Screenshot exists on disk; the response degrades rather
                // than failing the capture.
                warn!(target = "agent.skills", error = %err, "artifact registration failed");
                response["message"] =
                    json!("Screenshot captured successfully (artifact registration failed)");
            }
        }

        info!(
            target = "agent.skills",
            path = %path.display(),
            session_id = response["session_id"].as_str().unwrap_or(""),
            file_size = bytes.len(),
            "screenshot completed"
        );

        Ok(response.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock_session_manager;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn skill_with_store() -> (Arc<ArtifactStore>, TakeScreenshot, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(ArtifactStore::new(dir.path()).unwrap());
        let (_, sessions) = mock_session_manager();
        let skill = TakeScreenshot::new(
            sessions,
            Arc::clone(&artifacts),
            "http://localhost:8081".into(),
        );
        (artifacts, skill, dir)
    }

    #[test]
    fn filename_shapes() {
        let ts = "2025-03-01_10-20-30.123";
        assert_eq!(
            screenshot_filename(true, None, ImageFormat::Png, ts),
            "fullpage_2025-03-01_10-20-30.123.png"
        );
        assert_eq!(
            screenshot_filename(false, None, ImageFormat::Jpeg, ts),
            "viewport_2025-03-01_10-20-30.123.jpeg"
        );
        // Selector prefix truncated to 20 characters.
        let name = screenshot_filename(false, Some("#really-long-selector-name-here"), ImageFormat::Png, ts);
        assert!(name.starts_with("element_#really-long-selecto_"));
        assert!(name.ends_with(".png"));
    }

    #[tokio::test]
    async fn captures_and_registers_artifact() {
        let (artifacts, skill, _dir) = skill_with_store();

        let ctx = RequestContext::for_task("task-d");
        let response = skill.call(&ctx, &args(json!({}))).await.unwrap();
        let parsed: Value = serde_json::from_str(&response).unwrap();

        assert_eq!(parsed["success"], true);
        assert!(parsed["filename"].as_str().unwrap().starts_with("viewport_"));
        assert!(parsed["filename"].as_str().unwrap().ends_with(".png"));

        let artifact_id = parsed["artifact_id"].as_str().unwrap();
        let entry = artifacts.get(artifact_id).await.unwrap();
        assert_eq!(entry.mime_type, "image/png");
        assert_eq!(entry.metadata["capture_type"], "viewport");
        assert!(parsed["download_url"]
            .as_str()
            .unwrap()
            .ends_with(&format!("/artifacts/{artifact_id}")));
    }

    #[tokio::test]
    async fn jpeg_quality_validated() {
        let (_, skill, _dir) = skill_with_store();

        let err = skill
            .call(
                &RequestContext::default(),
                &args(json!({"type": "jpeg", "quality": 150})),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quality"));

        // Quality is ignored for png.
        let response = skill
            .call(
                &RequestContext::default(),
                &args(json!({"type": "png", "quality": 150})),
            )
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(parsed["success"], true);
    }

    #[tokio::test]
    async fn invalid_type_rejected() {
        let (_, skill, _dir) = skill_with_store();
        let err = skill
            .call(&RequestContext::default(), &args(json!({"type": "webp"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("png, jpeg"));
    }

    #[tokio::test]
    async fn element_capture_records_selector_metadata() {
        let (artifacts, skill, _dir) = skill_with_store();

        let response = skill
            .call(
                &RequestContext::for_task("task-e"),
                &args(json!({"selector": "#hero"})),
            )
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&response).unwrap();
        assert!(parsed["filename"].as_str().unwrap().starts_with("element_#hero_"));

        let entry = artifacts
            .get(parsed["artifact_id"].as_str().unwrap())
            .await
            .unwrap();
        assert_eq!(entry.metadata["capture_type"], "element");
        assert_eq!(entry.metadata["selector"], "#hero");
    }
}
