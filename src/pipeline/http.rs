//! HTTP client for the inference sidecar hosting the edit pipeline

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::pipeline::traits::{EditOutput, EditPipeline, EditRequest};
use crate::pipeline::variants::VariantSpec;

/// Prepended to every prompt so edits keep the subject recognizable
const FACE_PRESERVATION_PROMPT: &str =
    "Preserve the person's facial features, identity, and likeness exactly.";

const NEGATIVE_PROMPT: &str = "distorted face, disfigured face, ugly face, deformed face, \
     bad anatomy, extra limbs, missing limbs, blurry, low quality, \
     watermark, text, signature";

/// Edit pipeline backed by a sidecar process over HTTP
pub struct HttpEditPipeline {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct ApiLoadRequest<'a> {
    variant: &'a str,
    checkpoint_suffix: &'a str,
    steps: u32,
}

#[derive(Debug, Serialize)]
struct ApiEditRequest {
    image: String,
    prompt: String,
    negative_prompt: String,
    num_inference_steps: u32,
    true_cfg_scale: f32,
    seed: i64,
}

#[derive(Debug, Deserialize)]
struct ApiEditResponse {
    image: String,
    seed: i64,
}

impl HttpEditPipeline {
    /// Create a client against the sidecar base URL. No overall request
    /// timeout is set here; the caller imposes its own deadline on generate.
    pub fn new(endpoint: String) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn build_prompt(instruction: &str, style_prompt: Option<&str>) -> String {
        let instruction = sanitize(instruction);
        match style_prompt.map(sanitize).filter(|s| !s.is_empty()) {
            Some(style) => format!("{} {} {}", FACE_PRESERVATION_PROMPT, style, instruction),
            None => format!("{} {}", FACE_PRESERVATION_PROMPT, instruction),
        }
    }
}

/// Trim whitespace and stray wrapping quotes from caller-supplied text
fn sanitize(text: &str) -> String {
    text.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim()
        .to_string()
}

#[async_trait]
impl EditPipeline for HttpEditPipeline {
    async fn load(&self, variant: &VariantSpec) -> Result<()> {
        let url = format!("{}/load", self.endpoint);
        debug!(variant = %variant.key, url = %url, "requesting pipeline load");

        let request = ApiLoadRequest {
            variant: &variant.key,
            checkpoint_suffix: &variant.checkpoint_suffix,
            steps: variant.steps,
        };

        let response = self.client.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Processing(format!(
                "pipeline load returned {}: {}",
                status, body
            )));
        }

        Ok(())
    }

    async fn generate(&self, variant: &VariantSpec, request: EditRequest) -> Result<EditOutput> {
        let url = format!("{}/edit", self.endpoint);

        let seed = request
            .seed
            .ok_or_else(|| AppError::Internal("generate called without a seed".to_string()))?;

        let api_request = ApiEditRequest {
            image: base64::engine::general_purpose::STANDARD.encode(&request.image_data),
            prompt: Self::build_prompt(&request.instruction, request.style_prompt.as_deref()),
            negative_prompt: NEGATIVE_PROMPT.to_string(),
            num_inference_steps: variant.steps,
            true_cfg_scale: variant.cfg_scale,
            seed,
        };

        debug!(variant = %variant.key, seed, "sending edit request");

        let response = self.client.post(&url).json(&api_request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Processing(format!(
                "pipeline edit returned {}: {}",
                status, body
            )));
        }

        let api_response: ApiEditResponse = response
            .json()
            .await
            .map_err(|e| AppError::Processing(format!("failed to parse edit response: {}", e)))?;

        let image_data = base64::engine::general_purpose::STANDARD
            .decode(&api_response.image)
            .map_err(|e| AppError::Processing(format!("invalid image payload: {}", e)))?;

        Ok(EditOutput {
            image_data,
            seed: api_response.seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_quotes_and_whitespace() {
        assert_eq!(sanitize("  \"add a red hat\"  "), "add a red hat");
        assert_eq!(sanitize("'cinematic lighting'"), "cinematic lighting");
        assert_eq!(sanitize("plain"), "plain");
    }

    #[test]
    fn test_build_prompt_includes_face_preservation() {
        let prompt = HttpEditPipeline::build_prompt("add a hat", None);
        assert!(prompt.starts_with(FACE_PRESERVATION_PROMPT));
        assert!(prompt.ends_with("add a hat"));
    }

    #[test]
    fn test_build_prompt_inserts_style_between() {
        let prompt = HttpEditPipeline::build_prompt("add a hat", Some("photorealistic"));
        assert_eq!(
            prompt,
            format!("{} photorealistic add a hat", FACE_PRESERVATION_PROMPT)
        );
    }

    #[test]
    fn test_build_prompt_skips_blank_style() {
        let prompt = HttpEditPipeline::build_prompt("add a hat", Some("  "));
        assert_eq!(prompt, format!("{} add a hat", FACE_PRESERVATION_PROMPT));
    }
}
