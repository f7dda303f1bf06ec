//! Client for a Stable Diffusion web API (AUTOMATIC1111-compatible).
//!
//! Uses `POST /sdapi/v1/txt2img` and `POST /sdapi/v1/img2img`; images travel
//! as base64-encoded PNG in both directions.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    config::ModelConfig,
    error::{ConfigError, GenerationError, Result},
    generation::traits::{InferenceService, RenderRequest},
    video::types::Frame,
};

/// Response body shared by both endpoints
#[derive(Debug, Deserialize)]
struct RenderResponse {
    #[serde(default)]
    images: Vec<String>,
}

pub struct HttpService {
    client: reqwest::Client,
    api_url: String,
    model_id: Option<String>,
}

impl HttpService {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            model_id: config.model_id.clone(),
        })
    }

    /// Endpoint used for `request`
    pub fn endpoint(&self, request: &RenderRequest<'_>) -> String {
        let route = if request.init.is_some() { "img2img" } else { "txt2img" };
        format!("{}/sdapi/v1/{}", self.api_url, route)
    }

    /// JSON body for `request`
    pub fn payload(&self, request: &RenderRequest<'_>) -> Result<Value> {
        // -1 asks the server for a random seed, so a real seed must never map onto it
        let seed = match request.seed {
            Some(seed) => i64::try_from(seed).map_err(|_| ConfigError::InvalidValue {
                key: "seed".to_string(),
                value: seed.to_string(),
            })?,
            None => -1,
        };

        let mut body = json!({
            "prompt": request.prompt,
            "negative_prompt": request.negative_prompt,
            "width": request.width,
            "height": request.height,
            "steps": request.steps,
            "cfg_scale": request.guidance_scale,
            "seed": seed,
            "batch_size": 1,
            "n_iter": 1,
        });

        if let Some(model_id) = &self.model_id {
            body["override_settings"] = json!({ "sd_model_checkpoint": model_id });
        }

        if let Some(init) = request.init {
            let png = init.frame.encode_png()?;
            body["init_images"] = json!([STANDARD.encode(png)]);
            body["denoising_strength"] = json!(init.strength);
        }

        Ok(body)
    }

    /// Decode the first image of a response body
    fn decode_response(body: &str) -> Result<Frame> {
        let response: RenderResponse =
            serde_json::from_str(body).map_err(|e| GenerationError::InvalidResponse {
                reason: format!("malformed JSON: {}", e),
            })?;

        let first = response
            .images
            .first()
            .ok_or_else(|| GenerationError::InvalidResponse {
                reason: "response contained no images".to_string(),
            })?;

        // Some servers prefix a data URL header
        let encoded = first
            .split_once(',')
            .map(|(_, data)| data)
            .unwrap_or(first.as_str());
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| GenerationError::InvalidResponse {
                reason: format!("image is not valid base64: {}", e),
            })?;

        Ok(Frame::decode(&bytes)?)
    }
}

#[async_trait]
impl InferenceService for HttpService {
    fn name(&self) -> &str {
        "http"
    }

    async fn render(&self, request: &RenderRequest<'_>) -> Result<Frame> {
        let url = self.endpoint(request);
        let body = self.payload(request)?;
        debug!("POST {} (prompt {:?}, seed {:?})", url, request.prompt, request.seed);

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(GenerationError::InvalidResponse {
                reason: format!("{} returned {}: {}", url, status.as_u16(), text),
            }
            .into());
        }

        Self::decode_response(&text)
    }
}
