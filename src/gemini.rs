use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

pub const GEMINI_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

#[derive(Debug, Error)]
pub enum GeminiError {
    /// Upstream answered with a non-success status; carries the raw body so
    /// the handler can forward it verbatim.
    #[error("Gemini request failed: status={status}")]
    Upstream { status: u16, details: String },
    /// No response at all (DNS, connect, read failure).
    #[error("Gemini unreachable: {0}")]
    Unreachable(String),
    /// Well-formed response with no inline image anywhere; carries the raw
    /// payload for diagnostics. Terminal, never retried.
    #[error("no image returned from Gemini")]
    NoImage { debug: Value },
    #[error("failed to parse Gemini response: {0}")]
    Parse(String),
}

/// One inline image pulled out of the upstream response. The payload stays
/// base64-encoded; decoding is the store adapter's job.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
        }
    }

    /// Performs the single generateContent call and extracts up to `frames`
    /// inline images in traversal order. Fewer images than requested is not
    /// an error; zero is.
    pub async fn generate(&self, prompt: &str, frames: u32) -> Result<Vec<InlineImage>, GeminiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, GEMINI_IMAGE_MODEL);
        info!("🔗 Calling {}", url);

        let request_body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": prompt}]
            }]
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GeminiError::Unreachable(e.to_string()))?;

        let status = response.status();
        info!("📥 Gemini response status: {}", status);

        let body = response
            .text()
            .await
            .map_err(|e| GeminiError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            error!("❌ Gemini rejected the request: {}", body);
            return Err(GeminiError::Upstream {
                status: status.as_u16(),
                details: body,
            });
        }

        let raw: Value = serde_json::from_str(&body)
            .map_err(|e| GeminiError::Parse(format!("invalid JSON from Gemini: {e}")))?;
        let parsed: GeminiResponse = serde_json::from_value(raw.clone())
            .map_err(|e| GeminiError::Parse(format!("unexpected Gemini shape: {e}")))?;

        let images = extract_inline_images(&parsed, frames as usize);
        if images.is_empty() {
            let mut truncated = raw.clone();
            truncate_base64_in_json(&mut truncated);
            error!("⚠️ No inline image in Gemini payload: {}", truncated);
            return Err(GeminiError::NoImage { debug: raw });
        }

        info!(
            "🖼️ Extracted {} image(s), first mime type: {}",
            images.len(),
            images[0].mime_type
        );
        Ok(images)
    }
}

// --- Response parsing ---

#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Content,
}

#[derive(Debug, Deserialize, Default)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One response part. Untagged so text parts, inline images, and shapes we
/// have never seen all decode without failing the whole payload.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Inline {
        #[serde(rename = "inlineData", alias = "inline_data")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
    Other(Value),
}

#[derive(Debug, Deserialize)]
pub struct InlineData {
    pub data: String,
    #[serde(rename = "mimeType", alias = "mime_type")]
    pub mime_type: Option<String>,
}

/// In-order traversal over candidates, then parts, collecting non-empty
/// inline payloads up to `max`. Declared media type defaults to PNG.
pub fn extract_inline_images(resp: &GeminiResponse, max: usize) -> Vec<InlineImage> {
    let mut images = Vec::new();
    for candidate in &resp.candidates {
        for part in &candidate.content.parts {
            if images.len() >= max {
                return images;
            }
            if let Part::Inline { inline_data } = part {
                if inline_data.data.is_empty() {
                    continue;
                }
                images.push(InlineImage {
                    mime_type: inline_data
                        .mime_type
                        .clone()
                        .unwrap_or_else(|| "image/png".to_string()),
                    data: inline_data.data.clone(),
                });
            }
        }
    }
    images
}

/// Shortens base64 `data` fields so diagnostic payload logging stays readable.
fn truncate_base64_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let Value::String(s) = val {
                        if s.len() > 100 {
                            // Take chars, not bytes: upstream junk in a
                            // `data` field is not guaranteed to be base64.
                            let head: String = s.chars().take(50).collect();
                            *val = Value::String(format!(
                                "{}...[truncated {} chars]",
                                head,
                                s.len() - head.len()
                            ));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}
