use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Inbound lookbook request. Every field is optional; an absent or invalid
/// body is treated as all-empty so the composer always has something to
/// render.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct GenerationRequest {
    #[serde(default)]
    pub concept: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub palette: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub skus: Vec<String>,
    /// Kept as a raw JSON value so non-numeric garbage coerces to 1 instead
    /// of rejecting the whole body. Clamped by `prompt::safe_frame_count`.
    #[serde(default)]
    pub count: Option<Value>,
}

/// Accepts `"black"`, `["black","gold"]`, or `null` where a list is expected.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(s)) => Ok(vec![s]),
        Some(OneOrMany::Many(v)) => Ok(v),
        None => Ok(Vec::new()),
    }
}

/// Canonical single-frame success envelope (stored-URL mode).
#[derive(Debug, Serialize, Clone)]
pub struct StoredResponse {
    pub message: String,
    pub url: String,
}

/// Inline-mode single-frame envelope: the image travels as a data URL.
#[derive(Debug, Serialize, Clone)]
pub struct InlineResponse {
    pub message: String,
    pub image: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct FrameImage {
    pub mime: String,
    pub data_url: String,
}

/// Multi-frame envelope: echoes the request fields alongside the frames.
#[derive(Debug, Serialize, Clone)]
pub struct MultiFrameResponse {
    pub message: String,
    pub concept: String,
    pub skus: Vec<String>,
    pub palette: Vec<String>,
    pub images: Vec<FrameImage>,
}
