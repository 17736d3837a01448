use std::env;

/// Recognized Gemini credential variables, most specific first. An operator
/// can override a general key with an image-specific one without code changes.
pub const GEMINI_KEY_VARS: [&str; 4] = [
    "GOOGLE_GEMINI_IMAGE_API_KEY",
    "GEMINI_IMAGE_API_KEY",
    "GEMINI_API_KEY",
    "GOOGLE_GEMINI_API_KEY",
];

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_CATALOG_API_BASE: &str = "https://maisongdcparis.com/wp-json/wc/v3";

/// Short non-reversible preview of a credential for startup logging.
pub fn key_preview(key: &str) -> String {
    key.chars().take(6).collect()
}

/// Returns the first non-empty value found by `lookup` over `names`, in order.
pub fn resolve_api_key<F>(names: &[&str], lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names
        .iter()
        .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
}

/// How the lookbook endpoint returns a generated single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    /// Upload to the object store and return `{message, url}` (canonical:
    /// keeps the response small regardless of image size).
    #[default]
    StoredUrl,
    /// Embed the image as a base64 data URL. Subject to response payload
    /// ceilings in hosted environments, kept as a documented alternative.
    Inline,
}

impl ResponseMode {
    fn from_env() -> Self {
        match env::var("LOOKBOOK_RESPONSE_MODE").as_deref() {
            Ok("inline") => ResponseMode::Inline,
            _ => ResponseMode::StoredUrl,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers (MinIO, Spaces, ...).
    pub endpoint_url: Option<String>,
    /// Key prefix under which lookbook frames are written.
    pub prefix: String,
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Resolved once at startup from `GEMINI_KEY_VARS`; `None` surfaces as a
    /// configuration error when the lookbook endpoint is actually hit.
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    pub response_mode: ResponseMode,
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        let gemini_api_key = resolve_api_key(&GEMINI_KEY_VARS, |name| env::var(name).ok());
        let gemini_api_base =
            env::var("GEMINI_API_BASE").unwrap_or_else(|_| DEFAULT_GEMINI_API_BASE.to_string());

        let storage = StorageConfig {
            bucket: env::var("LOOKBOOK_S3_BUCKET").unwrap_or_else(|_| "maison-lookbooks".into()),
            region: env::var("LOOKBOOK_S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .unwrap_or_else(|_| "eu-west-3".into()),
            endpoint_url: env::var("LOOKBOOK_S3_ENDPOINT").ok(),
            prefix: env::var("LOOKBOOK_S3_PREFIX").unwrap_or_else(|_| "lookbooks".into()),
        };

        let catalog = CatalogConfig {
            base_url: env::var("WC_API_BASE")
                .unwrap_or_else(|_| DEFAULT_CATALOG_API_BASE.to_string()),
            consumer_key: env::var("WC_CONSUMER_KEY").unwrap_or_default(),
            consumer_secret: env::var("WC_CONSUMER_SECRET").unwrap_or_default(),
        };

        let port = env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080);

        Config {
            gemini_api_key,
            gemini_api_base,
            response_mode: ResponseMode::from_env(),
            storage,
            catalog,
            port,
        }
    }
}
