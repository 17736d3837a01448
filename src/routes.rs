use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::catalog::{CatalogClient, CatalogError, Product};
use crate::config::ResponseMode;
use crate::gemini::{GeminiClient, GeminiError, InlineImage};
use crate::models::{FrameImage, GenerationRequest, InlineResponse, MultiFrameResponse, StoredResponse};
use crate::prompt::{compose_prompt, safe_frame_count};
use crate::storage::{store_inline_image, ArtifactStore, StorageError};

#[derive(Clone)]
pub struct AppState {
    /// `None` when no recognized credential variable was set; the lookbook
    /// handler short-circuits before any network call in that case.
    pub gemini: Option<Arc<GeminiClient>>,
    pub store: Arc<dyn ArtifactStore>,
    pub catalog: Arc<CatalogClient>,
    pub response_mode: ResponseMode,
    pub storage_prefix: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/lookbook",
            post(generate_lookbook).fallback(method_not_allowed),
        )
        .route(
            "/api/products",
            get(search_products).fallback(method_not_allowed),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Request-level error taxonomy, with the exact JSON bodies clients rely on.
/// Nothing here is retried; every variant is terminal for the request.
#[derive(Debug)]
pub enum ApiError {
    /// No credential configured; raised before any upstream call.
    MissingKey,
    /// Gemini rejected the request; status and raw body are forwarded.
    Upstream { status: u16, details: String },
    /// Well-formed but image-less upstream response, raw payload attached.
    NoImage { debug: Value },
    /// Everything else: decode, upload, network-unreachable, parse.
    Internal(String),
    Catalog,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MissingKey => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Missing Gemini API key in env"})),
            )
                .into_response(),
            ApiError::Upstream { status, details } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                Json(json!({"error": "Gemini request failed", "details": details})),
            )
                .into_response(),
            ApiError::NoImage { debug } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "No image returned from Gemini", "debug": debug})),
            )
                .into_response(),
            ApiError::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to generate image", "details": details})),
            )
                .into_response(),
            ApiError::Catalog => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "WooCommerce API request failed"})),
            )
                .into_response(),
        }
    }
}

impl From<GeminiError> for ApiError {
    fn from(err: GeminiError) -> Self {
        match err {
            GeminiError::Upstream { status, details } => ApiError::Upstream { status, details },
            GeminiError::NoImage { debug } => ApiError::NoImage { debug },
            GeminiError::Unreachable(msg) | GeminiError::Parse(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<CatalogError> for ApiError {
    fn from(_: CatalogError) -> Self {
        ApiError::Catalog
    }
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({"error": "Method not allowed"})),
    )
        .into_response()
}

fn data_url(image: &InlineImage) -> String {
    format!("data:{};base64,{}", image.mime_type, image.data)
}

/// POST /api/lookbook — the whole pipeline runs strictly in sequence:
/// compose, generate, extract, persist, respond.
pub async fn generate_lookbook(
    State(state): State<AppState>,
    body: Option<Json<GenerationRequest>>,
) -> Result<Response, ApiError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();

    let gemini = state.gemini.as_ref().ok_or(ApiError::MissingKey)?;

    let frames = safe_frame_count(request.count.as_ref());
    let prompt = compose_prompt(&request, frames);
    info!(
        "🚀 Generating lookbook: concept={:?} frames={}",
        request.concept, frames
    );

    let images = gemini.generate(&prompt, frames).await?;

    if frames > 1 {
        let response = MultiFrameResponse {
            message: "Lookbook frames generated".to_string(),
            concept: request.concept,
            skus: request.skus,
            palette: request.palette,
            images: images
                .iter()
                .map(|img| FrameImage {
                    mime: img.mime_type.clone(),
                    data_url: data_url(img),
                })
                .collect(),
        };
        info!("✅ Returning {} frame(s) inline", response.images.len());
        return Ok(Json(response).into_response());
    }

    // Single frame. Selection already took the first qualifying part.
    let image = &images[0];
    match state.response_mode {
        ResponseMode::StoredUrl => {
            let artifact = store_inline_image(
                state.store.as_ref(),
                &state.storage_prefix,
                &request.concept,
                image,
            )
            .await?;
            info!("✅ Lookbook stored at {}", artifact.path);
            Ok(Json(StoredResponse {
                message: "Lookbook image generated".to_string(),
                url: artifact.public_url,
            })
            .into_response())
        }
        ResponseMode::Inline => {
            info!("✅ Returning lookbook inline ({} b64 chars)", image.data.len());
            Ok(Json(InlineResponse {
                message: "Lookbook image generated".to_string(),
                image: data_url(image),
            })
            .into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: String,
}

/// GET /api/products — field-projection proxy over the WooCommerce catalog.
pub async fn search_products(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    info!("🔍 Catalog search: {:?}", query.search);
    let products = state.catalog.search(&query.search).await?;
    Ok(Json(products))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogConfig;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use base64::Engine;
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct StubStore {
        puts: Mutex<Vec<(String, String, Vec<u8>)>>,
    }

    #[async_trait]
    impl ArtifactStore for StubStore {
        async fn put(
            &self,
            key: &str,
            content_type: &str,
            data: Vec<u8>,
        ) -> Result<String, StorageError> {
            self.puts
                .lock()
                .unwrap()
                .push((key.to_string(), content_type.to_string(), data));
            Ok(format!("https://store.test/{key}"))
        }
    }

    /// Minimal upstream standing in for the Gemini endpoint: answers any
    /// `POST /models/...` with a fixed status and payload.
    async fn spawn_upstream(status: StatusCode, payload: Value) -> String {
        let app = Router::new().route(
            "/models/*rest",
            post(move || {
                let payload = payload.clone();
                async move { (status, Json(payload)) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn state_with(
        gemini: Option<Arc<GeminiClient>>,
        mode: ResponseMode,
    ) -> (AppState, Arc<StubStore>) {
        let store = Arc::new(StubStore::default());
        let catalog = Arc::new(CatalogClient::new(&CatalogConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
        }));
        let state = AppState {
            gemini,
            store: store.clone(),
            catalog,
            response_mode: mode,
            storage_prefix: "lookbooks".to_string(),
        };
        (state, store)
    }

    async fn post_lookbook(state: AppState, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method("POST").uri("/api/lookbook");
        let request = match body {
            Some(value) => builder
                .header("content-type", "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn one_png_payload(data: &str) -> Value {
        json!({
            "candidates": [{"content": {"parts": [
                {"inlineData": {"data": data, "mimeType": "image/png"}}
            ]}}]
        })
    }

    #[tokio::test]
    async fn missing_credential_short_circuits() {
        let (state, store) = state_with(None, ResponseMode::StoredUrl);
        let (status, body) = post_lookbook(state, Some(json!({"concept": "x"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Missing Gemini API key in env"}));
        assert!(store.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn wrong_method_yields_405_envelope() {
        let (state, _) = state_with(None, ResponseMode::StoredUrl);
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/lookbook")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"error": "Method not allowed"}));
    }

    #[tokio::test]
    async fn generates_and_stores_a_single_frame() {
        let pixels: Vec<u8> = vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a];
        let encoded = base64::engine::general_purpose::STANDARD.encode(&pixels);
        let base = spawn_upstream(StatusCode::OK, one_png_payload(&encoded)).await;
        let gemini = Arc::new(GeminiClient::new("test-key".into(), base));
        let (state, store) = state_with(Some(gemini), ResponseMode::StoredUrl);

        let (status, body) = post_lookbook(
            state,
            Some(json!({
                "concept": "Midnight Rose",
                "palette": ["black", "gold"],
                "skus": ["SKU1"]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Lookbook image generated");
        let url = body["url"].as_str().unwrap();
        assert!(url.starts_with("https://store.test/lookbooks/"));
        assert!(url.contains("Midnight-Rose"));
        assert!(url.ends_with(".png"));

        let puts = store.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].1, "image/png");
        assert_eq!(puts[0].2, pixels);
    }

    #[tokio::test]
    async fn empty_body_is_not_an_error() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"img");
        let base = spawn_upstream(StatusCode::OK, one_png_payload(&encoded)).await;
        let gemini = Arc::new(GeminiClient::new("test-key".into(), base));
        let (state, _) = state_with(Some(gemini), ResponseMode::StoredUrl);

        let (status, body) = post_lookbook(state, None).await;
        assert_eq!(status, StatusCode::OK);
        // Empty concept falls back to the placeholder slug.
        assert!(body["url"].as_str().unwrap().contains("-concept.png"));
    }

    #[tokio::test]
    async fn inline_mode_returns_a_data_url() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"img");
        let base = spawn_upstream(StatusCode::OK, one_png_payload(&encoded)).await;
        let gemini = Arc::new(GeminiClient::new("test-key".into(), base));
        let (state, store) = state_with(Some(gemini), ResponseMode::Inline);

        let (status, body) = post_lookbook(state, Some(json!({"concept": "x"}))).await;
        assert_eq!(status, StatusCode::OK);
        let image = body["image"].as_str().unwrap();
        assert!(image.starts_with("data:image/png;base64,"));
        assert!(store.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn multi_frame_request_returns_inline_array_with_shortfall() {
        let payload = json!({
            "candidates": [{"content": {"parts": [
                {"inlineData": {"data": "QQ==", "mimeType": "image/png"}},
                {"inlineData": {"data": "Qg==", "mimeType": "image/jpeg"}}
            ]}}]
        });
        let base = spawn_upstream(StatusCode::OK, payload).await;
        let gemini = Arc::new(GeminiClient::new("test-key".into(), base));
        let (state, store) = state_with(Some(gemini), ResponseMode::StoredUrl);

        let (status, body) = post_lookbook(
            state,
            Some(json!({"concept": "Trio", "count": 3, "palette": ["noir"]})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["concept"], "Trio");
        assert_eq!(body["palette"], json!(["noir"]));
        let images = body["images"].as_array().unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0]["mime"], "image/png");
        assert_eq!(images[1]["data_url"], "data:image/jpeg;base64,Qg==");
        // Multi-frame responses never touch the object store.
        assert!(store.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upstream_rejection_propagates_status_and_body() {
        let base = spawn_upstream(StatusCode::BAD_REQUEST, json!({"error": "bad prompt"})).await;
        let gemini = Arc::new(GeminiClient::new("test-key".into(), base));
        let (state, _) = state_with(Some(gemini), ResponseMode::StoredUrl);

        let (status, body) = post_lookbook(state, Some(json!({"concept": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Gemini request failed");
        assert!(body["details"].as_str().unwrap().contains("bad prompt"));
    }

    #[tokio::test]
    async fn imageless_payload_is_a_terminal_500_with_debug() {
        let payload = json!({"candidates": [{"content": {"parts": [{"text": "no image"}]}}]});
        let base = spawn_upstream(StatusCode::OK, payload.clone()).await;
        let gemini = Arc::new(GeminiClient::new("test-key".into(), base));
        let (state, _) = state_with(Some(gemini), ResponseMode::StoredUrl);

        let (status, body) = post_lookbook(state, Some(json!({"concept": "x"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "No image returned from Gemini");
        assert_eq!(body["debug"], payload);
    }

    #[tokio::test]
    async fn catalog_search_projects_upstream_records() {
        let products = json!([{
            "id": 1,
            "sku": "SKU1",
            "name": "Silk Scarf",
            "images": [{"src": "https://cdn.test/a.jpg"}],
            "short_description": "A scarf.",
            "price": "120",
            "regular_price": "150",
            "sale_price": "120",
            "permalink": "https://shop.test/silk-scarf",
            "tags": [{"name": "silk"}],
            "categories": [{"name": "Accessories"}],
            "attributes": [{"name": "Color", "options": ["Noir"]}]
        }]);
        let app = Router::new().route(
            "/products",
            get(move || {
                let products = products.clone();
                async move { Json(products) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let catalog = Arc::new(CatalogClient::new(&CatalogConfig {
            base_url: format!("http://{addr}"),
            consumer_key: "ck".to_string(),
            consumer_secret: "cs".to_string(),
        }));
        let (mut state, _) = state_with(None, ResponseMode::StoredUrl);
        state.catalog = catalog;

        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/products?search=scarf")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body[0]["image"], "https://cdn.test/a.jpg");
        assert_eq!(body[0]["tags"], json!(["silk"]));
        assert_eq!(body[0]["attributes"][0]["options"], json!(["Noir"]));
    }

    #[tokio::test]
    async fn catalog_failure_collapses_to_generic_error() {
        // Nothing listens on the configured base URL.
        let (state, _) = state_with(None, ResponseMode::StoredUrl);
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/products?search=x")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"error": "WooCommerce API request failed"}));
    }
}
