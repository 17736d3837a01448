use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::config::CatalogConfig;

const PAGE_SIZE: u32 = 20;

/// All catalog failure modes collapse into this one variant space; the
/// handler never leaks upstream credentials or internals to the client.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("catalog upstream status {0}")]
    Status(u16),
}

// --- Raw WooCommerce shapes (consumed, not owned) ---

#[derive(Debug, Deserialize)]
struct RawProduct {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    sku: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    images: Vec<RawImage>,
    #[serde(default)]
    short_description: String,
    #[serde(default)]
    price: String,
    #[serde(default)]
    regular_price: String,
    #[serde(default)]
    sale_price: String,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    tags: Vec<RawNamed>,
    #[serde(default)]
    categories: Vec<RawNamed>,
    #[serde(default)]
    attributes: Vec<RawAttribute>,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    #[serde(default)]
    src: String,
}

#[derive(Debug, Deserialize)]
struct RawNamed {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawAttribute {
    #[serde(default)]
    name: String,
    #[serde(default)]
    options: Vec<String>,
}

// --- Normalized client-facing shape ---

#[derive(Debug, Serialize, Clone)]
pub struct Product {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub image: Option<String>,
    pub description: String,
    pub price: String,
    pub regular_price: String,
    pub sale_price: String,
    pub permalink: String,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Serialize, Clone)]
pub struct Attribute {
    pub name: String,
    pub options: Vec<String>,
}

fn project(raw: RawProduct) -> Product {
    Product {
        id: raw.id,
        sku: raw.sku,
        name: raw.name,
        image: raw.images.into_iter().next().map(|i| i.src),
        description: raw.short_description,
        price: raw.price,
        regular_price: raw.regular_price,
        sale_price: raw.sale_price,
        permalink: raw.permalink,
        tags: raw.tags.into_iter().map(|t| t.name).collect(),
        categories: raw.categories.into_iter().map(|c| c.name).collect(),
        attributes: raw
            .attributes
            .into_iter()
            .map(|a| Attribute {
                name: a.name,
                options: a.options,
            })
            .collect(),
    }
}

pub struct CatalogClient {
    client: Client,
    base_url: String,
    consumer_key: String,
    consumer_secret: String,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            consumer_key: config.consumer_key.clone(),
            consumer_secret: config.consumer_secret.clone(),
        }
    }

    /// One product search against the WooCommerce REST API, projected into
    /// the normalized shape.
    pub async fn search(&self, term: &str) -> Result<Vec<Product>, CatalogError> {
        let url = format!("{}/products", self.base_url);
        let per_page = PAGE_SIZE.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("search", term),
                ("consumer_key", self.consumer_key.as_str()),
                ("consumer_secret", self.consumer_secret.as_str()),
                ("per_page", per_page.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("❌ WooCommerce responded with status {}", status);
            return Err(CatalogError::Status(status.as_u16()));
        }

        let raw: Vec<RawProduct> = response.json().await?;
        Ok(raw.into_iter().map(project).collect())
    }
}
