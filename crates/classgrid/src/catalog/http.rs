//! Catalog client backed by the `/api/search` and `/api/sections` endpoints.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::CatalogClient;
use crate::error::LookupError;
use crate::types::{CourseResult, Section};

pub struct HttpCatalogClient {
    client: Client,
    base_url: Url,
}

impl HttpCatalogClient {
    /// Creates a client for the catalog served at `base_url` (e.g. `http://127.0.0.1:5000`).
    pub fn new(base_url: &str) -> Result<Self, LookupError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| LookupError::Network {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
        })
    }

    fn endpoint(&self, path: &str, key: &str, value: &str) -> Result<Url, LookupError> {
        let mut url = self.base_url.join(path)?;
        url.query_pairs_mut().append_pair(key, value);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned + Default>(&self, url: Url) -> Result<T, LookupError> {
        debug!(url = %url, "Catalog request");

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(url = %url, status = status.as_u16(), "Catalog request failed");
            return Err(LookupError::Status {
                status: status.as_u16(),
                message,
            });
        }

        // The backend answers `null` for an empty list.
        let body: Option<T> = response.json().await?;
        Ok(body.unwrap_or_default())
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn search_courses(&self, query: &str) -> Result<Vec<CourseResult>, LookupError> {
        let url = self.endpoint("api/search", "q", query)?;
        self.get_json(url).await
    }

    async fn sections_for_course(&self, course_id: &str) -> Result<Vec<Section>, LookupError> {
        let url = self.endpoint("api/sections", "courseID", course_id)?;
        self.get_json(url).await
    }
}
