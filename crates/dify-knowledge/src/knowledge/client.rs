//! Dify API client
//!
//! Maps the two knowledge calls onto `GET /datasets` and
//! `POST /datasets/{id}/retrieve`. Bodies are returned verbatim.

use reqwest::Url;
use tracing::debug;

use crate::error::{DifyError, Result};
use crate::network::HttpClient;
use crate::settings::Settings;

use super::types::{ListKnowledgeParams, QueryKnowledgeParams};

/// Client for one Dify endpoint
pub struct DifyClient {
    http: HttpClient,
    base_url: String,
}

impl DifyClient {
    /// Create a client from settings
    ///
    /// The base URL is parsed per call, so a malformed `DIFY_API_URL`
    /// surfaces as a call error rather than a startup failure.
    pub fn new(settings: Settings) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(&settings)?,
            base_url: settings.api_url,
        })
    }

    /// Configured base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full API URL by appending path segments to the base URL
    ///
    /// Segments are percent-encoded, so an ID cannot escape its path slot.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| DifyError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| DifyError::InvalidUrl(format!("{}: cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// List knowledge bases via GET /datasets
    pub async fn list_datasets(&self, params: &ListKnowledgeParams) -> Result<String> {
        let url = self.endpoint(&["datasets"])?;
        debug!(%url, keyword = %params.keyword, "Listing datasets");
        self.http.get_text(url, params).await
    }

    /// Query a knowledge base via POST /datasets/{id}/retrieve
    pub async fn retrieve(&self, params: &QueryKnowledgeParams) -> Result<String> {
        let url = self.endpoint(&["datasets", &params.id, "retrieve"])?;
        debug!(%url, "Retrieving from dataset");
        self.http.post_json_text(url, params).await
    }
}
