use crate::loader::{FetchError, RELATED_WORDS_PATH, RelatedQuery, RelatedWordsSource};
use crate::render::RelatedWord;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tracing::debug;

/// Fetches related words from a running `/related-words` endpoint.
#[derive(Debug, Clone)]
pub struct HttpRelatedWords {
    base_url: String,
    client: HttpClient,
}

impl HttpRelatedWords {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, HttpClient::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: HttpClient) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint_url(&self, query: &RelatedQuery) -> String {
        format!(
            "{}{}?{}",
            self.base_url,
            RELATED_WORDS_PATH,
            query.to_query_string()
        )
    }
}

#[async_trait]
impl RelatedWordsSource for HttpRelatedWords {
    async fn fetch(&self, query: &RelatedQuery) -> Result<Vec<RelatedWord>, FetchError> {
        let url = self.endpoint_url(query);
        debug!(%url, "Requesting related words");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
