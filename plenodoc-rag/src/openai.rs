//! Hosted embeddings through an OpenAI-compatible `/embeddings` endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const BASE_URL: &str = "https://api.openai.com/v1";
const MODEL: &str = "text-embedding-3-small";
const MODEL_DIMENSIONS: usize = 1536;
const BATCH_LIMIT: usize = 256;
const PROVIDER_LABEL: &str = "OpenAI embeddings";

/// Embeddings from `text-embedding-3-small` (or another model on the same API).
///
/// ```rust,ignore
/// let embedder = OpenAIEmbeddingProvider::from_env()?.with_dimensions(512);
/// let store = IndexStore::open("vector_index", Arc::new(embedder));
/// ```
pub struct OpenAIEmbeddingProvider {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    dimensions: usize,
    truncate_to: Option<usize>,
}

#[derive(Serialize)]
struct EmbedBody<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbedReply {
    data: Vec<EmbedItem>,
}

#[derive(Deserialize)]
struct EmbedItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiFailure {
    error: ApiFailureDetail,
}

#[derive(Deserialize)]
struct ApiFailureDetail {
    message: String,
}

impl OpenAIEmbeddingProvider {
    /// A blank key is [`RagError::NoCredential`].
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key: String = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagError::NoCredential { provider: PROVIDER_LABEL.into() });
        }
        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            endpoint: format!("{BASE_URL}/embeddings"),
            model: MODEL.to_string(),
            dimensions: MODEL_DIMENSIONS,
            truncate_to: None,
        })
    }

    /// Reads `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        Self::new(key)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Use another OpenAI-compatible server, e.g. `http://localhost:8080/v1`.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Self {
        self.endpoint = format!("{}/embeddings", base_url.as_ref().trim_end_matches('/'));
        self
    }

    /// Ask the API to truncate vectors to `dimensions`.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self.truncate_to = Some(dimensions);
        self
    }

    fn failure(&self, message: impl Into<String>) -> RagError {
        RagError::EmbeddingFailed { provider: format!("openai/{}", self.model), message: message.into() }
    }

    async fn post_batch(&self, batch: &[&str]) -> Result<Vec<Vec<f32>>> {
        debug!(model = %self.model, inputs = batch.len(), "requesting embeddings");
        let body = EmbedBody { model: &self.model, input: batch, dimensions: self.truncate_to };

        let response =
            self.http.post(&self.endpoint).bearer_auth(&self.api_key).json(&body).send().await.map_err(|err| {
                error!(model = %self.model, error = %err, "embedding request failed");
                self.failure(format!("request failed: {err}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiFailure>(&text) {
                Ok(failure) => failure.error.message,
                Err(_) => text,
            };
            error!(model = %self.model, %status, "embedding API error");
            return Err(self.failure(format!("{status}: {message}")));
        }

        let mut reply: EmbedReply =
            response.json().await.map_err(|err| self.failure(format!("unreadable response: {err}")))?;
        if reply.data.len() != batch.len() {
            return Err(self.failure(format!("sent {} inputs, got {} vectors", batch.len(), reply.data.len())));
        }
        reply.data.sort_by_key(|item| item.index);
        Ok(reply.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.post_batch(&[text]).await?.pop().ok_or_else(|| self.failure("no vector returned"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_LIMIT) {
            vectors.extend(self.post_batch(batch).await?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
