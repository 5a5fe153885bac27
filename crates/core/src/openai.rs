use crate::embeddings::Embedder;
use crate::error::{ConfigError, ServiceError};
use crate::traits::LanguageModel;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EMBEDDING_BATCH: usize = 256;

const PROVIDER: &str = "openai";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub temperature: f32,
    pub embedding_batch_size: usize,
    pub request_timeout: Option<Duration>,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.0,
            embedding_batch_size: DEFAULT_EMBEDDING_BATCH,
            request_timeout: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = Url::parse(&self.base_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "base_url",
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        if self.embedding_batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "embedding_batch_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }

    fn client(&self) -> Result<Client, ConfigError> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().map_err(|error| ConfigError::Invalid {
            field: "http_client",
            reason: error.to_string(),
        })
    }
}

async fn post_json<B, R>(
    client: &Client,
    config: &OpenAiConfig,
    path: &str,
    body: &B,
) -> Result<R, ServiceError>
where
    B: Serialize + ?Sized + Sync,
    R: for<'de> Deserialize<'de>,
{
    if config.api_key.trim().is_empty() {
        return Err(ServiceError::Config("OPENAI_API_KEY is not set".to_string()));
    }

    let url = config.endpoint(path);
    debug!(provider = PROVIDER, %url, "sending request");

    let response = client
        .post(&url)
        .bearer_auth(&config.api_key)
        .json(body)
        .send()
        .await
        .map_err(|error| ServiceError::network(PROVIDER, &error))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        debug!(provider = PROVIDER, %status, %body, "provider returned an error");
        return Err(ServiceError::from_status(PROVIDER, status));
    }

    response
        .json::<R>()
        .await
        .map_err(|error| ServiceError::MalformedResponse {
            provider: PROVIDER.to_string(),
            details: if error.is_decode() {
                "unexpected response shape".to_string()
            } else {
                "response body could not be read".to_string()
            },
        })
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            client: config.client()?,
            config,
        })
    }

    async fn embed_chunk(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            input: texts,
        };
        let response: EmbeddingResponse =
            post_json(&self.client, &self.config, "embeddings", &request).await?;
        order_embeddings(response.data, texts.len())
    }
}

/// Restores input order from the `index` field and checks one vector per input.
fn order_embeddings(
    data: Vec<EmbeddingData>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ServiceError> {
    let malformed = |details: String| ServiceError::MalformedResponse {
        provider: PROVIDER.to_string(),
        details,
    };

    if data.len() != expected {
        return Err(malformed(format!(
            "{} embeddings returned for {expected} inputs",
            data.len()
        )));
    }

    let mut ordered: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in data {
        let slot = ordered
            .get_mut(item.index)
            .ok_or_else(|| malformed(format!("embedding index {} out of range", item.index)))?;
        if slot.replace(item.embedding).is_some() {
            return Err(malformed(format!("duplicate embedding index {}", item.index)));
        }
    }

    // every slot is filled: lengths match and indices are unique and in range
    Ok(ordered.into_iter().flatten().collect())
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        &self.config.embedding_model
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.embedding_batch_size) {
            debug!(
                provider = PROVIDER,
                model = %self.config.embedding_model,
                batch_size = batch.len(),
                "embedding batch"
            );
            vectors.extend(self.embed_chunk(batch).await?);
        }
        Ok(vectors)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

pub struct OpenAiChatModel {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiChatModel {
    pub fn new(config: OpenAiConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            client: config.client()?,
            config,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    fn name(&self) -> &str {
        &self.config.chat_model
    }

    async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
        let request = ChatRequest {
            model: &self.config.chat_model,
            temperature: self.config.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response: ChatResponse =
            post_json(&self.client, &self.config, "chat/completions", &request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| ServiceError::MalformedResponse {
                provider: PROVIDER.to_string(),
                details: "completion had no message content".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(index: usize, value: f32) -> EmbeddingData {
        EmbeddingData {
            index,
            embedding: vec![value],
        }
    }

    #[test]
    fn embeddings_are_reordered_by_index() {
        let ordered = order_embeddings(vec![data(1, 1.0), data(0, 0.0), data(2, 2.0)], 3).unwrap();
        assert_eq!(ordered, vec![vec![0.0], vec![1.0], vec![2.0]]);
    }

    #[test]
    fn wrong_cardinality_is_malformed() {
        assert!(matches!(
            order_embeddings(vec![data(0, 0.0)], 2),
            Err(ServiceError::MalformedResponse { .. })
        ));
        assert!(matches!(
            order_embeddings(vec![data(0, 0.0), data(0, 1.0)], 2),
            Err(ServiceError::MalformedResponse { .. })
        ));
        assert!(matches!(
            order_embeddings(vec![data(0, 0.0), data(5, 1.0)], 2),
            Err(ServiceError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn response_shape_parses() {
        let body = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.5,-0.25]}],"model":"text-embedding-3-small"}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.5, -0.25]);

        let body = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":" Paris. "}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some(" Paris. "));
    }

    #[test]
    fn config_rejects_bad_base_url() {
        assert!(OpenAiConfig::new("sk-test")
            .with_base_url("not a url")
            .validate()
            .is_err());
        assert!(OpenAiConfig::new("sk-test")
            .with_base_url("ftp://example.com")
            .validate()
            .is_err());
        assert!(OpenAiConfig::new("sk-test").validate().is_ok());
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = OpenAiConfig::new("sk-test").with_base_url("http://localhost:8080/v1/");
        assert_eq!(config.endpoint("embeddings"), "http://localhost:8080/v1/embeddings");
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let embedder = OpenAiEmbedder::new(OpenAiConfig::new("")).unwrap();
        assert!(matches!(
            embedder.embed_batch(&["hello"]).await,
            Err(ServiceError::Config(_))
        ));

        let model = OpenAiChatModel::new(OpenAiConfig::new("  ")).unwrap();
        assert!(matches!(
            model.generate("hi").await,
            Err(ServiceError::Config(_))
        ));
    }
}
