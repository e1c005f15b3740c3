//! HTTP client for the generation endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use morphfeed_core::models::Recipe;
use morphfeed_core::{CorrelationId, ErrorMetadata, GenerationSettings, LogLevel};
use serde::Serialize;
use serde_json::Value;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::{classify_status, InvocationError};
use crate::extract::{extract_output_url, ExtractionStrategy, DEFAULT_STRATEGIES};
use crate::retry::{with_retry, RetryPolicy};

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const CORRELATION_HEADER: &str = "X-Correlation-Id";

/// One generation call against an already uploaded source.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    /// Durable URL of the uploaded source; never a local reference
    pub source_url: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub strength: f32,
    pub seed: Option<i64>,
    pub correlation_id: CorrelationId,
    pub recipe_id: String,
}

impl InvocationRequest {
    pub fn for_recipe(
        source_url: impl Into<String>,
        recipe: &Recipe,
        correlation_id: CorrelationId,
    ) -> Self {
        let spec = recipe.spec();
        Self {
            source_url: source_url.into(),
            prompt: spec.prompt.clone(),
            negative_prompt: spec.negative.clone(),
            strength: spec.strength,
            seed: spec.seed,
            correlation_id,
            recipe_id: recipe.id().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), InvocationError> {
        let source = self.source_url.trim();
        if !(source.starts_with("http://") || source.starts_with("https://")) {
            return Err(InvocationError::InvalidRequest(format!(
                "source URL must be a durable http(s) URL, got '{}'",
                self.source_url
            )));
        }
        if self.prompt.trim().is_empty() {
            return Err(InvocationError::InvalidRequest(
                "prompt must not be empty".to_string(),
            ));
        }
        if !self.strength.is_finite() || !(0.0..=1.0).contains(&self.strength) {
            return Err(InvocationError::InvalidRequest(format!(
                "strength {} is outside [0, 1]",
                self.strength
            )));
        }
        Ok(())
    }
}

/// Wire body sent to the endpoint.
#[derive(Debug, Serialize)]
struct GenerationBody<'a> {
    image_url: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<&'a str>,
    strength: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
}

impl<'a> From<&'a InvocationRequest> for GenerationBody<'a> {
    fn from(request: &'a InvocationRequest) -> Self {
        Self {
            image_url: request.source_url.trim(),
            prompt: &request.prompt,
            negative_prompt: request.negative_prompt.as_deref(),
            strength: request.strength,
            seed: request.seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvocationSuccess {
    pub output_url: String,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Remote generation capability used by the orchestrators.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Run one generation and return the output URL.
    async fn invoke(&self, request: &InvocationRequest)
        -> Result<InvocationSuccess, InvocationError>;

    /// Download a generated output.
    async fn fetch_output(
        &self,
        url: &str,
        correlation_id: CorrelationId,
    ) -> Result<Bytes, InvocationError>;
}

/// Generation endpoint client with per-attempt deadline and retries.
#[derive(Clone)]
pub struct InvocationClient {
    http_client: reqwest::Client,
    endpoint_url: String,
    api_token: Option<String>,
    timeout: Duration,
    policy: RetryPolicy,
    strategies: &'static [ExtractionStrategy],
}

impl Debug for InvocationClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("InvocationClient")
            .field("endpoint_url", &self.endpoint_url)
            .field("has_api_token", &self.api_token.is_some())
            .field("timeout", &self.timeout)
            .field("policy", &self.policy)
            .finish()
    }
}

impl InvocationClient {
    pub fn new(endpoint_url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client for generation endpoint")?;

        Ok(Self {
            http_client,
            endpoint_url: endpoint_url.into(),
            api_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            policy: RetryPolicy::default(),
            strategies: DEFAULT_STRATEGIES,
        })
    }

    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        settings.validate()?;
        let mut client = Self::new(settings.endpoint_url.trim())?
            .with_timeout(Duration::from_secs(settings.timeout_secs))
            .with_retry_policy(RetryPolicy::from_settings(settings));
        if let Some(token) = &settings.api_token {
            client = client.with_api_token(token.clone());
        }
        Ok(client)
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Deadline applied to each attempt separately.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `call` under the per-attempt deadline. The call future is dropped
    /// when the deadline fires, which aborts the in-flight request.
    async fn with_deadline<T, Fut>(&self, call: Fut) -> Result<T, InvocationError>
    where
        Fut: Future<Output = Result<T, InvocationError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(InvocationError::Timeout {
                after: self.timeout,
            }),
        }
    }

    async fn send_once(&self, request: &InvocationRequest) -> Result<String, InvocationError> {
        self.with_deadline(self.post(request)).await
    }

    async fn post(&self, request: &InvocationRequest) -> Result<String, InvocationError> {
        let body = GenerationBody::from(request);
        let mut builder = self
            .http_client
            .post(&self.endpoint_url)
            .header(CORRELATION_HEADER, request.correlation_id.to_string())
            .json(&body);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        match classify_status(status, &text) {
            Some(err) => Err(err),
            None => Ok(text),
        }
    }

    async fn download(&self, url: &str) -> Result<Bytes, InvocationError> {
        let response = self.http_client.get(url).send().await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            // Never hand an error page to the compositor as image data
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body).unwrap_or(InvocationError::Protocol {
                status: Some(status),
                message: body,
            }));
        }
        Ok(response.bytes().await?)
    }

    fn parse_output(&self, text: &str, request: &InvocationRequest) -> Result<String, InvocationError> {
        let payload: Value = serde_json::from_str(text).map_err(|e| InvocationError::Protocol {
            status: None,
            message: format!("response is not valid JSON: {}", e),
        })?;

        let (url, strategy) = extract_output_url(&payload, self.strategies).ok_or_else(|| {
            InvocationError::Protocol {
                status: None,
                message: "no output URL found in response".to_string(),
            }
        })?;

        tracing::debug!(
            correlation_id = %request.correlation_id,
            recipe_id = %request.recipe_id,
            strategy = strategy,
            "Extracted output URL"
        );

        Ok(url.to_string())
    }
}

#[async_trait]
impl Generator for InvocationClient {
    async fn invoke(
        &self,
        request: &InvocationRequest,
    ) -> Result<InvocationSuccess, InvocationError> {
        request.validate()?;

        let start = Instant::now();
        tracing::info!(
            correlation_id = %request.correlation_id,
            recipe_id = %request.recipe_id,
            strength = request.strength,
            max_attempts = self.policy.max_attempts(),
            "Generation invocation started"
        );

        let (result, attempts) = with_retry(
            &self.policy,
            request.correlation_id,
            "invoke",
            |attempt| async move {
                tracing::debug!(
                    correlation_id = %request.correlation_id,
                    recipe_id = %request.recipe_id,
                    attempt = attempt,
                    "Sending generation request"
                );
                let text = self.send_once(request).await?;
                self.parse_output(&text, request)
            },
        )
        .await;

        let elapsed = start.elapsed();
        match result {
            Ok(output_url) => {
                tracing::info!(
                    correlation_id = %request.correlation_id,
                    recipe_id = %request.recipe_id,
                    attempts = attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Generation invocation succeeded"
                );
                Ok(InvocationSuccess {
                    output_url,
                    attempts,
                    elapsed,
                })
            }
            Err(err) => {
                log_final_failure(&err, request, attempts, elapsed);
                Err(err)
            }
        }
    }

    async fn fetch_output(
        &self,
        url: &str,
        correlation_id: CorrelationId,
    ) -> Result<Bytes, InvocationError> {
        let (result, attempts) = with_retry(&self.policy, correlation_id, "fetch_output", |_| {
            self.with_deadline(self.download(url))
        })
        .await;

        match &result {
            Ok(data) => tracing::debug!(
                correlation_id = %correlation_id,
                size_bytes = data.len(),
                attempts = attempts,
                "Fetched generated output"
            ),
            Err(err) => tracing::warn!(
                correlation_id = %correlation_id,
                attempts = attempts,
                error_kind = %err.kind(),
                error = %err,
                "Failed to fetch generated output"
            ),
        }
        result
    }
}

fn log_final_failure(
    err: &InvocationError,
    request: &InvocationRequest,
    attempts: u32,
    elapsed: Duration,
) {
    let elapsed_ms = elapsed.as_millis() as u64;
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(
            correlation_id = %request.correlation_id,
            recipe_id = %request.recipe_id,
            attempts = attempts,
            elapsed_ms = elapsed_ms,
            error_kind = %err.kind(),
            error = %err,
            "Generation invocation rejected"
        ),
        LogLevel::Warn => tracing::warn!(
            correlation_id = %request.correlation_id,
            recipe_id = %request.recipe_id,
            attempts = attempts,
            elapsed_ms = elapsed_ms,
            error_kind = %err.kind(),
            error = %err,
            "Generation invocation failed"
        ),
        LogLevel::Error => tracing::error!(
            correlation_id = %request.correlation_id,
            recipe_id = %request.recipe_id,
            attempts = attempts,
            elapsed_ms = elapsed_ms,
            error_kind = %err.kind(),
            error = %err,
            "Generation invocation failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morphfeed_core::models::RecipeSpec;
    use uuid::Uuid;

    fn request() -> InvocationRequest {
        let recipe = Recipe::mood(
            "serene",
            RecipeSpec::new("calm", 0.5).with_negative("blurry").with_seed(42),
        );
        InvocationRequest::for_recipe(
            "https://cdn.example.com/uploads/source.png",
            &recipe,
            CorrelationId::new(Uuid::nil()),
        )
    }

    #[test]
    fn test_request_from_recipe() {
        let request = request();
        assert_eq!(request.recipe_id, "serene");
        assert_eq!(request.negative_prompt.as_deref(), Some("blurry"));
        assert_eq!(request.seed, Some(42));
        request.validate().unwrap();
    }

    #[test]
    fn test_wire_body_shape() {
        let request = request();
        let body = serde_json::to_value(GenerationBody::from(&request)).unwrap();
        assert_eq!(body["image_url"], "https://cdn.example.com/uploads/source.png");
        assert_eq!(body["prompt"], "calm");
        assert_eq!(body["negative_prompt"], "blurry");
        assert_eq!(body["seed"], 42);

        let mut bare = request;
        bare.negative_prompt = None;
        bare.seed = None;
        let body = serde_json::to_value(GenerationBody::from(&bare)).unwrap();
        assert!(body.get("negative_prompt").is_none());
        assert!(body.get("seed").is_none());
    }

    #[test]
    fn test_request_validation() {
        let mut bad = request();
        bad.source_url = "file:///tmp/source.png".to_string();
        assert!(matches!(bad.validate(), Err(InvocationError::InvalidRequest(_))));

        let mut bad = request();
        bad.strength = 1.2;
        assert!(bad.validate().is_err());

        let mut bad = request();
        bad.prompt = String::new();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_debug_hides_token() {
        let client = InvocationClient::new("https://gen.example.com")
            .unwrap()
            .with_api_token("super-secret");
        let debug = format!("{:?}", client);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("has_api_token: true"));
    }

    #[test]
    fn test_from_settings() {
        let mut settings = GenerationSettings::new("https://gen.example.com/v1/generate");
        settings.max_retries = 1;
        settings.timeout_secs = 5;
        let client = InvocationClient::from_settings(&settings).unwrap();
        assert_eq!(client.policy().max_attempts(), 2);
        assert_eq!(client.timeout, Duration::from_secs(5));

        settings.endpoint_url = String::new();
        assert!(InvocationClient::from_settings(&settings).is_err());
    }
}
