//! Classification service abstraction
//!
//! The ML model runs as a separate HTTP service. Its JSON answer is relayed
//! to the caller unmodified; this crate only reads the fields it persists
//! (see [`crate::news::ClassificationResult`]).

use crate::config::ClassifierConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Body forwarded to the classification service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifyRequest {
    #[serde(default)]
    pub text: String,

    /// Ask the model for word-level explanations
    #[serde(default)]
    pub explain: bool,
}

/// Trait for text classification
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a text, returning the service's JSON answer
    async fn classify(&self, request: &ClassifyRequest) -> Result<Value>;

    /// Provider name, used as a metrics label
    fn provider(&self) -> &str;
}

/// Client for the HTTP classification service
pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
}

impl HttpClassifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, request: &ClassifyRequest) -> Result<Value> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Upstream {
                status: None,
                message: format!("Request failed: {}", e),
                details: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            let details = error_details(response.text().await.unwrap_or_default());
            return Err(AppError::Upstream {
                status: Some(status.as_u16()),
                message: format!("Classifier returned {}", status),
                details,
            });
        }

        response.json::<Value>().await.map_err(|e| AppError::Upstream {
            status: None,
            message: format!("Failed to parse response: {}", e),
            details: None,
        })
    }

    fn provider(&self) -> &str {
        "http"
    }
}

/// Upstream error body: parsed JSON when possible, the raw text otherwise
fn error_details(body: String) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(&body).unwrap_or(Value::String(body)))
}

/// Mock classifier for testing and local runs
pub struct MockClassifier {
    fake_probability: f64,
}

impl MockClassifier {
    pub fn new(fake_probability: f64) -> Self {
        Self { fake_probability }
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new(72.4)
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(&self, request: &ClassifyRequest) -> Result<Value> {
        let fake = self.fake_probability;
        let mut result = json!({
            "fake_probability": fake,
            "real_probability": ((100.0 - fake) * 10.0).round() / 10.0,
            "detected_language": "en",
            "top_fake_words": [],
        });
        if request.explain {
            result["explanation"] = json!([]);
        }
        Ok(result)
    }

    fn provider(&self) -> &str {
        "mock"
    }
}

/// Create a classifier based on configuration
pub fn create_classifier(config: &ClassifierConfig) -> Result<Arc<dyn Classifier>> {
    match config.provider.as_str() {
        "http" => Ok(Arc::new(HttpClassifier::new(
            config.url.clone(),
            Duration::from_secs(config.timeout_secs),
        )?)),
        "mock" => Ok(Arc::new(MockClassifier::default())),
        other => Err(AppError::Configuration {
            message: format!("Unknown classifier provider: {}", other),
        }),
    }
}

/// Validate and forward a classification request, recording metrics
pub async fn classify_text(classifier: &dyn Classifier, request: ClassifyRequest) -> Result<Value> {
    if request.text.trim().is_empty() {
        return Err(AppError::validation("Text is required for classification."));
    }

    let start = Instant::now();
    let result = classifier.classify(&request).await;
    crate::metrics::record_classification(
        start.elapsed().as_secs_f64(),
        classifier.provider(),
        result.is_ok(),
    );

    if let Err(ref e) = result {
        tracing::warn!(error = %e, provider = classifier.provider(), "Classification failed");
    }
    result
}
