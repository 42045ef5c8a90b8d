use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::async_trait;
use serde_json::{json, Value};
use tracing::warn;

const GENAI_TIMEOUT: Duration = Duration::from_secs(30);

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// A backend able to turn a classification result into advice text.
#[async_trait]
pub trait InsightsProvider: Send + Sync {
    async fn generate_insights(&self, result: &Value, crop_type: &str) -> anyhow::Result<String>;
}

/// Wraps the configured provider, if any. `generate` is infallible: a missing
/// provider, a provider error, or empty provider output all degrade to the
/// deterministic fallback text. Insights failures must never fail a request.
#[derive(Clone)]
pub struct InsightsClient {
    provider: Option<Arc<dyn InsightsProvider>>,
}

impl InsightsClient {
    pub fn new(provider: Option<Arc<dyn InsightsProvider>>) -> Self {
        Self { provider }
    }

    pub fn fallback_only() -> Self {
        Self { provider: None }
    }

    pub async fn generate(&self, result: &Value, crop_type: &str) -> String {
        if let Some(provider) = &self.provider {
            match provider.generate_insights(result, crop_type).await {
                Ok(text) if !text.trim().is_empty() => return text,
                Ok(_) => warn!("insights provider returned empty text, using fallback"),
                Err(e) => warn!(error = %e, "insights provider failed, using fallback"),
            }
        }
        fallback_insights(result, crop_type)
    }
}

/// Pick the provider once at startup. Unknown names log and fall back rather
/// than failing boot: insights are non-fatal by contract.
pub fn provider_from_config(
    name: Option<&str>,
    gemini_api_key: Option<&str>,
    openai_api_key: Option<&str>,
) -> Option<Arc<dyn InsightsProvider>> {
    match name {
        Some("gemini") => match gemini_api_key {
            Some(key) => Some(Arc::new(GeminiProvider::new(key.to_string()))),
            None => {
                warn!("GENAI_PROVIDER=gemini but GEMINI_API_KEY is unset, insights fall back");
                None
            }
        },
        Some("openai") => match openai_api_key {
            Some(key) => Some(Arc::new(OpenAiProvider::new(key.to_string()))),
            None => {
                warn!("GENAI_PROVIDER=openai but OPENAI_API_KEY is unset, insights fall back");
                None
            }
        },
        Some(other) => {
            warn!(provider = other, "unknown GENAI_PROVIDER, insights fall back");
            None
        }
        None => None,
    }
}

// --- providers ---

pub struct GeminiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(GEMINI_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl InsightsProvider for GeminiProvider {
    async fn generate_insights(&self, result: &Value, crop_type: &str) -> anyhow::Result<String> {
        let url = format!(
            "{}/v1beta/models/gemini-1.5-flash:generateContent",
            self.base_url
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(result, crop_type) }] }]
        });

        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .timeout(GENAI_TIMEOUT)
            .json(&body)
            .send()
            .await
            .context("gemini request")?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("gemini responded with status {}", status);
        }

        let body: Value = resp.json().await.context("gemini response body")?;
        body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.trim().to_string())
            .context("gemini response missing text")
    }
}

pub struct OpenAiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(OPENAI_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl InsightsProvider for OpenAiProvider {
    async fn generate_insights(&self, result: &Value, crop_type: &str) -> anyhow::Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": "gpt-4o-mini",
            "messages": [{ "role": "user", "content": build_prompt(result, crop_type) }]
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(GENAI_TIMEOUT)
            .json(&body)
            .send()
            .await
            .context("openai request")?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("openai responded with status {}", status);
        }

        let body: Value = resp.json().await.context("openai response body")?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .context("openai response missing content")
    }
}

fn build_prompt(result: &Value, crop_type: &str) -> String {
    format!(
        "You are an agricultural advisor. A disease-detection model analyzed a {} image \
         and returned this result: {}. In a short paragraph, explain what the detected \
         condition means for the farmer and give practical treatment and prevention advice.",
        crop_type, result
    )
}

// --- result interpretation ---

/// Disease label embedded in a classification result, if any.
pub fn disease_label(result: &Value) -> Option<&str> {
    result["disease"]
        .as_str()
        .or_else(|| result["predicted_class"].as_str())
}

/// Confidence as a percentage, tolerating both 0..1 and 0..100 encodings.
pub fn confidence_pct(result: &Value) -> Option<f64> {
    let c = result["confidence"].as_f64()?;
    Some(if c <= 1.0 { c * 100.0 } else { c })
}

/// Deterministic advice used when no provider is configured or the call
/// fails. Pure function of the classification result and crop type.
pub fn fallback_insights(result: &Value, crop_type: &str) -> String {
    let mut text = match disease_label(result) {
        Some(d) => format!("Analysis of your {} image detected {}", crop_type, d),
        None => format!(
            "Analysis of your {} image detected an unidentified condition",
            crop_type
        ),
    };
    if let Some(pct) = confidence_pct(result) {
        text.push_str(&format!(" with {:.1}% confidence", pct));
    }
    text.push_str(
        ". General guidance: isolate affected plants where possible, remove visibly \
         infected leaves, avoid overhead watering, rotate crops next season, and consult \
         your local agricultural extension officer before applying any treatment.",
    );
    text
}
