//! Structure refinement through the Gemini `generateContent` REST API.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

use crate::parser::{RefineError, RefineOptions, RefineProvider};

use super::StructureRefiner;

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// [`StructureRefiner`] backed by a Gemini model.
///
/// Uses a blocking client with a request timeout, so a stalled call cannot
/// hang the pipeline.
#[derive(Debug, Clone)]
pub struct GeminiRefiner {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiRefiner {
    /// Create a refiner for `model` whose requests time out after `timeout`.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RefineError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RefineError::Unconfigured);
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RefineError::Http(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key,
            model: model.into(),
        })
    }

    /// Build a refiner from options. `Ok(None)` when refinement is disabled
    /// or no API key is set.
    pub fn from_options(options: &RefineOptions) -> Result<Option<Self>, RefineError> {
        match (&options.provider, options.api_key.as_deref()) {
            (RefineProvider::Gemini, Some(key)) if !key.trim().is_empty() => {
                Self::new(key, options.model.clone(), options.timeout).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Override the API base URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// The model name requests are sent to.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(system_prompt: &str, reasoning_prompt: &str, payload_json: &str) -> serde_json::Value {
        json!({
            "system_instruction": { "parts": [{ "text": system_prompt }] },
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": reasoning_prompt },
                    { "text": payload_json }
                ]
            }],
            "generationConfig": { "responseMimeType": "application/json" }
        })
    }

    fn response_text(body: &str) -> Result<String, RefineError> {
        let parsed: GenerateResponse =
            serde_json::from_str(body).map_err(|e| RefineError::Http(format!("unexpected response: {}", e)))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(RefineError::EmptyResponse);
        }
        Ok(text)
    }
}

impl StructureRefiner for GeminiRefiner {
    fn name(&self) -> &str {
        "gemini"
    }

    fn refine(
        &self,
        system_prompt: &str,
        reasoning_prompt: &str,
        payload_json: &str,
    ) -> Result<String, RefineError> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        log::debug!("GeminiRefiner: POST {} ({} bytes payload)", url, payload_json.len());

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::request_body(system_prompt, reasoning_prompt, payload_json))
            .send()
            .map_err(|e| RefineError::Http(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| RefineError::Http(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(RefineError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }
        Self::response_text(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = GeminiRefiner::request_body("sys", "think", r#"{"pages":[]}"#);
        assert_eq!(body["system_instruction"]["parts"][0]["text"], "sys");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "think");
        assert_eq!(body["contents"][0]["parts"][1]["text"], r#"{"pages":[]}"#);
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_response_text_joins_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"{\"pages\""},{"text":":[]}"}]}}]}"#;
        assert_eq!(GeminiRefiner::response_text(body).unwrap(), r#"{"pages":[]}"#);
    }

    #[test]
    fn test_response_without_candidates() {
        assert!(matches!(
            GeminiRefiner::response_text(r#"{"candidates":[]}"#),
            Err(RefineError::EmptyResponse)
        ));
        assert!(matches!(
            GeminiRefiner::response_text("<html>"),
            Err(RefineError::Http(_))
        ));
    }

    #[test]
    fn test_from_options_requires_key() {
        let options = RefineOptions::default();
        assert!(GeminiRefiner::from_options(&options).unwrap().is_none());

        let options = RefineOptions::default().with_api_key("   ");
        assert!(GeminiRefiner::from_options(&options).unwrap().is_none());

        let options = RefineOptions::default().with_api_key("k").disabled();
        assert!(GeminiRefiner::from_options(&options).unwrap().is_none());

        let options = RefineOptions::default().with_api_key("k");
        let refiner = GeminiRefiner::from_options(&options).unwrap().unwrap();
        assert_eq!(refiner.model(), "gemini-1.5-pro");
    }

    #[test]
    fn test_unreachable_endpoint_is_http_error() {
        let refiner = GeminiRefiner::new("k", "m", Duration::from_secs(2))
            .unwrap()
            .with_endpoint("http://127.0.0.1:9/");
        assert!(matches!(
            refiner.refine("s", "r", "{}"),
            Err(RefineError::Http(_))
        ));
    }
}
