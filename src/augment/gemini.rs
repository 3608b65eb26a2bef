use async_trait::async_trait;
use serde_json::json;

use super::DerivedText;
use crate::{AppResult, GetField};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini `generateContent` client. One prompt in, best-effort text out;
/// callers treat any failure as terminal for the request that triggered it.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> GeminiClient {
        GeminiClient {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: "gemini-1.5-flash".to_owned(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> GeminiClient {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl DerivedText for GeminiClient {
    async fn generate(&self, prompt: &str) -> AppResult<String> {
        let url = format!("{API_BASE}/{}:generateContent?key={}", self.model, self.api_key);
        let body: serde_json::Value = self
            .http
            .post(url)
            .json(&json!({ "contents": [{ "parts": [{ "text": prompt }] }] }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        body.get_obj_field("candidates")?
            .get(0)
            .ok_or("no candidates in Gemini response")?
            .get_obj_field("content")?
            .get_obj_field("parts")?
            .get(0)
            .ok_or("no parts in Gemini response")?
            .get_str_field("text")
            .map(|text| text.trim().to_owned())
    }
}
