use async_trait::async_trait;
use glossa_translator::{ProviderMetadata, TranslateError, Translator};

#[derive(Clone)]
pub struct GoogleTranslator {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl GoogleTranslator {
    pub fn new(api_key: String, api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            api_url,
        }
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate_batch(
        &self,
        texts: &[String],
        from: &str,
        to: &str,
    ) -> Result<Vec<String>, TranslateError> {
        if self.api_key.is_empty() {
            return Err(TranslateError::AuthenticationError);
        }

        let body = serde_json::json!({
            "q": texts,
            "source": from,
            "target": to,
            "format": "text",
        });

        let response = self
            .client
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if response.status() == 429 {
            return Err(TranslateError::RateLimitExceeded);
        }

        if response.status() == 403 {
            return Err(TranslateError::AuthenticationError);
        }

        if response.status() == 400 {
            tracing::debug!("bad request for pair {} -> {}", from, to);
            return Err(TranslateError::UnsupportedLanguagePair {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        if !response.status().is_success() {
            return Err(TranslateError::ApiError(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let json: serde_json::Value = response.json().await.map_err(|e| {
            TranslateError::ApiError(format!("Failed to parse response: {}", e))
        })?;

        let translations = json["data"]["translations"]
            .as_array()
            .ok_or_else(|| TranslateError::ApiError("No translations in response".to_string()))?;

        let mut out = Vec::with_capacity(translations.len());
        for t in translations {
            let text = t["translatedText"]
                .as_str()
                .ok_or_else(|| TranslateError::ApiError("Malformed translation entry".to_string()))?;
            out.push(text.to_string());
        }

        Ok(out)
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "Google Cloud Translation".to_string(),
            requires_api_key: true,
            free_tier_available: false,
        }
    }
}
