//! Inference backend client
//!
//! Issues one multipart POST per analysis action against the configured
//! backend and returns the parsed prediction. The client never touches
//! session state; accepting or discarding the outcome is the session's
//! responsibility.

use medscan_common::config::InferenceConfig;
use medscan_common::{Error, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("medscan-station/", env!("CARGO_PKG_VERSION"));

/// Multipart field name the backend expects the image under
const IMAGE_FIELD: &str = "file";

/// Successful inference response body
///
/// The backend may return more fields; only these are contractual.
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub prediction: String,
    pub confidence: f64,
}

/// HTTP client for the inference contract
#[derive(Debug, Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    base_url: String,
}

impl InferenceClient {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// POST /predict/{model_key} with the image as a multipart attachment
    ///
    /// Transport failures (including timeout) surface as `Error::Network`;
    /// non-success statuses and malformed bodies as `Error::Backend`.
    pub async fn analyze(
        &self,
        model_key: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Prediction> {
        let url = format!("{}/predict/{}", self.base_url, model_key);

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| Error::Internal(format!("invalid content type for upload: {e}")))?;
        let form = reqwest::multipart::Form::new().part(IMAGE_FIELD, part);

        debug!(model_key, url = %url, "submitting image for inference");

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Backend(format!(
                "inference backend returned {status}: {body}"
            )));
        }

        let prediction: Prediction = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("malformed inference response: {e}")))?;

        info!(
            model_key,
            prediction = %prediction.prediction,
            confidence = prediction.confidence,
            "inference completed"
        );

        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = InferenceClient::new(&InferenceConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = InferenceClient::new(&InferenceConfig {
            base_url: "http://gpu-box:9000/".to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(client.base_url, "http://gpu-box:9000");
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_network_error() {
        // Reserved TEST-NET-1 address; nothing listens there.
        let client = InferenceClient::new(&InferenceConfig {
            base_url: "http://192.0.2.1:9".to_string(),
            timeout_secs: 1,
        })
        .unwrap();

        let result = client
            .analyze("brain-tumor", "scan.png", "image/png", vec![1, 2, 3])
            .await;
        assert!(matches!(result, Err(Error::Network(_))));
    }
}
