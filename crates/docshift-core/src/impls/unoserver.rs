//! Unoserver converter.
//!
//! Posts the source document as multipart form data to
//! `http://{host}:{port}/request` and takes the response body as the
//! converted document.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, multipart};
use tracing::debug;

use crate::config::ConverterConfig;
use crate::ports::{ConversionError, Converter};

/// Longest slice of an error response body kept in the error message.
const MAX_ERROR_BODY: usize = 200;

pub struct UnoserverConverter {
    client: Client,
    endpoint: String,
    convert_to: String,
    upload_name: String,
}

impl UnoserverConverter {
    pub fn new(config: &ConverterConfig) -> Result<Self, ConversionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConversionError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("http://{}:{}/request", config.host, config.port),
            convert_to: config.convert_to.clone(),
            upload_name: format!("input.{}", config.input_extension),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Converter for UnoserverConverter {
    fn name(&self) -> &str {
        "unoserver"
    }

    async fn convert(&self, input: &[u8]) -> Result<Vec<u8>, ConversionError> {
        let part = multipart::Part::bytes(input.to_vec()).file_name(self.upload_name.clone());
        let form = multipart::Form::new()
            .part("file", part)
            .text("convert-to", self.convert_to.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ConversionError::Transport(format!("request timed out: {e}"))
                } else {
                    ConversionError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConversionError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ConversionError::Transport(format!("failed to read response: {e}")))?;
        if bytes.is_empty() {
            return Err(ConversionError::EmptyOutput);
        }
        debug!(endpoint = %self.endpoint, bytes = bytes.len(), "unoserver conversion finished");
        Ok(bytes.to_vec())
    }
}
