use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::{Client, Url};
use tracing::{debug, warn};

use super::traits::ImageSource;
use crate::config::{EngineConfig, MAX_IMAGE_BYTES};

pub struct HttpSource {
    client: Client,
    max_body_bytes: u64,
}

impl HttpSource {
    /// Build a source with the default client settings.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            max_body_bytes: MAX_IMAGE_BYTES,
        }
    }

    /// Build a source honouring the timeouts and body limit from `config`.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("gallery-engine/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            max_body_bytes: config.max_image_bytes,
        })
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: u64) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageSource for HttpSource {
    async fn fetch(&self, locator: &Url) -> Result<Bytes> {
        let mut resp = self.client.get(locator.clone()).send().await?;

        let status = resp.status();
        debug!("http fetch status={} url={}", status.as_u16(), locator);
        if !status.is_success() {
            warn!("http fetch failed status={} url={}", status.as_u16(), locator);
            return Err(anyhow!("fetch failed: HTTP {}", status.as_u16()));
        }

        if let Some(len) = resp.content_length() {
            if len > self.max_body_bytes {
                return Err(anyhow!(
                    "response too large: {} bytes (limit {})",
                    len,
                    self.max_body_bytes
                ));
            }
        }

        // Servers may omit or misreport Content-Length, so enforce the limit while reading.
        let mut body = BytesMut::new();
        while let Some(chunk) = resp.chunk().await? {
            if (body.len() + chunk.len()) as u64 > self.max_body_bytes {
                return Err(anyhow!(
                    "response exceeded {} bytes while reading",
                    self.max_body_bytes
                ));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body.freeze())
    }
}
