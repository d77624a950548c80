use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;

#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Fetch the full body addressed by `locator`.
    async fn fetch(&self, locator: &Url) -> Result<Bytes>;
}
