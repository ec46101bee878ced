use crate::types::{Result, ServiceConfig};
use anyhow::{bail, Context};
use async_trait::async_trait;
use interfaces::defs::PublicUrlResolver;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Builds public URLs by joining storage paths onto a fixed base, as served
/// by a public bucket or CDN.
#[derive(Debug, Clone)]
pub struct PrefixUrlResolver {
    base: Url,
}

impl PrefixUrlResolver {
    pub fn new(base: &str) -> Result<Self> {
        let mut base = Url::parse(base)?;
        // Without the trailing slash `join` would replace the last segment.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }
}

#[async_trait]
impl PublicUrlResolver for PrefixUrlResolver {
    async fn public_url(&self, storage_path: &str) -> anyhow::Result<String> {
        let relative = storage_path.trim_start_matches('/');
        if relative.is_empty() {
            bail!("empty storage path");
        }
        let url = self
            .base
            .join(relative)
            .with_context(|| format!("invalid storage path {:?}", storage_path))?;
        if !url.as_str().starts_with(self.base.as_str()) {
            bail!("storage path {:?} resolves outside {}", storage_path, self.base);
        }
        Ok(url.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct PublicUrlResponse {
    url: String,
}

/// Asks a storage gateway for the public URL of each object.
pub struct HttpUrlResolver {
    client: Client,
    endpoint: Url,
}

impl HttpUrlResolver {
    pub fn new(gateway: &str, timeout_seconds: u64) -> Result<Self> {
        let endpoint = PrefixUrlResolver::new(gateway)?.base.join("public-url")?;
        let client = Client::builder()
            .user_agent("call-status/0.1")
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl PublicUrlResolver for HttpUrlResolver {
    async fn public_url(&self, storage_path: &str) -> anyhow::Result<String> {
        debug!("Resolving public URL for {}", storage_path);

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("path", storage_path)])
            .send()
            .await
            .with_context(|| format!("request public URL for {}", storage_path))?;

        let status = response.status();
        if !status.is_success() {
            bail!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            );
        }

        let body: PublicUrlResponse = response
            .json()
            .await
            .context("decode public URL response")?;
        if body.url.is_empty() {
            bail!("gateway returned an empty URL");
        }
        Ok(body.url)
    }
}

/// The gateway resolver when one is configured, the prefix resolver otherwise.
pub fn resolver_from_config(config: &ServiceConfig) -> Result<Arc<dyn PublicUrlResolver>> {
    match &config.url_gateway {
        Some(gateway) => Ok(Arc::new(HttpUrlResolver::new(
            gateway,
            config.url_gateway_timeout_seconds,
        )?)),
        None => Ok(Arc::new(PrefixUrlResolver::new(&config.public_url_base)?)),
    }
}
