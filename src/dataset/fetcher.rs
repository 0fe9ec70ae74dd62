use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::HttpConfig;
use crate::dataset::schema::Sheet;

#[async_trait]
pub trait SheetProvider: Send + Sync {
    fn describe(&self) -> String;
    async fn fetch(&self) -> Result<String>;
}

/// Sheet exported as CSV behind an HTTP(S) URL.
pub struct HttpSheet {
    client: Client,
    url: String,
}

impl HttpSheet {
    pub fn new(url: impl Into<String>, http: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("recruitment-analytics/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(http.timeout_secs))
            .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SheetProvider for HttpSheet {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<String> {
        fetch_text(&self.client, &self.url).await
    }
}

pub struct FileSheet {
    path: PathBuf,
}

impl FileSheet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SheetProvider for FileSheet {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed reading sheet: {}", self.path.display()))
    }
}

/// Sheet content already held in memory.
pub struct InlineSheet {
    name: String,
    body: String,
}

impl InlineSheet {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }
}

#[async_trait]
impl SheetProvider for InlineSheet {
    fn describe(&self) -> String {
        format!("inline:{}", self.name)
    }

    async fn fetch(&self) -> Result<String> {
        Ok(self.body.clone())
    }
}

/// A location string from config or the command line: URLs go over HTTP,
/// everything else is a local path.
pub fn provider_for(location: &str, http: &HttpConfig) -> Result<Arc<dyn SheetProvider>> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("sheet location is empty"));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Ok(Arc::new(HttpSheet::new(trimmed, http)?));
    }
    Ok(Arc::new(FileSheet::new(crate::config::expand_tilde(trimmed))))
}

#[derive(Clone)]
pub struct SheetPair {
    pub candidates: Arc<dyn SheetProvider>,
    pub activity: Arc<dyn SheetProvider>,
}

impl SheetPair {
    pub fn new(candidates: Arc<dyn SheetProvider>, activity: Arc<dyn SheetProvider>) -> Self {
        Self {
            candidates,
            activity,
        }
    }

    pub async fn fetch(&self) -> Result<RawSheets> {
        debug!("fetching candidates sheet from {}", self.candidates.describe());
        let candidates_csv = self
            .candidates
            .fetch()
            .await
            .with_context(|| format!("failed loading {} sheet", Sheet::Candidates))?;
        debug!("fetching activity sheet from {}", self.activity.describe());
        let activity_csv = self
            .activity
            .fetch()
            .await
            .with_context(|| format!("failed loading {} sheet", Sheet::Activity))?;
        Ok(RawSheets {
            candidates_csv,
            activity_csv,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawSheets {
    pub candidates_csv: String,
    pub activity_csv: String,
}

impl RawSheets {
    /// Content fingerprint over both sheets; identical bytes give identical keys.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.candidates_csv.len().to_le_bytes());
        hasher.update(self.candidates_csv.as_bytes());
        hasher.update(self.activity_csv.len().to_le_bytes());
        hasher.update(self.activity_csv.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

pub async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed GET request: {url}"))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("failed reading response body: {url}"))?;
    if !status.is_success() {
        let preview: String = body.chars().take(180).collect();
        return Err(anyhow!("GET {url} returned {status}: {preview}"));
    }
    Ok(body)
}
