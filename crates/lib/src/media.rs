//! Media store: resolves a Twilio media locator and downloads the attachment to local disk.
//!
//! The locator is the `MediaUrl0` from the webhook, e.g.
//! `https://api.twilio.com/2010-04-01/Accounts/AC../Messages/MM../Media/ME..`.
//! The message and media SIDs are taken positionally from its path, the media resource is
//! fetched from the REST API to get the content URI, and the content is downloaded with
//! account credentials.

use crate::config::TwilioCredentials;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("invalid media locator: {0}")]
    Locator(String),
    #[error("media request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("media api error: {0}")]
    Api(String),
    #[error("writing media file: {0}")]
    Io(#[from] std::io::Error),
}

/// SIDs extracted from a media locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLocator {
    pub message_sid: String,
    pub media_sid: String,
}

impl MediaLocator {
    /// Message SID is the third-from-last path segment, media SID the last.
    pub fn parse(locator: &str) -> Result<Self, MediaError> {
        let trimmed = locator.trim().split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.len() < 3 {
            return Err(MediaError::Locator(locator.to_string()));
        }
        let media_sid = segments[segments.len() - 1];
        let message_sid = segments[segments.len() - 3];
        if media_sid.is_empty() || message_sid.is_empty() {
            return Err(MediaError::Locator(locator.to_string()));
        }
        Ok(Self {
            message_sid: message_sid.to_string(),
            media_sid: media_sid.to_string(),
        })
    }
}

/// Downloads a media locator to a local file.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download `locator` into `dest` and return the written path.
    async fn fetch(&self, locator: &str, dest: &Path) -> Result<PathBuf, MediaError>;
}

#[derive(Debug, Deserialize)]
struct MediaResource {
    uri: String,
}

/// Media store backed by the Twilio REST API.
#[derive(Clone)]
pub struct TwilioMediaStore {
    api_base: String,
    credentials: TwilioCredentials,
    client: reqwest::Client,
}

impl TwilioMediaStore {
    pub fn new(api_base: &str, credentials: TwilioCredentials) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            credentials,
            client: reqwest::Client::new(),
        }
    }

    /// GET the media resource; returns the absolute content URL.
    async fn resolve_content_url(&self, loc: &MediaLocator) -> Result<String, MediaError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages/{}/Media/{}.json",
            self.api_base, self.credentials.account_sid, loc.message_sid, loc.media_sid
        );
        let res = self
            .client
            .get(&url)
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.auth_token))
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(MediaError::Api(format!("media lookup failed: {} {}", status, body)));
        }
        let resource: MediaResource = res.json().await?;
        let uri = resource.uri.replace(".json", "");
        Ok(format!("{}{}", self.api_base, uri))
    }
}

#[async_trait]
impl MediaFetcher for TwilioMediaStore {
    async fn fetch(&self, locator: &str, dest: &Path) -> Result<PathBuf, MediaError> {
        let loc = MediaLocator::parse(locator)?;
        let content_url = self.resolve_content_url(&loc).await?;
        let res = self
            .client
            .get(&content_url)
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.auth_token))
            .send()
            .await?;
        if res.status() != reqwest::StatusCode::OK {
            return Err(MediaError::Api(format!(
                "media download failed: {}",
                res.status()
            )));
        }
        let bytes = res.bytes().await?;
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &bytes).await?;
        log::info!("saved media file: {} ({} bytes)", dest.display(), bytes.len());
        Ok(dest.to_path_buf())
    }
}
