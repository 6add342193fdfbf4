//! Twilio WhatsApp channel: webhook form payload and outbound Messages API.

use crate::channels::inbound::{normalize_text, InboundMessage};
use crate::config::TwilioCredentials;
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("twilio request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("twilio api error: {0}")]
    Api(String),
}

/// Form fields Twilio POSTs to the webhook. Only the fields the tracker uses are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TwilioWebhookForm {
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    #[serde(rename = "Body", default)]
    pub body: Option<String>,
    #[serde(rename = "MediaUrl0", default)]
    pub media_url0: Option<String>,
}

impl TwilioWebhookForm {
    /// Normalize into an inbound message. Returns None when `From` is missing.
    pub fn into_inbound(self) -> Option<InboundMessage> {
        let sender = self.from.filter(|f| !f.trim().is_empty())?;
        Some(InboundMessage {
            sender,
            media_url: self.media_url0.filter(|u| !u.trim().is_empty()),
            text: self.body.as_deref().and_then(normalize_text),
        })
    }
}

/// Out-of-band delivery of a media message to a sender.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_media(&self, to: &str, body: &str, media_url: &str) -> Result<(), ChannelError>;
}

/// Sends messages through the Twilio REST Messages API.
#[derive(Clone)]
pub struct TwilioSender {
    api_base: String,
    credentials: TwilioCredentials,
    from: String,
    client: reqwest::Client,
}

impl TwilioSender {
    pub fn new(api_base: &str, credentials: TwilioCredentials, from: impl Into<String>) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            credentials,
            from: from.into(),
            client: reqwest::Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.credentials.account_sid
        )
    }
}

#[async_trait]
impl MessageSender for TwilioSender {
    async fn send_media(&self, to: &str, body: &str, media_url: &str) -> Result<(), ChannelError> {
        let res = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.auth_token))
            .form(&[
                ("To", to),
                ("From", self.from.as_str()),
                ("Body", body),
                ("MediaUrl", media_url),
            ])
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChannelError::Api(format!("send message failed: {} {}", status, body)));
        }
        log::info!("twilio: media message sent to {}", to);
        Ok(())
    }
}
