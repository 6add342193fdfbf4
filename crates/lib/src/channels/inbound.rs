//! Inbound message from the channel: delivered to the conversation tracker.

/// One webhook event: who sent it, an optional attachment and optional text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: String,
    /// Locator of the first media attachment (Twilio `MediaUrl0`).
    pub media_url: Option<String>,
    /// Message text, trimmed and lowercased; None when empty.
    pub text: Option<String>,
}

impl InboundMessage {
    pub fn text(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            media_url: None,
            text: normalize_text(&text.into()),
        }
    }

    pub fn media(sender: impl Into<String>, media_url: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            media_url: Some(media_url.into()),
            text: None,
        }
    }
}

/// Trim and lowercase; empty text is treated as absent.
pub(crate) fn normalize_text(text: &str) -> Option<String> {
    let t = text.trim().to_lowercase();
    if t.is_empty() {
        None
    } else {
        Some(t)
    }
}
