//! Conversation tracker: per-sender state machine that collects a person image and a garment image.
//!
//! Every uploaded image is held as pending until the sender replies "0" (person) or "1"
//! (garment). Once both roles are filled the try-on runs in the same webhook call, the result
//! is pushed to the sender out-of-band, and the session is dropped whatever the outcome.

use crate::channels::{InboundMessage, MessageSender};
use crate::session::{Session, SessionStore};
use crate::tryon::TryOnService;
use std::sync::Arc;

pub const PROMPT_SEND_IMAGES: &str = "Please send your person image followed by garment image.";
pub const PROMPT_CHOOSE_ROLE: &str =
    "📸 Got your image! Please reply with:\n👉 '0' for person image\n👉 '1' for garment image";
pub const PERSON_RECEIVED: &str = "✅ Person image received! Now please send the garment image.";
pub const GARMENT_RECEIVED: &str = "👕 Garment image received! Now please send the person image.";
pub const PROCESSING: &str = "🧠 Processing your virtual try-on... Please wait a moment ⏳";
pub const TRYON_READY: &str = "🎉✨ Your Virtual Try-On is Ready! ✨🎉";
pub const TRYON_FAILED: &str = "⚠ Sorry! Something went wrong during the try-on process.";
pub const INVALID_MESSAGE: &str = "❓Please send a valid text or image message.";
/// Body of the out-of-band media message carrying the result image.
pub const RESULT_CAPTION: &str = "✨ Your Virtual Try-On is Ready! ✨";

const ROLE_PERSON: &str = "0";
const ROLE_GARMENT: &str = "1";

pub struct ConversationTracker {
    sessions: Arc<dyn SessionStore>,
    tryon: Arc<dyn TryOnService>,
    outbound: Arc<dyn MessageSender>,
    public_url: String,
}

impl ConversationTracker {
    /// `public_url` is prefixed onto the `/static/...` path returned by the try-on service.
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        tryon: Arc<dyn TryOnService>,
        outbound: Arc<dyn MessageSender>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            tryon,
            outbound,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Handle one webhook event; returns the replies for the synchronous response, in order.
    pub async fn handle(&self, msg: &InboundMessage) -> Vec<String> {
        let mut replies = Vec::new();
        let mut session = match self.sessions.get(&msg.sender).await {
            Ok(Some(s)) => s,
            Ok(None) => Session::default(),
            Err(e) => {
                log::warn!("session lookup failed for {}: {}", msg.sender, e);
                Session::default()
            }
        };

        match (&msg.media_url, &msg.text) {
            (Some(media), _) => {
                if session.pending_media.is_some() {
                    log::debug!("{} replaced an unconfirmed upload", msg.sender);
                }
                session.pending_media = Some(media.clone());
                session.expecting_response = true;
                replies.push(PROMPT_CHOOSE_ROLE.to_string());
                self.save(&msg.sender, session).await;
            }
            (None, Some(text)) => {
                let Some(pending) = session.awaiting_role().map(str::to_string) else {
                    replies.push(PROMPT_SEND_IMAGES.to_string());
                    self.save(&msg.sender, session).await;
                    return replies;
                };
                match text.as_str() {
                    ROLE_PERSON => {
                        session.user_image = Some(pending);
                        session.pending_media = None;
                        session.expecting_response = false;
                        replies.push(PERSON_RECEIVED.to_string());
                    }
                    ROLE_GARMENT => {
                        session.garment_image = Some(pending);
                        session.pending_media = None;
                        session.expecting_response = false;
                        replies.push(GARMENT_RECEIVED.to_string());
                    }
                    // Any other reply while a role is pending is ignored without a message.
                    _ => {}
                }
                match session.pair() {
                    Some((person, garment)) => {
                        let (person, garment) = (person.to_string(), garment.to_string());
                        self.run_tryon(&msg.sender, &person, &garment, &mut replies)
                            .await;
                        if let Err(e) = self.sessions.delete(&msg.sender).await {
                            log::warn!("failed to clear session for {}: {}", msg.sender, e);
                        }
                    }
                    None => self.save(&msg.sender, session).await,
                }
            }
            (None, None) => {
                replies.push(INVALID_MESSAGE.to_string());
                self.save(&msg.sender, session).await;
            }
        }
        replies
    }

    async fn run_tryon(&self, sender: &str, person: &str, garment: &str, replies: &mut Vec<String>) {
        replies.push(PROCESSING.to_string());
        log::info!("starting try-on for {}", sender);
        match self.tryon.try_on(sender, person, garment).await {
            Ok(path) => {
                let result_url = format!("{}{}", self.public_url, path);
                match self.outbound.send_media(sender, RESULT_CAPTION, &result_url).await {
                    Ok(()) => log::info!("result sent to {}", sender),
                    Err(e) => log::error!("error sending result to {}: {}", sender, e),
                }
                replies.push(TRYON_READY.to_string());
            }
            Err(e) => {
                log::warn!("try-on for {} failed: {}", sender, e);
                replies.push(TRYON_FAILED.to_string());
            }
        }
    }

    async fn save(&self, sender: &str, session: Session) {
        if let Err(e) = self.sessions.put(sender, session).await {
            log::warn!("failed to store session for {}: {}", sender, e);
        }
    }
}
