//! Messaging channel plumbing (Twilio WhatsApp).
//!
//! Inbound webhook forms are normalized into [`InboundMessage`]; replies go back either
//! synchronously as TwiML or out-of-band through a [`MessageSender`].

mod inbound;
mod twilio;
mod twiml;

pub use inbound::InboundMessage;
pub use twilio::{ChannelError, MessageSender, TwilioSender, TwilioWebhookForm};
pub use twiml::MessagingResponse;
