//! Drape core library: WhatsApp virtual try-on gateway.
//!
//! Collects a person photo and a garment photo from a sender over the Twilio webhook,
//! runs a hosted try-on model, and sends the composite back.

pub mod channels;
pub mod config;
pub mod conversation;
pub mod gateway;
pub mod init;
pub mod media;
pub mod session;
pub mod static_files;
pub mod tryon;
