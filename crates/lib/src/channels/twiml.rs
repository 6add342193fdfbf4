//! TwiML messaging response: the synchronous reply body for a Twilio webhook.

/// Builder for `<Response>` with zero or more `<Message>` elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagingResponse {
    messages: Vec<String>,
}

impl MessagingResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `<Message>` with the given body.
    pub fn message(&mut self, body: impl Into<String>) -> &mut Self {
        self.messages.push(body.into());
        self
    }

    /// Render as an XML document.
    pub fn to_xml(&self) -> String {
        let mut out = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);
        for m in &self.messages {
            out.push_str("<Message>");
            out.push_str(&escape_xml(m));
            out.push_str("</Message>");
        }
        out.push_str("</Response>");
        out
    }
}

impl From<Vec<String>> for MessagingResponse {
    fn from(messages: Vec<String>) -> Self {
        Self { messages }
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
