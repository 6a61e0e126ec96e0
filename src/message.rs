//! Message container fact extraction.
//!
//! Routing only needs three facts from a container file: the optional
//! routing-mode header, the sender address and the primary recipient
//! address. Everything else in the message is opaque to the daemon.

use std::path::Path;

use mail_parser::MessageParser;

use crate::error::MessageError;

/// Fixed suffix recognized (case-sensitively) as a message container file.
pub const CONTAINER_SUFFIX: &str = ".eml";

/// Header carrying the routing-mode tag.
pub const MODE_HEADER: &str = "sepamail-mode";

/// Mode tag value selecting the canonical output queue.
pub const MODE_CANONICAL: &str = "canonical";

/// Mode tag value selecting the flash heavy output queue.
pub const MODE_FLASH: &str = "flash";

/// The facts routing extracts from one message container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFacts {
    /// Trimmed value of the routing-mode header, when present.
    pub mode: Option<String>,
    /// Address of the first `From:` mailbox, when present.
    pub from: Option<String>,
    /// Address of the first `To:` mailbox, when present.
    pub to: Option<String>,
}

/// Read a container file and extract its routing facts.
pub async fn read_facts(path: &Path) -> Result<MessageFacts, MessageError> {
    let raw = tokio::fs::read(path).await?;
    parse_facts(&raw).ok_or_else(|| MessageError::Unparseable(path.to_path_buf()))
}

/// Extract routing facts from raw container bytes.
pub fn parse_facts(raw: &[u8]) -> Option<MessageFacts> {
    let parsed = MessageParser::default().parse(raw)?;

    let mode = parsed
        .header_raw(MODE_HEADER)
        .map(|value| value.trim().to_string());

    let from = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.trim().to_string());

    let to = parsed
        .to()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.trim().to_string());

    Some(MessageFacts { mode, from, to })
}

/// Whether a file name denotes a message container.
pub fn is_container_name(name: &str) -> bool {
    name.ends_with(CONTAINER_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = "From: Alice <alice@bank-a.example>\r\n\
                         To: Bob <bob@bank-b.example>\r\n\
                         Subject: settlement notice\r\n\
                         \r\n\
                         body\r\n";

    const TAGGED: &str = "From: alice@bank-a.example\r\n\
                          To: bob@bank-b.example\r\n\
                          sepamail-mode: canonical\r\n\
                          Subject: tagged\r\n\
                          \r\n\
                          body\r\n";

    #[test]
    fn extracts_addresses() {
        let facts = parse_facts(PLAIN.as_bytes()).unwrap();
        assert_eq!(facts.from.as_deref(), Some("alice@bank-a.example"));
        assert_eq!(facts.to.as_deref(), Some("bob@bank-b.example"));
        assert_eq!(facts.mode, None);
    }

    #[test]
    fn extracts_mode_header() {
        let facts = parse_facts(TAGGED.as_bytes()).unwrap();
        assert_eq!(facts.mode.as_deref(), Some("canonical"));
    }

    #[test]
    fn missing_headers_yield_absent_facts() {
        let facts = parse_facts(b"Subject: bare\r\n\r\nbody\r\n").unwrap();
        assert_eq!(facts.from, None);
        assert_eq!(facts.to, None);
    }

    #[test]
    fn container_suffix_is_case_sensitive() {
        assert!(is_container_name("message-001.eml"));
        assert!(!is_container_name("message-001.EML"));
        assert!(!is_container_name("message-001.eml.lock"));
    }
}
