use serde_json::Value;

use super::{ChatError, ChatResult};
use crate::core::conversation::LeadExtraction;

/// Marker the model emits once it has location, issue and phone.
pub const COMPLETE_MARKER: &str = "[COMPLETE]";

/// A model reply split at the completion marker.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    /// Text shown to the caller
    pub public_text: String,
    /// Raw text after the marker, `None` while the conversation is still open
    pub completion: Option<String>,
}

/// Split a reply at the first `[COMPLETE]` marker.
///
/// Without a marker the reply is returned unchanged.
pub fn parse_reply(reply: &str) -> ChatReply {
    match reply.split_once(COMPLETE_MARKER) {
        Some((public, rest)) => ChatReply {
            public_text: public.trim().to_string(),
            completion: Some(rest.trim().to_string()),
        },
        None => ChatReply {
            public_text: reply.to_string(),
            completion: None,
        },
    }
}

/// Parse the JSON object that follows the completion marker.
///
/// Tolerates a surrounding code fence and trailing text after the object.
/// Non-string values (a phone number given as a number) are stringified.
pub fn parse_extraction(raw: &str) -> ChatResult<LeadExtraction> {
    let start = raw
        .find('{')
        .ok_or_else(|| ChatError::Extraction("no JSON object after marker".to_string()))?;

    let value = serde_json::Deserializer::from_str(&raw[start..])
        .into_iter::<Value>()
        .next()
        .ok_or_else(|| ChatError::Extraction("empty completion data".to_string()))?
        .map_err(|e| ChatError::Extraction(e.to_string()))?;

    let Value::Object(fields) = value else {
        return Err(ChatError::Extraction("completion data is not an object".to_string()));
    };

    Ok(LeadExtraction {
        location: fields.get("location").and_then(as_text),
        issue: fields.get("issue").and_then(as_text),
        phone: fields.get("phone").and_then(as_text),
    })
}

fn as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_without_marker() {
        let reply = parse_reply("Où êtes-vous exactement ?");
        assert!(reply.completion.is_none());
        assert_eq!(reply.public_text, "Où êtes-vous exactement ?");
    }

    #[test]
    fn test_reply_with_marker() {
        let reply = parse_reply(
            "Dépanneuse en route. [COMPLETE] {\"location\":\"A6\",\"issue\":\"pneu\",\"phone\":\"06\"}",
        );
        assert!(reply.completion.is_some());
        assert_eq!(reply.public_text, "Dépanneuse en route.");

        let extraction = parse_extraction(reply.completion.as_deref().unwrap()).unwrap();
        assert_eq!(extraction.location.as_deref(), Some("A6"));
        assert_eq!(extraction.issue.as_deref(), Some("pneu"));
        assert_eq!(extraction.phone.as_deref(), Some("06"));
    }

    #[test]
    fn test_extraction_in_code_fence_with_numeric_phone() {
        let raw = "```json\n{ \"location\": \"Lyon\", \"issue\": \"batterie\", \"phone\": 612345678 }\n```";
        let extraction = parse_extraction(raw).unwrap();
        assert_eq!(extraction.location.as_deref(), Some("Lyon"));
        assert_eq!(extraction.phone.as_deref(), Some("612345678"));
    }

    #[test]
    fn test_extraction_errors() {
        assert!(matches!(
            parse_extraction("rien ici"),
            Err(ChatError::Extraction(_))
        ));
        assert!(matches!(
            parse_extraction("{ \"location\": "),
            Err(ChatError::Extraction(_))
        ));
    }

    #[test]
    fn test_missing_fields_are_none() {
        let extraction = parse_extraction("{\"issue\": \"\", \"phone\": null}").unwrap();
        assert_eq!(extraction, LeadExtraction::default());
    }
}
