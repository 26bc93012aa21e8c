#![forbid(unsafe_code)]

//! Network feed decoding.
//!
//! The host page's API responses are observed as raw text. Most are noise.
//! The interesting ones carry either a full message-mapping graph (a
//! conversation load) or a single message (a send or a streamed update).
//! Streamed responses are server-sent events: `data: {json}` lines ending
//! with a `data: [DONE]` sentinel.
//!
//! Decoding never fails from the caller's point of view. Anything that cannot
//! be parsed is logged at debug level and dropped.

use std::fmt;

use serde_json::Value;

use crate::graph::{GraphMessage, MessageGraph};

const SSE_PREFIX: &str = "data: ";
const SSE_DONE: &str = "[DONE]";

/// URL fragments of conversation-related API calls.
pub const CONVERSATION_URL_PATTERNS: [&str; 4] =
    ["/conversation", "/backend-api", "/moderations", "/chat"];

/// True when a request URL may carry conversation data.
#[must_use]
pub fn is_conversation_url(url: &str) -> bool {
    CONVERSATION_URL_PATTERNS.iter().any(|p| url.contains(p))
}

/// What one decoded payload (or one SSE frame) means for the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A full conversation graph.
    Graph(MessageGraph),
    /// A single message with an id.
    Message(GraphMessage),
    /// Valid JSON without a recognizable conversation structure.
    Irrelevant,
}

/// Errors from decoding a non-streamed payload.
#[derive(Debug)]
pub enum PayloadError {
    /// Body was empty or whitespace.
    Empty,
    /// Body was not JSON.
    Json(serde_json::Error),
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty payload"),
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
        }
    }
}

impl std::error::Error for PayloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Empty => None,
            Self::Json(e) => Some(e),
        }
    }
}

/// Map a parsed JSON value onto a [`FeedEvent`].
///
/// Recognized shapes, in priority order: `{conversation: {mapping}}`,
/// `{mapping}`, `{message: {id}}`.
#[must_use]
pub fn classify(value: &Value) -> FeedEvent {
    if let Some(conversation) = value.get("conversation")
        && let Some(mapping) = conversation.get("mapping").filter(|m| m.is_object())
    {
        let current = conversation.get("current_node").and_then(Value::as_str);
        return FeedEvent::Graph(MessageGraph::from_mapping(mapping, current));
    }
    if let Some(mapping) = value.get("mapping").filter(|m| m.is_object()) {
        let current = value.get("current_node").and_then(Value::as_str);
        return FeedEvent::Graph(MessageGraph::from_mapping(mapping, current));
    }
    if let Some(message) = value.get("message")
        && message.get("id").is_some_and(|id| !id.is_null())
    {
        match serde_json::from_value::<GraphMessage>(message.clone()) {
            Ok(message) => return FeedEvent::Message(message),
            Err(err) => {
                tracing::debug!(target: "branchmap.feed", error = %err, "unreadable message object");
            }
        }
    }
    FeedEvent::Irrelevant
}

/// Parse a non-streamed body.
pub fn parse_payload(body: &str) -> Result<FeedEvent, PayloadError> {
    if body.trim().is_empty() {
        return Err(PayloadError::Empty);
    }
    let value: Value = serde_json::from_str(body).map_err(PayloadError::Json)?;
    Ok(classify(&value))
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Decode the frames of a server-sent-event body.
///
/// Frames that fail to parse, or carry neither `message` nor
/// `conversation_id`, are skipped.
#[must_use]
pub fn decode_stream(body: &str) -> Vec<FeedEvent> {
    let mut events = Vec::new();
    for line in body.lines() {
        let Some(frame) = line.strip_prefix(SSE_PREFIX) else {
            continue;
        };
        if frame == SSE_DONE {
            continue;
        }
        match serde_json::from_str::<Value>(frame) {
            Ok(value) => {
                if is_truthy(value.get("message")) || is_truthy(value.get("conversation_id")) {
                    events.push(classify(&value));
                }
            }
            Err(err) => {
                tracing::trace!(target: "branchmap.feed", error = %err, "skipping unparsable frame");
            }
        }
    }
    events
}

/// Decode any response body into zero or more events.
///
/// A body containing a `data: ` marker is treated as an event stream and
/// yields one event per kept frame. Any other body yields at most one event.
#[must_use]
pub fn decode_payload(body: &str) -> Vec<FeedEvent> {
    if body.contains(SSE_PREFIX) {
        let events = decode_stream(body);
        tracing::debug!(target: "branchmap.feed", frames = events.len(), "decoded event stream");
        return events;
    }
    match parse_payload(body) {
        Ok(event) => vec![event],
        Err(err) => {
            tracing::debug!(target: "branchmap.feed", error = %err, "ignoring payload");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn url_filter() {
        assert!(is_conversation_url("https://chat.example/backend-api/conversation/abc"));
        assert!(is_conversation_url("/backend-api/moderations"));
        assert!(is_conversation_url("/chat/requirements"));
        assert!(!is_conversation_url("/static/app.js"));
    }

    #[test]
    fn nested_and_direct_mappings() {
        let nested = r#"{"conversation":{"mapping":{"a":{"message":null,"parent":null}},"current_node":"a"}}"#;
        let Some(FeedEvent::Graph(graph)) = decode_payload(nested).pop() else {
            panic!("expected graph");
        };
        assert_eq!(graph.current_node.as_deref(), Some("a"));

        let direct = r#"{"mapping":{"a":{"parent":null},"b":{"parent":"a"}}}"#;
        let Some(FeedEvent::Graph(graph)) = decode_payload(direct).pop() else {
            panic!("expected graph");
        };
        assert_eq!(graph.mapping.len(), 2);
        assert_eq!(graph.current_node, None);
    }

    #[test]
    fn single_message() {
        let body = r#"{"message":{"id":"m1","author":{"role":"user"},"content":{"parts":["hi"]}}}"#;
        let events = decode_payload(body);
        assert_eq!(events.len(), 1);
        let FeedEvent::Message(message) = &events[0] else {
            panic!("expected message");
        };
        assert!(message.is_user());
        assert_eq!(message.first_text(), Some("hi"));
    }

    #[test]
    fn irrelevant_and_malformed() {
        assert_eq!(decode_payload(r#"{"flagged":false}"#), vec![FeedEvent::Irrelevant]);
        assert_eq!(decode_payload(r#"{"message":{"content":"no id"}}"#), vec![FeedEvent::Irrelevant]);
        assert_eq!(decode_payload("<html>"), vec![]);
        assert_eq!(decode_payload(""), vec![]);
        assert!(matches!(parse_payload("   "), Err(PayloadError::Empty)));
        assert!(parse_payload("{").unwrap_err().to_string().starts_with("JSON parse error"));
    }

    #[test]
    fn event_stream_frames() {
        let body = "event: delta\n\
            data: {\"message\":{\"id\":\"a1\",\"author\":{\"role\":\"assistant\"}},\"conversation_id\":\"c\"}\n\
            \n\
            data: {\"v\":\"partial\"}\n\
            data: not json\n\
            data: {\"conversation_id\":\"c\"}\n\
            data: [DONE]\n";
        let events = decode_payload(body);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], FeedEvent::Message(m) if m.id.as_deref() == Some("a1")));
        assert_eq!(events[1], FeedEvent::Irrelevant);
    }

    #[test]
    fn crlf_stream_is_tolerated() {
        let body = "data: {\"message\":{\"id\":\"x\"}}\r\ndata: [DONE]\r\n";
        assert_eq!(decode_payload(body).len(), 1);
    }
}
