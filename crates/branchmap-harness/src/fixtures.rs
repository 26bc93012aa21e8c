#![forbid(unsafe_code)]

//! Network payload fixtures.
//!
//! Builders for the JSON shapes the host API delivers: message-mapping
//! graphs, single messages, and server-sent-event bodies. Graphs interleave
//! an assistant reply after every user message, like a real conversation.

use serde_json::{Map, Value, json};

/// Incrementally builds a message-mapping graph.
#[derive(Debug, Clone, Default)]
pub struct GraphFixture {
    mapping: Map<String, Value>,
    current_node: Option<String>,
    clock: f64,
}

impl GraphFixture {
    /// A graph holding only the system root message `root`.
    #[must_use]
    pub fn new() -> Self {
        let mut mapping = Map::new();
        mapping.insert(
            "root".to_owned(),
            json!({"message": null, "parent": null, "children": []}),
        );
        Self {
            mapping,
            current_node: Some("root".to_owned()),
            clock: 1_700_000_000.0,
        }
    }

    fn insert(&mut self, id: &str, role: &str, text: &str, parent: Option<&str>) {
        self.clock += 1.0;
        self.mapping.insert(
            id.to_owned(),
            json!({
                "id": id,
                "message": {
                    "id": id,
                    "author": {"role": role},
                    "content": {"content_type": "text", "parts": [text]},
                    "create_time": self.clock,
                },
                "parent": parent,
                "children": [],
            }),
        );
    }

    /// Add a user message under `parent` followed by an assistant reply
    /// `{id}-reply`. The reply becomes the current node.
    #[must_use]
    pub fn user(mut self, id: &str, text: &str, parent: &str) -> Self {
        self.insert(id, "user", text, Some(parent));
        let reply = format!("{id}-reply");
        self.insert(&reply, "assistant", "ok", Some(id));
        self.current_node = Some(reply);
        self
    }

    /// Add a user message without a reply.
    #[must_use]
    pub fn user_only(mut self, id: &str, text: &str, parent: Option<&str>) -> Self {
        self.insert(id, "user", text, parent);
        self.current_node = Some(id.to_owned());
        self
    }

    /// Override the current node.
    #[must_use]
    pub fn current(mut self, id: &str) -> Self {
        self.current_node = Some(id.to_owned());
        self
    }

    /// The bare mapping object.
    #[must_use]
    pub fn mapping(&self) -> Value {
        Value::Object(self.mapping.clone())
    }

    /// A conversation load response: `{title, mapping, current_node}`.
    #[must_use]
    pub fn conversation_body(&self) -> String {
        json!({
            "title": "fixture",
            "mapping": self.mapping(),
            "current_node": self.current_node,
        })
        .to_string()
    }

    /// The same graph nested under a `conversation` key.
    #[must_use]
    pub fn nested_body(&self) -> String {
        json!({
            "conversation": {
                "mapping": self.mapping(),
                "current_node": self.current_node,
            }
        })
        .to_string()
    }
}

/// A linear conversation of `n` user turns named `u0..u{n-1}`.
#[must_use]
pub fn linear_graph(n: usize) -> GraphFixture {
    (0..n).fold(GraphFixture::new(), |graph, i| {
        let parent = if i == 0 {
            "root".to_owned()
        } else {
            format!("u{}-reply", i - 1)
        };
        graph.user(&format!("u{i}"), &format!("message {i}"), &parent)
    })
}

/// Three user messages, each the parent of the next, with no assistant
/// turns in between.
#[must_use]
pub fn user_only_chain() -> GraphFixture {
    GraphFixture::new()
        .user_only("u0", "first", None)
        .user_only("u1", "second", Some("u0"))
        .user_only("u2", "third", Some("u1"))
}

/// A conversation whose second turn was edited twice: `u1a`, `u1b`, `u1c`
/// all answer `u0-reply`. The current branch continues from `u1b` into `u2`.
#[must_use]
pub fn edited_graph() -> GraphFixture {
    GraphFixture::new()
        .user("u0", "hello", "root")
        .user("u1a", "first try", "u0-reply")
        .user("u1b", "second try", "u0-reply")
        .user("u1c", "third try", "u0-reply")
        .user("u2", "follow up", "u1b-reply")
}

/// A single-message body, as sent after posting a new turn.
#[must_use]
pub fn message_body(id: &str, role: &str, text: &str) -> String {
    json!({
        "message": {
            "id": id,
            "author": {"role": role},
            "content": {"content_type": "text", "parts": [text]},
        },
        "conversation_id": "fixture",
    })
    .to_string()
}

/// Wrap JSON frames in server-sent-event framing with a `[DONE]` sentinel.
#[must_use]
pub fn sse_body(frames: &[String]) -> String {
    let mut body = String::new();
    for frame in frames {
        body.push_str("event: delta\n");
        body.push_str("data: ");
        body.push_str(frame);
        body.push_str("\n\n");
    }
    body.push_str("data: [DONE]\n\n");
    body
}
