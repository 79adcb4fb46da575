use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::error::{Rejection, RejectionCode};

/// Application event carried inside `publish` commands and publications.
/// The payload shape is determined by `kind` alone.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    /// Unix seconds.
    #[serde(default)]
    pub timestamp: i64,
}

impl Event {
    pub fn new(kind: EventType, payload: Value) -> Self {
        Event {
            kind: kind.as_str().to_string(),
            payload,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Every event kind the hub knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    // inbound
    CreateComment,
    UpdateComment,
    DeleteComment,
    // outbound
    NewComment,
    EditComment,
    RemoveComment,
}

impl EventType {
    pub const fn as_str(self) -> &'static str {
        match self {
            EventType::CreateComment => "create_comment",
            EventType::UpdateComment => "update_comment",
            EventType::DeleteComment => "delete_comment",
            EventType::NewComment => "new_comment",
            EventType::EditComment => "edit_comment",
            EventType::RemoveComment => "remove_comment",
        }
    }
}

/// A broadcast scope: `#<user-id>` is a private, server-pushed channel,
/// anything else names a post.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    Private(i64),
    Post(String),
}

impl Channel {
    pub fn private(user_id: i64) -> Self {
        Channel::Private(user_id)
    }

    pub fn parse(name: &str) -> Result<Self, Rejection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Rejection::bad_request("channel name is required"));
        }

        match name.strip_prefix('#') {
            Some(id) => id
                .parse::<i64>()
                .map(Channel::Private)
                .map_err(|_| Rejection::bad_request(format!("malformed private channel {name:?}"))),
            None => Ok(Channel::Post(name.to_string())),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Channel::Private(user_id) => format!("#{user_id}"),
            Channel::Post(post_id) => post_id.clone(),
        }
    }
}

/// Where a reconnecting client left off.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RecoverFrom {
    pub epoch: String,
    pub offset: u64,
}

/// A command read from a client frame.
#[derive(Debug, Deserialize)]
pub struct ClientCommand {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub command: Command,
}

/// A frame that could not be turned into a command, with the correlation id
/// when the frame carried one.
#[derive(Debug, PartialEq)]
pub struct InvalidCommand {
    pub id: Option<u64>,
    pub rejection: Rejection,
}

impl ClientCommand {
    /// Unknown methods are told apart from frames that are malformed.
    pub fn parse(text: &str) -> Result<ClientCommand, InvalidCommand> {
        let frame: Value = serde_json::from_str(text).map_err(|e| InvalidCommand {
            id: None,
            rejection: Rejection::bad_request(format!("invalid frame: {e}")),
        })?;
        let id = frame.get("id").and_then(Value::as_u64);
        let invalid = |rejection| InvalidCommand { id, rejection };

        let method = frame
            .get("method")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| invalid(Rejection::bad_request("method is required")))?;
        if !Command::METHODS.contains(&method.as_str()) {
            return Err(invalid(Rejection::method_not_found(&method)));
        }

        serde_json::from_value(frame).map_err(|e| {
            invalid(Rejection::bad_request(format!(
                "invalid {method} command: {e}"
            )))
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Command {
    Subscribe {
        channel: String,
        #[serde(default)]
        recover: Option<RecoverFrom>,
    },
    Unsubscribe {
        channel: String,
    },
    Publish {
        channel: String,
        data: Event,
    },
    Refresh {
        token: String,
    },
    Ping,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Publication {
    pub offset: u64,
    pub data: Event,
}

/// Message to a client.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        session_id: String,
        user_id: i64,
        expires_at: i64,
        channels: Vec<String>,
    },
    Subscribed {
        id: Option<u64>,
        channel: String,
        epoch: String,
        offset: u64,
        recovered: bool,
        publications: Vec<Publication>,
    },
    Unsubscribed {
        id: Option<u64>,
        channel: String,
    },
    Publication {
        channel: String,
        offset: u64,
        data: Event,
    },
    Published {
        id: Option<u64>,
        channel: String,
        offset: u64,
    },
    Refreshed {
        id: Option<u64>,
        expires_at: i64,
    },
    Error {
        id: Option<u64>,
        code: RejectionCode,
        message: String,
    },
    Pong {
        id: Option<u64>,
    },
    Disconnect {
        reason: String,
    },
}

impl Command {
    const METHODS: [&'static str; 5] = ["subscribe", "unsubscribe", "publish", "refresh", "ping"];
}

impl ServerMessage {
    pub fn rejected(id: Option<u64>, rejection: Rejection) -> Self {
        ServerMessage::Error {
            id,
            code: rejection.code,
            message: rejection.message,
        }
    }
}
