//! Coordinator message envelopes
//!
//! Every stream client talks to its coordinator exclusively through
//! [`Message`] envelopes. Per logical stream the expected sequence is zero or
//! more `CONTENT_STREAM_CHUNK`, exactly one `CONTENT_STREAM_END`, then exactly
//! one `CONTENT`. `ERRORS` may appear anywhere and does not end the stream.
//!
//! Payload shapes on the wire:
//!
//! | Kind                   | Payload                              |
//! |------------------------|--------------------------------------|
//! | `CONTENT_STREAM_CHUNK` | `{"chunk": <value>}`                 |
//! | `CONTENT_STREAM_END`   | none                                 |
//! | `CONTENT`              | `{"content": <value>}`               |
//! | `ERRORS`               | `{"errors": [{"message": "..."}]}`   |

use crate::{MessageId, StreamId, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical address of the coordinator actor
pub const COORDINATOR_RECEIVER: &str = "coordinator";

/// Envelope kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// One raw delta of an in-progress stream
    ContentStreamChunk,
    /// End-of-stream marker, always followed by `Content`
    ContentStreamEnd,
    /// Final, fully stitched output
    Content,
    /// Producer-side errors reported to the coordinator
    Errors,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::ContentStreamChunk => "CONTENT_STREAM_CHUNK",
            MessageType::ContentStreamEnd => "CONTENT_STREAM_END",
            MessageType::Content => "CONTENT",
            MessageType::Errors => "ERRORS",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentStreamChunkData {
    pub chunk: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentData {
    pub content: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorsData {
    pub errors: Vec<ErrorEntry>,
}

/// Envelope payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageData {
    ContentStreamChunk(ContentStreamChunkData),
    Content(ContentData),
    Errors(ErrorsData),
}

/// Relay envelope; immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Option<MessageId>,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub sender: String,
    pub receiver: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<MessageData>,
}

impl Message {
    /// Build an arbitrary envelope, e.g. for raw relays
    pub fn new(
        id: Option<MessageId>,
        message_type: MessageType,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        data: Option<MessageData>,
    ) -> Self {
        Self {
            id,
            message_type,
            sender: sender.into(),
            receiver: receiver.into(),
            data,
        }
    }

    /// `CONTENT_STREAM_CHUNK` carrying one raw delta
    pub fn chunk(id: MessageId, sender: &StreamId, receiver: &str, chunk: Value) -> Self {
        Self::new(
            Some(id),
            MessageType::ContentStreamChunk,
            sender.as_str(),
            receiver,
            Some(MessageData::ContentStreamChunk(ContentStreamChunkData { chunk })),
        )
    }

    /// `CONTENT_STREAM_END` marker without payload
    pub fn stream_end(id: MessageId, sender: &StreamId, receiver: &str) -> Self {
        Self::new(
            Some(id),
            MessageType::ContentStreamEnd,
            sender.as_str(),
            receiver,
            None,
        )
    }

    /// `CONTENT` carrying the finalized output
    pub fn content(id: MessageId, sender: &StreamId, receiver: &str, content: Value) -> Self {
        Self::new(
            Some(id),
            MessageType::Content,
            sender.as_str(),
            receiver,
            Some(MessageData::Content(ContentData { content })),
        )
    }

    /// `ERRORS` carrying one or more error descriptions
    pub fn errors<I, S>(id: MessageId, sender: &StreamId, receiver: &str, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let errors = messages
            .into_iter()
            .map(|message| ErrorEntry {
                message: message.into(),
            })
            .collect();
        Self::new(
            Some(id),
            MessageType::Errors,
            sender.as_str(),
            receiver,
            Some(MessageData::Errors(ErrorsData { errors })),
        )
    }

    /// The chunk of a `CONTENT_STREAM_CHUNK` envelope
    pub fn chunk_value(&self) -> Option<&Value> {
        match &self.data {
            Some(MessageData::ContentStreamChunk(data)) => Some(&data.chunk),
            _ => None,
        }
    }

    /// The content of a `CONTENT` envelope
    pub fn content_value(&self) -> Option<&Value> {
        match &self.data {
            Some(MessageData::Content(data)) => Some(&data.content),
            _ => None,
        }
    }

    /// The error messages of an `ERRORS` envelope
    pub fn error_messages(&self) -> Vec<&str> {
        match &self.data {
            Some(MessageData::Errors(data)) => {
                data.errors.iter().map(|e| e.message.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}
