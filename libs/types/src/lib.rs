//! # Stream Types Library
//!
//! Shared data model for incrementally produced, structured stream output.
//!
//! ## Contents
//!
//! - **Values**: [`Value`] is a closed, dynamically-shaped datum (null, scalars,
//!   text, lists, maps, tagged enums and named records). Producers emit partial
//!   values ("deltas") and consumers fold them together.
//! - **Stitching**: [`stitch`] merges two partial values of arbitrary shape into
//!   one. It is total and deterministic: text is appended, maps and lists merge
//!   element-wise, records merge field-wise, enums and scalars keep the latest
//!   meaningful value.
//! - **Envelopes**: [`Message`] is the unit relayed to the coordinator actor
//!   (`CONTENT_STREAM_CHUNK`, `CONTENT_STREAM_END`, `CONTENT`, `ERRORS`).
//! - **Identifiers**: [`StreamId`] and [`MessageId`].
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{stitch, Value};
//!
//! let first = Value::map([("text", Value::from("Hello"))]);
//! let second = Value::map([("text", Value::from(" World"))]);
//!
//! let merged = stitch(first, second);
//! assert_eq!(merged.get("text"), Some(&Value::from("Hello World")));
//! ```

pub mod common;
pub mod messages;
pub mod stitch;
pub mod value;

pub use common::errors::ValueError;
pub use common::identifiers::{MessageId, StreamId};
pub use messages::{
    ContentData, ContentStreamChunkData, ErrorEntry, ErrorsData, Message, MessageData,
    MessageType, COORDINATOR_RECEIVER,
};
pub use stitch::stitch;
pub use value::{EnumValue, Record, Value, ValueKind};
