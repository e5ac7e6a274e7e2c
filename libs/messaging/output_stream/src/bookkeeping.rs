//! Bookkeeping queue
//!
//! Stream clients push timestamped entries without ever waiting; a consumer
//! outside the stream drains them at its own pace.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use stream_config::constants::{BOOKKEEPING_DATA_FIELD, TIMESTAMP_FIELD};
use tokio::sync::mpsc;
use types::{StreamId, Value};

/// One bookkeeping record, owned by the queue once pushed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookkeepingEntry {
    pub stream_id: StreamId,
    pub data: BTreeMap<String, Value>,
}

impl BookkeepingEntry {
    /// Capture time in seconds since the UNIX epoch
    pub fn timestamp(&self) -> Option<f64> {
        match self.data.get(TIMESTAMP_FIELD) {
            Some(Value::Float(seconds)) => Some(*seconds),
            _ => None,
        }
    }
}

/// Producer side of an unbounded bookkeeping queue
#[derive(Debug, Clone)]
pub struct BookkeepingQueue {
    sender: mpsc::UnboundedSender<BookkeepingEntry>,
}

/// Consumer side of a bookkeeping queue
#[derive(Debug)]
pub struct BookkeepingReceiver {
    receiver: mpsc::UnboundedReceiver<BookkeepingEntry>,
}

impl BookkeepingQueue {
    pub fn unbounded() -> (Self, BookkeepingReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, BookkeepingReceiver { receiver })
    }

    /// Enqueue without waiting; hands the entry back if the consumer is gone
    pub fn push(&self, entry: BookkeepingEntry) -> Result<(), BookkeepingEntry> {
        self.sender
            .send(entry)
            .map_err(|mpsc::error::SendError(entry)| entry)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl BookkeepingReceiver {
    /// Wait for the next entry; `None` once every producer is gone
    pub async fn recv(&mut self) -> Option<BookkeepingEntry> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<BookkeepingEntry> {
        self.receiver.try_recv().ok()
    }

    /// Everything queued right now
    pub fn drain(&mut self) -> Vec<BookkeepingEntry> {
        let mut entries = Vec::new();
        while let Ok(entry) = self.receiver.try_recv() {
            entries.push(entry);
        }
        entries
    }
}

/// Spread `entry` into a field mapping and stamp it with `now`
///
/// Map and record fields are copied as they are; any other value is kept
/// under the data field. An existing timestamp field is overwritten.
pub(crate) fn timestamped(entry: Value, now: DateTime<Utc>) -> BTreeMap<String, Value> {
    let mut data = match entry.into_mapping() {
        Ok(fields) => fields,
        Err(Value::Null) => BTreeMap::new(),
        Err(other) => BTreeMap::from([(BOOKKEEPING_DATA_FIELD.to_string(), other)]),
    };
    let seconds = now.timestamp_micros() as f64 / 1_000_000.0;
    data.insert(TIMESTAMP_FIELD.to_string(), Value::Float(seconds));
    data
}
