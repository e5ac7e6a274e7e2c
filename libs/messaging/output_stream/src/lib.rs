//! # Output Streams
//!
//! Client side of the stream relay protocol. A producer writes partial values
//! (deltas) into an [`OutputStream`]; every delta is relayed to the
//! coordinator as a `CONTENT_STREAM_CHUNK` and stitched into the stream's
//! accumulator. [`OutputStream::finalize`] converts the accumulator into an
//! optional [`TargetShape`] and relays `CONTENT_STREAM_END` followed by
//! `CONTENT`.
//!
//! ## Usage
//!
//! ```rust
//! use message_sink::test_utils::CollectorSink;
//! use output_stream::OutputStream;
//! use std::sync::Arc;
//! use types::Value;
//!
//! # tokio_test::block_on(async {
//! let coordinator = Arc::new(CollectorSink::new());
//! let mut stream = OutputStream::builder("completion-1")
//!     .sink(coordinator.clone())
//!     .build()?;
//!
//! stream.write(Value::map([("text", Value::from("Hello"))])).await;
//! stream.write(Value::map([("text", Value::from(" World"))])).await;
//!
//! let output = stream.finalize().await?;
//! assert_eq!(output.get("text"), Some(&Value::from("Hello World")));
//! assert_eq!(coordinator.message_count(), 4);
//! # Ok::<(), output_stream::StreamError>(())
//! # }).unwrap();
//! ```

pub mod bookkeeping;
pub mod error;
pub mod shape;
pub mod stream;

pub use bookkeeping::{BookkeepingEntry, BookkeepingQueue, BookkeepingReceiver};
pub use error::{ShapeError, StreamError};
pub use shape::{FieldSpec, RecordSchema, SerdeShape, TargetShape};
pub use stream::{OutputStream, OutputStreamBuilder, RelayStats};
