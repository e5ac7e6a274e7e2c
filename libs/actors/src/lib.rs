//! In-Process Actor Runtime
//!
//! Minimal actor runtime used to host stream coordinators. Actors own a single
//! unbounded FIFO mailbox, so everything one sender enqueues is handled in
//! send order and enqueueing never blocks the sender.
//!
//! Actors are found by logical address through an [`ActorRegistry`].
//!
//! # Examples
//!
//! ```rust
//! use async_trait::async_trait;
//! use messaging_actors::{ActorBehavior, ActorRegistry, ActorSystem, Result};
//!
//! struct Printer;
//!
//! #[async_trait]
//! impl ActorBehavior for Printer {
//!     type Message = String;
//!
//!     async fn handle(&mut self, msg: String) -> Result<()> {
//!         println!("Received: {}", msg);
//!         Ok(())
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let system = ActorSystem::new();
//! let registry = ActorRegistry::new();
//! system.spawn_named(&registry, "printer", Printer).await?;
//!
//! let printer = registry.lookup("printer").await?;
//! printer.send("Hello, Actor!".to_string())?;
//! system.shutdown().await;
//! # Ok::<(), messaging_actors::ActorError>(())
//! # }).unwrap();
//! ```

pub mod error;
pub mod registry;
pub mod system;

pub use error::{ActorError, Result};
pub use registry::{ActorId, ActorRegistry};
pub use system::{
    ActorBehavior, ActorRef, ActorSystem, Mailbox, MailboxReceiver, SupervisorDirective,
    SystemMetrics, SystemStats,
};
