//! End-to-End Test Support
//!
//! Fixtures for driving output streams against real coordinator actors
//! hosted in an in-process [`messaging_actors::ActorSystem`].

pub mod fixtures;

pub use fixtures::{init_test_tracing, start_coordinator, CoordinatorLog, RecordingCoordinator};
