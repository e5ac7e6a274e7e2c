pub mod actor;

pub use actor::ActorSink;
