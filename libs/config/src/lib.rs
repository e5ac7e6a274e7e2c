//! # Output Stream Configuration
//!
//! Centralized configuration and constants for stream clients, so that the
//! coordinator address, relay resolution policy and scheduling knobs are not
//! duplicated across producers.
//!
//! ## Usage
//!
//! ```rust
//! use stream_config::{constants, StreamConfig};
//!
//! let config = StreamConfig::default();
//! assert_eq!(config.coordinator_address, constants::COORDINATOR_ADDRESS);
//!
//! let config = StreamConfig::from_toml_str(r#"
//! coordinator_address = "coordinator-eu"
//!
//! [write_yield]
//! mode = "disabled"
//! "#).unwrap();
//! assert_eq!(config.coordinator_address, "coordinator-eu");
//! ```

pub mod constants;
pub mod stream_config;

pub use stream_config::{load_config, ResolverSettings, StreamConfig, WriteYield};
