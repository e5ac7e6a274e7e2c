//! Common identifier and error types shared by every stream crate

pub mod errors;
pub mod identifiers;
