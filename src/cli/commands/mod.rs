//! CLI command implementations.

pub mod download;
pub mod sources;
pub mod validate;
