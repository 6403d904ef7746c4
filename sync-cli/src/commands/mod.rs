//! CLI command implementations.

pub mod host;
pub mod view;
