//! Command handlers.

pub mod host;
pub mod lint;
pub mod list;
