//! Core identifier and configuration value types
//!
//! User identifiers are validated once at the boundary so the buffer,
//! snapshots and publishers can rely on them being non-empty.

pub mod duration;
pub mod validated;

pub use duration::duration_ms_serde;
pub use validated::{UpstreamName, UserId, ValidationError};
