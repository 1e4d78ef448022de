//! HTTP handlers for arms-api.

pub mod forms;
pub mod sessions;
