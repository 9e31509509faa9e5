//! Shared pieces used across components
//!
//! - `error`: the error taxonomy raised by repository operations
//! - `observer`: hooks notified after remote synchronization

pub mod error;
pub mod observer;
