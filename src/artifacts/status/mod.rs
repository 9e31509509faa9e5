//! Working directory status
//!
//! - `file_change`: a changed path and how it changed
//! - `inspector`: compares the index with the working directory and HEAD

pub mod file_change;
pub mod inspector;
