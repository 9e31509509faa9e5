//! Command implementations
//!
//! - `porcelain`: user-facing commands, one module per command

pub mod porcelain;
