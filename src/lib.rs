//! knot: a small content-addressed version control core
//!
//! - `areas`: the on-disk components of a repository and the [`Repository`]
//!   handle
//! - `artifacts`: object formats and the algorithms working on them
//! - `commands`: porcelain commands, as methods on [`Repository`]
//!
//! [`Repository`]: areas::repository::Repository

pub mod areas;
pub mod artifacts;
pub mod commands;
