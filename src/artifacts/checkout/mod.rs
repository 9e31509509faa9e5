//! Making the working directory match a commit
//!
//! - `migration`: plan the file system changes for a target tree and
//!   materialize it, collecting per-path failures
//!
//! Everything the target tree does not contain is removed, tracked or not;
//! the repository directory is left alone.

pub mod migration;
