//! Porcelain commands
//!
//! Each command is an `impl Repository` block. Commands that change the
//! index, HEAD or the working directory hold the repository lock for their
//! whole duration.
//!
//! ## Commands
//!
//! - `init`: create an empty repository
//! - `add`: stage files
//! - `commit`: record the index as a new commit
//! - `push` / `pull`: synchronize with the remote store
//! - `revert`: restore the working directory to an earlier commit
//! - `log`: show first-parent history
//! - `status`: show staged and unstaged changes

pub mod add;
pub mod commit;
pub mod init;
pub mod log;
pub mod pull;
pub mod push;
pub mod revert;
pub mod status;
