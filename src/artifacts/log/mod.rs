//! Commit history
//!
//! - `rev_list`: lazy first-parent history and ancestry checks
//!
//! History is append-only: commits never change once written, so walking it
//! needs no locking. A walk started before a commit lands simply misses it.

pub mod rev_list;
