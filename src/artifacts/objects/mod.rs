//! Object types and their canonical encodings
//!
//! Everything the repository stores is an immutable object identified by the
//! SHA-1 digest of its encoding:
//!
//! - **Blob**: file content (raw bytes)
//! - **Tree**: directory listing (names, modes and digests)
//! - **Commit**: snapshot metadata (tree, parents, author, message)
//!
//! Every encoding has the shape `<type> <size>\0<content>`.

pub mod blob;
pub mod commit;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod tree;

/// Length of a SHA-1 digest in hexadecimal format
pub const OBJECT_ID_LENGTH: usize = 40;
