//! Data structures and algorithms
//!
//! - `branch`: ref names and revision parsing
//! - `checkout`: planning and applying working directory changes
//! - `core`: error taxonomy and sync observers
//! - `index`: index file format
//! - `log`: commit history traversal
//! - `objects`: blobs, trees and commits
//! - `status`: change detection between index, HEAD and working directory
//! - `transfer`: object transfer to and from a remote

pub mod branch;
pub mod checkout;
pub mod core;
pub mod index;
pub mod log;
pub mod objects;
pub mod status;
pub mod transfer;
