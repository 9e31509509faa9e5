//! Repository components
//!
//! - `config`: repository configuration (`.knot/config.json`)
//! - `database`: content-addressed object store
//! - `index`: staging area
//! - `locator`: repository id to storage location mapping
//! - `lock`: per-repository operation lock
//! - `refs`: HEAD and branch references
//! - `remote`: remote object store abstraction
//! - `repository`: the handle tying everything together
//! - `workspace`: working directory file system operations

pub mod config;
pub mod database;
pub mod index;
pub mod locator;
pub mod lock;
pub mod refs;
pub mod remote;
pub mod repository;
pub mod workspace;
