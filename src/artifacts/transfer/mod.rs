//! Object transfer between a repository and its remote
//!
//! - `plan`: post-order walks deciding which objects cross the wire
//! - `remote_record`: what the repository already knows about its remote
//!
//! Objects always travel before anything that references them, and the
//! remote ref (or local HEAD, on pull) moves only once every object is in
//! place.

pub mod plan;
pub mod remote_record;

use crate::artifacts::objects::object_id::ObjectId;
use serde::Serialize;

/// Outcome of a push or pull
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Number of objects copied
    pub transferred: usize,
    /// Ref value after the operation
    pub head: Option<ObjectId>,
    pub up_to_date: bool,
}

impl SyncReport {
    pub fn up_to_date(head: Option<ObjectId>) -> Self {
        SyncReport {
            transferred: 0,
            head,
            up_to_date: true,
        }
    }

    pub fn transferred(transferred: usize, head: ObjectId) -> Self {
        SyncReport {
            transferred,
            head: Some(head),
            up_to_date: false,
        }
    }
}
