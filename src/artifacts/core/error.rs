//! Error taxonomy for repository operations
//!
//! Operations return `anyhow::Result` and raise one of these variants at the
//! point of failure, so callers can recover the kind with
//! `err.downcast_ref::<KnotError>()` while still getting the full context chain.

use crate::artifacts::objects::object_id::ObjectId;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum KnotError {
    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),

    #[error("pathspec '{}' did not match any files", .0.display())]
    PathNotFound(PathBuf),

    #[error("parent {0} is not a known commit")]
    InvalidParent(ObjectId),

    #[error("short object ID {prefix} is ambiguous: {}", format_candidates(.candidates))]
    AmbiguousRef {
        prefix: String,
        candidates: Vec<ObjectId>,
    },

    #[error("unknown revision '{0}'")]
    UnknownRef(String),

    #[error("remote head {remote} is not an ancestor of {local} (use --force to overwrite)")]
    NonFastForward { remote: ObjectId, local: ObjectId },

    #[error("local head {local} has diverged from remote head {remote}")]
    DivergedHistory { local: ObjectId, remote: ObjectId },

    #[error("nothing to commit")]
    NothingToCommit,

    #[error("commit message must not be empty")]
    EmptyMessage,

    /// `causes` holds one message per entry of `paths`
    #[error("{operation} failed for {}", format_failures(.paths, .causes))]
    Io {
        operation: &'static str,
        paths: Vec<PathBuf>,
        causes: Vec<String>,
    },

    #[error("unable to acquire {} after {attempts} attempts", .path.display())]
    LockContention { path: PathBuf, attempts: u32 },

    #[error("repository already initialized at {}", .0.display())]
    AlreadyInitialized(PathBuf),

    #[error("not a knot repository: {}", .0.display())]
    NotARepository(PathBuf),

    #[error("no remote configured")]
    NoRemote,

    #[error("remote ref moved (expected {}, found {})", format_ref(.expected), format_ref(.actual))]
    RemoteRefMoved {
        expected: Option<ObjectId>,
        actual: Option<ObjectId>,
    },

    #[error("object {expected} is corrupt (content hashes to {actual})")]
    CorruptObject { expected: ObjectId, actual: ObjectId },
}

fn format_candidates(candidates: &[ObjectId]) -> String {
    candidates
        .iter()
        .map(|oid| oid.to_short_oid())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_ref(oid: &Option<ObjectId>) -> String {
    oid.as_ref()
        .map(|oid| oid.to_short_oid())
        .unwrap_or_else(|| "nothing".to_string())
}

fn format_failures(paths: &[PathBuf], causes: &[String]) -> String {
    paths
        .iter()
        .enumerate()
        .map(|(i, path)| match causes.get(i) {
            Some(cause) => format!("{} ({})", path.display(), cause),
            None => path.display().to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Look through an error chain for a `KnotError`
pub fn knot_error(err: &anyhow::Error) -> Option<&KnotError> {
    err.chain().find_map(|cause| cause.downcast_ref::<KnotError>())
}
