//! Working directory migration
//!
//! Making the working directory match a tree happens in two steps:
//!
//! 1. Planning: compare the target tree with what is on disk and record the
//!    exact set of file writes, file deletions and directory changes
//! 2. Applying: [`Workspace::apply_migration`] carries the plan out
//!
//! Files already matching the tree (same digest, same mode) are left alone.
//! Files and directories the tree does not mention are removed, tracked or
//! not; the repository directory is never touched.

use crate::areas::database::Database;
use crate::areas::workspace::Workspace;
use crate::artifacts::core::error::KnotError;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::TreeEntry;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Planned file system changes
#[derive(Debug, Default)]
pub struct Migration {
    /// Files to create or overwrite
    writes: Vec<(PathBuf, TreeEntry)>,
    /// Files to delete
    deletes: Vec<PathBuf>,
    mkdirs: BTreeSet<PathBuf>,
    rmdirs: BTreeSet<PathBuf>,
}

/// Outcome of applying a [`Migration`]
#[derive(Debug, Default)]
pub struct MaterializeReport {
    pub written: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, anyhow::Error)>,
}

impl MaterializeReport {
    pub fn record_failure(&mut self, path: &Path, err: anyhow::Error) {
        tracing::warn!(path = %path.display(), error = %err, "materialize failed for path");
        self.failed.push((path.to_path_buf(), err));
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Turn per-path failures into a single error naming every path and why
    pub fn into_result(self) -> anyhow::Result<Self> {
        if self.is_clean() {
            return Ok(self);
        }

        let (paths, causes) = self
            .failed
            .into_iter()
            .map(|(path, err)| (path, format!("{:#}", err)))
            .unzip();
        Err(KnotError::Io {
            operation: "materialize",
            paths,
            causes,
        }
        .into())
    }
}

impl Migration {
    /// Plan the changes turning the workspace into `target`
    pub fn plan(
        workspace: &Workspace,
        target: &BTreeMap<PathBuf, TreeEntry>,
    ) -> anyhow::Result<Self> {
        let mut migration = Migration::default();

        for file_path in workspace.list_files(None)? {
            if !target.contains_key(&file_path) {
                migration.deletes.push(file_path);
            }
        }

        for (file_path, entry) in target {
            if !Self::matches_on_disk(workspace, file_path, entry) {
                migration.writes.push((file_path.clone(), entry.clone()));
            }

            migration.mkdirs.extend(
                file_path
                    .ancestors()
                    .skip(1)
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .map(Path::to_path_buf),
            );
        }

        for dir_path in workspace.list_dirs()? {
            if !migration.mkdirs.contains(&dir_path) {
                migration.rmdirs.insert(dir_path);
            }
        }

        Ok(migration)
    }

    pub fn writes(&self) -> &[(PathBuf, TreeEntry)] {
        &self.writes
    }

    pub fn deletes(&self) -> &[PathBuf] {
        &self.deletes
    }

    pub fn mkdirs(&self) -> &BTreeSet<PathBuf> {
        &self.mkdirs
    }

    pub fn rmdirs(&self) -> &BTreeSet<PathBuf> {
        &self.rmdirs
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.deletes.is_empty() && self.rmdirs.is_empty()
    }

    fn matches_on_disk(workspace: &Workspace, file_path: &Path, entry: &TreeEntry) -> bool {
        let Ok(stat) = workspace.stat_file(file_path) else {
            return false;
        };
        if stat.mode != entry.mode {
            return false;
        }

        workspace
            .hash_file(file_path)
            .is_ok_and(|oid| oid == entry.oid)
    }
}

/// Make the workspace byte-identical to a stored tree
///
/// Per-path failures end up in the report; only a failure to plan (e.g. the
/// tree is missing) is returned as an error.
pub fn materialize(
    database: &Database,
    workspace: &Workspace,
    tree_oid: &ObjectId,
) -> anyhow::Result<MaterializeReport> {
    let target = database.flatten_tree(tree_oid)?;
    let migration = Migration::plan(workspace, &target)?;

    let report = workspace.apply_migration(&migration, database);
    tracing::debug!(
        tree = %tree_oid,
        written = report.written.len(),
        removed = report.removed.len(),
        failed = report.failed.len(),
        "tree materialized"
    );

    Ok(report)
}
