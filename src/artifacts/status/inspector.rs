use crate::areas::index::Index;
use crate::areas::workspace::Workspace;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::objects::tree::TreeEntry;
use crate::artifacts::status::file_change::{ChangeKind, FileChange};
use derive_new::new;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Compares the index with the working directory and with HEAD
#[derive(new)]
pub struct Inspector<'w> {
    workspace: &'w Workspace,
}

impl<'w> Inspector<'w> {
    /// Differences between the index and the working directory
    ///
    /// `Added` is a file on disk the index does not know, `Deleted` an index
    /// entry with no file behind it, `Modified` a file whose content (or
    /// mode) changed. Entries found unchanged despite a different mtime get
    /// their cached stat refreshed, so the next diff can skip hashing them.
    pub fn diff(&self, index: &mut Index) -> anyhow::Result<BTreeSet<FileChange>> {
        let mut changes = BTreeSet::new();

        for file_path in self.workspace.list_files(None)? {
            if index.entry_by_path(&file_path).is_none() {
                changes.insert(FileChange::new(file_path, ChangeKind::Added));
            }
        }

        let entries = index.entries().cloned().collect::<Vec<_>>();
        for entry in entries {
            let stat = self
                .workspace
                .stat_file(&entry.name)
                .ok()
                .filter(|stat| !stat.mode.is_tree());

            match self.check_index_against_workspace(&entry, stat.as_ref())? {
                Some(kind) => {
                    changes.insert(FileChange::new(entry.name.clone(), kind));
                }
                None => {
                    if let Some(stat) = stat {
                        index.update_entry_stat(&entry.name, stat);
                    }
                }
            }
        }

        Ok(changes)
    }

    /// Differences between HEAD's files and the index (what a commit would record)
    pub fn diff_head(
        &self,
        index: &Index,
        head_files: &BTreeMap<PathBuf, TreeEntry>,
    ) -> BTreeSet<FileChange> {
        let mut changes = BTreeSet::new();

        for entry in index.entries() {
            let head_entry = head_files.get(&entry.name);
            if let Some(kind) = Self::check_index_against_head(Some(entry), head_entry) {
                changes.insert(FileChange::new(entry.name.clone(), kind));
            }
        }

        for (path, head_entry) in head_files {
            if index.entry_by_path(path).is_none()
                && let Some(kind) = Self::check_index_against_head(None, Some(head_entry))
            {
                changes.insert(FileChange::new(path.clone(), kind));
            }
        }

        changes
    }

    pub fn check_index_against_workspace(
        &self,
        entry: &IndexEntry,
        stat: Option<&EntryMetadata>,
    ) -> anyhow::Result<Option<ChangeKind>> {
        match stat {
            None => Ok(Some(ChangeKind::Deleted)),
            Some(stat) if !entry.stat_match(stat) => Ok(Some(ChangeKind::Modified)),
            Some(stat) if entry.times_match(stat) => Ok(None),
            Some(_) if self.workspace.hash_file(&entry.name)? != entry.oid => {
                Ok(Some(ChangeKind::Modified))
            }
            Some(_) => Ok(None),
        }
    }

    pub fn check_index_against_head(
        index_entry: Option<&IndexEntry>,
        head_entry: Option<&TreeEntry>,
    ) -> Option<ChangeKind> {
        match (index_entry, head_entry) {
            (Some(index_entry), Some(head_entry))
                if head_entry.mode != index_entry.metadata.mode
                    || head_entry.oid != index_entry.oid =>
            {
                Some(ChangeKind::Modified)
            }
            (Some(_), None) => Some(ChangeKind::Added),
            (None, Some(_)) => Some(ChangeKind::Deleted),
            _ => None,
        }
    }
}
