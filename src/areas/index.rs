//! Index (staging area)
//!
//! The index records which blob each tracked path will have in the next
//! commit. It lives in `.knot/index` and is rewritten as a whole on every
//! update (temp file + rename), so a reader never sees a half-written index.
//!
//! ## Data Structures
//!
//! - `entries`: Maps file paths to their index entries
//! - `children`: Maps directory paths to the files below them, which makes
//!   file/directory conflict resolution cheap

use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::index_entry::{ENTRY_FIXED_SIZE, EntryMetadata, IndexEntry};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::HEADER_SIZE;
use crate::artifacts::objects::object::Packable;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::Tree;
use anyhow::Context;
use byteorder::ByteOrder;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::DerefMut;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Index {
    /// Path to the index file (typically `.knot/index`)
    path: Box<Path>,
    entries: BTreeMap<PathBuf, IndexEntry>,
    children: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    /// Set when the in-memory index differs from the file
    changed: bool,
}

impl Index {
    pub fn new(path: Box<Path>) -> Self {
        Index {
            path,
            entries: BTreeMap::new(),
            children: BTreeMap::new(),
            changed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_by_path(&self, path: &Path) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.children.clear();
        self.changed = true;
    }

    /// Load the index from disk
    ///
    /// A missing or empty file is an empty index. The trailing checksum is
    /// verified; a mismatch is an error rather than an empty index.
    pub fn rehydrate(&mut self) -> anyhow::Result<()> {
        self.entries.clear();
        self.children.clear();
        self.changed = false;

        if !self.path.exists() {
            return Ok(());
        }

        let mut index_file = std::fs::OpenOptions::new()
            .read(true)
            .open(self.path())
            .with_context(|| format!("Unable to open index {}", self.path.display()))?;
        let mut lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1)?;

        if lock.deref_mut().metadata()?.len() == 0 {
            return Ok(());
        }

        let mut reader = Checksum::new(lock.deref_mut());
        let header = IndexHeader::parse(&reader.read(HEADER_SIZE)?)?;

        for _ in 0..header.entries_count {
            let mut entry_bytes = reader.read(ENTRY_FIXED_SIZE)?.to_vec();
            let name_len = byteorder::NetworkEndian::read_u16(&entry_bytes[36..38]) as usize;
            let remaining = IndexEntry::padded_size(name_len) - ENTRY_FIXED_SIZE;
            entry_bytes.extend_from_slice(&reader.read(remaining)?);

            let entry = IndexEntry::parse(&entry_bytes)?;
            self.store_entry(entry);
        }

        reader
            .verify()
            .with_context(|| format!("Corrupt index {}", self.path.display()))
    }

    /// Persist the index if it changed since it was loaded
    pub fn write_updates(&mut self) -> anyhow::Result<()> {
        if !self.changed {
            return Ok(());
        }

        let temp_path = self.path.with_extension("tmp");
        {
            let file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Unable to open {}", temp_path.display()))?;
            let mut writer = Checksum::new(std::io::BufWriter::new(file));

            let header = IndexHeader {
                entries_count: self.entries.len() as u32,
                ..IndexHeader::empty()
            };
            writer.write(&header.serialize()?)?;

            for entry in self.entries.values() {
                writer.write(&entry.serialize()?)?;
            }

            writer.write_checksum()?;
        }

        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Unable to replace index {}", self.path.display()))?;
        self.changed = false;

        tracing::debug!(entries = self.entries.len(), "index written");
        Ok(())
    }

    /// Stage a file, replacing any previous entry for the same path
    ///
    /// Entries that conflict with the new path are discarded: a file where a
    /// parent directory of the new path is expected, or files below the new
    /// path when it used to be a directory.
    pub fn add(&mut self, entry: IndexEntry) {
        self.discard_conflicts(&entry);
        self.store_entry(entry);
        self.changed = true;
    }

    /// Shorthand for [`Index::add`]
    pub fn stage(&mut self, path: PathBuf, oid: ObjectId, metadata: EntryMetadata) {
        self.add(IndexEntry::new(path, oid, metadata));
    }

    /// Unstage a path (or everything below it); absent paths are ignored
    pub fn remove(&mut self, path: &Path) {
        let had_entry = self.remove_entry(path);
        let had_children = self.remove_children(path);

        if had_entry || had_children {
            self.changed = true;
        }
    }

    /// Build the tree that a commit of this index would record
    pub fn snapshot(&self) -> anyhow::Result<Tree> {
        Tree::build(self.entries.values())
    }

    /// Refresh cached stat data after a file was found unchanged
    pub fn update_entry_stat(&mut self, path: &Path, stat: EntryMetadata) {
        if let Some(existing_entry) = self.entries.get_mut(path)
            && existing_entry.metadata != stat
        {
            existing_entry.metadata = stat;
            self.changed = true;
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Whether `path` is a staged file or a directory containing staged files
    pub fn is_tracked(&self, path: &Path) -> bool {
        self.entries.contains_key(path) || self.children.contains_key(path)
    }

    fn discard_conflicts(&mut self, entry: &IndexEntry) {
        for parent in entry.parent_dirs() {
            self.remove_entry(parent);
        }
        self.remove_children(&entry.name);
    }

    fn store_entry(&mut self, entry: IndexEntry) {
        for parent in entry.parent_dirs() {
            self.children
                .entry(parent.to_path_buf())
                .or_default()
                .insert(entry.name.clone());
        }

        self.entries.insert(entry.name.clone(), entry);
    }

    fn remove_children(&mut self, path: &Path) -> bool {
        match self.children.remove(path) {
            Some(children) => {
                for child in children {
                    self.remove_entry(&child);
                }
                true
            }
            None => false,
        }
    }

    fn remove_entry(&mut self, path: &Path) -> bool {
        match self.entries.remove(path) {
            None => false,
            Some(entry) => {
                for parent in entry.parent_dirs() {
                    if let Some(children) = self.children.get_mut(parent) {
                        children.remove(path);
                        if children.is_empty() {
                            self.children.remove(parent);
                        }
                    }
                }
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
    use crate::artifacts::objects::object::Object;
    use assert_fs::TempDir;
    use rstest::{fixture, rstest};

    fn oid(content: &str) -> ObjectId {
        ObjectId::from_content(content.as_bytes())
    }

    fn metadata() -> EntryMetadata {
        EntryMetadata {
            mode: EntryMode::File(FileMode::Regular),
            size: 3,
            ..Default::default()
        }
    }

    #[fixture]
    fn index_dir() -> TempDir {
        TempDir::new().expect("Failed to create temp dir")
    }

    fn new_index(dir: &TempDir) -> Index {
        Index::new(dir.path().join("index").into_boxed_path())
    }

    fn paths(index: &Index) -> Vec<PathBuf> {
        index.entries().map(|entry| entry.name.clone()).collect()
    }

    #[rstest]
    fn staging_the_same_path_twice_keeps_the_latest_digest(index_dir: TempDir) {
        let mut index = new_index(&index_dir);

        index.stage(PathBuf::from("a.txt"), oid("first"), metadata());
        index.stage(PathBuf::from("a.txt"), oid("second"), metadata());

        pretty_assertions::assert_eq!(index.len(), 1);
        pretty_assertions::assert_eq!(
            index.entry_by_path(Path::new("a.txt")).unwrap().oid,
            oid("second")
        );
    }

    #[rstest]
    fn file_replaces_directory_and_vice_versa(index_dir: TempDir) {
        let mut index = new_index(&index_dir);

        index.stage(PathBuf::from("alice.txt"), oid("a"), metadata());
        index.stage(PathBuf::from("nested/bob.txt"), oid("b"), metadata());
        index.stage(PathBuf::from("nested/inner/claire.txt"), oid("c"), metadata());

        index.stage(PathBuf::from("nested"), oid("d"), metadata());
        pretty_assertions::assert_eq!(
            paths(&index),
            vec![PathBuf::from("alice.txt"), PathBuf::from("nested")]
        );

        index.stage(PathBuf::from("alice.txt/nested.txt"), oid("e"), metadata());
        pretty_assertions::assert_eq!(
            paths(&index),
            vec![PathBuf::from("alice.txt/nested.txt"), PathBuf::from("nested")]
        );
    }

    #[rstest]
    fn unstage_is_idempotent(index_dir: TempDir) {
        let mut index = new_index(&index_dir);
        index.stage(PathBuf::from("dir/a.txt"), oid("a"), metadata());
        index.stage(PathBuf::from("dir/b.txt"), oid("b"), metadata());

        index.remove(Path::new("missing.txt"));
        index.remove(Path::new("dir"));
        index.remove(Path::new("dir"));

        assert!(index.is_empty());
        assert!(!index.is_tracked(Path::new("dir")));
    }

    #[rstest]
    fn index_survives_a_write_and_reload(index_dir: TempDir) {
        let mut index = new_index(&index_dir);
        index.stage(PathBuf::from("1.txt"), oid("one"), metadata());
        index.stage(PathBuf::from("a/b/3.txt"), oid("three"), metadata());
        index.write_updates().unwrap();

        let mut reloaded = new_index(&index_dir);
        reloaded.rehydrate().unwrap();

        pretty_assertions::assert_eq!(paths(&reloaded), paths(&index));
        pretty_assertions::assert_eq!(
            reloaded.snapshot().unwrap().object_id().unwrap(),
            index.snapshot().unwrap().object_id().unwrap()
        );
        assert!(reloaded.is_tracked(Path::new("a/b")));
    }

    #[rstest]
    fn corrupt_index_is_reported(index_dir: TempDir) {
        let mut index = new_index(&index_dir);
        index.stage(PathBuf::from("1.txt"), oid("one"), metadata());
        index.write_updates().unwrap();

        let mut bytes = std::fs::read(index.path()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(index.path(), bytes).unwrap();

        assert!(new_index(&index_dir).rehydrate().is_err());
    }

    #[rstest]
    fn missing_index_loads_empty(index_dir: TempDir) {
        let mut index = new_index(&index_dir);

        index.rehydrate().unwrap();
        assert!(index.is_empty());
    }
}
