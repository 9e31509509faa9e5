//! Tree object
//!
//! Trees are directory snapshots. Each entry names a blob (file) or another
//! tree (subdirectory) together with its mode.
//!
//! ## Format
//!
//! `tree <size>\0<entries>`, one entry per child: `<mode> <name>\0<20-byte-digest>`.
//! Entries are ordered by name so the same directory content always encodes
//! to the same bytes.
//!
//! ## Tree Building
//!
//! [`Tree::build`] turns the flat path list of the index into nested trees.
//! A built tree keeps its subtrees in memory (`children`) so they can be
//! stored bottom-up with [`Tree::traverse`]; a tree read back from the
//! database only has its entries.

use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object::Unpackable;
use crate::artifacts::objects::object::{Object, Packable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use derive_new::new;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Component;

/// A single named child of a tree
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct TreeEntry {
    pub oid: ObjectId,
    pub mode: EntryMode,
}

impl TreeEntry {
    pub fn is_tree(&self) -> bool {
        self.mode.is_tree()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: BTreeMap<String, TreeEntry>,
    /// Subtrees produced by `build`, keyed like `entries`
    children: BTreeMap<String, Tree>,
}

/// Intermediate directory node used while grouping index paths
#[derive(Default)]
struct DirectoryNode {
    files: BTreeMap<String, TreeEntry>,
    directories: BTreeMap<String, DirectoryNode>,
}

impl DirectoryNode {
    fn insert(&mut self, segments: &[String], entry: &IndexEntry) {
        match segments {
            [] => {}
            [name] => {
                self.directories.remove(name);
                self.files.insert(
                    name.clone(),
                    TreeEntry::new(entry.oid.clone(), entry.metadata.mode),
                );
            }
            [dir, rest @ ..] => {
                self.files.remove(dir);
                self.directories
                    .entry(dir.clone())
                    .or_default()
                    .insert(rest, entry);
            }
        }
    }

    fn into_tree(self) -> anyhow::Result<Tree> {
        let mut tree = Tree {
            entries: self.files,
            children: BTreeMap::new(),
        };

        for (name, node) in self.directories {
            let subtree = node.into_tree()?;
            tree.entries.insert(
                name.clone(),
                TreeEntry::new(subtree.object_id()?, EntryMode::Directory),
            );
            tree.children.insert(name, subtree);
        }

        Ok(tree)
    }
}

impl Tree {
    /// Build nested trees from index entries
    ///
    /// Paths are grouped by their directory prefix; the result does not
    /// depend on the iteration order of `entries`.
    pub fn build<'e>(entries: impl IntoIterator<Item = &'e IndexEntry>) -> anyhow::Result<Self> {
        let mut root = DirectoryNode::default();

        for entry in entries {
            let segments = entry
                .name
                .components()
                .map(|component| match component {
                    Component::Normal(name) => name
                        .to_str()
                        .map(String::from)
                        .with_context(|| format!("Invalid path {:?}", entry.name)),
                    _ => Err(anyhow::anyhow!("Invalid path component in {:?}", entry.name)),
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            root.insert(&segments, entry);
        }

        root.into_tree()
    }

    /// Visit every built subtree before the tree that contains it
    ///
    /// Storing trees in this order guarantees that a tree is never written
    /// before the subtrees it references.
    pub fn traverse<F>(&self, func: &mut F) -> anyhow::Result<()>
    where
        F: FnMut(&Tree) -> anyhow::Result<()>,
    {
        for child in self.children.values() {
            child.traverse(func)?;
        }
        func(self)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &TreeEntry)> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, TreeEntry)> {
        self.entries.into_iter()
    }

    pub fn entry(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Packable for Tree {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut content = Vec::new();

        for (name, entry) in &self.entries {
            write!(content, "{} {}\0", entry.mode.as_str(), name)?;
            entry.oid.write_h40_to(&mut content)?;
        }

        Ok(Bytes::from(self.object_type().encode(&content)))
    }
}

impl Unpackable for Tree {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut entries = BTreeMap::new();

        loop {
            let mut mode = Vec::new();
            if reader.read_until(b' ', &mut mode)? == 0 {
                break;
            }
            mode.pop();
            let mode = EntryMode::try_from(std::str::from_utf8(&mode)?)?;

            let mut name = Vec::new();
            reader.read_until(b'\0', &mut name)?;
            if name.pop() != Some(b'\0') {
                anyhow::bail!("Invalid tree object: unterminated entry name");
            }
            let name = String::from_utf8(name).context("Invalid tree object: entry name")?;

            let oid = ObjectId::read_h40_from(&mut reader)
                .context("Invalid tree object: truncated entry digest")?;

            entries.insert(name, TreeEntry::new(oid, mode));
        }

        Ok(Tree {
            entries,
            children: BTreeMap::new(),
        })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }
}
