//! Object store
//!
//! Objects live under `.knot/objects/<2 hex>/<38 hex>`, zlib-compressed.
//! Writes go to a temporary file next to the destination and are renamed into
//! place, so two writers storing the same object never see a partial file.

use crate::artifacts::core::error::KnotError;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{Object, ObjectBox};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::{Tree, TreeEntry};
use anyhow::Context;
use bytes::Bytes;
use fake::rand;
use std::collections::{BTreeMap, HashSet};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
}

// TODO: pack loose objects once repositories grow past a few thousand objects
impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    pub fn has(&self, object_id: &ObjectId) -> bool {
        self.path.join(object_id.to_path()).is_file()
    }

    /// Canonical encoding of a stored object (header included)
    pub fn load(&self, object_id: &ObjectId) -> anyhow::Result<Bytes> {
        let object_path = self.path.join(object_id.to_path());
        if !object_path.is_file() {
            return Err(KnotError::ObjectNotFound(object_id.clone()).into());
        }

        self.read_object(object_path)
    }

    /// Store an object, returning its digest
    ///
    /// Storing an object that already exists is a no-op.
    pub fn store(&self, object: &impl Object) -> anyhow::Result<ObjectId> {
        let object_content = object.serialize()?;
        let object_id = ObjectId::from_content(&object_content);

        self.write_if_missing(&object_id, object_content)?;
        Ok(object_id)
    }

    /// Store an encoding received from elsewhere after checking its digest
    pub fn store_raw(&self, object_id: &ObjectId, object_content: Bytes) -> anyhow::Result<()> {
        let actual = ObjectId::from_content(&object_content);
        if &actual != object_id {
            return Err(KnotError::CorruptObject {
                expected: object_id.clone(),
                actual,
            }
            .into());
        }

        self.write_if_missing(object_id, object_content)
    }

    pub fn parse_object(&self, object_id: &ObjectId) -> anyhow::Result<ObjectBox> {
        ObjectBox::parse(self.load(object_id)?)
            .with_context(|| format!("Unable to parse object {}", object_id))
    }

    pub fn parse_object_as_blob(&self, object_id: &ObjectId) -> anyhow::Result<Option<Blob>> {
        match self.parse_object(object_id)? {
            ObjectBox::Blob(blob) => Ok(Some(*blob)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_tree(&self, object_id: &ObjectId) -> anyhow::Result<Option<Tree>> {
        match self.parse_object(object_id)? {
            ObjectBox::Tree(tree) => Ok(Some(*tree)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_commit(&self, object_id: &ObjectId) -> anyhow::Result<Option<Commit>> {
        match self.parse_object(object_id)? {
            ObjectBox::Commit(commit) => Ok(Some(*commit)),
            _ => Ok(None),
        }
    }

    pub fn object_type(&self, object_id: &ObjectId) -> anyhow::Result<ObjectType> {
        let content = self.load(object_id)?;
        let (object_type, _) = ObjectType::parse_header(&mut Cursor::new(content))?;
        Ok(object_type)
    }

    /// Every file reachable from a tree, keyed by its path from the tree root
    pub fn flatten_tree(&self, tree_id: &ObjectId) -> anyhow::Result<BTreeMap<PathBuf, TreeEntry>> {
        let mut files = BTreeMap::new();
        self.collect_tree(tree_id, PathBuf::new(), &mut files)?;
        Ok(files)
    }

    fn collect_tree(
        &self,
        tree_id: &ObjectId,
        prefix: PathBuf,
        files: &mut BTreeMap<PathBuf, TreeEntry>,
    ) -> anyhow::Result<()> {
        let tree = self
            .parse_object_as_tree(tree_id)?
            .with_context(|| format!("Object {} is not a tree", tree_id))?;

        for (name, entry) in tree.into_entries() {
            let path = prefix.join(&name);
            if entry.is_tree() {
                self.collect_tree(&entry.oid, path, files)?;
            } else {
                files.insert(path, entry);
            }
        }

        Ok(())
    }

    /// Lazily walk every object reachable from `root`
    ///
    /// Follows commit → tree, commit → parents and tree → entries edges.
    /// Each object is yielded once; a missing object yields `ObjectNotFound`.
    pub fn walk_reachable(&self, root: &ObjectId) -> ReachableObjects<'_> {
        ReachableObjects {
            database: self,
            pending: vec![(root.clone(), false)],
            visited: HashSet::new(),
        }
    }

    /// Find all objects whose digest starts with `prefix`
    ///
    /// Prefixes of two or more characters only look in one fan-out directory.
    pub fn find_objects_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<ObjectId>> {
        let prefix = prefix.to_ascii_lowercase();
        let mut matches = Vec::new();
        if !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(matches);
        }

        let directories = if prefix.len() >= 2 {
            vec![prefix[..2].to_string()]
        } else {
            (0..=255u8).map(|i| format!("{:02x}", i)).collect()
        };

        for dir_name in directories {
            let dir_path = self.path.join(&dir_name);
            if !dir_path.is_dir() {
                continue;
            }

            for entry in std::fs::read_dir(&dir_path)? {
                let full_oid = format!("{}{}", dir_name, entry?.file_name().to_string_lossy());

                if full_oid.starts_with(&prefix)
                    && let Ok(oid) = ObjectId::try_parse(full_oid)
                {
                    matches.push(oid);
                }
            }
        }

        matches.sort();
        Ok(matches)
    }

    fn write_if_missing(&self, object_id: &ObjectId, object_content: Bytes) -> anyhow::Result<()> {
        let object_path = self.path.join(object_id.to_path());
        if object_path.exists() {
            return Ok(());
        }

        let object_dir = object_path
            .parent()
            .with_context(|| format!("Invalid object path {}", object_path.display()))?;
        std::fs::create_dir_all(object_dir).with_context(|| {
            format!("Unable to create object directory {}", object_dir.display())
        })?;

        self.write_object(object_dir, &object_path, object_content)?;
        tracing::debug!(oid = %object_id, "object stored");

        Ok(())
    }

    fn read_object(&self, object_path: PathBuf) -> anyhow::Result<Bytes> {
        let object_content = std::fs::read(&object_path)
            .with_context(|| format!("Unable to read object file {}", object_path.display()))?;

        Self::decompress(object_content.into())
    }

    fn write_object(
        &self,
        object_dir: &Path,
        object_path: &Path,
        object_content: Bytes,
    ) -> anyhow::Result<()> {
        let temp_object_path = object_dir.join(Self::generate_temp_name());
        let object_content = Self::compress(object_content)?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_object_path)
            .with_context(|| {
                format!("Unable to open object file {}", temp_object_path.display())
            })?;

        file.write_all(&object_content).with_context(|| {
            format!("Unable to write object file {}", temp_object_path.display())
        })?;
        drop(file);

        // concurrent writers of one object rename identical content
        std::fs::rename(&temp_object_path, object_path).with_context(|| {
            format!("Unable to rename object file to {}", object_path.display())
        })?;

        Ok(())
    }

    fn compress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(&data)
            .context("Unable to compress object content")?;

        encoder
            .finish()
            .map(|compressed_content| compressed_content.into())
            .context("Unable to finish compressing object content")
    }

    fn decompress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(&*data);
        let mut decompressed_content = Vec::new();
        decoder
            .read_to_end(&mut decompressed_content)
            .context("Unable to decompress object content")?;

        Ok(decompressed_content.into())
    }

    fn generate_temp_name() -> String {
        format!("tmp-obj-{}", rand::random::<u32>())
    }
}

/// Iterator returned by [`Database::walk_reachable`]
pub struct ReachableObjects<'d> {
    database: &'d Database,
    /// Digests still to visit; `true` marks a blob known from its tree entry
    pending: Vec<(ObjectId, bool)>,
    visited: HashSet<ObjectId>,
}

impl ReachableObjects<'_> {
    fn visit(&mut self, object_id: &ObjectId, is_blob: bool) -> anyhow::Result<()> {
        if is_blob {
            if !self.database.has(object_id) {
                return Err(KnotError::ObjectNotFound(object_id.clone()).into());
            }
            return Ok(());
        }

        match self.database.parse_object(object_id)? {
            ObjectBox::Blob(_) => {}
            ObjectBox::Tree(tree) => {
                let entries = tree.entries().collect::<Vec<_>>();
                for (_, entry) in entries.into_iter().rev() {
                    self.pending.push((entry.oid.clone(), !entry.is_tree()));
                }
            }
            ObjectBox::Commit(commit) => {
                for parent in commit.parents().iter().rev() {
                    self.pending.push((parent.clone(), false));
                }
                self.pending.push((commit.tree_oid().clone(), false));
            }
        }

        Ok(())
    }
}

impl Iterator for ReachableObjects<'_> {
    type Item = anyhow::Result<ObjectId>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (object_id, is_blob) = self.pending.pop()?;
            if !self.visited.insert(object_id.clone()) {
                continue;
            }

            return Some(self.visit(&object_id, is_blob).map(|_| object_id));
        }
    }
}
