use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use anyhow::Result;
use bytes::Bytes;
use std::io::{BufRead, Cursor};
use std::path::PathBuf;

/// Types with a canonical byte encoding
pub trait Packable {
    fn serialize(&self) -> Result<Bytes>;
}

/// Types that can be rebuilt from their encoding (header already consumed)
pub trait Unpackable {
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    fn object_id(&self) -> Result<ObjectId> {
        let content = self.serialize()?;
        Ok(ObjectId::from_content(&content))
    }

    fn object_path(&self) -> Result<PathBuf> {
        Ok(self.object_id()?.to_path())
    }
}

/// A decoded object of any kind
#[derive(Debug, Clone)]
pub enum ObjectBox {
    Blob(Box<Blob>),
    Tree(Box<Tree>),
    Commit(Box<Commit>),
}

impl ObjectBox {
    /// Decode a full canonical encoding (header included)
    pub fn parse(content: Bytes) -> Result<Self> {
        let mut reader = Cursor::new(content);
        let (object_type, size) = ObjectType::parse_header(&mut reader)?;

        let remaining = reader.get_ref().len() - reader.position() as usize;
        if remaining != size {
            anyhow::bail!(
                "Invalid {} object: header declares {} bytes, found {}",
                object_type,
                size,
                remaining
            );
        }

        Ok(match object_type {
            ObjectType::Blob => ObjectBox::Blob(Box::new(Blob::deserialize(reader)?)),
            ObjectType::Tree => ObjectBox::Tree(Box::new(Tree::deserialize(reader)?)),
            ObjectType::Commit => ObjectBox::Commit(Box::new(Commit::deserialize(reader)?)),
        })
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectBox::Blob(_) => ObjectType::Blob,
            ObjectBox::Tree(_) => ObjectType::Tree,
            ObjectBox::Commit(_) => ObjectType::Commit,
        }
    }

    /// Outgoing edges of the object graph
    ///
    /// Commits point at their tree and parents, trees at their entries,
    /// blobs at nothing.
    pub fn references(&self) -> Vec<ObjectId> {
        match self {
            ObjectBox::Blob(_) => Vec::new(),
            ObjectBox::Tree(tree) => tree.entries().map(|(_, entry)| entry.oid.clone()).collect(),
            ObjectBox::Commit(commit) => std::iter::once(commit.tree_oid().clone())
                .chain(commit.parents().iter().cloned())
                .collect(),
        }
    }
}
