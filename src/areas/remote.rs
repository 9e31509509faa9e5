//! Remote object store
//!
//! A remote holds objects under the same digests as a local repository plus a
//! single branch ref. [`RemoteStore`] is the seam between the sync engine and
//! wherever the remote actually lives; [`FsRemote`] keeps it in a directory:
//!
//! ```text
//! <remote>/objects/xx/yyyy...   zlib-compressed canonical encodings
//! <remote>/refs/heads/main      40-hex digest, absent until the first push
//! <remote>/ref.lock             held while the ref is compared and swapped
//! ```

use crate::areas::database::Database;
use crate::areas::refs::{DEFAULT_BRANCH, Refs};
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::core::error::KnotError;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use bytes::Bytes;
use std::path::{Path, PathBuf};

const REF_LOCK_FILE: &str = "ref.lock";

pub trait RemoteStore: Send + Sync {
    /// Stable name of the remote, used to key what is known about it
    fn location(&self) -> String;

    fn has(&self, object_id: &ObjectId) -> anyhow::Result<bool>;

    /// Canonical encoding of an object; `ObjectNotFound` when absent
    fn get(&self, object_id: &ObjectId) -> anyhow::Result<Bytes>;

    fn put(&self, object_id: &ObjectId, content: Bytes) -> anyhow::Result<()>;

    fn read_ref(&self) -> anyhow::Result<Option<ObjectId>>;

    /// Move the ref to `new` only if it still points at `expected`
    fn update_ref(&self, expected: Option<&ObjectId>, new: &ObjectId) -> anyhow::Result<()>;
}

#[derive(Debug)]
pub struct FsRemote {
    path: PathBuf,
    objects: Database,
    refs: Refs,
    branch: BranchName,
}

impl FsRemote {
    pub fn new(path: PathBuf) -> anyhow::Result<Self> {
        let objects = Database::new(path.join("objects").into_boxed_path());
        let refs = Refs::new(path.clone().into_boxed_path());
        let branch = BranchName::try_parse(DEFAULT_BRANCH.to_string())?;

        Ok(FsRemote {
            path,
            objects,
            refs,
            branch,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RemoteStore for FsRemote {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn has(&self, object_id: &ObjectId) -> anyhow::Result<bool> {
        Ok(self.objects.has(object_id))
    }

    fn get(&self, object_id: &ObjectId) -> anyhow::Result<Bytes> {
        self.objects.load(object_id)
    }

    fn put(&self, object_id: &ObjectId, content: Bytes) -> anyhow::Result<()> {
        self.objects
            .store_raw(object_id, content)
            .with_context(|| format!("Unable to upload object {}", object_id))
    }

    fn read_ref(&self) -> anyhow::Result<Option<ObjectId>> {
        self.refs.read_branch(&self.branch)
    }

    fn update_ref(&self, expected: Option<&ObjectId>, new: &ObjectId) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.path)
            .with_context(|| format!("Unable to create remote {}", self.path.display()))?;

        let lock_path = self.path.join(REF_LOCK_FILE);
        let mut lock_file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Unable to open {}", lock_path.display()))?;
        let _lock = file_guard::lock(&mut lock_file, file_guard::Lock::Exclusive, 0, 1)?;

        let actual = self.read_ref()?;
        if actual.as_ref() != expected {
            return Err(KnotError::RemoteRefMoved {
                expected: expected.cloned(),
                actual,
            }
            .into());
        }

        self.refs.update_branch(&self.branch, new)
    }
}
