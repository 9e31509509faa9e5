//! Repository handle
//!
//! A [`Repository`] ties together the object database, index, refs and
//! working directory of one root path. Handles are independent of each
//! other: several repositories can be open in the same process.
//!
//! Porcelain commands are implemented as `impl Repository` blocks under
//! `commands::porcelain`.

use crate::areas::config::Config;
use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::locator::RepositoryLocator;
use crate::areas::lock::RepositoryLock;
use crate::areas::refs::Refs;
use crate::areas::remote::{FsRemote, RemoteStore};
use crate::areas::workspace::Workspace;
use crate::artifacts::core::error::KnotError;
use crate::artifacts::core::observer::SyncObserver;
use crate::artifacts::index::index_entry::EntryMetadata;
use crate::artifacts::log::rev_list;
use crate::artifacts::objects::commit::{Author, Commit};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::TreeEntry;
use anyhow::Context;
use std::cell::{RefCell, RefMut};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Name of the repository directory inside the working directory
pub const REPOSITORY_DIR: &str = ".knot";

pub struct Repository {
    path: Box<Path>,
    writer: RefCell<Box<dyn std::io::Write>>,
    index: Arc<Mutex<Index>>,
    database: Database,
    workspace: Workspace,
    refs: Refs,
    config: Config,
    observer: Option<Arc<dyn SyncObserver>>,
}

impl Repository {
    /// Handle for `path`, whether or not a repository exists there yet
    ///
    /// The directory is created if missing. Use [`Repository::open`] for
    /// anything but `init`.
    pub fn new(path: &Path, writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Unable to create {}", path.display()))?;
        let path = path
            .canonicalize()
            .with_context(|| format!("Unable to resolve {}", path.display()))?;

        let repository_dir = path.join(REPOSITORY_DIR);
        let index = Index::new(repository_dir.join("index").into_boxed_path());
        let database = Database::new(repository_dir.join("objects").into_boxed_path());
        let workspace = Workspace::new(path.clone().into_boxed_path());
        let refs = Refs::new(repository_dir.clone().into_boxed_path());
        let config = Config::load(&repository_dir)?;

        Ok(Repository {
            path: path.into_boxed_path(),
            writer: RefCell::new(writer),
            index: Arc::new(Mutex::new(index)),
            database,
            workspace,
            refs,
            config,
            observer: None,
        })
    }

    /// Handle for an existing repository rooted at `path`
    pub fn open(path: &Path, writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        if !path.join(REPOSITORY_DIR).is_dir() {
            return Err(KnotError::NotARepository(path.to_path_buf()).into());
        }

        Self::new(path, writer)
    }

    /// Handle for the repository a locator maps `repository_id` to
    ///
    /// A remote named by the locator replaces the configured one.
    pub fn open_located(
        locator: &dyn RepositoryLocator,
        repository_id: &str,
        writer: Box<dyn std::io::Write>,
    ) -> anyhow::Result<Self> {
        let location = locator.locate(repository_id)?;
        let mut repository = Self::open(&location.root, writer)?;

        if let Some(remote) = location.remote {
            repository.config.remote = Some(remote);
        }

        Ok(repository)
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn repository_dir(&self) -> PathBuf {
        self.path.join(REPOSITORY_DIR)
    }

    pub fn writer(&'_ self) -> RefMut<'_, Box<dyn std::io::Write>> {
        self.writer.borrow_mut()
    }

    pub fn index(&self) -> Arc<Mutex<Index>> {
        self.index.clone()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn observer(&self) -> Option<&Arc<dyn SyncObserver>> {
        self.observer.as_ref()
    }

    /// Hold the repository-wide operation lock until the guard is dropped
    pub async fn lock(&self) -> anyhow::Result<RepositoryLock> {
        RepositoryLock::acquire(&self.repository_dir()).await
    }

    /// The configured remote store
    pub fn remote(&self) -> anyhow::Result<FsRemote> {
        let remote_path = self.config.remote().ok_or(KnotError::NoRemote)?;
        let remote_path = if remote_path.is_absolute() {
            remote_path
        } else {
            self.path.join(remote_path)
        };

        FsRemote::new(remote_path)
    }

    /// Write a commit object after checking everything it points at
    ///
    /// The tree must be stored, and every parent must be a stored commit.
    pub fn create_commit(
        &self,
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        author: Author,
        message: String,
    ) -> anyhow::Result<ObjectId> {
        if self.database.object_type(&tree_oid)? != ObjectType::Tree {
            anyhow::bail!("object {} is not a tree", tree_oid);
        }

        for parent in &parents {
            let is_commit = self.database.has(parent)
                && self.database.object_type(parent)? == ObjectType::Commit;
            if !is_commit {
                return Err(KnotError::InvalidParent(parent.clone()).into());
            }
        }

        let commit = Commit::new(parents, tree_oid, author, message);
        let commit_oid = self.database.store(&commit)?;
        tracing::debug!(commit = %commit_oid, "commit stored");

        Ok(commit_oid)
    }

    pub fn load_commit(&self, commit_oid: &ObjectId) -> anyhow::Result<Commit> {
        self.database
            .parse_object_as_commit(commit_oid)?
            .with_context(|| format!("{} is not a commit", commit_oid))
    }

    pub fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> anyhow::Result<bool> {
        rev_list::is_ancestor(ancestor, descendant, |oid| self.load_commit(oid))
    }

    /// Files of the commit HEAD points at; empty while HEAD is unborn
    pub fn head_tree_files(&self) -> anyhow::Result<BTreeMap<PathBuf, TreeEntry>> {
        match self.refs.read_head()? {
            Some(head_oid) => {
                let commit = self.load_commit(&head_oid)?;
                self.database.flatten_tree(commit.tree_oid())
            }
            None => Ok(BTreeMap::new()),
        }
    }

    /// Replace the index content with the files of a tree
    ///
    /// Stat data comes from the working directory, which is expected to have
    /// just been materialized from the same tree.
    pub fn rebuild_index(&self, index: &mut Index, tree_oid: &ObjectId) -> anyhow::Result<()> {
        index.clear();

        for (file_path, entry) in self.database.flatten_tree(tree_oid)? {
            let stat = self
                .workspace
                .stat_file(&file_path)
                .map(|stat| EntryMetadata {
                    mode: entry.mode,
                    ..stat
                })
                .unwrap_or_else(|_| EntryMetadata {
                    mode: entry.mode,
                    ..Default::default()
                });

            index.stage(file_path, entry.oid, stat);
        }

        Ok(())
    }
}
