//! References (HEAD and branches)
//!
//! References are human-readable names pointing at commits:
//! - Direct: the file holds a 40-character digest
//! - Symbolic: the file holds `ref: <path>` (e.g. HEAD -> refs/heads/main)
//!
//! HEAD is unborn while it points at a branch file that does not exist yet.
//! Reference files are replaced with a temp file + rename, never rewritten
//! in place.

use crate::artifacts::branch::branch_name::{BranchName, SymRefName};
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use derive_new::new;
use fake::rand;
use std::path::{Path, PathBuf};

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

/// Name of the HEAD reference
pub const HEAD_REF_NAME: &str = "HEAD";

/// Branch created by `init`
pub const DEFAULT_BRANCH: &str = "main";

#[derive(Debug, new)]
pub struct Refs {
    /// Path to the repository directory (typically `.knot`)
    path: Box<Path>,
}

/// Where HEAD currently points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// On a branch that has no commit yet
    Unborn(BranchName),
    Branch(BranchName, ObjectId),
    Detached(ObjectId),
}

impl Head {
    pub fn oid(&self) -> Option<&ObjectId> {
        match self {
            Head::Unborn(_) => None,
            Head::Branch(_, oid) | Head::Detached(oid) => Some(oid),
        }
    }

    pub fn branch(&self) -> Option<&BranchName> {
        match self {
            Head::Unborn(branch) | Head::Branch(branch, _) => Some(branch),
            Head::Detached(_) => None,
        }
    }
}

/// Content of a single reference file
#[derive(Debug, Clone)]
enum SymRefOrOid {
    SymRef(SymRefName),
    Oid(ObjectId),
}

impl SymRefOrOid {
    fn read(path: &Path) -> anyhow::Result<Option<SymRefOrOid>> {
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ref file at {:?}", path))?;
        let content = content.trim();

        if content.is_empty() {
            return Ok(None);
        }

        match regex::Regex::new(SYMREF_REGEX)?.captures(content) {
            Some(symref_match) => Ok(Some(SymRefOrOid::SymRef(SymRefName::new(
                symref_match[1].to_string(),
            )))),
            None => Ok(Some(SymRefOrOid::Oid(
                ObjectId::try_parse(content.to_string())
                    .with_context(|| format!("corrupt ref file at {:?}", path))?,
            ))),
        }
    }
}

impl Refs {
    /// Point HEAD at a (not yet existing) branch
    pub fn init(&self, branch: &BranchName) -> anyhow::Result<()> {
        std::fs::create_dir_all(self.heads_path())?;
        self.write_ref_file(&self.head_path(), &SymRefName::for_branch(branch).to_symref())
    }

    pub fn head(&self) -> anyhow::Result<Head> {
        match SymRefOrOid::read(&self.head_path())? {
            Some(SymRefOrOid::Oid(oid)) => Ok(Head::Detached(oid)),
            Some(SymRefOrOid::SymRef(sym_ref_name)) => {
                let branch = BranchName::try_parse_sym_ref_name(&sym_ref_name)?;
                match self.read_symref(&self.path.join(sym_ref_name.as_ref_path()))? {
                    Some(oid) => Ok(Head::Branch(branch, oid)),
                    None => Ok(Head::Unborn(branch)),
                }
            }
            None => anyhow::bail!("HEAD is missing at {:?}", self.head_path()),
        }
    }

    pub fn read_head(&self) -> anyhow::Result<Option<ObjectId>> {
        self.read_symref(&self.head_path())
    }

    /// Advance whatever HEAD designates: the current branch, or HEAD itself
    /// when detached
    pub fn update_head(&self, oid: &ObjectId) -> anyhow::Result<()> {
        let path = self.current_ref_path()?;
        self.write_ref_file(&path, oid.as_ref())?;

        tracing::info!(path = %path.display(), %oid, "ref updated");
        Ok(())
    }

    /// Make HEAD point straight at a commit, leaving branches alone
    pub fn set_head_detached(&self, oid: &ObjectId) -> anyhow::Result<()> {
        self.write_ref_file(&self.head_path(), oid.as_ref())?;

        tracing::info!(%oid, "HEAD detached");
        Ok(())
    }

    /// Resolve a name the way a user would type it
    ///
    /// `HEAD`, `main`, `refs/heads/main` are all accepted; `None` means no
    /// such reference exists (or it is unborn).
    pub fn read_ref(&self, name: &BranchName) -> anyhow::Result<Option<ObjectId>> {
        match self.find_path_to_ref(name) {
            Some(path) => self.read_symref(&path),
            None => Ok(None),
        }
    }

    pub fn ref_exists(&self, name: &BranchName) -> bool {
        self.find_path_to_ref(name).is_some()
    }

    pub fn read_branch(&self, branch: &BranchName) -> anyhow::Result<Option<ObjectId>> {
        self.read_symref(&self.heads_path().join(branch.as_ref()))
    }

    pub fn update_branch(&self, branch: &BranchName, oid: &ObjectId) -> anyhow::Result<()> {
        self.write_ref_file(&self.heads_path().join(branch.as_ref()), oid.as_ref())?;

        tracing::info!(%branch, %oid, "branch updated");
        Ok(())
    }

    /// Last file of the symbolic chain starting at HEAD
    fn current_ref_path(&self) -> anyhow::Result<PathBuf> {
        let mut path = self.head_path();

        while let Some(SymRefOrOid::SymRef(sym_ref_name)) = SymRefOrOid::read(&path)? {
            path = self.path.join(sym_ref_name.as_ref_path());
        }

        Ok(path)
    }

    fn read_symref(&self, path: &Path) -> anyhow::Result<Option<ObjectId>> {
        match SymRefOrOid::read(path)? {
            Some(SymRefOrOid::SymRef(sym_ref_name)) => {
                self.read_symref(&self.path.join(sym_ref_name.as_ref_path()))
            }
            Some(SymRefOrOid::Oid(oid)) => Ok(Some(oid)),
            None => Ok(None),
        }
    }

    fn find_path_to_ref(&self, name: &BranchName) -> Option<PathBuf> {
        if name.as_ref() == HEAD_REF_NAME {
            return Some(self.head_path());
        }

        [self.path.to_path_buf(), self.path.join("refs"), self.heads_path()]
            .iter()
            .map(|base_path| base_path.join(name.as_ref()))
            .filter(|path| path.starts_with(self.path.join("refs")))
            .find(|path| path.is_file())
    }

    fn write_ref_file(&self, path: &Path, raw_ref: &str) -> anyhow::Result<()> {
        let parent = path
            .parent()
            .with_context(|| format!("invalid ref path {:?}", path))?;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create parent directories for {:?}", path))?;

        let temp_path = parent.join(format!("tmp-ref-{}", rand::random::<u32>()));
        std::fs::write(&temp_path, format!("{}\n", raw_ref))
            .with_context(|| format!("failed to write ref file at {:?}", temp_path))?;
        std::fs::rename(&temp_path, path)
            .with_context(|| format!("failed to replace ref file at {:?}", path))?;

        Ok(())
    }

    pub fn head_path(&self) -> PathBuf {
        self.path.join(HEAD_REF_NAME)
    }

    pub fn heads_path(&self) -> PathBuf {
        self.path.join("refs").join("heads")
    }
}
