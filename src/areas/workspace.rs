use crate::areas::database::Database;
use crate::areas::repository::REPOSITORY_DIR;
use crate::artifacts::checkout::migration::{MaterializeReport, Migration};
use crate::artifacts::core::error::KnotError;
use crate::artifacts::index::index_entry::EntryMetadata;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use bytes::Bytes;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// The working directory: every file under the root except the repository
/// directory itself
#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: Box<Path>) -> Self {
        Workspace { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path relative to the workspace root, whatever form the caller used
    ///
    /// Paths into the repository directory are not part of the workspace and
    /// fail with `PathNotFound`.
    pub fn relative_path(&self, path: &Path) -> anyhow::Result<PathBuf> {
        let absolute = self.path.join(path);
        let relative = absolute
            .strip_prefix(&self.path)
            .with_context(|| format!("{:?} is outside the repository", path))?;

        // `.` and `..` are resolved lexically
        let mut normalized = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => normalized.push(name),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        anyhow::bail!("{:?} is outside the repository", path);
                    }
                }
                _ => anyhow::bail!("{:?} is outside the repository", path),
            }
        }

        if normalized
            .components()
            .any(|component| component.as_os_str() == REPOSITORY_DIR)
        {
            return Err(KnotError::PathNotFound(path.to_path_buf()).into());
        }

        Ok(normalized)
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.path.join(path).exists()
    }

    /// Every file at or below `root_path` (the whole workspace by default),
    /// relative to the workspace root and sorted
    pub fn list_files(&self, root_path: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
        let root_file_path = match root_path {
            Some(path) => self.path.join(path),
            None => self.path.to_path_buf(),
        };

        if !root_file_path.exists() {
            return Err(KnotError::PathNotFound(
                root_path.map(Path::to_path_buf).unwrap_or_default(),
            )
            .into());
        }

        let mut files = WalkDir::new(&root_file_path)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != REPOSITORY_DIR)
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.path)
                    .ok()
                    .map(Path::to_path_buf)
            })
            .collect::<Vec<_>>();

        files.sort();
        Ok(files)
    }

    /// Every directory below the root, outermost first
    pub fn list_dirs(&self) -> anyhow::Result<Vec<PathBuf>> {
        Ok(WalkDir::new(&self.path)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.file_name() != REPOSITORY_DIR)
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.path)
                    .ok()
                    .map(Path::to_path_buf)
            })
            .collect())
    }

    pub fn read_file(&self, file_path: &Path) -> anyhow::Result<Bytes> {
        let content = std::fs::read(self.path.join(file_path))
            .with_context(|| format!("Unable to read {}", file_path.display()))?;

        Ok(Bytes::from(content))
    }

    pub fn parse_blob(&self, file_path: &Path) -> anyhow::Result<Blob> {
        Ok(Blob::new(self.read_file(file_path)?))
    }

    pub fn stat_file(&self, file_path: &Path) -> anyhow::Result<EntryMetadata> {
        let absolute_path = self.path.join(file_path);
        let metadata = std::fs::metadata(&absolute_path)
            .with_context(|| format!("Unable to stat {}", file_path.display()))?;

        (absolute_path.as_path(), metadata).try_into()
    }

    /// Carry out a planned migration
    ///
    /// File deletions go first, then directory removals (deepest first), then
    /// directory creations, then file writes. A failing path is recorded in
    /// the report and the remaining paths are still processed.
    pub fn apply_migration(&self, migration: &Migration, database: &Database) -> MaterializeReport {
        let mut report = MaterializeReport::default();

        for file_path in migration.deletes() {
            match self.remove_file(file_path) {
                Ok(()) => report.removed.push(file_path.clone()),
                Err(err) => report.record_failure(file_path, err),
            }
        }

        for dir_path in migration.rmdirs().iter().rev() {
            if let Err(err) = self.remove_directory(dir_path) {
                report.record_failure(dir_path, err);
            }
        }

        for dir_path in migration.mkdirs() {
            if let Err(err) = self.make_directory(dir_path) {
                report.record_failure(dir_path, err);
            }
        }

        for (file_path, entry) in migration.writes() {
            let written = database
                .parse_object_as_blob(&entry.oid)
                .and_then(|blob| blob.with_context(|| format!("{} is not a blob", entry.oid)))
                .and_then(|blob| {
                    self.write_file(file_path, blob.content(), entry.mode.permissions())
                });

            match written {
                Ok(()) => report.written.push(file_path.clone()),
                Err(err) => report.record_failure(file_path, err),
            }
        }

        report
    }

    /// Hash a file the way `add` would, without storing it
    pub fn hash_file(&self, file_path: &Path) -> anyhow::Result<ObjectId> {
        self.parse_blob(file_path)?.object_id()
    }

    fn write_file(&self, file_path: &Path, data: &[u8], permissions: u32) -> anyhow::Result<()> {
        let path = self.path.join(file_path);

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("Failed to open file: {:?}", file_path))?;

        file.write_all(data)
            .with_context(|| format!("Failed to write to file: {:?}", file_path))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(permissions))
                .with_context(|| format!("Failed to set permissions for file: {:?}", file_path))?;
        }
        #[cfg(not(unix))]
        let _ = permissions;

        Ok(())
    }

    fn remove_file(&self, file_path: &Path) -> anyhow::Result<()> {
        let path = self.path.join(file_path);

        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("Failed to remove file: {:?}", file_path)),
        }
    }

    fn remove_directory(&self, dir_path: &Path) -> anyhow::Result<()> {
        let path = self.path.join(dir_path);
        if !path.is_dir() {
            return Ok(());
        }

        std::fs::remove_dir_all(&path)
            .with_context(|| format!("Failed to remove directory: {:?}", dir_path))
    }

    fn make_directory(&self, dir_path: &Path) -> anyhow::Result<()> {
        let path = self.path.join(dir_path);

        if path.is_file() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove file in the way: {:?}", dir_path))?;
        }

        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create directory: {:?}", dir_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn workspace_dir() -> TempDir {
        let dir = TempDir::new().expect("Failed to create temp dir");
        dir.child("a.txt").write_str("a").unwrap();
        dir.child("nested/b.txt").write_str("b").unwrap();
        dir.child(".knot/objects/xx").write_str("ignored").unwrap();
        dir
    }

    #[rstest]
    fn listing_skips_the_repository_directory(workspace_dir: TempDir) {
        let workspace = Workspace::new(workspace_dir.path().to_path_buf().into_boxed_path());

        pretty_assertions::assert_eq!(
            workspace.list_files(None).unwrap(),
            vec![PathBuf::from("a.txt"), PathBuf::from("nested/b.txt")]
        );
        pretty_assertions::assert_eq!(
            workspace.list_files(Some(Path::new("nested"))).unwrap(),
            vec![PathBuf::from("nested/b.txt")]
        );
        pretty_assertions::assert_eq!(
            workspace.list_dirs().unwrap(),
            vec![PathBuf::from("nested")]
        );
    }

    #[rstest]
    fn listing_a_missing_path_fails(workspace_dir: TempDir) {
        let workspace = Workspace::new(workspace_dir.path().to_path_buf().into_boxed_path());

        let err = workspace.list_files(Some(Path::new("missing"))).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KnotError>(),
            Some(KnotError::PathNotFound(path)) if path == Path::new("missing")
        ));
    }

    #[rstest]
    fn relative_paths_are_normalized(workspace_dir: TempDir) {
        let workspace = Workspace::new(workspace_dir.path().to_path_buf().into_boxed_path());

        pretty_assertions::assert_eq!(
            workspace.relative_path(Path::new("./nested/../a.txt")).unwrap(),
            PathBuf::from("a.txt")
        );
        pretty_assertions::assert_eq!(
            workspace
                .relative_path(&workspace_dir.path().join("nested/b.txt"))
                .unwrap(),
            PathBuf::from("nested/b.txt")
        );
        assert!(workspace.relative_path(Path::new("../outside")).is_err());
    }

    #[rstest]
    #[case(".knot")]
    #[case(".knot/objects")]
    #[case("./src/../.knot/HEAD")]
    #[case("nested/.knot/index")]
    fn repository_dir_is_outside_the_workspace(workspace_dir: TempDir, #[case] path: &str) {
        let workspace = Workspace::new(workspace_dir.path().to_path_buf().into_boxed_path());

        let err = workspace.relative_path(Path::new(path)).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<KnotError>(),
            Some(KnotError::PathNotFound(rejected)) if rejected == Path::new(path)
        ));
    }

    #[rstest]
    fn file_content_is_read_as_bytes(workspace_dir: TempDir) {
        workspace_dir.child("bin.dat").write_binary(&[0, 159, 146, 150]).unwrap();
        let workspace = Workspace::new(workspace_dir.path().to_path_buf().into_boxed_path());

        pretty_assertions::assert_eq!(
            workspace.read_file(Path::new("bin.dat")).unwrap(),
            Bytes::from_static(&[0, 159, 146, 150])
        );
    }
}
