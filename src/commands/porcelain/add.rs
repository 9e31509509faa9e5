use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::core::error::KnotError;
use std::path::{Path, PathBuf};

impl Repository {
    /// Stage files, expanding directories recursively
    ///
    /// A path that no longer exists is unstaged if the index tracks it and is
    /// an error otherwise. Tracked files missing below a staged directory are
    /// unstaged too. The index is only written once every path succeeded.
    pub async fn add(&mut self, paths: &[PathBuf]) -> anyhow::Result<()> {
        let _lock = self.lock().await?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        for path in paths {
            let relative_path = self.workspace().relative_path(path)?;

            if !self.workspace().exists(&relative_path) {
                if index.is_tracked(&relative_path) {
                    index.remove(&relative_path);
                    tracing::debug!(path = %relative_path.display(), "unstaged deleted path");
                    continue;
                }

                return Err(KnotError::PathNotFound(path.clone()).into());
            }

            let deleted = index
                .entries()
                .filter(|entry| entry.name.starts_with(&relative_path))
                .filter(|entry| !self.workspace().exists(&entry.name))
                .map(|entry| entry.name.clone())
                .collect::<Vec<_>>();
            for deleted_path in deleted {
                index.remove(&deleted_path);
            }

            for file_path in self.workspace().list_files(Some(&relative_path))? {
                self.stage_file(&mut index, &file_path)?;
            }
        }

        index.write_updates()?;

        Ok(())
    }

    fn stage_file(&self, index: &mut Index, file_path: &Path) -> anyhow::Result<()> {
        let blob = self.workspace().parse_blob(file_path)?;
        let stat = self.workspace().stat_file(file_path)?;
        let blob_id = self.database().store(&blob)?;

        tracing::debug!(path = %file_path.display(), blob = %blob_id, "staged");
        index.stage(file_path.to_path_buf(), blob_id, stat);

        Ok(())
    }
}
