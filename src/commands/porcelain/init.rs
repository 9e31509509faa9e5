use crate::areas::refs::DEFAULT_BRANCH;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::core::error::KnotError;
use anyhow::Context;
use std::fs;
use std::io::Write;

impl Repository {
    /// Create an empty repository: no objects, an empty index and an unborn
    /// HEAD pointing at the default branch
    pub async fn init(&mut self) -> anyhow::Result<()> {
        let repository_dir = self.repository_dir();
        if repository_dir.exists() {
            return Err(KnotError::AlreadyInitialized(self.path().to_path_buf()).into());
        }

        fs::create_dir_all(self.database().objects_path())
            .context("Failed to create .knot/objects directory")?;

        let default_branch = BranchName::try_parse(DEFAULT_BRANCH.to_string())?;
        self.refs()
            .init(&default_branch)
            .context("Failed to create initial HEAD reference")?;

        {
            let index = self.index();
            let mut index = index.lock().await;
            index.clear();
            index
                .write_updates()
                .context("Failed to create .knot/index file")?;
        }

        self.config()
            .save(&repository_dir)
            .context("Failed to write .knot/config.json")?;

        tracing::info!(path = %self.path().display(), "repository initialized");
        writeln!(
            self.writer(),
            "Initialized empty knot repository in {}",
            self.path().display()
        )?;

        Ok(())
    }
}
