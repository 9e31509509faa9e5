use crate::areas::repository::Repository;
use crate::artifacts::core::error::KnotError;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use std::io::Write;

impl Repository {
    /// Record the index as a new commit on top of HEAD
    ///
    /// Trees are stored bottom-up, then the commit, and only then does HEAD
    /// move. The index is kept as is.
    pub async fn commit(&mut self, message: &str) -> anyhow::Result<ObjectId> {
        let message = message.trim();
        if message.is_empty() {
            return Err(KnotError::EmptyMessage.into());
        }

        let _lock = self.lock().await?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        if index.is_empty() {
            return Err(KnotError::NothingToCommit.into());
        }

        let tree = index.snapshot()?;
        tree.traverse(&mut |subtree| self.database().store(subtree).map(|_| ()))?;
        let tree_id = tree.object_id()?;

        let parent = self.refs().read_head()?;
        if let Some(parent) = &parent
            && self.load_commit(parent)?.tree_oid() == &tree_id
        {
            return Err(KnotError::NothingToCommit.into());
        }

        let author = self.config().author()?;
        let is_root = match parent {
            Some(_) => "",
            None => "(root-commit) ",
        };

        let commit_id =
            self.create_commit(parent.into_iter().collect(), tree_id, author, message.to_string())?;
        self.refs().update_head(&commit_id)?;
        index.write_updates()?;

        let first_line = message.lines().next().unwrap_or_default();
        writeln!(
            self.writer(),
            "[{}{}] {}",
            is_root,
            commit_id.to_short_oid(),
            first_line
        )?;

        Ok(commit_id)
    }
}
