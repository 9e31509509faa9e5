use crate::areas::refs::Head;
use crate::areas::repository::Repository;
use crate::artifacts::status::file_change::FileChange;
use crate::artifacts::status::inspector::Inspector;
use std::collections::BTreeSet;
use std::io::Write;

impl Repository {
    /// Print where HEAD is, what the next commit would record and what the
    /// working directory changes on top of the index
    pub async fn status(&mut self) -> anyhow::Result<()> {
        let _lock = self.lock().await?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let inspector = Inspector::new(self.workspace());
        let staged = inspector.diff_head(&index, &self.head_tree_files()?);
        let unstaged = inspector.diff(&mut index)?;

        // refreshed stat data
        index.write_updates()?;

        match self.refs().head()? {
            Head::Unborn(branch) => {
                writeln!(self.writer(), "On branch {}", branch)?;
                writeln!(self.writer(), "No commits yet")?;
            }
            Head::Branch(branch, _) => writeln!(self.writer(), "On branch {}", branch)?,
            Head::Detached(oid) => {
                writeln!(self.writer(), "HEAD detached at {}", oid.to_short_oid())?
            }
        }

        if staged.is_empty() && unstaged.is_empty() {
            writeln!(self.writer(), "nothing to commit, working tree clean")?;
            return Ok(());
        }

        self.show_changes("Changes to be committed:", &staged)?;
        self.show_changes("Changes not staged for commit:", &unstaged)?;

        Ok(())
    }

    fn show_changes(&self, title: &str, changes: &BTreeSet<FileChange>) -> anyhow::Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        writeln!(self.writer(), "{}", title)?;
        for change in changes {
            writeln!(self.writer(), "  {}", change)?;
        }

        Ok(())
    }
}
