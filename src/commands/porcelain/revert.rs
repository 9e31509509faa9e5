use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::checkout::migration::materialize;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use std::io::Write;

impl Repository {
    /// Restore the working directory and index to the tree of `revision`
    ///
    /// By default HEAD is detached at the target and branches stay where they
    /// are. With `reset`, the current branch is moved to the target instead.
    /// No commit is ever deleted either way.
    pub async fn revert(&mut self, revision: &str, reset: bool) -> anyhow::Result<ObjectId> {
        let _lock = self.lock().await?;

        let target = Revision::try_parse(revision)?
            .resolve(self)
            .with_context(|| format!("revert {}", revision))?;
        let commit = self.load_commit(&target)?;

        {
            let index = self.index();
            let mut index = index.lock().await;
            index.rehydrate()?;

            let report = materialize(self.database(), self.workspace(), commit.tree_oid())?
                .into_result()
                .context("revert")?;
            tracing::debug!(
                written = report.written.len(),
                removed = report.removed.len(),
                "working directory restored"
            );

            self.rebuild_index(&mut index, commit.tree_oid())?;
            index.write_updates()?;
        }

        if reset {
            self.refs().update_head(&target)?;
        } else {
            self.refs().set_head_detached(&target)?;
        }

        writeln!(
            self.writer(),
            "HEAD is now at {} {}",
            target.to_short_oid(),
            commit.short_message()
        )?;

        Ok(target)
    }
}
