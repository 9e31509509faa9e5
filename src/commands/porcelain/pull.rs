use crate::areas::remote::RemoteStore;
use crate::areas::repository::Repository;
use crate::artifacts::checkout::migration::materialize;
use crate::artifacts::core::error::KnotError;
use crate::artifacts::log::rev_list;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::transfer::SyncReport;
use crate::artifacts::transfer::plan::download;
use crate::artifacts::transfer::remote_record::RemoteRecord;
use anyhow::Context;
use std::collections::HashMap;
use std::io::Write;

impl Repository {
    /// Pull from the configured remote
    pub async fn pull(&mut self) -> anyhow::Result<SyncReport> {
        let remote = self.remote()?;
        let report = self.pull_from(&remote).await?;

        match &report.head {
            Some(head) if !report.up_to_date => writeln!(
                self.writer(),
                "Fast-forward to {} ({} objects)",
                head.to_short_oid(),
                report.transferred
            )?,
            _ => writeln!(self.writer(), "Already up to date.")?,
        }

        Ok(report)
    }

    /// Fast-forward HEAD to the remote head
    ///
    /// Missing objects are downloaded and verified in memory first; nothing
    /// is written when HEAD has diverged from the remote. Once the objects
    /// are stored, HEAD moves and the working directory and index are
    /// rebuilt from the new commit. Pull never merges.
    pub async fn pull_from(&mut self, remote: &dyn RemoteStore) -> anyhow::Result<SyncReport> {
        let _lock = self.lock().await?;

        let local_head = self.refs().read_head()?;
        let Some(remote_head) = remote.read_ref()? else {
            let report = SyncReport::up_to_date(local_head);
            self.notify_pull(&report);
            return Ok(report);
        };
        let mut record = RemoteRecord::load(&self.repository_dir(), &remote.location())?;
        record.reconcile(Some(&remote_head));

        let behind_or_equal = match &local_head {
            Some(local_head) => {
                self.database().has(&remote_head) && self.is_ancestor(&remote_head, local_head)?
            }
            None => false,
        };
        if behind_or_equal {
            record.record_sync([], remote_head);
            record.save(&self.repository_dir())?;

            let report = SyncReport::up_to_date(local_head);
            self.notify_pull(&report);
            return Ok(report);
        }

        let fetched = download(remote, self.database(), &remote_head)?;

        if let Some(local_head) = &local_head {
            let fetched_by_id = fetched.iter().cloned().collect::<HashMap<_, _>>();
            let fast_forward = rev_list::is_ancestor(local_head, &remote_head, |commit_oid| {
                match fetched_by_id.get(commit_oid) {
                    Some(content) => match ObjectBox::parse(content.clone())? {
                        ObjectBox::Commit(commit) => Ok(*commit),
                        _ => anyhow::bail!("{} is not a commit", commit_oid),
                    },
                    None => self.load_commit(commit_oid),
                }
            })?;

            if !fast_forward {
                return Err(KnotError::DivergedHistory {
                    local: local_head.clone(),
                    remote: remote_head,
                }
                .into());
            }
        }

        for (object_id, content) in &fetched {
            self.database().store_raw(object_id, content.clone())?;
        }
        self.refs().update_head(&remote_head)?;

        let commit = self.load_commit(&remote_head)?;
        {
            let index = self.index();
            let mut index = index.lock().await;
            index.rehydrate()?;

            materialize(self.database(), self.workspace(), commit.tree_oid())?
                .into_result()
                .context("pull")?;
            self.rebuild_index(&mut index, commit.tree_oid())?;
            index.write_updates()?;
        }

        tracing::info!(
            remote = %remote.location(),
            head = %remote_head,
            objects = fetched.len(),
            "pulled"
        );

        record.record_sync(
            fetched.iter().map(|(object_id, _)| object_id.clone()),
            remote_head.clone(),
        );
        record.save(&self.repository_dir())?;

        let report = SyncReport::transferred(fetched.len(), remote_head);
        self.notify_pull(&report);
        Ok(report)
    }

    fn notify_pull(&self, report: &SyncReport) {
        if let Some(observer) = self.observer() {
            observer.on_pull(report);
        }
    }
}
