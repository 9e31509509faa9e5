use crate::areas::refs::HEAD_REF_NAME;
use crate::areas::remote::RemoteStore;
use crate::areas::repository::Repository;
use crate::artifacts::core::error::KnotError;
use crate::artifacts::transfer::SyncReport;
use crate::artifacts::transfer::plan::upload_plan;
use crate::artifacts::transfer::remote_record::RemoteRecord;
use std::io::Write;

impl Repository {
    /// Push to the configured remote
    pub async fn push(&mut self, force: bool) -> anyhow::Result<SyncReport> {
        let remote = self.remote()?;
        let report = self.push_to(&remote, force).await?;

        match &report.head {
            Some(head) if !report.up_to_date => writeln!(
                self.writer(),
                "{} objects pushed, remote now at {}",
                report.transferred,
                head.to_short_oid()
            )?,
            _ => writeln!(self.writer(), "Everything up-to-date")?,
        }

        Ok(report)
    }

    /// Upload the closure of HEAD and move the remote ref to it
    ///
    /// The remote head must be an ancestor of HEAD unless `force` is set.
    /// Objects are uploaded referenced-first and the ref moves last, so an
    /// interrupted push leaves the remote ref where it was.
    pub async fn push_to(
        &mut self,
        remote: &dyn RemoteStore,
        force: bool,
    ) -> anyhow::Result<SyncReport> {
        let _lock = self.lock().await?;

        let local_head = self
            .refs()
            .read_head()?
            .ok_or_else(|| KnotError::UnknownRef(HEAD_REF_NAME.to_string()))?;
        let remote_head = remote.read_ref()?;
        let mut record = RemoteRecord::load(&self.repository_dir(), &remote.location())?;
        record.reconcile(remote_head.as_ref());

        if remote_head.as_ref() == Some(&local_head) {
            record.record_sync([], local_head.clone());
            record.save(&self.repository_dir())?;

            let report = SyncReport::up_to_date(Some(local_head));
            self.notify_push(&report);
            return Ok(report);
        }

        if let Some(remote_head) = &remote_head
            && !force
        {
            let fast_forward = self.database().has(remote_head)
                && self.is_ancestor(remote_head, &local_head)?;
            if !fast_forward {
                return Err(KnotError::NonFastForward {
                    remote: remote_head.clone(),
                    local: local_head,
                }
                .into());
            }
        }

        let plan = upload_plan(self.database(), &local_head, |object_id| {
            Ok(record.knows(object_id) || remote.has(object_id)?)
        })?;
        for (object_id, content) in &plan {
            remote.put(object_id, content.clone())?;
        }
        remote.update_ref(remote_head.as_ref(), &local_head)?;

        tracing::info!(
            remote = %remote.location(),
            head = %local_head,
            objects = plan.len(),
            forced = force,
            "remote ref updated"
        );

        record.record_sync(
            plan.iter().map(|(object_id, _)| object_id.clone()),
            local_head.clone(),
        );
        record.save(&self.repository_dir())?;

        let report = SyncReport::transferred(plan.len(), local_head);
        self.notify_push(&report);
        Ok(report)
    }

    fn notify_push(&self, report: &SyncReport) {
        if let Some(observer) = self.observer() {
            observer.on_push(report);
        }
    }
}
