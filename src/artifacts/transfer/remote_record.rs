use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

pub const REMOTE_RECORD_FILE: &str = "remote.json";

/// Digests known to exist on a remote and the remote ref last seen
///
/// Stored in `.knot/remote.json`. The record belongs to one remote: loading
/// it for a different location starts over with an empty record. It is only
/// trusted while the remote ref is still where the record last saw it; see
/// [`RemoteRecord::reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    #[serde(default)]
    pub remote: String,
    #[serde(default)]
    pub last_ref: Option<ObjectId>,
    #[serde(default)]
    known: BTreeSet<ObjectId>,
}

impl RemoteRecord {
    pub fn load(repository_dir: &Path, remote: &str) -> anyhow::Result<Self> {
        let record_path = repository_dir.join(REMOTE_RECORD_FILE);
        let fresh = RemoteRecord {
            remote: remote.to_string(),
            ..Default::default()
        };

        if !record_path.exists() {
            return Ok(fresh);
        }

        let data = std::fs::read_to_string(&record_path)
            .with_context(|| format!("Failed to read remote record from {:?}", record_path))?;
        let record: RemoteRecord = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse remote record {:?}", record_path))?;

        if record.remote != remote {
            tracing::debug!(previous = %record.remote, remote, "remote changed, record reset");
            return Ok(fresh);
        }

        Ok(record)
    }

    pub fn save(&self, repository_dir: &Path) -> anyhow::Result<()> {
        let record_path = repository_dir.join(REMOTE_RECORD_FILE);
        let temp_path = record_path.with_extension("tmp");

        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(&temp_path, &data)
            .with_context(|| format!("Failed to write remote record to {:?}", temp_path))?;
        std::fs::rename(&temp_path, &record_path)
            .with_context(|| format!("Failed to replace remote record {:?}", record_path))?;

        Ok(())
    }

    /// Drop everything known about the remote if its ref moved since the last sync
    ///
    /// A remote that was wiped, recreated or pushed to by someone else can no
    /// longer be assumed to hold what the record lists.
    pub fn reconcile(&mut self, remote_head: Option<&ObjectId>) {
        if self.last_ref.as_ref() == remote_head {
            return;
        }

        tracing::debug!(
            remote = %self.remote,
            recorded = ?self.last_ref,
            current = ?remote_head,
            "remote ref moved, record reset"
        );
        self.known.clear();
        self.last_ref = None;
    }

    pub fn knows(&self, object_id: &ObjectId) -> bool {
        self.known.contains(object_id)
    }

    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    /// Remember objects now present on the remote and where its ref points
    pub fn record_sync(&mut self, object_ids: impl IntoIterator<Item = ObjectId>, head: ObjectId) {
        self.known.extend(object_ids);
        self.known.insert(head.clone());
        self.last_ref = Some(head);
    }
}
