use crate::areas::database::Database;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use std::collections::{HashSet, VecDeque};

/// First-parent history, newest first
///
/// Starting from `None` (an unborn HEAD) yields nothing. A commit that cannot
/// be read ends the walk with an error.
#[derive(Debug, Clone)]
pub struct RevList<'d> {
    database: &'d Database,
    next_commit_oid: Option<ObjectId>,
}

impl<'d> RevList<'d> {
    pub fn new(database: &'d Database, start: Option<ObjectId>) -> Self {
        RevList {
            database,
            next_commit_oid: start,
        }
    }
}

impl Iterator for RevList<'_> {
    type Item = anyhow::Result<(ObjectId, Commit)>;

    fn next(&mut self) -> Option<Self::Item> {
        let commit_oid = self.next_commit_oid.take()?;

        let commit = self
            .database
            .parse_object_as_commit(&commit_oid)
            .and_then(|commit| commit.with_context(|| format!("{} is not a commit", commit_oid)));

        match commit {
            Ok(commit) => {
                self.next_commit_oid = commit.parent().cloned();
                Some(Ok((commit_oid, commit)))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

/// Whether `ancestor` is reachable from `descendant` through parent links
///
/// A commit counts as its own ancestor. `load_commit` decides where commits
/// come from, so the check also works on objects not yet stored.
pub fn is_ancestor<F>(
    ancestor: &ObjectId,
    descendant: &ObjectId,
    mut load_commit: F,
) -> anyhow::Result<bool>
where
    F: FnMut(&ObjectId) -> anyhow::Result<Commit>,
{
    let mut queue = VecDeque::from([descendant.clone()]);
    let mut visited = HashSet::new();

    while let Some(commit_oid) = queue.pop_front() {
        if &commit_oid == ancestor {
            return Ok(true);
        }
        if !visited.insert(commit_oid.clone()) {
            continue;
        }

        queue.extend(load_commit(&commit_oid)?.parents().iter().cloned());
    }

    Ok(false)
}
