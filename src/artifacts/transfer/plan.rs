//! Deciding which objects to transfer
//!
//! Both directions walk the object graph from a root commit and stop
//! descending at objects the destination already has: a stored commit implies
//! its whole closure is stored too. The walk yields objects in post-order, so
//! writing them in sequence never leaves a reference to an absent object.

use crate::areas::database::Database;
use crate::areas::remote::RemoteStore;
use crate::artifacts::core::error::KnotError;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use bytes::Bytes;
use std::collections::HashSet;

enum Visit<T> {
    Enter(ObjectId),
    Exit(ObjectId, T),
}

/// Depth-first post-order walk from `root`
///
/// `expand` returns `None` for objects the walk should skip (along with
/// everything below them), or the object's payload and outgoing references.
pub fn post_order<T, F>(root: &ObjectId, mut expand: F) -> anyhow::Result<Vec<(ObjectId, T)>>
where
    F: FnMut(&ObjectId) -> anyhow::Result<Option<(T, Vec<ObjectId>)>>,
{
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![Visit::Enter(root.clone())];

    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Exit(object_id, payload) => order.push((object_id, payload)),
            Visit::Enter(object_id) => {
                if !visited.insert(object_id.clone()) {
                    continue;
                }

                if let Some((payload, references)) = expand(&object_id)? {
                    stack.push(Visit::Exit(object_id, payload));
                    stack.extend(references.into_iter().rev().map(Visit::Enter));
                }
            }
        }
    }

    Ok(order)
}

/// Objects reachable from `head` that the remote lacks, with their encodings
pub fn upload_plan(
    database: &Database,
    head: &ObjectId,
    mut remote_has: impl FnMut(&ObjectId) -> anyhow::Result<bool>,
) -> anyhow::Result<Vec<(ObjectId, Bytes)>> {
    let plan = post_order(head, |object_id| {
        if remote_has(object_id)? {
            return Ok(None);
        }

        let content = database.load(object_id)?;
        let references = ObjectBox::parse(content.clone())?.references();
        Ok(Some((content, references)))
    })?;

    tracing::debug!(%head, objects = plan.len(), "upload planned");
    Ok(plan)
}

/// Fetch every object reachable from `head` that the local store lacks
///
/// Nothing is written locally; each downloaded encoding is checked against
/// its digest.
pub fn download(
    remote: &dyn RemoteStore,
    database: &Database,
    head: &ObjectId,
) -> anyhow::Result<Vec<(ObjectId, Bytes)>> {
    let fetched = post_order(head, |object_id| {
        if database.has(object_id) {
            return Ok(None);
        }

        let content = remote.get(object_id)?;
        let actual = ObjectId::from_content(&content);
        if &actual != object_id {
            return Err(KnotError::CorruptObject {
                expected: object_id.clone(),
                actual,
            }
            .into());
        }

        let references = ObjectBox::parse(content.clone())?.references();
        Ok(Some((content, references)))
    })?;

    tracing::debug!(%head, objects = fetched.len(), "objects downloaded");
    Ok(fetched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::remote::FsRemote;
    use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
    use crate::artifacts::objects::blob::Blob;
    use crate::artifacts::objects::commit::{Author, Commit};
    use crate::artifacts::objects::object::Object;
    use crate::artifacts::objects::tree::Tree;
    use assert_fs::TempDir;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn author() -> Author {
        Author::new_with_timestamp(
            "Ada".to_string(),
            "ada@example.com".to_string(),
            Author::parse_date("2024-01-01 12:00:00 +0000").unwrap(),
        )
    }

    fn commit_files(
        database: &Database,
        parents: Vec<ObjectId>,
        files: &[(&str, &str)],
    ) -> ObjectId {
        let entries = files
            .iter()
            .map(|(path, content)| {
                let oid = database
                    .store(&Blob::new(Bytes::from(content.to_string())))
                    .unwrap();
                IndexEntry::new(PathBuf::from(path), oid, EntryMetadata::default())
            })
            .collect::<Vec<_>>();
        let tree = Tree::build(&entries).unwrap();
        tree.traverse(&mut |subtree| database.store(subtree).map(|_| ()))
            .unwrap();

        let commit = Commit::new(parents, tree.object_id().unwrap(), author(), "msg".into());
        database.store(&commit).unwrap()
    }

    fn positions(plan: &[(ObjectId, Bytes)]) -> HashMap<ObjectId, usize> {
        plan.iter()
            .enumerate()
            .map(|(i, (oid, _))| (oid.clone(), i))
            .collect()
    }

    #[test]
    fn every_object_comes_after_what_it_references() {
        let dir = TempDir::new().unwrap();
        let database = Database::new(dir.path().join("objects").into_boxed_path());
        let first = commit_files(&database, vec![], &[("a.txt", "a"), ("dir/b.txt", "b")]);
        let second = commit_files(&database, vec![first.clone()], &[("a.txt", "changed")]);

        let plan = upload_plan(&database, &second, |_| Ok(false)).unwrap();
        let position = positions(&plan);

        pretty_assertions::assert_eq!(plan.len(), position.len());
        for (oid, content) in &plan {
            for reference in ObjectBox::parse(content.clone()).unwrap().references() {
                assert!(position[&reference] < position[oid]);
            }
        }
        pretty_assertions::assert_eq!(plan.last().map(|(oid, _)| oid), Some(&second));
    }

    #[test]
    fn objects_the_remote_has_are_pruned_with_their_closure() {
        let dir = TempDir::new().unwrap();
        let database = Database::new(dir.path().join("objects").into_boxed_path());
        let first = commit_files(&database, vec![], &[("a.txt", "a"), ("dir/b.txt", "b")]);
        let second = commit_files(
            &database,
            vec![first.clone()],
            &[("a.txt", "a"), ("c.txt", "c")],
        );
        let first_closure = database
            .walk_reachable(&first)
            .collect::<anyhow::Result<HashSet<_>>>()
            .unwrap();

        let plan = upload_plan(&database, &second, |oid| Ok(first_closure.contains(oid))).unwrap();
        let planned = plan.into_iter().map(|(oid, _)| oid).collect::<HashSet<_>>();

        // new commit, its tree and the new blob
        pretty_assertions::assert_eq!(planned.len(), 3);
        assert!(planned.is_disjoint(&first_closure));
    }

    #[test]
    fn download_fetches_only_missing_objects() {
        let dir = TempDir::new().unwrap();
        let source = Database::new(dir.path().join("source").into_boxed_path());
        let local = Database::new(dir.path().join("local").into_boxed_path());
        let remote = FsRemote::new(dir.path().join("remote")).unwrap();

        let head = commit_files(&source, vec![], &[("a.txt", "a")]);
        for object_id in source.walk_reachable(&head) {
            let object_id = object_id.unwrap();
            remote.put(&object_id, source.load(&object_id).unwrap()).unwrap();
        }
        let blob_id = Blob::new(Bytes::from_static(b"a")).object_id().unwrap();
        local.store(&Blob::new(Bytes::from_static(b"a"))).unwrap();

        let fetched = download(&remote, &local, &head).unwrap();

        pretty_assertions::assert_eq!(fetched.len(), 2);
        assert!(fetched.iter().all(|(oid, _)| oid != &blob_id));
        pretty_assertions::assert_eq!(fetched.last().map(|(oid, _)| oid), Some(&head));
        assert!(!local.has(&head));
    }

    #[test]
    fn missing_remote_objects_surface_as_not_found() {
        let dir = TempDir::new().unwrap();
        let local = Database::new(dir.path().join("local").into_boxed_path());
        let remote = FsRemote::new(dir.path().join("remote")).unwrap();
        let head = ObjectId::try_parse("a".repeat(40)).unwrap();

        let err = download(&remote, &local, &head).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<KnotError>(),
            Some(KnotError::ObjectNotFound(_))
        ));
    }
}
