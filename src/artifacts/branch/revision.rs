use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::branch::{ANCESTOR_REGEX, PARENT_REGEX, REF_ALIASES};
use crate::artifacts::core::error::KnotError;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;

/// Shortest digest prefix accepted as a commit name
const MIN_PREFIX_LENGTH: usize = 4;

/// A user-supplied name for a commit
///
/// Supported forms:
/// - Ref names: `HEAD`, `main`, `refs/heads/main`, and the alias `@`
/// - Full digests and unambiguous prefixes of at least four hex characters
/// - `<rev>^`: first parent of `<rev>`
/// - `<rev>~<n>`: n-th first-parent ancestor of `<rev>`
///
/// Refs win over digest-like names: a branch called `abcd` shadows every
/// commit starting with `abcd`. Prefixes only ever match commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    Ref(BranchName),
    Parent(Box<Revision>),
    Ancestor(Box<Revision>, usize),
}

impl Revision {
    pub fn try_parse(revision: &str) -> anyhow::Result<Revision> {
        let parent_regex = regex::Regex::new(PARENT_REGEX)
            .with_context(|| format!("invalid parent regex: {PARENT_REGEX}"))?;
        let ancestor_regex = regex::Regex::new(ANCESTOR_REGEX)
            .with_context(|| format!("invalid ancestor regex: {ANCESTOR_REGEX}"))?;

        if let Some(caps) = parent_regex.captures(revision) {
            return Ok(Revision::Parent(Box::new(Self::try_parse(&caps[1])?)));
        }

        if let Some(caps) = ancestor_regex.captures(revision) {
            let generations = caps[2]
                .parse()
                .with_context(|| format!("failed to parse generations in revision: {revision}"))?;
            return Ok(Revision::Ancestor(
                Box::new(Self::try_parse(&caps[1])?),
                generations,
            ));
        }

        let resolved_name = *REF_ALIASES.get(revision).unwrap_or(&revision);
        BranchName::try_parse(resolved_name.to_string())
            .map(Revision::Ref)
            .map_err(|_| KnotError::UnknownRef(revision.to_string()).into())
    }

    /// Resolve to the digest of a stored commit
    pub fn resolve(&self, repository: &Repository) -> anyhow::Result<ObjectId> {
        match self {
            Revision::Ref(name) => Self::resolve_name(name, repository),
            Revision::Parent(base) => {
                let base_oid = base.resolve(repository)?;
                Self::first_parent(&base_oid, repository)?
                    .ok_or_else(|| KnotError::UnknownRef(self.to_string()).into())
            }
            Revision::Ancestor(base, generations) => {
                let mut oid = base.resolve(repository)?;
                for _ in 0..*generations {
                    oid = Self::first_parent(&oid, repository)?
                        .ok_or_else(|| KnotError::UnknownRef(self.to_string()))?;
                }

                Ok(oid)
            }
        }
    }

    fn resolve_name(name: &BranchName, repository: &Repository) -> anyhow::Result<ObjectId> {
        if repository.refs().ref_exists(name) {
            return repository
                .refs()
                .read_ref(name)?
                .ok_or_else(|| KnotError::UnknownRef(name.to_string()).into());
        }

        if Self::looks_like_oid(name.as_ref()) {
            return Self::resolve_oid(name.as_ref(), repository);
        }

        Err(KnotError::UnknownRef(name.to_string()).into())
    }

    fn resolve_oid(prefix: &str, repository: &Repository) -> anyhow::Result<ObjectId> {
        let database = repository.database();

        let candidates = database
            .find_objects_by_prefix(prefix)?
            .into_iter()
            .filter(|oid| {
                database
                    .object_type(oid)
                    .is_ok_and(|object_type| object_type == ObjectType::Commit)
            })
            .collect::<Vec<_>>();

        match candidates.len() {
            0 => Err(KnotError::UnknownRef(prefix.to_string()).into()),
            1 => Ok(candidates[0].clone()),
            _ => Err(KnotError::AmbiguousRef {
                prefix: prefix.to_string(),
                candidates,
            }
            .into()),
        }
    }

    fn first_parent(oid: &ObjectId, repository: &Repository) -> anyhow::Result<Option<ObjectId>> {
        Ok(repository.load_commit(oid)?.parent().cloned())
    }

    fn looks_like_oid(name: &str) -> bool {
        (MIN_PREFIX_LENGTH..=OBJECT_ID_LENGTH).contains(&name.len())
            && name.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Revision::Ref(name) => write!(f, "{}", name),
            Revision::Parent(base) => write!(f, "{}^", base),
            Revision::Ancestor(base, generations) => write!(f, "{}~{}", base, generations),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn name(revision: &Revision) -> &str {
        match revision {
            Revision::Ref(name) => name.as_ref(),
            other => panic!("expected a ref, got {:?}", other),
        }
    }

    #[test]
    fn plain_names_and_aliases_parse_as_refs() {
        pretty_assertions::assert_eq!(name(&Revision::try_parse("main").unwrap()), "main");
        pretty_assertions::assert_eq!(name(&Revision::try_parse("@").unwrap()), "HEAD");
        pretty_assertions::assert_eq!(
            name(&Revision::try_parse("refs/heads/main").unwrap()),
            "refs/heads/main"
        );

        let oid = "a".repeat(40);
        pretty_assertions::assert_eq!(name(&Revision::try_parse(&oid).unwrap()), oid);
    }

    #[test]
    fn parent_and_ancestor_suffixes_nest() {
        let revision = Revision::try_parse("main~3^").unwrap();

        match &revision {
            Revision::Parent(base) => match base.as_ref() {
                Revision::Ancestor(inner, 3) => pretty_assertions::assert_eq!(name(inner), "main"),
                other => panic!("expected an ancestor, got {:?}", other),
            },
            other => panic!("expected a parent, got {:?}", other),
        }
        pretty_assertions::assert_eq!(revision.to_string(), "main~3^");
    }

    #[test]
    fn invalid_names_are_unknown_refs() {
        for revision in ["", "bad name", "bad:name", ".hidden", "x.lock", "a..b", ".bad^"] {
            let err = Revision::try_parse(revision).unwrap_err();
            assert!(
                matches!(err.downcast_ref::<KnotError>(), Some(KnotError::UnknownRef(_))),
                "{revision:?} should be rejected"
            );
        }
    }

    #[test]
    fn short_hex_names_do_not_look_like_digests() {
        assert!(!Revision::looks_like_oid("abc"));
        assert!(Revision::looks_like_oid("abcd"));
        assert!(!Revision::looks_like_oid(&"a".repeat(41)));
        assert!(!Revision::looks_like_oid("main"));
    }

    proptest! {
        #[test]
        fn ancestor_generations_round_trip(generations in 0usize..1000) {
            let text = format!("HEAD~{}", generations);
            let revision = Revision::try_parse(&text).unwrap();

            prop_assert_eq!(revision.to_string(), text);
        }
    }
}
