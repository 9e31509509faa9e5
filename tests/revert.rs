use assert_fs::TempDir;
use common::command::{
    get_head_commit_sha, knot_stdout, log_short_ids, repository_with_multiple_commits,
    run_knot_command,
};
use common::file::{FileSpec, read_file, write_file};
use predicates::prelude::predicate;
use pretty_assertions::assert_eq;
use rstest::rstest;

mod common;

fn main_ref(dir: &std::path::Path) -> String {
    std::fs::read_to_string(dir.join(".knot").join("refs").join("heads").join("main"))
        .expect("main ref is missing")
        .trim()
        .to_string()
}

#[rstest]
fn revert_detaches_head_and_restores_the_tree(
    repository_with_multiple_commits: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = repository_with_multiple_commits.path();
    let head = get_head_commit_sha(dir)?;

    run_knot_command(dir, &["revert", "HEAD~2"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(
            r"^HEAD is now at [0-9a-f]{7} Second commit\n$",
        )?);

    assert_eq!(read_file(&dir.join("file1.txt")), "content 1");
    assert_eq!(read_file(&dir.join("file2.txt")), "content 2");
    assert!(!dir.join("file3.txt").exists());
    assert!(!dir.join("file4.txt").exists());

    // the branch stays where it was
    assert_eq!(main_ref(dir), head);
    assert_eq!(log_short_ids(dir).len(), 2);
    assert_eq!(
        knot_stdout(dir, &["status"]).lines().nth(1),
        Some("nothing to commit, working tree clean")
    );

    Ok(())
}

#[rstest]
fn revert_with_reset_moves_the_branch(
    repository_with_multiple_commits: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = repository_with_multiple_commits.path();
    let head = get_head_commit_sha(dir)?;

    run_knot_command(dir, &["revert", "--reset", "HEAD^"])
        .assert()
        .success();

    assert!(!dir.join("file4.txt").exists());
    assert_ne!(main_ref(dir), head);
    assert_eq!(
        std::fs::read_to_string(dir.join(".knot").join("HEAD"))?,
        "ref: refs/heads/main\n"
    );
    assert_eq!(log_short_ids(dir).len(), 3);

    // no commit is deleted: the old head is still reachable by digest
    run_knot_command(dir, &["revert", "--reset", &head])
        .assert()
        .success();
    assert_eq!(read_file(&dir.join("file4.txt")), "content 4");
    assert_eq!(main_ref(dir), head);
    assert_eq!(log_short_ids(dir).len(), 4);

    Ok(())
}

#[rstest]
fn revert_by_abbreviated_digest(
    repository_with_multiple_commits: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = repository_with_multiple_commits.path();
    let first = log_short_ids(dir)
        .last()
        .cloned()
        .expect("history is empty");

    run_knot_command(dir, &["revert", &first])
        .assert()
        .success()
        .stdout(format!("HEAD is now at {} First commit\n", first));

    assert_eq!(get_head_commit_sha(dir)?[..7], first);
    assert!(dir.join("file1.txt").exists());
    assert!(!dir.join("file2.txt").exists());

    Ok(())
}

#[rstest]
fn revert_removes_files_the_target_does_not_track(
    repository_with_multiple_commits: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = repository_with_multiple_commits.path();
    write_file(FileSpec::new(
        dir.join("scratch").join("notes.txt"),
        "notes".to_string(),
    ));

    run_knot_command(dir, &["revert", "HEAD"])
        .assert()
        .success();

    assert!(!dir.join("scratch").exists());
    assert_eq!(read_file(&dir.join("file4.txt")), "content 4");

    Ok(())
}

#[rstest]
#[case::unknown_ref("nope")]
#[case::beyond_root("HEAD~10")]
#[case::unknown_digest("0000000")]
fn revert_to_an_unknown_revision_fails(
    repository_with_multiple_commits: TempDir,
    #[case] revision: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = repository_with_multiple_commits.path();
    let head = get_head_commit_sha(dir)?;

    run_knot_command(dir, &["revert", revision])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown revision"));

    assert_eq!(get_head_commit_sha(dir)?, head);
    assert_eq!(read_file(&dir.join("file4.txt")), "content 4");

    Ok(())
}
