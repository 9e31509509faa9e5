use assert_fs::TempDir;
use common::command::{
    get_head_commit_sha, init_repository_dir, knot_commit, knot_stdout, log_short_ids,
    repository_dir, run_knot_command,
};
use common::file::{FileSpec, write_file};
use predicates::prelude::predicate;
use pretty_assertions::assert_eq;
use rstest::rstest;

mod common;

#[rstest]
fn first_commit_is_a_root_commit(
    repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    run_knot_command(repository_dir.path(), &["init"])
        .assert()
        .success();
    write_file(FileSpec::new(
        repository_dir.path().join("a").join("b").join("c.txt"),
        "nested".to_string(),
    ));
    run_knot_command(repository_dir.path(), &["add", "a"])
        .assert()
        .success();

    knot_commit(repository_dir.path(), "Initial commit")
        .assert()
        .success()
        .stdout(predicate::str::is_match(
            r"^\[\(root-commit\) [0-9a-f]{7}\] Initial commit\n$",
        )?);

    let head = get_head_commit_sha(repository_dir.path())?;
    assert_eq!(head.len(), 40);
    assert_eq!(log_short_ids(repository_dir.path()), vec![head[..7].to_string()]);

    Ok(())
}

#[rstest]
fn second_commit_has_the_first_as_parent(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let first = get_head_commit_sha(init_repository_dir.path())?;
    write_file(FileSpec::new(
        init_repository_dir.path().join("1.txt"),
        "one, again".to_string(),
    ));
    run_knot_command(init_repository_dir.path(), &["add", "1.txt"])
        .assert()
        .success();

    knot_commit(init_repository_dir.path(), "Second commit\n\nWith a body")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^\[[0-9a-f]{7}\] Second commit\n$")?);

    let second = get_head_commit_sha(init_repository_dir.path())?;
    assert_ne!(first, second);
    assert_eq!(
        log_short_ids(init_repository_dir.path()),
        vec![second[..7].to_string(), first[..7].to_string()]
    );

    Ok(())
}

#[rstest]
fn positional_message_is_accepted(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    write_file(FileSpec::new(
        init_repository_dir.path().join("5.txt"),
        "five".to_string(),
    ));
    run_knot_command(init_repository_dir.path(), &["add", "5.txt"])
        .assert()
        .success();

    run_knot_command(init_repository_dir.path(), &["commit", "Add five"])
        .env("KNOT_AUTHOR_NAME", "someone")
        .env("KNOT_AUTHOR_EMAIL", "someone@example.com")
        .assert()
        .success()
        .stdout(predicate::str::ends_with("] Add five\n"));

    Ok(())
}

#[rstest]
fn committing_an_unchanged_index_fails(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let head = get_head_commit_sha(init_repository_dir.path())?;

    knot_commit(init_repository_dir.path(), "Nothing new")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: nothing to commit"));

    assert_eq!(get_head_commit_sha(init_repository_dir.path())?, head);

    Ok(())
}

#[rstest]
fn committing_an_empty_index_fails(repository_dir: TempDir) {
    run_knot_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    knot_commit(repository_dir.path(), "Empty")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: nothing to commit"));

    assert!(
        !repository_dir
            .path()
            .join(".knot")
            .join("refs")
            .join("heads")
            .join("main")
            .exists()
    );
}

#[rstest]
#[case::empty("")]
#[case::blank("   \n\t")]
fn committing_without_a_message_fails(init_repository_dir: TempDir, #[case] message: &str) {
    write_file(FileSpec::new(
        init_repository_dir.path().join("1.txt"),
        "changed".to_string(),
    ));
    run_knot_command(init_repository_dir.path(), &["add", "."])
        .assert()
        .success();

    knot_commit(init_repository_dir.path(), message)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "error: commit message must not be empty",
        ));
}

#[rstest]
fn committing_without_an_author_fails(init_repository_dir: TempDir) {
    write_file(FileSpec::new(
        init_repository_dir.path().join("1.txt"),
        "changed".to_string(),
    ));
    run_knot_command(init_repository_dir.path(), &["add", "."])
        .assert()
        .success();

    run_knot_command(init_repository_dir.path(), &["commit", "-m", "Anonymous"])
        .env_remove("KNOT_AUTHOR_NAME")
        .env_remove("KNOT_AUTHOR_EMAIL")
        .assert()
        .failure()
        .stderr(predicate::str::contains("author name not configured"));
}

#[rstest]
fn commit_keeps_the_index_so_status_is_clean(init_repository_dir: TempDir) {
    assert_eq!(
        knot_stdout(init_repository_dir.path(), &["status"]),
        "On branch main\nnothing to commit, working tree clean\n"
    );
}

#[rstest]
fn lock_file_left_by_a_dead_process_does_not_block(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    write_file(FileSpec::new(
        init_repository_dir.path().join(".knot").join("knot.lock"),
        String::new(),
    ));
    write_file(FileSpec::new(
        init_repository_dir.path().join("1.txt"),
        "one, again".to_string(),
    ));

    run_knot_command(init_repository_dir.path(), &["add", "1.txt"])
        .assert()
        .success();
    knot_commit(init_repository_dir.path(), "Commit past a stale lock file")
        .assert()
        .success();

    Ok(())
}

#[rstest]
fn commands_wait_for_a_lock_held_by_another_process(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    let held = runtime.block_on(knot::areas::lock::RepositoryLock::acquire(
        &init_repository_dir.path().join(".knot"),
    ))?;

    run_knot_command(init_repository_dir.path(), &["status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("after 5 attempts"));

    drop(held);
    run_knot_command(init_repository_dir.path(), &["status"])
        .assert()
        .success();

    Ok(())
}
