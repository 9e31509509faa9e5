use assert_fs::TempDir;
use common::command::{repository_dir, run_knot_command};
use predicates::prelude::predicate;
use pretty_assertions::assert_eq;
use rstest::rstest;

mod common;

#[rstest]
fn new_repository_initiated_with_knot_directory(
    repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir_absolute_path = repository_dir.path().canonicalize()?.display().to_string();

    run_knot_command(repository_dir.path(), &["init"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(
            r"^Initialized empty knot repository in .+\n$",
        )?)
        .stdout(predicate::str::contains(dir_absolute_path));

    let knot_dir = repository_dir.path().join(".knot");
    assert!(knot_dir.join("objects").is_dir());
    assert_eq!(
        std::fs::read_to_string(knot_dir.join("HEAD"))?,
        "ref: refs/heads/main\n"
    );

    Ok(())
}

#[rstest]
fn init_at_explicit_path_creates_the_directory(
    repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let nested = repository_dir.path().join("nested").join("project");

    run_knot_command(repository_dir.path(), &["init", "nested/project"])
        .assert()
        .success();

    assert!(nested.join(".knot").join("objects").is_dir());
    assert!(!repository_dir.path().join(".knot").exists());

    Ok(())
}

#[rstest]
fn init_twice_fails_and_leaves_the_repository_alone(
    repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    run_knot_command(repository_dir.path(), &["init"])
        .assert()
        .success();
    let head_before = std::fs::read_to_string(repository_dir.path().join(".knot").join("HEAD"))?;

    run_knot_command(repository_dir.path(), &["init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: repository already initialized"));

    let head_after = std::fs::read_to_string(repository_dir.path().join(".knot").join("HEAD"))?;
    assert_eq!(head_before, head_after);

    Ok(())
}

#[rstest]
fn init_with_remote_records_it_in_the_config(
    repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    run_knot_command(repository_dir.path(), &["init", "--remote", "../shared"])
        .assert()
        .success();

    let config = std::fs::read_to_string(repository_dir.path().join(".knot").join("config.json"))?;
    let config: serde_json::Value = serde_json::from_str(&config)?;
    assert_eq!(config["remote"], "../shared");

    Ok(())
}

#[rstest]
#[case::add(&["add", "."])]
#[case::commit(&["commit", "-m", "message"])]
#[case::log(&["log"])]
#[case::status(&["status"])]
#[case::push(&["push"])]
#[case::pull(&["pull"])]
#[case::revert(&["revert", "HEAD"])]
fn commands_outside_a_repository_fail(repository_dir: TempDir, #[case] args: &[&str]) {
    run_knot_command(repository_dir.path(), args)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: not a knot repository"));
}
