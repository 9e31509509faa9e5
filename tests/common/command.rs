use crate::common::file::{FileSpec, write_file};
use crate::common::redirect_temp_dir;
use assert_cmd::Command;
use assert_fs::TempDir;
use rstest::fixture;
use std::path::{Path, PathBuf};

pub const AUTHOR_NAME: &str = "fake_user";
pub const AUTHOR_EMAIL: &str = "fake_email@email.com";

#[fixture]
pub fn repository_dir() -> TempDir {
    redirect_temp_dir();
    TempDir::new().expect("Failed to create temp dir")
}

/// Repository with `1.txt`, `a/2.txt` and `a/b/3.txt` committed once
#[fixture]
pub fn init_repository_dir(repository_dir: TempDir) -> TempDir {
    run_knot_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    write_file(FileSpec::new(
        repository_dir.path().join("1.txt"),
        "one".to_string(),
    ));
    write_file(FileSpec::new(
        repository_dir.path().join("a").join("2.txt"),
        "two".to_string(),
    ));
    write_file(FileSpec::new(
        repository_dir.path().join("a").join("b").join("3.txt"),
        "three".to_string(),
    ));

    run_knot_command(repository_dir.path(), &["add", "."])
        .assert()
        .success();

    knot_commit(repository_dir.path(), "Initial commit")
        .assert()
        .success();

    repository_dir
}

/// Repository with four commits, each adding `fileN.txt`
#[fixture]
pub fn repository_with_multiple_commits(repository_dir: TempDir) -> TempDir {
    run_knot_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    for (n, message) in ["First", "Second", "Third", "Fourth"].iter().enumerate() {
        write_file(FileSpec::new(
            repository_dir.path().join(format!("file{}.txt", n + 1)),
            format!("content {}", n + 1),
        ));
        run_knot_command(repository_dir.path(), &["add", "."])
            .assert()
            .success();
        knot_commit(repository_dir.path(), &format!("{} commit", message))
            .assert()
            .success();
    }

    repository_dir
}

pub fn run_knot_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("knot").expect("Failed to find knot binary");
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("KNOT_REMOTE");
    cmd.current_dir(dir);
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

pub fn knot_commit(dir: &Path, message: &str) -> Command {
    let mut cmd = run_knot_command(dir, &["commit", "-m", message]);
    cmd.envs(vec![
        ("KNOT_AUTHOR_NAME", AUTHOR_NAME),
        ("KNOT_AUTHOR_EMAIL", AUTHOR_EMAIL),
        ("KNOT_AUTHOR_DATE", "2023-01-01 12:00:00 +0000"), // %Y-%m-%d %H:%M:%S %z
    ]);
    cmd
}

/// Run a command and hand back its stdout
pub fn knot_stdout(dir: &Path, args: &[&str]) -> String {
    let output = run_knot_command(dir, args).assert().success();
    String::from_utf8(output.get_output().stdout.clone()).expect("stdout is not UTF-8")
}

fn repository_path(dir: &Path) -> PathBuf {
    dir.join(".knot")
}

/// Commit HEAD resolves to, following the branch HEAD points at
pub fn get_head_commit_sha(dir: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let head_content = std::fs::read_to_string(repository_path(dir).join("HEAD"))?;

    // HEAD holds either a commit digest or a ref like "ref: refs/heads/main"
    if let Some(ref_path) = head_content.strip_prefix("ref: ") {
        let commit_sha = std::fs::read_to_string(repository_path(dir).join(ref_path.trim()))?;
        Ok(commit_sha.trim().to_string())
    } else {
        Ok(head_content.trim().to_string())
    }
}

/// Commit a remote store's `main` ref points at, if any
pub fn get_remote_head_sha(remote: &Path) -> Option<String> {
    std::fs::read_to_string(remote.join("refs").join("heads").join("main"))
        .ok()
        .map(|content| content.trim().to_string())
}

/// Digests printed by `log --oneline`, newest first
pub fn log_short_ids(dir: &Path) -> Vec<String> {
    knot_stdout(dir, &["log", "--oneline"])
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}
