#![allow(dead_code)]

use ripper::{BatchRunner, Limits, Policy};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

/// Helper to create a small source tree to explore
pub fn create_source_tree() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().to_path_buf();

    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("README.md"), "# Demo\n\nA tiny project.\n").unwrap();
    fs::write(root.join("Cargo.toml"), "[package]\nname = \"demo\"\n").unwrap();
    fs::write(
        root.join("src").join("core.py"),
        "def main():\n    # TODO: wire config\n    return 1\n",
    )
    .unwrap();
    fs::write(root.join("file.txt"), "foo\nbar\nfoo bar\n").unwrap();

    (temp_dir, root)
}

/// Helper to create a test git repository
pub fn create_test_repo() -> (TempDir, PathBuf) {
    let (temp_dir, repo_path) = create_source_tree();

    git(&repo_path, &["init"]);
    git(&repo_path, &["config", "user.name", "Test User"]);
    git(&repo_path, &["config", "user.email", "test@example.com"]);

    (temp_dir, repo_path)
}

/// Helper to create a commit
pub fn create_commit(repo_path: &Path, file: &str, content: &str, message: &str) {
    fs::write(repo_path.join(file), content).expect("Failed to write file");
    git(repo_path, &["add", file]);
    git(repo_path, &["commit", "-m", message]);
}

fn git(repo_path: &Path, args: &[&str]) {
    Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .expect("Failed to run git");
}

/// Whether `program` can be spawned on this machine
pub fn has_program(program: &str) -> bool {
    Command::new(program).arg("--version").output().is_ok()
}

pub fn default_policy() -> Arc<Policy> {
    Arc::new(Policy::read_only_default().unwrap())
}

/// Policy allowing `sleep` and `cat`, for timing and budget tests
pub fn timing_policy() -> Arc<Policy> {
    let toml = r#"
[commands.sleep]
description = "Pause"
syntax = "sleep SECONDS"

[commands.cat]
description = "Show file contents"
syntax = "cat FILE"

[[blocked]]
name = "pipe"
pattern = '\|'
"#;
    Arc::new(Policy::from_toml_str(toml).unwrap())
}

pub fn runner(root: &Path, limits: Limits) -> BatchRunner {
    BatchRunner::new(default_policy(), limits, root).unwrap()
}
