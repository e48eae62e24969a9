//! cp, ls and rm integration tests against local storage.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn cp_copies_file() {
  let env = TestEnv::new();
  let src = env.write_file("a.txt", "hello");
  let dst = env.temp.path().join("b.txt");

  env.cmd().arg("cp").arg(&src).arg(&dst).assert().success();

  assert_eq!(std::fs::read_to_string(dst).unwrap(), "hello");
}

#[test]
fn cp_into_directory_keeps_name() {
  let env = TestEnv::new();
  let src = env.write_file("a.txt", "hello");
  let dir = env.temp.path().join("out");
  std::fs::create_dir_all(&dir).unwrap();

  env
    .cmd()
    .arg("cp")
    .arg(&src)
    .arg(format!("{}/", dir.display()))
    .assert()
    .success();

  assert_eq!(std::fs::read_to_string(dir.join("a.txt")).unwrap(), "hello");
}

#[test]
fn cp_missing_source_fails() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("cp")
    .arg(env.temp.path().join("missing.txt"))
    .arg(env.temp.path().join("b.txt"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn ls_lists_sorted_names() {
  let env = TestEnv::new();
  env.write_file("dir/b.txt", "b");
  env.write_file("dir/a.txt", "a");

  env
    .cmd()
    .arg("ls")
    .arg(env.temp.path().join("dir"))
    .assert()
    .success()
    .stdout(predicate::eq("a.txt\nb.txt\n"));
}

#[test]
fn rm_removes_file() {
  let env = TestEnv::new();
  let file = env.write_file("gone.txt", "bye");

  env.cmd().arg("rm").arg(&file).assert().success();

  assert!(!file.exists());
}

#[test]
fn rm_missing_file_fails() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("rm")
    .arg(env.temp.path().join("missing.txt"))
    .assert()
    .failure();
}

#[test]
fn unknown_scheme_fails() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("ls")
    .arg("ftp://example.com/pub/")
    .assert()
    .failure()
    .stderr(predicate::str::contains("ftp"));
}
