//! Apply and status integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn apply_lays_out_application() {
  let env = TestEnv::new();
  env.write_config(&env.site_config("1"));

  env
    .cmd()
    .arg("apply")
    .arg(&env.config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("Apply complete"))
    .stdout(predicate::str::contains("Applications installed: 1"));

  let app = env.root_path().join("applications").join("site");
  assert!(app.join("index.html").is_file());
  assert!(app.join("assets").join("app.js").is_file());
  assert_eq!(std::fs::read_to_string(app.join("VERSION")).unwrap(), "1");
  assert!(env.root_path().join("state.json").is_file());
}

#[test]
fn apply_is_idempotent() {
  let env = TestEnv::new();
  env.write_config(&env.site_config("1"));

  env.cmd().arg("apply").arg(&env.config_path).assert().success();

  env
    .cmd()
    .arg("apply")
    .arg(&env.config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("Already up to date"))
    .stdout(predicate::str::contains("Applications unchanged: 1"));
}

#[test]
fn apply_replaces_changed_application() {
  let env = TestEnv::new();
  env.write_config(&env.site_config("1"));
  env.cmd().arg("apply").arg(&env.config_path).assert().success();

  env.write_config(&env.site_config("2"));
  env
    .cmd()
    .arg("apply")
    .arg(&env.config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("Applications removed: 1"))
    .stdout(predicate::str::contains("Applications installed: 1"))
    // the source did not change, so nothing is downloaded again
    .stdout(predicate::str::contains("Downloads fetched: 0"));

  let version = env.root_path().join("applications").join("site").join("VERSION");
  assert_eq!(std::fs::read_to_string(version).unwrap(), "2");
}

#[test]
fn apply_empty_config_removes_everything() {
  let env = TestEnv::new();
  env.write_config(&env.site_config("1"));
  env.cmd().arg("apply").arg(&env.config_path).assert().success();

  env.write_config("applications: []\n");
  env
    .cmd()
    .arg("apply")
    .arg(&env.config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("Applications removed: 1"))
    .stdout(predicate::str::contains("Downloads removed: 1"));

  assert!(!env.root_path().join("applications").join("site").exists());
}

#[test]
fn apply_nonexistent_config_fails() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("apply")
    .arg(env.temp.path().join("missing.yaml"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("failed to fetch configuration"));
}

#[test]
fn apply_malformed_config_fails() {
  let env = TestEnv::new();
  env.write_config("applications: [name: \n");

  env
    .cmd()
    .arg("apply")
    .arg(&env.config_path)
    .assert()
    .failure()
    .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn apply_unknown_archive_format_keeps_previous_state() {
  let env = TestEnv::new();
  env.write_config(&env.site_config("1"));
  env.cmd().arg("apply").arg(&env.config_path).assert().success();

  let bogus = env.write_file("bundle.rar", "not an archive");
  env.write_config(&format!(
    "applications:\n  - name: other\n    source: {}\n",
    bogus.display()
  ));
  env.cmd().arg("apply").arg(&env.config_path).assert().failure();

  env
    .cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("site"));
}

#[test]
fn status_on_fresh_root() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing applied yet"));
}

#[test]
fn status_lists_applied_applications() {
  let env = TestEnv::new();
  env.write_config(&env.site_config("1"));
  env.cmd().arg("apply").arg(&env.config_path).assert().success();

  env
    .cmd()
    .arg("status")
    .arg("--verbose")
    .assert()
    .success()
    .stdout(predicate::str::contains("Applications: 1"))
    .stdout(predicate::str::contains("site"))
    .stdout(predicate::str::contains("Downloads:"));
}

#[test]
fn status_json_output() {
  let env = TestEnv::new();
  env.write_config(&env.site_config("1"));
  env.cmd().arg("apply").arg(&env.config_path).assert().success();

  let output = env.cmd().arg("status").arg("--json").output().unwrap();
  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["applications"][0]["name"], "site");
  assert_eq!(json["applications"][0]["fingerprint"].as_str().unwrap().len(), 64);
  assert!(json["applications"][0]["service"].is_null());
  assert_eq!(json["downloads"].as_array().unwrap().len(), 1);
}
