//! End-to-end reconciliations through `apply`.

use pullstack_lib::apply::{ApplyError, apply};
use pullstack_lib::config::Config;
use pullstack_lib::ledger::StackState;
use pullstack_lib::reconcile::ReconcileError;

use super::common::Node;

fn single_app(source: &std::path::Path, extra: &str) -> String {
  format!(
    "applications:\n  - name: A\n    source: {}\n    service:\n      command: [\"run.sh\"]\n{}",
    source.display(),
    extra
  )
}

#[tokio::test]
async fn fresh_node_deploys_application() {
  let node = Node::new();
  let pkg = node.package("pkg.tar.gz", &[("run.sh", "#!/bin/sh\nsleep 300\n")]);
  let yaml = single_app(&pkg, "");
  let location = node.config(&yaml);

  let outcome = apply(&node.ctx, &location).await.unwrap();
  assert_eq!(outcome.report.downloads_fetched, 1);
  assert_eq!(outcome.report.applications_installed, 1);

  assert!(node.app_dir("A").join("run.sh").is_file());
  assert_eq!(node.manager.events(), vec!["install stack-A"]);

  let desired = Config::parse(&yaml).unwrap();
  let ledger = StackState::load(&node.ctx.paths.ledger_file()).await.unwrap();
  assert_eq!(
    ledger.application_fingerprints().unwrap(),
    vec![desired.applications[0].content_fingerprint().unwrap()]
  );
  assert_eq!(ledger.downloads.len(), 1);
  let download = ledger.downloads.keys().next().unwrap();
  assert!(std::path::Path::new(download).is_file());
}

#[tokio::test]
async fn second_apply_is_a_no_op() {
  let node = Node::new();
  let pkg = node.package("pkg.tar.gz", &[("run.sh", "#!/bin/sh\n")]);
  let location = node.config(&single_app(&pkg, ""));

  apply(&node.ctx, &location).await.unwrap();
  let before = std::fs::read_to_string(node.ctx.paths.ledger_file()).unwrap();

  let outcome = apply(&node.ctx, &location).await.unwrap();
  assert!(outcome.report.is_noop());
  assert!(outcome.validation.is_clean());
  assert_eq!(outcome.report.applications_unchanged, 1);
  assert_eq!(node.manager.events(), vec!["install stack-A"]);
  assert_eq!(std::fs::read_to_string(node.ctx.paths.ledger_file()).unwrap(), before);
}

#[tokio::test]
async fn changed_application_is_removed_before_reinstall() {
  let node = Node::new();
  let pkg = node.package("pkg.tar.gz", &[("run.sh", "#!/bin/sh\n")]);
  apply(&node.ctx, &node.config(&single_app(&pkg, ""))).await.unwrap();

  let changed = single_app(&pkg, "    files:\n      VERSION: \"2\"\n");
  let outcome = apply(&node.ctx, &node.config(&changed)).await.unwrap();

  assert_eq!(outcome.report.applications_removed, 1);
  assert_eq!(outcome.report.applications_installed, 1);
  assert_eq!(outcome.report.downloads_fetched, 0);
  assert_eq!(
    node.manager.events(),
    vec!["install stack-A", "uninstall stack-A", "install stack-A"]
  );
  assert_eq!(std::fs::read_to_string(node.app_dir("A").join("VERSION")).unwrap(), "2");
}

#[tokio::test]
async fn changed_source_is_downloaded_again() {
  let node = Node::new();
  let v1 = node.package("v1.tar.gz", &[("run.sh", "v1")]);
  let v2 = node.package("v2.tar.gz", &[("run.sh", "v2")]);
  apply(&node.ctx, &node.config(&single_app(&v1, ""))).await.unwrap();

  let outcome = apply(&node.ctx, &node.config(&single_app(&v2, ""))).await.unwrap();
  assert_eq!(outcome.report.downloads_removed, 1);
  assert_eq!(outcome.report.downloads_fetched, 1);
  assert_eq!(std::fs::read_to_string(node.app_dir("A").join("run.sh")).unwrap(), "v2");
}

#[tokio::test]
async fn interrupted_run_resumes_at_failed_item() {
  let node = Node::new();
  let pkg = node.package("pkg.tar.gz", &[("run.sh", "#!/bin/sh\n")]);
  let apps = |broken: bool| {
    let link = if broken { "    links:\n      alias: missing\n" } else { "" };
    format!(
      "applications:\n\
       \x20 - {{name: a, source: {pkg}, service: {{command: [run.sh]}}}}\n\
       \x20 - {{name: b, source: {pkg}, service: {{command: [run.sh]}}}}\n\
       \x20 - name: c\n    source: {pkg}\n    service: {{command: [run.sh]}}\n{link}",
      pkg = pkg.display(),
      link = link
    )
  };

  let err = apply(&node.ctx, &node.config(&apps(true))).await.unwrap_err();
  assert!(matches!(
    err,
    ApplyError::Reconcile(ReconcileError::Layout { ref app, .. }) if app == "c"
  ));
  let ledger = StackState::load(&node.ctx.paths.ledger_file()).await.unwrap();
  let names: Vec<_> = ledger.applications.iter().map(|a| a.name.as_str()).collect();
  assert_eq!(names, vec!["a", "b"]);

  let outcome = apply(&node.ctx, &node.config(&apps(false))).await.unwrap();
  assert_eq!(outcome.report.applications_installed, 1);
  assert_eq!(outcome.report.applications_unchanged, 2);
  assert_eq!(
    node.manager.events(),
    vec!["install stack-a", "install stack-b", "install stack-c"]
  );
}

#[tokio::test]
async fn removed_application_directory_is_redeployed() {
  let node = Node::new();
  let pkg = node.package("pkg.tar.gz", &[("run.sh", "#!/bin/sh\n")]);
  let location = node.config(&single_app(&pkg, ""));
  apply(&node.ctx, &location).await.unwrap();

  std::fs::remove_dir_all(node.app_dir("A")).unwrap();

  let outcome = apply(&node.ctx, &location).await.unwrap();
  assert_eq!(outcome.validation.pruned_applications, vec!["A"]);
  assert_eq!(outcome.report.applications_installed, 1);
  assert!(node.app_dir("A").join("run.sh").is_file());
}

#[tokio::test]
async fn malformed_config_changes_nothing() {
  let node = Node::new();
  let pkg = node.package("pkg.tar.gz", &[("run.sh", "#!/bin/sh\n")]);
  apply(&node.ctx, &node.config(&single_app(&pkg, ""))).await.unwrap();

  let err = apply(&node.ctx, &node.config("applications: [name: \n")).await.unwrap_err();
  assert!(matches!(err, ApplyError::Config { .. }));
  assert!(node.app_dir("A").join("run.sh").is_file());
  assert_eq!(node.manager.events(), vec!["install stack-A"]);
}
