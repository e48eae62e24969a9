//! The watch loop against a local configuration file.

use std::path::Path;
use std::time::Duration;

use tokio::sync::watch;

use pullstack_lib::apply::ApplyOutcome;
use pullstack_lib::watch::run_watch;

use super::common::Node;

async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
  for _ in 0..200 {
    if check() {
      return true;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
  }
  false
}

#[tokio::test]
async fn applies_at_start_and_on_every_change() {
  let node = Node::new();
  let pkg = node.package("pkg.tar.gz", &[("index.html", "hi")]);
  let location = node.config(&format!("applications:\n  - {{name: site, source: {}}}\n", pkg.display()));
  let app_dir = node.app_dir("site");

  let (stop_tx, stop_rx) = watch::channel(false);
  let ctx = node.ctx.clone();
  let watched = location.clone();
  let task = tokio::spawn(async move { run_watch(&ctx, &watched, stop_rx, &|_: &ApplyOutcome| {}).await });

  assert!(wait_until(|| app_dir.join("index.html").is_file()).await, "initial apply did not run");

  // Replace the file the way editors do: write elsewhere, rename over.
  let staged = node.temp.path().join("stack.yaml.new");
  std::fs::write(&staged, "applications: []\n").unwrap();
  std::fs::rename(&staged, Path::new(location.path())).unwrap();

  assert!(wait_until(|| !app_dir.exists()).await, "change was not applied");

  stop_tx.send(true).unwrap();
  tokio::time::timeout(Duration::from_secs(5), task)
    .await
    .unwrap()
    .unwrap()
    .unwrap();
}
