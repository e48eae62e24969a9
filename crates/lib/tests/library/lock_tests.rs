//! Cross-process lock exclusion.

use std::time::Duration;

use pullstack_lib::lock::{PortLock, PortLockError};

use super::common::free_port;

#[tokio::test]
async fn second_acquire_waits_for_release() {
  let port = free_port();
  let first = PortLock::acquire(port).await.unwrap();

  let waiter = tokio::spawn(async move { PortLock::acquire(port).await.map(|lock| lock.port()) });
  tokio::time::sleep(Duration::from_millis(300)).await;
  assert!(!waiter.is_finished());

  drop(first);
  let acquired = tokio::time::timeout(Duration::from_secs(5), waiter).await.unwrap().unwrap();
  assert_eq!(acquired.unwrap(), port);
}

#[test]
fn try_acquire_reports_contention() {
  let port = free_port();
  let _held = PortLock::try_acquire(port).unwrap();
  assert!(matches!(
    PortLock::try_acquire(port),
    Err(PortLockError::Contention { port: p }) if p == port
  ));
}
