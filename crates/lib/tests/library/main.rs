//! Library integration tests: whole reconciliations against a temporary
//! root, driven through the public API.

mod common;
mod fingerprint_tests;
mod lock_tests;
mod reconcile_tests;
mod watch_tests;
