//! CLI integration tests, one module per command family.

mod apply_tests;
mod common;
mod storage_tests;
mod supervisor_tests;
