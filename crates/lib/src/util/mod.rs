//! Shared utilities: content fingerprints and unit-test fixtures.

pub mod hash;

#[cfg(test)]
pub mod testutil;
