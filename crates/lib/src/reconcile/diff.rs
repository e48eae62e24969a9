//! Deltas between the ledger and a desired configuration.
//!
//! Both passes are set differences over fingerprints: an item whose
//! fingerprint appears on both sides is unchanged, anything else is removed
//! from the old side and added from the new. A modified application is
//! therefore a removal followed by an addition.

use std::collections::BTreeSet;

use crate::config::{Application, Config};
use crate::ledger::StackState;
use crate::platform::StackPaths;
use crate::util::hash::{Fingerprint, HashError};

/// A cached download: where it lives and which source it came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceEntry {
  pub path: String,
  pub fingerprint: Fingerprint,
}

/// Work for the sources pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SourceDiff {
  /// Ledger entries absent from the desired set.
  pub to_remove: Vec<SourceEntry>,
  /// Desired entries absent from the ledger, with the application that owns them.
  pub to_fetch: Vec<(SourceEntry, Application)>,
}

impl SourceDiff {
  pub fn is_empty(&self) -> bool {
    self.to_remove.is_empty() && self.to_fetch.is_empty()
  }
}

/// Work for the applications pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ApplicationDiff {
  /// Ledger applications whose fingerprint is not desired.
  pub to_remove: Vec<(Fingerprint, Application)>,
  /// Desired applications whose fingerprint is not in the ledger.
  pub to_install: Vec<(Fingerprint, Application)>,
  /// Names of applications present on both sides.
  pub unchanged: Vec<String>,
}

impl ApplicationDiff {
  pub fn is_empty(&self) -> bool {
    self.to_remove.is_empty() && self.to_install.is_empty()
  }
}

/// Desired (download path, source fingerprint) pairs, in configuration order.
fn desired_sources(desired: &Config, paths: &StackPaths) -> Result<Vec<(SourceEntry, Application)>, HashError> {
  desired
    .applications
    .iter()
    .map(|app| -> Result<_, HashError> {
      let entry = SourceEntry {
        path: app.download_path(paths).to_string_lossy().into_owned(),
        fingerprint: app.source_fingerprint()?,
      };
      Ok((entry, app.clone()))
    })
    .collect()
}

pub fn diff_sources(state: &StackState, desired: &Config, paths: &StackPaths) -> Result<SourceDiff, HashError> {
  let wanted = desired_sources(desired, paths)?;
  let wanted_set: BTreeSet<&SourceEntry> = wanted.iter().map(|(entry, _)| entry).collect();

  let current: Vec<SourceEntry> = state
    .downloads
    .iter()
    .map(|(path, fingerprint)| SourceEntry {
      path: path.clone(),
      fingerprint: fingerprint.clone(),
    })
    .collect();
  let current_set: BTreeSet<&SourceEntry> = current.iter().collect();

  let to_remove = current.iter().filter(|e| !wanted_set.contains(e)).cloned().collect();
  let mut seen = BTreeSet::new();
  let to_fetch = wanted
    .iter()
    .filter(|(entry, _)| !current_set.contains(entry) && seen.insert(entry.clone()))
    .cloned()
    .collect();

  Ok(SourceDiff { to_remove, to_fetch })
}

pub fn diff_applications(state: &StackState, desired: &Config) -> Result<ApplicationDiff, HashError> {
  let current = fingerprinted(&state.applications)?;
  let wanted = fingerprinted(&desired.applications)?;
  let current_set: BTreeSet<&Fingerprint> = current.iter().map(|(fp, _)| fp).collect();
  let wanted_set: BTreeSet<&Fingerprint> = wanted.iter().map(|(fp, _)| fp).collect();

  let mut diff = ApplicationDiff::default();
  for (fp, app) in &current {
    if !wanted_set.contains(fp) {
      diff.to_remove.push((fp.clone(), app.clone()));
    }
  }
  for (fp, app) in wanted {
    if current_set.contains(&fp) {
      diff.unchanged.push(app.name);
    } else {
      diff.to_install.push((fp, app));
    }
  }
  Ok(diff)
}

fn fingerprinted(apps: &[Application]) -> Result<Vec<(Fingerprint, Application)>, HashError> {
  apps
    .iter()
    .map(|app| -> Result<_, HashError> { Ok((app.content_fingerprint()?, app.clone())) })
    .collect()
}
