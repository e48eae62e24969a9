//! Status command implementation.
//!
//! Displays the ledger: applied applications with their fingerprints, and
//! cached downloads.

use std::time::SystemTime;

use anyhow::{Context, Result};

use pullstack_lib::ledger::StackState;
use pullstack_lib::settings::Settings;

use super::runtime;
use crate::output::{print_applications, print_downloads, print_info, print_json, print_stat, print_success};

pub fn cmd_status(verbose: bool, json: bool) -> Result<()> {
  let settings = Settings::from_env().context("Invalid settings")?;
  let paths = settings.paths();
  let ledger = paths.ledger_file();

  let rt = runtime()?;
  let state = rt
    .block_on(StackState::load(&ledger))
    .context("Failed to load ledger")?;
  let updated = std::fs::metadata(&ledger).and_then(|m| m.modified()).ok();

  let mut applications = Vec::with_capacity(state.applications.len());
  for app in &state.applications {
    let fingerprint = app
      .content_fingerprint()
      .with_context(|| format!("Failed to fingerprint application '{}'", app.name))?;
    applications.push((app, fingerprint));
  }

  if json {
    let app_list: Vec<_> = applications
      .iter()
      .map(|(app, fingerprint)| {
        serde_json::json!({
          "name": app.name,
          "fingerprint": fingerprint,
          "source": app.source.to_string(),
          "service": app.has_service().then(|| app.service_name()),
        })
      })
      .collect();
    let download_list: Vec<_> = state
      .downloads
      .iter()
      .map(|(path, fingerprint)| serde_json::json!({ "path": path, "fingerprint": fingerprint }))
      .collect();
    let json_output = serde_json::json!({
      "root": paths.root(),
      "updated_at": updated.map(format_time),
      "applications": app_list,
      "downloads": download_list,
    });
    return print_json(&json_output);
  }

  if state.applications.is_empty() && state.downloads.is_empty() {
    print_info("Nothing applied yet. Run 'pullstack apply <config>' to deploy.");
    return Ok(());
  }

  print_success(&format!("Root: {}", paths.root().display()));
  if let Some(updated) = updated {
    print_stat("Updated", &format_time(updated));
  }
  print_stat("Applications", &state.applications.len().to_string());
  print_stat("Downloads", &state.downloads.len().to_string());

  if !applications.is_empty() {
    print_applications(&applications, verbose);
  }
  if verbose && !state.downloads.is_empty() {
    print_downloads(&state.downloads);
  }

  Ok(())
}

fn format_time(time: SystemTime) -> String {
  humantime::format_rfc3339_seconds(time).to_string()
}
