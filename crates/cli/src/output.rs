//! Terminal rendering for pullstack: status lines, reconcile and validation
//! reports, and the ledger listing.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};

use pullstack_lib::apply::ApplyOutcome;
use pullstack_lib::config::Application;
use pullstack_lib::ledger::ValidationReport;
use pullstack_lib::reconcile::ReconcileReport;
use pullstack_lib::util::hash::Fingerprint;

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    format!("{}m {}s", secs / 60, secs % 60)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// What ledger validation had to repair before reconciling.
pub fn print_validation(report: &ValidationReport) {
  for name in &report.pruned_applications {
    print_warning(&format!("Application '{}' was incomplete and has been reset", name));
  }
  for path in &report.pruned_downloads {
    print_warning(&format!("Download {} was missing and has been forgotten", path));
  }
  for service in &report.removed_services {
    print_info(&format!("Removed orphaned service {}", service));
  }
}

/// One line naming every non-zero count, e.g. `1 download fetched, 2
/// applications installed`.
pub fn summarize(report: &ReconcileReport) -> String {
  let counts = [
    (report.downloads_fetched, "download", "fetched"),
    (report.downloads_removed, "download", "removed"),
    (report.applications_installed, "application", "installed"),
    (report.applications_removed, "application", "removed"),
  ];
  let parts: Vec<String> = counts
    .iter()
    .filter(|(n, _, _)| *n > 0)
    .map(|(n, noun, verb)| format!("{} {}{} {}", n, noun, if *n == 1 { "" } else { "s" }, verb))
    .collect();
  if parts.is_empty() {
    "nothing to do".to_string()
  } else {
    parts.join(", ")
  }
}

/// Full report for a one-shot apply.
pub fn print_reconcile_report(report: &ReconcileReport, took: Duration) {
  if report.is_noop() {
    print_success("Already up to date");
  } else {
    print_success("Apply complete");
  }
  print_stat("Downloads fetched", &report.downloads_fetched.to_string());
  print_stat("Downloads removed", &report.downloads_removed.to_string());
  print_stat("Applications installed", &report.applications_installed.to_string());
  print_stat("Applications removed", &report.applications_removed.to_string());
  print_stat("Applications unchanged", &report.applications_unchanged.to_string());
  print_stat("Took", &format_duration(took));
}

/// Compact report for each apply in the watch loop. No-op applies stay quiet.
pub fn print_watch_apply(outcome: &ApplyOutcome) {
  print_validation(&outcome.validation);
  if !outcome.report.is_noop() {
    print_success(&format!("Applied: {}", summarize(&outcome.report)));
  }
}

/// The applied applications, with their short fingerprints and services.
pub fn print_applications(applications: &[(&Application, Fingerprint)], verbose: bool) {
  println!();
  println!("Applications:");
  for (app, fingerprint) in applications {
    let service = if app.has_service() {
      format!(" ({})", app.service_name())
    } else {
      String::new()
    };
    println!("  {} {} {}{}", symbols::INFO, app.name, fingerprint.short(), service);
    if verbose {
      println!("      source: {}", app.source);
    }
  }
}

/// Cached downloads and the fingerprint of the source each came from.
pub fn print_downloads(downloads: &BTreeMap<String, Fingerprint>) {
  println!();
  println!("Downloads:");
  for (path, fingerprint) in downloads {
    println!("  {} {} {}", symbols::INFO, path, fingerprint.short());
  }
}
