use std::fmt;
use std::path::Path;
use std::process::Command;

/// Operating system variants supported by pullstack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "darwin",
      Self::Windows => "windows",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Init system managing services on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitSystem {
  Upstart,
  Systemd,
  /// No supported init system was found (or the host is not Linux).
  Unknown,
}

impl InitSystem {
  /// Probe the host's init system.
  ///
  /// Upstart is recognized by `/sbin/init --version`; systemd by `systemctl`
  /// listing mount units. Probing failures are treated as "not this one".
  pub fn detect() -> Self {
    if Os::current() != Some(Os::Linux) {
      return Self::Unknown;
    }
    if probe_output("/sbin/init", &["--version"]).is_some_and(|out| out.contains("upstart")) {
      return Self::Upstart;
    }
    if probe_output("systemctl", &[]).is_some_and(|out| out.contains(".mount")) {
      return Self::Systemd;
    }
    Self::Unknown
  }
}

/// Directory systemd reads unit files from on this host.
pub fn systemd_unit_dir() -> &'static Path {
  let vendor = Path::new("/usr/lib/systemd/system");
  if vendor.is_dir() {
    vendor
  } else {
    Path::new("/etc/systemd/system")
  }
}

fn probe_output(cmd: &str, args: &[&str]) -> Option<String> {
  let out = Command::new(cmd).args(args).output().ok()?;
  if !out.status.success() {
    return None;
  }
  let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
  text.push_str(&String::from_utf8_lossy(&out.stderr));
  Some(text)
}
