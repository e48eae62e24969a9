//! Host probing: operating system, init system, privilege, and directory layout.

pub mod os;
pub mod paths;

pub use os::{InitSystem, Os};
pub use paths::StackPaths;

/// Returns true when the current process runs with root (or administrator) privileges.
#[cfg(unix)]
pub fn is_elevated() -> bool {
  rustix::process::geteuid().is_root()
}

/// Returns true when the current process runs with root (or administrator) privileges.
///
/// Windows nodes always use the built-in supervisor, so privilege only affects
/// the default root directory there, which is machine-wide regardless.
#[cfg(windows)]
pub fn is_elevated() -> bool {
  true
}
