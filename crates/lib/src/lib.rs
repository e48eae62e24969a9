//! pullstack-lib: pull-based deployment for a single node
//!
//! The crate is organised around one control flow: a watcher notices that
//! the configuration changed, the cross-process lock is taken, and the
//! reconciliation engine moves the node from the state recorded in the
//! ledger to the desired state.
//! - `Config`: the desired applications, parsed from YAML
//! - `StackState`: the ledger of what is currently deployed
//! - `reconcile`: the ordered diff/apply engine
//! - `service`: the native service managers and the builtin supervisor
//! - `watch`: change detection and the retrying apply loop

pub mod apply;
pub mod archive;
pub mod config;
pub mod consts;
pub mod context;
pub mod ledger;
pub mod lock;
pub mod platform;
pub mod reconcile;
pub mod service;
pub mod settings;
pub mod storage;
pub mod util;
pub mod watch;
