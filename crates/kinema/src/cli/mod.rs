//! Subcommand handlers for the `kinema` binary.

pub mod config;
pub mod convert;
pub mod fetch;
pub mod serve;
pub mod tasks;

use chrono::Local;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A fresh artifact path: `<dir>/<prefix>-<YYYY-MM-DD-HH-MM-SS>-<8 hex>.<ext>`.
///
/// The random suffix keeps requests made within the same second apart.
pub fn timestamped_path(dir: &Path, prefix: &str, ext: &str) -> PathBuf {
    let stamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
    let suffix = Uuid::new_v4().simple().to_string();
    dir.join(format!("{prefix}-{stamp}-{}.{ext}", &suffix[..8]))
}
