//! Cache slot naming and the removal list that cleans them up.
//!
//! The spec calls the removal list and its draining at process exit "external collaborators" —
//! the transformer only needs to hand the right paths to whatever owns cleanup. We model that
//! ownership as a scoped guard: acquiring the cache directory returns a [`CacheGuard`] whose
//! `Drop` impl deletes every path on the [`RemovalList`] (unless `keep_files` was requested),
//! rather than hanging cleanup off a genuine `atexit` hook or a process-wide global.

use std::{fs, path::{Path, PathBuf}, process};

use log::{debug, warn};

use crate::config::TransformConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSlot {
    Processed,
    Transformed,
}

impl CacheSlot {
    fn suffix(self) -> &'static str {
        match self {
            CacheSlot::Processed => "1.processed",
            CacheSlot::Transformed => "2.transformed",
        }
    }
}

/// Compute `<cache_dir>/<basename>.<slot>[.<pid>]` for an input file, per §6.
pub fn cache_path(config: &TransformConfig, input: &Path, slot: CacheSlot) -> PathBuf {
    let basename = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "source".to_owned());

    let mut name = format!("{basename}.{}", slot.suffix());
    if config.with_pid_suffix {
        name.push('.');
        name.push_str(&process::id().to_string());
    }

    config.cache_dir.join(name)
}

/// Process-wide list of cache paths to delete once the caller is done with them.
#[derive(Debug, Default)]
pub struct RemovalList {
    paths: Vec<PathBuf>,
}

impl RemovalList {
    pub fn push(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn drain(&mut self, keep_files: bool) {
        if keep_files {
            debug!("LJP_KEEP_FILE set, leaving {} cache file(s) on disk", self.paths.len());
            self.paths.clear();
            return;
        }

        for path in self.paths.drain(..) {
            if let Err(err) = fs::remove_file(&path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to remove cache file '{}': {err}", path.display());
                }
            }
        }
    }
}

/// Ensures the cache directory exists and owns the [`RemovalList`] for the files written into it
/// during this guard's lifetime; dropping the guard drains the list.
pub struct CacheGuard {
    config: TransformConfig,
    removals: RemovalList,
}

impl CacheGuard {
    pub fn acquire(config: TransformConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.cache_dir)?;
        Ok(Self {
            config,
            removals: RemovalList::default(),
        })
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    pub fn track(&mut self, path: PathBuf) {
        self.removals.push(path);
    }
}

impl Drop for CacheGuard {
    fn drop(&mut self) {
        self.removals.drain(self.config.keep_files);
    }
}
