//! Ambient configuration: the three environment variables the transformer recognizes, collected
//! once at process entry instead of read ad hoc from `std::env` at arbitrary call sites.

use std::path::PathBuf;

const VERBOSE_DO_STRING: &str = "LJP_VERBOSE_DO_STRING";
const KEEP_FILE: &str = "LJP_KEEP_FILE";
const WITH_PID_SUFFIX: &str = "LJP_WITH_PID_SUFFIX";

fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|v| v == "1").unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct TransformConfig {
    /// Echo each `$comp_time`/`$include` evaluation result to stdout.
    pub verbose_do_string: bool,
    /// Skip deleting the `.1.processed`/`.2.transformed` cache slots at process exit.
    pub keep_files: bool,
    /// Append `.<pid>` to both cache suffixes, so concurrent processes don't collide.
    pub with_pid_suffix: bool,
    /// Directory the cache slots are written under.
    pub cache_dir: PathBuf,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl TransformConfig {
    /// Build the configuration from the process environment, exactly the three variables named
    /// in the external-interfaces section: `LJP_VERBOSE_DO_STRING`, `LJP_KEEP_FILE`,
    /// `LJP_WITH_PID_SUFFIX`.
    pub fn from_env() -> Self {
        Self {
            verbose_do_string: env_flag(VERBOSE_DO_STRING),
            keep_files: env_flag(KEEP_FILE),
            with_pid_suffix: env_flag(WITH_PID_SUFFIX),
            cache_dir: PathBuf::from("./.luajit_pro"),
        }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_off_when_unset() {
        std::env::remove_var(VERBOSE_DO_STRING);
        std::env::remove_var(KEEP_FILE);
        std::env::remove_var(WITH_PID_SUFFIX);

        let cfg = TransformConfig::from_env();
        assert!(!cfg.verbose_do_string);
        assert!(!cfg.keep_files);
        assert!(!cfg.with_pid_suffix);
    }
}
