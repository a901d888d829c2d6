//! Transformer Driver: the top-level per-file pipeline tying the macro-preprocessor,
//! lexer, and rewriter together and owning the cache lifecycle.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use log::debug;

use crate::{
    buffer::LineBuffer,
    cache::{self, CacheGuard, CacheSlot},
    config::TransformConfig,
    error::{TransformError, TransformResult},
    lexer::Lexer,
    rewriter::{IncludeContext, Rewriter},
};

const SENTINEL: &str = "--[[luajit-pro]]";
const SENTINEL_REPLACEMENT: &str = "--[[luajit-pro]] local ipairs, _tinsert = ipairs, table.insert";
const PREPROCESS_DISABLE_DIRECTIVE: &str = "preprocess: false";

pub struct Driver {
    guard: CacheGuard,
    visited: HashSet<PathBuf>,
}

impl Driver {
    pub fn new(config: TransformConfig) -> std::io::Result<Self> {
        Ok(Self {
            guard: CacheGuard::acquire(config)?,
            visited: HashSet::new(),
        })
    }

    /// Transform `path`, returning the path it was ultimately read from: either the original
    /// input (if it lacks the sentinel) or the `.2.transformed` cache slot.
    pub fn transform(&mut self, path: &Path) -> TransformResult<PathBuf> {
        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if !self.visited.insert(canonical.clone()) {
            return Err(TransformError::Include {
                file: path.display().to_string(),
                line: 0,
                module: path.display().to_string(),
                message: "cyclic $include detected".to_owned(),
            });
        }

        let source = fs::read_to_string(path).map_err(|source| TransformError::Input {
            path: path.to_path_buf(),
            source,
        })?;

        let Some(first_line) = source.lines().next() else {
            self.visited.remove(&canonical);
            return Ok(path.to_path_buf());
        };

        if !first_line.contains(SENTINEL) {
            debug!("{}: no sentinel, passing through unchanged", path.display());
            self.visited.remove(&canonical);
            return Ok(path.to_path_buf());
        }

        debug!("{}: transforming", path.display());
        let skip_preprocessor = first_line.contains(PREPROCESS_DISABLE_DIRECTIVE);

        let config = self.guard.config().clone();
        let processed_path = cache::cache_path(&config, path, CacheSlot::Processed);
        let transformed_path = cache::cache_path(&config, path, CacheSlot::Transformed);

        let processed_source = if skip_preprocessor {
            fs::write(&processed_path, &source).map_err(|source| TransformError::Input {
                path: processed_path.clone(),
                source,
            })?;
            source
        } else {
            run_macro_preprocessor(path, &processed_path)?
        };
        self.guard.track(processed_path.clone());

        let mut lines: Vec<String> = processed_source.lines().map(str::to_owned).collect();
        if lines.is_empty() {
            lines.push(String::new());
        }
        lines[0] = SENTINEL_REPLACEMENT.to_owned();
        let mut buffer = LineBuffer::from_source(&lines.join("\n"));

        let tokens = Lexer::new(&buffer.to_source())
            .lex()
            .map_err(|err| TransformError::structural(&path.display().to_string(), Default::default(), err.to_string()))?;

        {
            let filename = path.display().to_string();
            let mut rewriter = Rewriter::new(&tokens, &mut buffer, filename, &config);
            rewriter.run(self)?;
        }

        let transformed_source = buffer.to_source();
        fs::write(&transformed_path, &transformed_source).map_err(|source| TransformError::Input {
            path: transformed_path.clone(),
            source,
        })?;
        self.guard.track(transformed_path.clone());

        self.visited.remove(&canonical);
        Ok(transformed_path)
    }
}

impl IncludeContext for Driver {
    fn transform_include(&mut self, path: &Path) -> TransformResult<PathBuf> {
        self.transform(path)
    }
}

/// Run `cpp <file> -E | sed '/^#/d'` and return its stdout as a string, used as the character
/// level macro-preprocessing stage ahead of tokenization.
fn run_macro_preprocessor(input: &Path, processed_path: &Path) -> TransformResult<String> {
    let cpp = Command::new("cpp")
        .arg(input)
        .arg("-E")
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|source| TransformError::Input {
            path: input.to_path_buf(),
            source,
        })?;

    let output = cpp.wait_with_output().map_err(|source| TransformError::Input {
        path: input.to_path_buf(),
        source,
    })?;

    let raw = String::from_utf8_lossy(&output.stdout);
    let filtered: String = raw
        .lines()
        .filter(|line| !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");

    fs::write(processed_path, &filtered).map_err(|source| TransformError::Input {
        path: processed_path.to_path_buf(),
        source,
    })?;

    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn files_without_sentinel_pass_through_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "plain.lua", "local x = 1\n");
        let config = TransformConfig::default().with_cache_dir(dir.path().join(".cache"));
        let mut driver = Driver::new(config).unwrap();

        let out = driver.transform(&path).unwrap();
        assert_eq!(out, path);
    }

    #[test]
    fn missing_file_surfaces_as_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = TransformConfig::default().with_cache_dir(dir.path().join(".cache"));
        let mut driver = Driver::new(config).unwrap();

        let err = driver.transform(Path::new("/nonexistent/does-not-exist.lua")).unwrap_err();
        assert!(matches!(err, TransformError::Input { .. }));
    }
}
