//! Loading test declarations from YAML files.
//!
//! A test directory holds any number of `*.yml` / `*.yaml` files, each a YAML
//! sequence of test mappings:
//!
//! ```yaml
//! - name: orders_complete
//!   function: test_completeness
//!   dataset: sales
//!   table: orders
//!   columns_to_test: [id, customer_id]
//!
//! - name: revenue_positive
//!   function: test_custom
//!   select: SELECT SUM(amount) AS total FROM orders
//!   assert: df[0]['total'] > 0
//! ```

use crate::core::TestDeclaration;
use crate::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Reads every test definition file in a directory.
#[derive(Debug, Clone)]
pub struct TestLoader {
    dir: PathBuf,
}

impl TestLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory being scanned.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Definition files in the directory, sorted by path. Not recursive.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Err(TermError::Configuration(format!(
                "test directory '{}' does not exist",
                self.dir.display()
            )));
        }

        let dir = self.dir.to_str().ok_or_else(|| {
            TermError::Configuration(format!(
                "test directory '{}' is not valid UTF-8",
                self.dir.display()
            ))
        })?;
        // The directory is matched literally, only the file name is a pattern.
        let dir = PathBuf::from(glob::Pattern::escape(dir));

        let mut files = Vec::new();
        for extension in ["yml", "yaml"] {
            let pattern = dir.join(format!("*.{extension}"));
            let pattern = pattern.to_string_lossy();
            let paths = glob::glob(&pattern)
                .map_err(|e| TermError::Configuration(format!("invalid glob pattern: {e}")))?;
            for entry in paths {
                let path = entry.map_err(|e| TermError::Io(e.into()))?;
                if path.is_file() {
                    files.push(path);
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// Loads and concatenates the declarations of every file.
    #[instrument(skip(self), fields(loader.dir = %self.dir.display()))]
    pub fn load(&self) -> Result<Vec<TestDeclaration>> {
        let mut declarations = Vec::new();
        for path in self.files()? {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let loaded = Self::load_str(&content)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            debug!(file = %path.display(), tests = loaded.len(), "Loaded test file");
            declarations.extend(loaded);
        }
        info!(tests = declarations.len(), "Loaded test declarations");
        Ok(declarations)
    }

    /// Parses one YAML document holding a sequence of declarations.
    ///
    /// A blank document (or a bare `null`) contains no tests.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use term_runner::loader::TestLoader;
    ///
    /// let tests = TestLoader::load_str(
    ///     "- function: test_uniqueness\n  table: orders\n  columns_to_test: [id]\n",
    /// )
    /// .unwrap();
    /// assert_eq!(tests[0].columns_to_test.as_deref(), Some(&["id".to_string()][..]));
    /// ```
    pub fn load_str(content: &str) -> Result<Vec<TestDeclaration>> {
        let blank = content.lines().all(|line| {
            let line = line.trim();
            line.is_empty() || line.starts_with('#')
        });
        if blank {
            return Ok(Vec::new());
        }
        let parsed: Option<Vec<TestDeclaration>> = serde_yaml::from_str(content)?;
        Ok(parsed.unwrap_or_default())
    }
}
