//! Output sinks: where a finished (or cancelled) run's text is persisted.
//!
//! The coordinator serialises runs per [`OutputSink::target`]; two sinks with
//! the same target are treated as the same destination.

use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;
use tracing::debug;

/// Destination for a run's text.
pub trait OutputSink: Send + Sync {
    /// Stable identifier of the destination, e.g. the output file path.
    fn target(&self) -> &str;

    /// Persist `text` for the document called `name`.
    ///
    /// Called at most once per run, from a blocking thread.
    fn write(&self, name: &str, text: &str) -> io::Result<()>;
}

/// Writes the text to a file, atomically.
///
/// The text goes to a temporary file in the destination directory first and
/// is renamed over the target, so readers never see a half-written file.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    target: String,
}

impl FileSink {
    /// The path is made absolute and normalised, so `out.txt`, `./out.txt`
    /// and `/work/out.txt` all name the same target.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = normalize_path(&path.into());
        let target = path.to_string_lossy().into_owned();
        Self { path, target }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for FileSink {
    fn target(&self) -> &str {
        &self.target
    }

    fn write(&self, name: &str, text: &str) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!(
            "Wrote {} bytes for '{}' to {}",
            text.len(),
            name,
            self.path.display()
        );
        Ok(())
    }
}

/// Absolute form of `path` with `.` and `..` resolved lexically, and the
/// parent directory canonicalised when it already exists.
fn normalize_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut clean = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            other => clean.push(other),
        }
    }

    match (clean.parent(), clean.file_name()) {
        (Some(parent), Some(name)) => match parent.canonicalize() {
            Ok(parent) => parent.join(name),
            Err(_) => clean,
        },
        _ => clean,
    }
}

/// Keeps every write in memory. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    target: String,
    writes: Mutex<Vec<(String, String)>>,
}

impl MemorySink {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Text of the most recent write, if any.
    pub fn contents(&self) -> Option<String> {
        self.writes().pop().map(|(_, text)| text)
    }

    /// All `(name, text)` pairs written so far, oldest first.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl OutputSink for MemorySink {
    fn target(&self) -> &str {
        &self.target
    }

    fn write(&self, name: &str, text: &str) -> io::Result<()> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.to_string(), text.to_string()));
        Ok(())
    }
}
