//! Long-term customer memory: the [`MemoryStore`] seam and its backends.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::error::DialogueError;

/// Per-customer conversational summary.
pub trait MemoryStore {
    /// Empty string when nothing is remembered.
    fn read_summary(&self, customer_id: &str) -> Result<String>;
    fn write_summary(&self, customer_id: &str, text: &str) -> Result<()>;
}

impl<T: MemoryStore + ?Sized> MemoryStore for &T {
    fn read_summary(&self, customer_id: &str) -> Result<String> {
        (**self).read_summary(customer_id)
    }

    fn write_summary(&self, customer_id: &str, text: &str) -> Result<()> {
        (**self).write_summary(customer_id, text)
    }
}

/// Remembers nothing. Used when memory is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMemoryStore;

impl MemoryStore for NoopMemoryStore {
    fn read_summary(&self, _customer_id: &str) -> Result<String> {
        Ok(String::new())
    }

    fn write_summary(&self, _customer_id: &str, _text: &str) -> Result<()> {
        Ok(())
    }
}

/// One markdown file per customer; each non-empty update is appended as a line.
#[derive(Debug, Clone)]
pub struct FileMemoryStore {
    dir: PathBuf,
}

impl FileMemoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, customer_id: &str) -> Result<PathBuf> {
        let customer_id = customer_id.trim();
        if customer_id.is_empty()
            || customer_id.contains(['/', '\\'])
            || customer_id == "."
            || customer_id == ".."
        {
            return Err(
                DialogueError::validation(format!("customer id={customer_id:?} is not a file name"))
                    .into(),
            );
        }
        Ok(self.dir.join(format!("{customer_id}.md")))
    }
}

impl MemoryStore for FileMemoryStore {
    fn read_summary(&self, customer_id: &str) -> Result<String> {
        let path = self.path_for(customer_id)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(contents.trim().to_string()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(err).with_context(|| format!("read memory {}", path.display())),
        }
    }

    #[instrument(skip_all, fields(customer_id = %customer_id))]
    fn write_summary(&self, customer_id: &str, text: &str) -> Result<()> {
        let path = self.path_for(customer_id)?;
        let text = text.trim();
        if text.is_empty() {
            debug!("empty memory update; nothing to write");
            return Ok(());
        }
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create memory dir {}", self.dir.display()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open memory {}", path.display()))?;
        writeln!(file, "- {}", text.replace('\n', " "))
            .with_context(|| format!("append memory {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_store_remembers_nothing() {
        let store = NoopMemoryStore;
        store.write_summary("c1", "likes mice").expect("write");
        assert_eq!(store.read_summary("c1").expect("read"), "");
    }

    #[test]
    fn unknown_customer_reads_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path().join("memory"));
        assert_eq!(store.read_summary("c1").expect("read"), "");
    }

    #[test]
    fn appends_non_empty_updates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path().join("memory"));

        store.write_summary("c1", " prefers wireless ").expect("first");
        store.write_summary("c1", "   ").expect("empty");
        store.write_summary("c1", "budget\naround 1500").expect("second");

        assert_eq!(
            store.read_summary("c1").expect("read"),
            "- prefers wireless\n- budget around 1500"
        );
        assert_eq!(store.read_summary("c2").expect("other"), "");
    }

    #[test]
    fn empty_update_does_not_create_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("memory");
        FileMemoryStore::new(&dir).write_summary("c1", "").expect("write");
        assert!(!dir.exists());
    }

    #[test]
    fn rejects_path_like_customer_ids() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path());
        assert!(store.read_summary("../c1").is_err());
        assert!(store.write_summary("", "x").is_err());
    }
}
