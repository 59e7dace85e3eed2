//! Session persistence: the [`SessionStore`] seam and a file-backed store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use jsonschema::{Draft, Validator};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::error::DialogueError;
use crate::core::invariants::check_session;
use crate::core::types::SessionState;

const SESSION_SCHEMA: &str = include_str!("../../schemas/session_state.schema.json");

/// Durable storage for [`SessionState`], keyed by session id.
pub trait SessionStore {
    /// `Ok(None)` means no state has been persisted for `session_id`.
    fn load(&self, session_id: &str) -> Result<Option<SessionState>>;
    fn save(&self, session: &SessionState) -> Result<()>;
    fn delete(&self, session_id: &str) -> Result<()>;
}

impl<T: SessionStore + ?Sized> SessionStore for &T {
    fn load(&self, session_id: &str) -> Result<Option<SessionState>> {
        (**self).load(session_id)
    }

    fn save(&self, session: &SessionState) -> Result<()> {
        (**self).save(session)
    }

    fn delete(&self, session_id: &str) -> Result<()> {
        (**self).delete(session_id)
    }
}

/// One pretty-printed JSON document per session under `dir`.
///
/// Documents are named `<key_prefix><session_id>.json`, validated against the
/// embedded session schema and the session invariants on load, and replaced
/// atomically on save.
pub struct FileSessionStore {
    dir: PathBuf,
    key_prefix: String,
    validator: Validator,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>, key_prefix: impl Into<String>) -> Result<Self> {
        let schema: Value =
            serde_json::from_str(SESSION_SCHEMA).context("parse session schema")?;
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&schema)
            .map_err(|err| anyhow!("compile session schema: {err}"))?;
        Ok(Self {
            dir: dir.into(),
            key_prefix: key_prefix.into(),
            validator,
        })
    }

    /// Path of the document for `session_id`; rejects ids that could escape `dir`.
    pub fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(DialogueError::validation("session id is empty").into());
        }
        if session_id.contains(['/', '\\']) || session_id == "." || session_id == ".." {
            return Err(
                DialogueError::validation(format!("session id={session_id:?} is not a file name"))
                    .into(),
            );
        }
        Ok(self
            .dir
            .join(format!("{}{}.json", self.key_prefix, session_id)))
    }

    /// Read the raw document without deserializing it.
    pub fn read_raw(&self, session_id: &str) -> Result<Option<String>> {
        let path = self.path_for(session_id)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("read session {}", path.display())),
        }
    }

    fn validate_schema(&self, path: &Path, value: &Value) -> Result<()> {
        if self.validator.is_valid(value) {
            return Ok(());
        }
        let messages = self
            .validator
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        Err(DialogueError::state(format!(
            "session schema validation failed for {}: {}",
            path.display(),
            messages.join("; ")
        ))
        .into())
    }
}

impl SessionStore for FileSessionStore {
    #[instrument(skip_all, fields(session_id = %session_id))]
    fn load(&self, session_id: &str) -> Result<Option<SessionState>> {
        let path = self.path_for(session_id)?;
        let Some(contents) = self.read_raw(session_id)? else {
            debug!(path = %path.display(), "no persisted session");
            return Ok(None);
        };
        let value: Value =
            serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
        self.validate_schema(&path, &value)?;
        let session: SessionState = serde_json::from_value(value)
            .with_context(|| format!("deserialize session {}", path.display()))?;
        if session.session_id != session_id.trim() {
            return Err(DialogueError::state(format!(
                "{} holds session_id={:?}",
                path.display(),
                session.session_id
            ))
            .into());
        }
        check_session(&session)?;
        Ok(Some(session))
    }

    #[instrument(skip_all, fields(session_id = %session.session_id))]
    fn save(&self, session: &SessionState) -> Result<()> {
        let path = self.path_for(&session.session_id)?;
        let mut buf = serde_json::to_string_pretty(session).context("serialize session")?;
        buf.push('\n');
        write_atomic(&path, &buf)?;
        debug!(path = %path.display(), "saved session");
        Ok(())
    }

    #[instrument(skip_all, fields(session_id = %session_id))]
    fn delete(&self, session_id: &str) -> Result<()> {
        let path = self.path_for(session_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(DialogueError::not_found(format!("session id={}", session_id.trim())).into())
            }
            Err(err) => Err(err).with_context(|| format!("delete session {}", path.display())),
        }
    }
}

/// Temp file + rename so readers never observe a partial document.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{ErrorKind as DialogueErrorKind, classify};
    use crate::core::types::GoalStatus;
    use crate::test_support::{goal, session_with_goals, t0};

    fn store(dir: &Path) -> FileSessionStore {
        FileSessionStore::new(dir, "session-").expect("store")
    }

    fn focused_session() -> SessionState {
        let mut st = session_with_goals(vec![
            goal("support", "support.troubleshoot", GoalStatus::Active, 100),
            goal("sales", "sales.recommend_item", GoalStatus::Active, 50),
        ]);
        st.suspend_and_activate("support", t0()).expect("support");
        st.suspend_and_activate("sales", t0()).expect("sales");
        st.goal_mut("sales")
            .expect("sales")
            .set_slot("budget", serde_json::json!(1500));
        st
    }

    #[test]
    fn load_missing_session_is_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(store(temp.path()).load("s1").expect("load").is_none());
    }

    #[test]
    fn save_then_load_preserves_state() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path());
        let session = focused_session();

        store.save(&session).expect("save");

        assert!(temp.path().join("session-s1.json").exists());
        assert!(!temp.path().join("session-s1.json.tmp").exists());
        assert_eq!(store.load("s1").expect("load"), Some(session));
    }

    #[test]
    fn load_rejects_schema_violations() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join("session-s1.json"),
            r#"{"session_id":"s1","workspace_id":"w","customer_id":"c","channel_type":"chat",
                "updated_at":"2025-01-01T09:00:00Z",
                "goals":{"g":{"id":"g","type":"sales.x","status":"paused","priority":1,
                               "updated_at":"2025-01-01T09:00:00Z"}}}"#,
        )
        .expect("write");

        let err = store(temp.path()).load("s1").expect_err("schema");
        assert_eq!(classify(&err), Some(DialogueErrorKind::State));
        assert!(format!("{err:#}").contains("schema validation failed"));
    }

    #[test]
    fn load_rejects_invariant_violations() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut session = focused_session();
        session.goal_stack.push("ghost".to_string());
        let mut buf = serde_json::to_string_pretty(&session).expect("json");
        buf.push('\n');
        fs::write(temp.path().join("session-s1.json"), buf).expect("write");

        let err = store(temp.path()).load("s1").expect_err("invariants");
        assert!(err.to_string().contains("goal stack corrupt"));
    }

    /// Documents written before `goal_stack` existed still load.
    #[test]
    fn load_accepts_documents_without_optional_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join("session-s1.json"),
            r#"{"session_id":"s1","workspace_id":"w","customer_id":"c","channel_type":"chat",
                "updated_at":"2025-01-01T09:00:00Z"}"#,
        )
        .expect("write");

        let session = store(temp.path()).load("s1").expect("load").expect("some");
        assert!(session.goal_stack.is_empty());
        assert!(session.goals.is_empty());
        assert!(session.active_goal_id.is_none());
    }

    #[test]
    fn rejects_ids_that_are_not_file_names() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path());
        for id in ["", "  ", "../escape", "a/b", "..", "a\\b"] {
            let err = store.load(id).expect_err(id);
            assert_eq!(classify(&err), Some(DialogueErrorKind::Validation), "{id}");
        }
    }

    #[test]
    fn delete_removes_document_and_reports_missing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path());
        store.save(&focused_session()).expect("save");

        store.delete("s1").expect("delete");
        assert!(store.load("s1").expect("load").is_none());

        let err = store.delete("s1").expect_err("gone");
        assert_eq!(classify(&err), Some(DialogueErrorKind::NotFound));
    }
}
