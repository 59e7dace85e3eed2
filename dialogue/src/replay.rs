//! `dialogue replay`: run scripted turns end to end against the file stores.
//!
//! A script lists the turns to send and the model replies to serve, in the
//! order the planner and specialists will ask for them.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::agents::SpecialistRegistry;
use crate::agents::planner::ModelPlanner;
use crate::agents::specialist::LayeredSpecialist;
use crate::core::types::AgentKind;
use crate::io::config::DialogueConfig;
use crate::io::memory::{FileMemoryStore, MemoryStore, NoopMemoryStore};
use crate::io::model::{ModelReply, ScriptedModel};
use crate::io::store::FileSessionStore;
use crate::tools::ToolCatalog;
use crate::turn::{Orchestrator, TurnOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayTurn {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayScript {
    pub turns: Vec<ReplayTurn>,
    /// Served in order to whichever component calls the model next.
    pub replies: Vec<ModelReply>,
}

pub fn load_script(path: &Path) -> Result<ReplayScript> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Run every turn in order; stops at the first failing turn.
#[instrument(skip_all, fields(turns = script.turns.len(), replies = script.replies.len()))]
pub fn run_replay(script: ReplayScript, cfg: &DialogueConfig) -> Result<Vec<TurnOutcome>> {
    let store = FileSessionStore::new(&cfg.store.state_dir, cfg.store.key_prefix.clone())?;
    let memory: Box<dyn MemoryStore> = if cfg.memory.enabled {
        Box::new(FileMemoryStore::new(&cfg.memory.dir))
    } else {
        Box::new(NoopMemoryStore)
    };
    let model = ScriptedModel::new(script.replies);
    let catalog = ToolCatalog;

    let mut specialists = SpecialistRegistry::new();
    for kind in AgentKind::ALL {
        specialists.register(kind, LayeredSpecialist::new(kind, &model, &catalog)?);
    }
    let orchestrator = Orchestrator::new(
        &store,
        &*memory,
        ModelPlanner::new(&model)?,
        specialists,
        catalog,
        cfg.session.clone(),
    );

    let mut outcomes = Vec::with_capacity(script.turns.len());
    for (index, turn) in script.turns.iter().enumerate() {
        let outcome = orchestrator
            .handle_message(&turn.session_id, &turn.message)
            .with_context(|| format!("turn {} (session {})", index + 1, turn.session_id))?;
        info!(turn = index + 1, focus = ?outcome.active_goal_id, "replayed turn");
        outcomes.push(outcome);
    }

    if model.remaining() > 0 {
        warn!(unused = model.remaining(), "replay finished with unused model replies");
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::GoalStatus;
    use crate::io::model::ToolCall;
    use crate::io::store::SessionStore;
    use std::path::PathBuf;

    fn config(root: &Path) -> DialogueConfig {
        DialogueConfig::default().resolved(root)
    }

    fn turn(message: &str) -> ReplayTurn {
        ReplayTurn {
            session_id: "s1".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn replays_tool_turn_and_persists_state() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = config(temp.path());
        let script = ReplayScript {
            turns: vec![turn("what is 1500 minus 10 percent?")],
            replies: vec![
                ModelReply::text(r#"{"goal_type": "sales.recommend_item", "priority": 50}"#),
                ModelReply {
                    content: String::new(),
                    tool_calls: vec![ToolCall {
                        name: "math.evaluate".to_string(),
                        arguments: r#"{"expression": "1500 * 0.9"}"#.to_string(),
                    }],
                },
                ModelReply::text(
                    r#"{"message": "That comes to 1350.",
                        "state_updates": {"slots_patch": {"budget": 1350},
                                          "memory_update": "budget around 1350"}}"#,
                ),
            ],
        };

        let outcomes = run_replay(script, &cfg).expect("replay");

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].reply, "That comes to 1350.");
        let store = FileSessionStore::new(&cfg.store.state_dir, "session-").expect("store");
        let session = store.load("s1").expect("load").expect("persisted");
        let active = session.active_goal().expect("focus");
        assert_eq!(active.status, GoalStatus::Active);
        assert_eq!(active.slots.get("budget"), Some(&serde_json::json!(1350)));
        let memory = FileMemoryStore::new(&cfg.memory.dir);
        assert_eq!(
            memory.read_summary("default-customer").expect("memory"),
            "- budget around 1350"
        );
    }

    #[test]
    fn failing_turn_names_its_position() {
        let temp = tempfile::tempdir().expect("tempdir");
        let script = ReplayScript {
            turns: vec![turn("hello")],
            replies: vec![ModelReply::text("not json")],
        };

        let err = run_replay(script, &config(temp.path())).expect_err("bad plan");

        assert!(err.to_string().contains("turn 1 (session s1)"));
    }

    #[test]
    fn load_script_reads_json() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path: PathBuf = temp.path().join("script.json");
        fs::write(
            &path,
            r#"{"turns": [{"session_id": "s1", "message": "hi"}],
                "replies": [{"content": "{}"}]}"#,
        )
        .expect("write");

        let script = load_script(&path).expect("load");

        assert_eq!(script.turns, vec![turn("hi")]);
        assert_eq!(script.replies, vec![ModelReply::text("{}")]);
    }
}
