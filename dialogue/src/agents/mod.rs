//! Planner and specialist abstractions plus their model-driven implementations.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::core::error::DialogueError;
use crate::core::types::{AgentKind, GoalPatch, PlannerRequest, SpecialistRequest, SpecialistResponse};

pub mod dispatch;
pub mod planner;
pub mod prompt;
pub mod specialist;

/// Chooses which goal a user message advances.
pub trait Planner {
    fn plan(&self, request: &PlannerRequest<'_>) -> Result<GoalPatch>;
}

impl<T: Planner + ?Sized> Planner for &T {
    fn plan(&self, request: &PlannerRequest<'_>) -> Result<GoalPatch> {
        (**self).plan(request)
    }
}

/// Domain agent that works the focused goal for one dispatch pass.
pub trait Specialist {
    fn run(&self, request: &SpecialistRequest<'_>) -> Result<SpecialistResponse>;
}

impl<T: Specialist + ?Sized> Specialist for &T {
    fn run(&self, request: &SpecialistRequest<'_>) -> Result<SpecialistResponse> {
        (**self).run(request)
    }
}

/// Dispatch table from goal namespace to specialist.
#[derive(Default)]
pub struct SpecialistRegistry<'a> {
    specialists: BTreeMap<AgentKind, Box<dyn Specialist + 'a>>,
}

impl<'a> SpecialistRegistry<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `specialist` for `kind`, replacing any earlier one.
    pub fn with(mut self, kind: AgentKind, specialist: impl Specialist + 'a) -> Self {
        self.register(kind, specialist);
        self
    }

    pub fn register(&mut self, kind: AgentKind, specialist: impl Specialist + 'a) {
        self.specialists.insert(kind, Box::new(specialist));
    }

    /// Specialist for a goal type; unknown namespaces and unregistered kinds
    /// are validation errors.
    pub fn resolve(&self, goal_type: &str) -> Result<(AgentKind, &(dyn Specialist + 'a)), DialogueError> {
        let goal_type = goal_type.trim();
        let kind = AgentKind::from_goal_type(goal_type).ok_or_else(|| {
            DialogueError::validation(format!("unsupported goal type={goal_type:?}"))
        })?;
        let specialist = self.specialists.get(&kind).ok_or_else(|| {
            DialogueError::validation(format!("no specialist registered for agent={kind}"))
        })?;
        Ok((kind, specialist.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedSpecialist;

    #[test]
    fn resolves_by_namespace() {
        let sales = ScriptedSpecialist::default();
        let registry = SpecialistRegistry::new().with(AgentKind::Sales, &sales);

        let (kind, _) = registry.resolve(" sales.recommend_item ").expect("sales");
        assert_eq!(kind, AgentKind::Sales);
    }

    #[test]
    fn unknown_namespace_and_missing_registration_are_validation_errors() {
        let sales = ScriptedSpecialist::default();
        let registry = SpecialistRegistry::new().with(AgentKind::Sales, &sales);

        let err = registry.resolve("billing.refund").err().expect("namespace");
        assert!(matches!(err, DialogueError::Validation(_)));

        let err = registry.resolve("support.troubleshoot").err().expect("unregistered");
        assert_eq!(
            err,
            DialogueError::validation("no specialist registered for agent=support")
        );
    }
}
