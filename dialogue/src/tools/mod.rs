//! Tool gateway and the per-namespace tool catalog.

pub mod math;

use anyhow::Result;
use serde_json::json;
use tracing::{debug, instrument};

use crate::core::types::{AgentKind, ToolRequest, ToolResult};
use crate::io::model::ToolSpec;

pub const INVENTORY_QUERY: &str = "inventory.query";
pub const KNOWLEDGE_BASE_SEARCH: &str = "knowledge_base.search";

/// Executes specialist tool requests on behalf of an agent namespace.
pub trait ToolGateway {
    /// Run `requests` in order; one result per request.
    fn execute(&self, agent: AgentKind, requests: &[ToolRequest]) -> Result<Vec<ToolResult>>;
}

impl<T: ToolGateway + ?Sized> ToolGateway for &T {
    fn execute(&self, agent: AgentKind, requests: &[ToolRequest]) -> Result<Vec<ToolResult>> {
        (**self).execute(agent, requests)
    }
}

/// Built-in catalog: which tools each namespace may call, and local execution
/// for the ones implemented in-process.
///
/// Tools without a local implementation answer with an error result rather
/// than failing the turn, so the specialist can still finalize.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolCatalog;

impl ToolCatalog {
    /// Tools advertised to the `agent` specialist.
    pub fn specs_for(&self, agent: AgentKind) -> Vec<ToolSpec> {
        let lookup = match agent {
            AgentKind::Sales => ToolSpec {
                name: INVENTORY_QUERY,
                description: "Query product inventory, stock, and price by user constraints.",
                parameters: string_param("query", "Natural language query"),
            },
            AgentKind::Support => ToolSpec {
                name: KNOWLEDGE_BASE_SEARCH,
                description: "Search troubleshooting knowledge base and return evidence snippets.",
                parameters: string_param("query", "Troubleshooting query"),
            },
        };
        vec![
            lookup,
            ToolSpec {
                name: math::MATH_EVALUATE,
                description: "Evaluate a mathematical expression.",
                parameters: string_param("expression", "Expression to evaluate"),
            },
        ]
    }

    pub fn allows(&self, agent: AgentKind, tool: &str) -> bool {
        self.specs_for(agent).iter().any(|spec| spec.name == tool)
    }

    fn execute_one(&self, agent: AgentKind, request: &ToolRequest) -> ToolResult {
        let tool = request.tool.trim();
        match tool {
            math::MATH_EVALUATE => math::execute(&request.args),
            _ => ToolResult::failed(tool, format!("tool={tool} is unavailable for agent={agent}")),
        }
    }
}

impl ToolGateway for ToolCatalog {
    #[instrument(skip_all, fields(agent = %agent, requests = requests.len()))]
    fn execute(&self, agent: AgentKind, requests: &[ToolRequest]) -> Result<Vec<ToolResult>> {
        let results = requests
            .iter()
            .map(|request| {
                let result = self.execute_one(agent, request);
                debug!(tool = %result.tool, failed = result.error.is_some(), "tool executed");
                result
            })
            .collect();
        Ok(results)
    }
}

fn string_param(name: &str, description: &str) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": { name: { "type": "string", "description": description } },
        "required": [name],
    })
}
