//! Wire-format DTOs for workflow graphs, used by the campaign HTTP API and
//! by operator tooling that authors workflows as JSON rather than Rust
//! literals.

use serde::{Deserialize, Serialize};

use super::{Edge, Node, WorkflowGraph};
use crate::error::VoxResult;

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkflowGraphDto {
    pub name: String,
    pub entry_node: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl WorkflowGraphDto {
    /// Parse and validate a workflow graph from its JSON representation.
    pub fn parse(json: &str) -> VoxResult<WorkflowGraph> {
        let dto: WorkflowGraphDto = serde_json::from_str(json)?;
        let graph = WorkflowGraph {
            id: uuid::Uuid::new_v4(),
            name: dto.name,
            entry_node: dto.entry_node,
            nodes: dto.nodes,
            edges: dto.edges,
        };
        graph.validate()?;
        Ok(graph)
    }
}
