//! Workflow graph definition and validation.
//!
//! A workflow is a directed graph of conversation [`Node`]s connected by
//! [`Edge`]s. The conversational engine walks this graph one node at a time,
//! choosing an outgoing edge once a node's exit condition is satisfied.
//! Validation happens once, at load time, so the engine itself never has to
//! handle a dangling reference mid-call.

pub mod dto;

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{VoxError, VoxResult};

/// The condition under which an [`Edge`] is taken out of its source node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "condition_type", rename_all = "snake_case")]
pub enum EdgeCondition {
    /// Always taken once the source node's turn strategy considers it done
    /// speaking (the default, unconditional edge).
    Always,
    /// Taken when a gathered variable equals a specific value.
    VariableEquals { variable: String, value: serde_json::Value },
    /// Taken when the LLM's free-form classification of the last utterance
    /// matches one of `labels` (e.g. intent routing).
    IntentMatches { labels: Vec<String> },
    /// Taken when a named tool call completed successfully on this node.
    ToolSucceeded { tool_name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub id: String,
    pub from_node: String,
    pub to_node: String,
    pub condition: EdgeCondition,
    /// Edges are evaluated in ascending priority order; the first whose
    /// condition matches is taken.
    pub priority: i32,
    /// Human-readable label, registered with the LLM as the name of the
    /// transition function this edge becomes while its source node is
    /// active. Defaults to the edge id if left blank.
    #[serde(default)]
    pub label: String,
}

impl Edge {
    /// The label to register this edge's transition function under:
    /// `label` if set, otherwise `id`, slugified into a valid function name.
    pub fn function_name(&self) -> String {
        let source = if self.label.is_empty() { self.id.as_str() } else { self.label.as_str() };
        source
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A conversational turn: the agent speaks (from `prompt` or a static
    /// `message`) and waits for the caller's response.
    Conversation,
    /// A terminal node; reaching it ends the call.
    Terminal,
    /// Hands the call off to a human or another workflow.
    Transfer,
    /// Executes a tool without speaking, then immediately transitions.
    ToolOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    /// Instructions appended to the engine's system prompt while this node
    /// is active.
    pub prompt: Option<String>,
    /// A fixed message spoken verbatim instead of an LLM-generated one.
    pub message: Option<String>,
    /// Names of tools the engine may call while in this node.
    pub available_tools: Vec<String>,
    /// Variables this node's exit conditions may depend on, to be extracted
    /// from the conversation before an edge is evaluated.
    pub extract_variables: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub id: Uuid,
    pub name: String,
    pub entry_node: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl WorkflowGraph {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Outgoing edges of `node_id`, sorted by ascending priority.
    pub fn edges_from(&self, node_id: &str) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self.edges.iter().filter(|e| e.from_node == node_id).collect();
        edges.sort_by_key(|e| e.priority);
        edges
    }

    /// Validate structural integrity: the entry node exists, every edge
    /// references real nodes, every non-terminal node has at least one
    /// outgoing edge, and every node is reachable from the entry node.
    pub fn validate(&self) -> VoxResult<()> {
        let node_ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();

        if !node_ids.contains(self.entry_node.as_str()) {
            return Err(VoxError::InvalidWorkflowGraph(format!(
                "entry node '{}' does not exist",
                self.entry_node
            )));
        }

        let mut seen_ids = HashSet::new();
        for node in &self.nodes {
            if !seen_ids.insert(node.id.as_str()) {
                return Err(VoxError::InvalidWorkflowGraph(format!("duplicate node id '{}'", node.id)));
            }
        }

        for edge in &self.edges {
            if !node_ids.contains(edge.from_node.as_str()) {
                return Err(VoxError::UnknownNode(edge.from_node.clone()));
            }
            if !node_ids.contains(edge.to_node.as_str()) {
                return Err(VoxError::UnknownNode(edge.to_node.clone()));
            }
        }

        for node in &self.nodes {
            if node.kind == NodeKind::Terminal {
                continue;
            }
            if self.edges_from(&node.id).is_empty() {
                return Err(VoxError::InvalidWorkflowGraph(format!(
                    "non-terminal node '{}' has no outgoing edges",
                    node.id
                )));
            }
        }

        let reachable = self.reachable_from(&self.entry_node);
        for node in &self.nodes {
            if !reachable.contains(node.id.as_str()) {
                return Err(VoxError::InvalidWorkflowGraph(format!(
                    "node '{}' is unreachable from the entry node",
                    node.id
                )));
            }
        }

        Ok(())
    }

    fn reachable_from<'a>(&'a self, start: &'a str) -> HashSet<&'a str> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);
        visited.insert(start);
        while let Some(current) = queue.pop_front() {
            for edge in self.edges_from(current) {
                if visited.insert(edge.to_node.as_str()) {
                    queue.push_back(edge.to_node.as_str());
                }
            }
        }
        visited
    }

    /// Pick the first edge out of `node_id` whose condition is satisfied by
    /// the gathered variables and the last tool result, if any.
    pub fn next_edge<'a>(
        &'a self,
        node_id: &str,
        variables: &HashMap<String, serde_json::Value>,
        last_tool_success: Option<&str>,
    ) -> Option<&'a Edge> {
        self.edges_from(node_id).into_iter().find(|edge| match &edge.condition {
            EdgeCondition::Always => true,
            EdgeCondition::VariableEquals { variable, value } => variables.get(variable) == Some(value),
            EdgeCondition::IntentMatches { labels } => variables
                .get("intent")
                .and_then(|v| v.as_str())
                .map(|intent| labels.iter().any(|l| l == intent))
                .unwrap_or(false),
            EdgeCondition::ToolSucceeded { tool_name } => last_tool_success == Some(tool_name.as_str()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_graph() -> WorkflowGraph {
        WorkflowGraph {
            id: Uuid::new_v4(),
            name: "greeting".into(),
            entry_node: "start".into(),
            nodes: vec![
                Node {
                    id: "start".into(),
                    kind: NodeKind::Conversation,
                    prompt: Some("Greet the caller".into()),
                    message: None,
                    available_tools: vec![],
                    extract_variables: vec!["intent".into()],
                },
                Node {
                    id: "end".into(),
                    kind: NodeKind::Terminal,
                    prompt: None,
                    message: Some("Goodbye".into()),
                    available_tools: vec![],
                    extract_variables: vec![],
                },
            ],
            edges: vec![Edge {
                id: "e1".into(),
                from_node: "start".into(),
                to_node: "end".into(),
                condition: EdgeCondition::Always,
                priority: 0,
                label: "continue".into(),
            }],
        }
    }

    #[test]
    fn validates_a_well_formed_graph() {
        assert!(simple_graph().validate().is_ok());
    }

    #[test]
    fn rejects_unknown_entry_node() {
        let mut graph = simple_graph();
        graph.entry_node = "nowhere".into();
        assert!(graph.validate().is_err());
    }

    #[test]
    fn rejects_dangling_edge_target() {
        let mut graph = simple_graph();
        graph.edges[0].to_node = "ghost".into();
        assert!(matches!(graph.validate(), Err(VoxError::UnknownNode(_))));
    }

    #[test]
    fn rejects_unreachable_node() {
        let mut graph = simple_graph();
        graph.nodes.push(Node {
            id: "orphan".into(),
            kind: NodeKind::Terminal,
            prompt: None,
            message: None,
            available_tools: vec![],
            extract_variables: vec![],
        });
        assert!(graph.validate().is_err());
    }

    #[test]
    fn next_edge_respects_priority_order() {
        let mut graph = simple_graph();
        graph.edges.push(Edge {
            id: "e0".into(),
            from_node: "start".into(),
            to_node: "start".into(),
            condition: EdgeCondition::VariableEquals {
                variable: "intent".into(),
                value: serde_json::json!("retry"),
            },
            priority: -1,
            label: "retry".into(),
        });
        let mut vars = HashMap::new();
        vars.insert("intent".to_string(), serde_json::json!("retry"));
        let edge = graph.next_edge("start", &vars, None).unwrap();
        assert_eq!(edge.id, "e0");
    }

    #[test]
    fn function_name_falls_back_to_id_when_label_is_blank() {
        let edge = Edge {
            id: "edge-1".into(),
            from_node: "a".into(),
            to_node: "b".into(),
            condition: EdgeCondition::Always,
            priority: 0,
            label: String::new(),
        };
        assert_eq!(edge.function_name(), "edge_1");
    }

    #[test]
    fn function_name_slugifies_the_label_when_set() {
        let edge = Edge {
            id: "edge-1".into(),
            from_node: "a".into(),
            to_node: "b".into(),
            condition: EdgeCondition::Always,
            priority: 0,
            label: "Caller wants to cancel".into(),
        };
        assert_eq!(edge.function_name(), "caller_wants_to_cancel");
    }
}
