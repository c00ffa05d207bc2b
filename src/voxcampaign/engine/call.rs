//! Binds an [`EngineSession`] to a [`WorkflowGraph`]: composes the active
//! node's system prompt and tool registry, and walks the graph edge by edge
//! as the model (or a tool result) signals a node is done.
//!
//! The model doesn't see nodes or edges directly — each outgoing edge of the
//! active node is registered as a synthetic tool named after
//! [`Edge::function_name`], so "move to the next node" looks to the model
//! like any other function call. Calling one sends the edge's id over a
//! dedicated channel rather than [`crate::engine::EngineControlSignal`],
//! which the pipeline treats as terminal; a node transition is routine.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::session::{EngineSession, LlmClient, StepOutcome};
use super::tools::{HandlerRegistry, ToolHandler, ToolMetadata};
use super::variable_extraction::extract_variables;
use crate::error::{VoxError, VoxResult};
use crate::workflow::{Edge, EdgeCondition, NodeKind, WorkflowGraph};

struct EdgeTransitionTool {
    edge_id: String,
    function_name: String,
    description: String,
    transition_tx: mpsc::Sender<String>,
}

#[async_trait]
impl ToolHandler for EdgeTransitionTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: self.function_name.clone(),
            description: self.description.clone(),
            parameters: vec![],
        }
    }

    async fn call(&self, _arguments: serde_json::Value) -> VoxResult<serde_json::Value> {
        let _ = self.transition_tx.send(self.edge_id.clone()).await;
        Ok(serde_json::json!({ "acknowledged": true }))
    }
}

fn describe_edge(edge: &Edge) -> String {
    match &edge.condition {
        EdgeCondition::Always => "Call once this step is complete and the conversation is ready to move on.".to_string(),
        EdgeCondition::VariableEquals { variable, value } => format!("Call once `{variable}` has been determined to be {value}."),
        EdgeCondition::IntentMatches { labels } => format!("Call when the caller's intent matches one of: {}.", labels.join(", ")),
        EdgeCondition::ToolSucceeded { tool_name } => format!("Call after `{tool_name}` has completed successfully."),
    }
}

/// Replace every `{{name}}` occurrence in `template` with the matching
/// entry of `vars`, if present. Variables with no match are left verbatim
/// so a half-populated template still reads sensibly.
fn render_template(template: &str, vars: &HashMap<String, serde_json::Value>) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        let needle = format!("{{{{{key}}}}}");
        let replacement = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out = out.replace(&needle, &replacement);
    }
    out
}

/// One call's walk through a workflow graph, mediating between the raw
/// conversational turn cycle ([`EngineSession`]) and the node/edge model the
/// workflow is authored in.
pub struct CallEngine {
    session: EngineSession,
    graph: WorkflowGraph,
    current_node: String,
    global_prompt: String,
    base_tools: HandlerRegistry,
    call_context_vars: HashMap<String, serde_json::Value>,
    transition_tx: mpsc::Sender<String>,
    transition_rx: mpsc::Receiver<String>,
}

impl CallEngine {
    pub async fn new(
        client: Arc<dyn LlmClient>,
        graph: WorkflowGraph,
        global_prompt: impl Into<String>,
        base_tools: HandlerRegistry,
        max_tokens: usize,
    ) -> VoxResult<Self> {
        let entry = graph.entry_node.clone();
        let (transition_tx, transition_rx) = mpsc::channel(4);
        let session = EngineSession::new(client, HandlerRegistry::new(), String::new(), max_tokens);
        let mut engine = Self {
            session,
            graph,
            current_node: entry.clone(),
            global_prompt: global_prompt.into(),
            base_tools,
            call_context_vars: HashMap::new(),
            transition_tx,
            transition_rx,
        };
        engine.enter_node(&entry).await?;
        Ok(engine)
    }

    pub fn current_node_id(&self) -> &str {
        &self.current_node
    }

    pub fn gathered_variables(&self) -> &HashMap<String, serde_json::Value> {
        &self.call_context_vars
    }

    pub fn is_at_terminal_node(&self) -> bool {
        self.graph.node(&self.current_node).map(|n| n.kind == NodeKind::Terminal).unwrap_or(false)
    }

    /// The caller's disposition, if the conversation set one via a gathered
    /// `call_disposition` variable. Raw and un-mapped — pass it through the
    /// owning organization's disposition table before recording it.
    pub fn call_disposition(&self) -> Option<&str> {
        self.call_context_vars.get("call_disposition").and_then(|v| v.as_str())
    }

    /// Extract the active node's declared variables from the conversation
    /// so far, without following any edge. Called when a call ends before a
    /// transition tool fires (idle abandon, an explicit `end_call`), so
    /// whatever the node could still determine isn't lost.
    pub async fn extract_current_node_variables(&mut self) -> VoxResult<()> {
        let node = self.graph.node(&self.current_node).cloned();
        if let Some(node) = node {
            if !node.extract_variables.is_empty() {
                let extracted = extract_variables(self.session.client(), self.session.history(), &node.extract_variables).await?;
                self.call_context_vars.extend(extracted);
            }
        }
        Ok(())
    }

    /// Compose the system prompt and tool registry for `node_id` and make it
    /// the active node. Does not run a conversation turn.
    async fn enter_node(&mut self, node_id: &str) -> VoxResult<()> {
        let node = self.graph.node(node_id).ok_or_else(|| VoxError::UnknownNode(node_id.to_string()))?.clone();
        self.current_node = node_id.to_string();

        let node_prompt = node.prompt.as_deref().unwrap_or("");
        let composed = format!(
            "{}\n\n{}",
            render_template(&self.global_prompt, &self.call_context_vars),
            render_template(node_prompt, &self.call_context_vars)
        );
        self.session.set_system_prompt(composed);

        let registry = HandlerRegistry::new();
        for name in &node.available_tools {
            if let Some(handler) = self.base_tools.get(name).await {
                registry.register(handler).await;
            }
        }
        for edge in self.graph.edges_from(node_id) {
            registry
                .register(Arc::new(EdgeTransitionTool {
                    edge_id: edge.id.clone(),
                    function_name: edge.function_name(),
                    description: describe_edge(edge),
                    transition_tx: self.transition_tx.clone(),
                }))
                .await;
        }
        self.session.set_tools(registry);
        Ok(())
    }

    /// Run one conversational turn, then follow an edge out of the current
    /// node if the model (via a synthetic edge tool) asked to move on:
    /// extract the node's declared variables first, then enter the target
    /// node.
    pub async fn step(&mut self, caller_utterance: &str) -> VoxResult<StepOutcome> {
        let outcome = self.session.step(caller_utterance).await?;

        if let Ok(edge_id) = self.transition_rx.try_recv() {
            self.extract_current_node_variables().await?;
            let target = self
                .graph
                .edges_from(&self.current_node)
                .into_iter()
                .find(|e| e.id == edge_id)
                .map(|e| e.to_node.clone());
            if let Some(target) = target {
                self.enter_node(&target).await?;
            }
        }

        Ok(outcome)
    }
}
