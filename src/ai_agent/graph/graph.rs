use std::collections::HashMap;
use async_trait::async_trait;
use anyhow::{Result, Error, anyhow};
use std::sync::Arc;
use std::future::Future;
use std::pin::Pin;
use std::result::Result::{Ok, Err};

use crate::ai_agent::graph::state::{AgentState, StateChunk};
use crate::app::state::registry::AppRegistry;

/// Revisiting nodes is expected (debate rounds), so instead of cycle
/// detection the walk carries a hard step budget.
const MAX_GRAPH_STEPS: u32 = 200;

// Define a trait for node functions
#[async_trait]
pub trait AgentStep: Send + Sync {
  async fn call(&self, state: AgentState) -> Result<StateChunk>;
}

// Allow Fn types to be used as AgentStep
#[async_trait]
impl<F> AgentStep for F where F: Fn(AgentState) -> Pin<Box<dyn Future<Output = Result<StateChunk, Error>> + Send>> + Send + Sync,
{
  async fn call(&self, state: AgentState) -> Result<StateChunk> {
    let future = self(state);
    future.await
  }
}

enum Edge {
  Direct(String),
  Conditional(Arc<dyn Fn(&AgentState) -> String + Send + Sync>),
}

pub struct StateGraph {
  nodes: HashMap<String, Arc<dyn AgentStep>>,
  edges: HashMap<String, Edge>,
  entry_point: Option<String>,
  end_node: String,
}

impl StateGraph {

  pub fn new() -> Self {
    StateGraph {
      nodes: HashMap::new(),
      edges: HashMap::new(),
      entry_point: None,
      end_node: "END".to_string(),
    }
  }

  pub fn add_node(&mut self, name: &str, step: Arc<dyn AgentStep>) {
    self.nodes.insert(name.to_string(), step);
  }

  pub fn add_edge(&mut self, from: &str, to: &str) {
    self.edges.insert(from.to_string(), Edge::Direct(to.to_string()));
  }

  /// Routing decided at runtime from the state, e.g. "another debate round
  /// or hand off to the judge".
  pub fn add_conditional_edge<F>(&mut self, from: &str, router: F) where F: Fn(&AgentState) -> String + Send + Sync + 'static {
    self.edges.insert(from.to_string(), Edge::Conditional(Arc::new(router)));
  }

  pub fn set_entry_point(&mut self, node: &str) {
    self.entry_point = Some(node.to_string());
  }

  pub fn compile(self) -> Result<CompiledGraph> {
    if self.entry_point.is_none() {
      return Err(anyhow!("Graph must have an entry point"));
    }
    for (from, edge) in &self.edges {
      if let Edge::Direct(to) = edge {
        if to != &self.end_node && !self.nodes.contains_key(to) {
          return Err(anyhow!("Edge from '{}' targets unknown node '{}'", from, to));
        }
      }
    }
    return Ok(CompiledGraph { graph: Arc::new(self) });
  }
}

#[derive(Clone)]
pub struct CompiledGraph {
  graph: Arc<StateGraph>,
}

impl CompiledGraph {

  /// Walk the graph from the entry point. Every chunk a node emits is folded
  /// into the pipeline state and forwarded to the registry, so the per-symbol
  /// view advances step by step instead of all at once at the end.
  pub async fn invoke(&self, initial_state: AgentState, registry: Arc<AppRegistry>, symbol: &str) -> Result<AgentState> {
    let mut current_state: AgentState = initial_state;
    let mut current_node: String = self.graph.entry_point.clone().ok_or_else(|| anyhow!("Graph must have an entry point"))?;
    let mut steps_taken: u32 = 0;

    while current_node != self.graph.end_node {
      steps_taken += 1;
      if steps_taken > MAX_GRAPH_STEPS {
        return Err(anyhow!("Graph exceeded {} steps, aborting at node '{}'", MAX_GRAPH_STEPS, current_node));
      }

      let step: &Arc<dyn AgentStep> = self.graph.nodes.get(&current_node).ok_or_else(|| anyhow!("Node not found: {}", current_node))?;

      log::info!("Graph step {}: {}", steps_taken, current_node);
      let chunk: StateChunk = step.call(current_state.clone()).await?;

      current_state.update_from_chunk(&chunk)?;
      if !chunk.is_empty() {
        registry.process_chunk(symbol, &chunk);
      }

      current_node = match self.graph.edges.get(&current_node) {
        Some(Edge::Direct(next)) => next.clone(),
        Some(Edge::Conditional(router)) => router(&current_state),
        None => return Err(anyhow!("No edge defined for node: {}", current_node)),
      };
    }

    return Ok(current_state);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ai_agent::llm::model_provider::ChatMessage;
  use crate::app::state::symbol::ReportField;

  fn note_step(field: ReportField, text: &'static str) -> Arc<dyn AgentStep> {
    let step = move |_state: AgentState| -> Pin<Box<dyn Future<Output = Result<StateChunk, Error>> + Send>> {
      Box::pin(async move {
        Ok(StateChunk::new()
          .with_messages(vec![ChatMessage::assistant(text)])
          .with_report(field, text))
      })
    };
    return Arc::new(step);
  }

  #[tokio::test]
  async fn walk_folds_chunks_and_reaches_end() {
    let registry = Arc::new(AppRegistry::new());
    registry.init_symbol_state("NVDA");

    let mut graph = StateGraph::new();
    graph.add_node("market", note_step(ReportField::Market, "market view"));
    graph.add_node("news", note_step(ReportField::News, "news view"));
    graph.add_edge("market", "news");
    graph.add_edge("news", "END");
    graph.set_entry_point("market");

    let compiled = graph.compile().unwrap();
    let state = AgentState::initial("NVDA", "2025-06-01");
    let final_state = compiled.invoke(state, registry.clone(), "NVDA").await.unwrap();

    assert_eq!(final_state.market_report, "market view");
    assert_eq!(final_state.news_report, "news view");
    let stored = registry.get_state("NVDA").unwrap();
    assert_eq!(stored.report(crate::app::state::symbol::ReportField::Market), Some("market view"));
  }

  #[tokio::test]
  async fn conditional_edge_routes_on_state() {
    let registry = Arc::new(AppRegistry::new());
    registry.init_symbol_state("NVDA");

    let mut graph = StateGraph::new();
    graph.add_node("seed", note_step(ReportField::Market, "seed"));
    graph.add_node("extra", note_step(ReportField::News, "extra"));
    graph.add_conditional_edge("seed", |state: &AgentState| {
      if state.news_report.is_empty() { "extra".to_string() } else { "END".to_string() }
    });
    graph.add_conditional_edge("extra", |_state: &AgentState| "END".to_string());
    graph.set_entry_point("seed");

    let compiled = graph.compile().unwrap();
    let final_state = compiled.invoke(AgentState::initial("NVDA", "2025-06-01"), registry, "NVDA").await.unwrap();
    assert_eq!(final_state.news_report, "extra");
  }

  #[tokio::test]
  async fn runaway_walk_hits_step_budget() {
    let registry = Arc::new(AppRegistry::new());
    registry.init_symbol_state("NVDA");

    let mut graph = StateGraph::new();
    let idle = |_state: AgentState| -> Pin<Box<dyn Future<Output = Result<StateChunk, Error>> + Send>> {
      Box::pin(async { Ok(StateChunk::new()) })
    };
    graph.add_node("loop", Arc::new(idle));
    graph.add_edge("loop", "loop");
    graph.set_entry_point("loop");

    let compiled = graph.compile().unwrap();
    let result = compiled.invoke(AgentState::initial("NVDA", "2025-06-01"), registry, "NVDA").await;
    assert!(result.is_err());
  }
}
