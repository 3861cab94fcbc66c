use std::sync::Arc;
use std::time::Duration;
use futures::stream::{FuturesUnordered, StreamExt};
use std::result::Result::{Ok, Err};

use crate::ai_agent::graph::graph::AgentStep;
use crate::ai_agent::graph::runner::AgentRunner;
use crate::ai_agent::graph::state::{AgentState, StateChunk};
use crate::ai_agent::utils::analysts::AnalystType;
use crate::app::state::registry::AppRegistry;
use crate::app::state::symbol::AgentStatus;

/// Fans the selected analysts out over isolated snapshots of the base state
/// and folds their reports back together. A failed or panicked analyst
/// degrades to an empty report; siblings are never blocked.
pub struct ParallelAnalystCoordinator {
  runner: Arc<AgentRunner>,
  registry: Arc<AppRegistry>,
  start_delay: Duration,
}

impl ParallelAnalystCoordinator {

  pub fn new(runner: Arc<AgentRunner>, registry: Arc<AppRegistry>, start_delay_secs: f64) -> Self {
    ParallelAnalystCoordinator {
      runner,
      registry,
      start_delay: Duration::from_secs_f64(start_delay_secs.max(0.0)),
    }
  }

  pub async fn run_all(&self, analysts: Vec<(AnalystType, Arc<dyn AgentStep>)>, base: AgentState) -> AgentState {
    let symbol: String = base.company_of_interest.clone();
    let mut final_state: AgentState = base.clone();

    for (analyst, _) in &analysts {
      self.registry.update_agent_status(analyst.report_field().owner(), AgentStatus::InProgress, &symbol);
    }

    let mut in_flight = FuturesUnordered::new();
    for (index, (analyst, step)) in analysts.into_iter().enumerate() {
      let runner: Arc<AgentRunner> = self.runner.clone();
      let snapshot: AgentState = base.clone();
      let delay: Duration = self.start_delay * index as u32;
      let analyst_copy: AnalystType = analyst;

      // Staggered starts keep the provider from seeing five simultaneous
      // opening calls.
      let handle = tokio::spawn(async move {
        if !delay.is_zero() {
          tokio::time::sleep(delay).await;
        }
        return runner.run(analyst_copy, step, snapshot).await;
      });
      in_flight.push(async move { (analyst, handle.await) });
    }

    while let Some((analyst, joined)) = in_flight.next().await {
      let (state, made_tool_calls) = match joined {
        Ok(outcome) => outcome,
        Err(join_error) => {
          log::error!("[{}] Analyst task panicked for {}: {}", analyst.display_name(), symbol, join_error);
          (base.clone(), false)
        }
      };

      let field = analyst.report_field();
      let report: String = match state.last_assistant_content() {
        Some(content) => content.to_string(),
        None => state.analyst_report(field).to_string(),
      };

      if !report.trim().is_empty() {
        log::info!("[{}] Collected {} chars of {} for {} (tools used: {})", analyst.display_name(), report.len(), field.as_str(), symbol, made_tool_calls);
      } else {
        log::warn!("[{}] No usable report for {}, storing empty placeholder", analyst.display_name(), symbol);
      }

      final_state.set_analyst_report(field, &report);
      if !report.trim().is_empty() {
        self.registry.process_chunk(&symbol, &StateChunk::new().with_report(field, &report));
      }
      // Forward-only, so this is a no-op when the merge already completed it.
      self.registry.update_agent_status(field.owner(), AgentStatus::Completed, &symbol);
    }

    final_state.clear_messages();
    return final_state;
  }
}
