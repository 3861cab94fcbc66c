use std::sync::Arc;
use std::time::Duration;
use anyhow::{Result};
use std::result::Result::{Ok, Err};

use crate::ai_agent::graph::graph::AgentStep;
use crate::ai_agent::graph::state::{AgentState, StateChunk};
use crate::ai_agent::llm::model_provider::{ChatMessage, ToolRequest};
use crate::ai_agent::tools::toolkit::Toolkit;
use crate::ai_agent::utils::analysts::AnalystType;

/// Drives one analyst through its plan/fetch/report round trip over a private
/// state snapshot. Failures never escape: the caller gets the untouched
/// snapshot back.
pub struct AgentRunner {
  toolkit: Arc<Toolkit>,
  call_delay: Duration,
  tool_result_delay: Duration,
}

impl AgentRunner {

  pub fn new(toolkit: Arc<Toolkit>, call_delay_secs: f64, tool_result_delay_secs: f64) -> Self {
    AgentRunner {
      toolkit,
      call_delay: Duration::from_secs_f64(call_delay_secs.max(0.0)),
      tool_result_delay: Duration::from_secs_f64(tool_result_delay_secs.max(0.0)),
    }
  }

  /// Returns the updated state and whether the analyst invoked any tools.
  /// A failed run yields the untouched snapshot and no tool activity.
  pub async fn run(&self, analyst: AnalystType, step: Arc<dyn AgentStep>, snapshot: AgentState) -> (AgentState, bool) {
    let agent_name: &str = analyst.display_name();
    match self.run_inner(analyst, step, snapshot.clone()).await {
      Ok((final_state, made_tool_calls)) => (final_state, made_tool_calls),
      Err(error) => {
        log::error!("[{}] Analyst run failed for {}: {:#}", agent_name, snapshot.company_of_interest, error);
        return (snapshot, false);
      }
    }
  }

  async fn run_inner(&self, analyst: AnalystType, step: Arc<dyn AgentStep>, mut state: AgentState) -> Result<(AgentState, bool)> {
    let agent_name: &str = analyst.display_name();
    let symbol: String = state.company_of_interest.clone();

    if !self.call_delay.is_zero() {
      tokio::time::sleep(self.call_delay).await;
    }

    let planning_chunk: StateChunk = step.call(state.clone()).await?;
    state.update_from_chunk(&planning_chunk)?;

    let requests: Vec<ToolRequest> = state.messages.last()
      .map(|message| message.tool_calls.clone())
      .unwrap_or_default();

    if requests.is_empty() {
      log::warn!("[{}] Planning round requested no tools for {}", agent_name, symbol);
      return Ok((state, false));
    }

    for request in &requests {
      match self.toolkit.execute(request, agent_name, &symbol).await {
        Ok(output) => {
          state.add_message(ChatMessage::tool_result(&request.name, &output))?;
        }
        Err(error) => {
          // The report round still runs; it just sees the failure text.
          log::error!("[{}] Tool '{}' failed for {}: {:#}", agent_name, request.name, symbol, error);
          state.add_message(ChatMessage::tool_result(&request.name, &format!("ERROR: {}", error)))?;
        }
      }
    }

    if !self.tool_result_delay.is_zero() {
      tokio::time::sleep(self.tool_result_delay).await;
    }

    let report_chunk: StateChunk = step.call(state.clone()).await?;
    state.update_from_chunk(&report_chunk)?;

    return Ok((state, true));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::future::Future;
  use std::pin::Pin;
  use anyhow::{anyhow, Error};
  use crate::app::config::Config;
  use crate::app::state::registry::AppRegistry;
  use crate::app::state::symbol::ReportField;

  fn runner() -> AgentRunner {
    let toolkit = Arc::new(Toolkit::new(&Config::default(), Arc::new(AppRegistry::new())));
    AgentRunner::new(toolkit, 0.0, 0.0)
  }

  fn scripted_step(plan_tools: Vec<ToolRequest>) -> Arc<dyn AgentStep> {
    let step = move |state: AgentState| -> Pin<Box<dyn Future<Output = Result<StateChunk, Error>> + Send>> {
      let plan_tools = plan_tools.clone();
      Box::pin(async move {
        let has_tool_results = state.messages.iter().any(|m| m.role == crate::ai_agent::llm::model_provider::MessageRole::Tool);
        if has_tool_results {
          return Ok(StateChunk::new()
            .with_messages(vec![ChatMessage::assistant("final report")])
            .with_report(ReportField::Market, "final report"));
        }
        return Ok(StateChunk::new().with_messages(vec![
          ChatMessage::assistant_with_tools("planning", plan_tools),
        ]));
      })
    };
    return Arc::new(step);
  }

  #[tokio::test]
  async fn failing_step_returns_pristine_snapshot() {
    let failing = |_state: AgentState| -> Pin<Box<dyn Future<Output = Result<StateChunk, Error>> + Send>> {
      Box::pin(async { Err(anyhow!("model unavailable")) })
    };
    let snapshot = AgentState::initial("NVDA", "2025-06-01");

    let (result, made_tool_calls) = runner().run(AnalystType::Market, Arc::new(failing), snapshot.clone()).await;

    assert!(!made_tool_calls);
    assert_eq!(result, snapshot);
  }

  #[tokio::test]
  async fn unknown_tool_failure_still_reaches_report_round() {
    let plan = vec![ToolRequest { name: "no_such_tool".to_string(), args: Default::default() }];
    let snapshot = AgentState::initial("NVDA", "2025-06-01");

    let (result, made_tool_calls) = runner().run(AnalystType::Market, scripted_step(plan), snapshot).await;

    // A failed tool invocation still counts as tool activity.
    assert!(made_tool_calls);
    assert_eq!(result.market_report, "final report");
    let tool_message = result.messages.iter().find(|m| m.role == crate::ai_agent::llm::model_provider::MessageRole::Tool).unwrap();
    assert!(tool_message.content.contains("ERROR"));
  }

  #[tokio::test]
  async fn planning_without_tools_skips_report_round() {
    let snapshot = AgentState::initial("NVDA", "2025-06-01");

    let (result, made_tool_calls) = runner().run(AnalystType::Market, scripted_step(Vec::new()), snapshot).await;

    assert!(!made_tool_calls);
    assert!(result.market_report.is_empty());
  }
}
