use std::sync::Arc;

use crate::ai_agent::graph::graph::AgentStep;
use crate::ai_agent::graph::runner::AgentRunner;
use crate::ai_agent::graph::state::{AgentState, StateChunk};
use crate::ai_agent::utils::analysts::AnalystType;
use crate::app::state::registry::AppRegistry;
use crate::app::state::symbol::AgentStatus;

/// Fallback path: one analyst at a time over the shared pipeline state.
/// Slower but easier to follow in the logs, and the only mode that matters
/// when the provider rate limit is tight.
pub struct SequentialAnalystCoordinator {
  runner: Arc<AgentRunner>,
  registry: Arc<AppRegistry>,
}

impl SequentialAnalystCoordinator {

  pub fn new(runner: Arc<AgentRunner>, registry: Arc<AppRegistry>) -> Self {
    SequentialAnalystCoordinator { runner, registry }
  }

  pub async fn run_all(&self, analysts: Vec<(AnalystType, Arc<dyn AgentStep>)>, base: AgentState) -> AgentState {
    let symbol: String = base.company_of_interest.clone();
    let mut state: AgentState = base;

    for (analyst, step) in analysts {
      let field = analyst.report_field();
      self.registry.update_agent_status(field.owner(), AgentStatus::InProgress, &symbol);

      let (next_state, made_tool_calls) = self.runner.run(analyst, step, state.clone()).await;
      state = next_state;
      if !made_tool_calls {
        log::warn!("[{}] Run for {} finished without tool data", analyst.display_name(), symbol);
      }

      let report: String = match state.last_assistant_content() {
        Some(content) => content.to_string(),
        None => state.analyst_report(field).to_string(),
      };

      if !report.trim().is_empty() {
        state.set_analyst_report(field, &report);
        self.registry.process_chunk(&symbol, &StateChunk::new().with_report(field, &report));
      }
      self.registry.update_agent_status(field.owner(), AgentStatus::Completed, &symbol);

      // Analyst transcripts do not leak into the next analyst's context.
      state.clear_messages();
    }

    return state;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::future::Future;
  use std::pin::Pin;
  use anyhow::Error;
  use crate::ai_agent::graph::runner::AgentRunner;
  use crate::ai_agent::llm::model_provider::ChatMessage;
  use crate::ai_agent::tools::toolkit::Toolkit;
  use crate::app::config::Config;
  use crate::app::state::symbol::{AgentName, ReportField};

  fn coordinator(registry: Arc<AppRegistry>) -> SequentialAnalystCoordinator {
    let toolkit = Arc::new(Toolkit::new(&Config::default(), registry.clone()));
    let runner = Arc::new(AgentRunner::new(toolkit, 0.0, 0.0));
    SequentialAnalystCoordinator::new(runner, registry)
  }

  fn reporting_step(field: ReportField, text: &'static str) -> Arc<dyn AgentStep> {
    let step = move |state: AgentState| -> Pin<Box<dyn Future<Output = Result<StateChunk, Error>> + Send>> {
      Box::pin(async move {
        // Transcript from the previous analyst must have been cleared.
        assert!(state.messages.len() <= 1);
        Ok(StateChunk::new()
          .with_messages(vec![ChatMessage::assistant(text)])
          .with_report(field, text))
      })
    };
    return Arc::new(step);
  }

  #[tokio::test]
  async fn analysts_run_in_order_and_reports_accumulate() {
    let registry = Arc::new(AppRegistry::new());
    registry.init_symbol_state("NVDA");

    let analysts: Vec<(AnalystType, Arc<dyn AgentStep>)> = vec![
      (AnalystType::Market, reporting_step(ReportField::Market, "market findings")),
      (AnalystType::Fundamentals, reporting_step(ReportField::Fundamentals, "fundamental findings")),
    ];

    let base = AgentState::initial("NVDA", "2025-06-01");
    let final_state = coordinator(registry.clone()).run_all(analysts, base).await;

    assert_eq!(final_state.market_report, "market findings");
    assert_eq!(final_state.fundamentals_report, "fundamental findings");
    assert!(final_state.messages.is_empty());

    let stored = registry.get_state("NVDA").unwrap();
    assert_eq!(stored.status(AgentName::MarketAnalyst), AgentStatus::Completed);
    assert_eq!(stored.status(AgentName::FundamentalsAnalyst), AgentStatus::Completed);
  }
}
