use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::ai_agent::graph::state::StateChunk;
use crate::ai_agent::llm::model_provider::MessageRole;
use crate::ai_agent::tools::invocation::ToolCallRecord;
use crate::ai_agent::utils::analysts::AnalystType;
use crate::app::state::merge;
use crate::app::state::symbol::{AgentName, AgentStatus, SymbolState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmCallRecord {
  pub timestamp: DateTime<Utc>,
  pub kind: String,
  pub detail: String,
}

#[derive(Default)]
struct RegistryInner {
  symbol_states: HashMap<String, SymbolState>,
  analysis_queue: VecDeque<String>,
  analyzing_symbol: Option<String>,
  active_analysts: Vec<AnalystType>,
}

/// Process-wide analysis state, passed by `Arc` into the coordinators and the
/// HTTP layer. Holds every ticker's SymbolState, the analysis queue, and the
/// append-only audit logs.
///
/// The inner mutex serializes chunk application per symbol; distinct tickers
/// contend only for the short critical section of one fold.
pub struct AppRegistry {
  inner: Mutex<RegistryInner>,
  tool_calls_log: Mutex<Vec<ToolCallRecord>>,
  llm_calls_log: Mutex<Vec<LlmCallRecord>>,
  ui_revision: AtomicU64,
}

impl AppRegistry {

  pub fn new() -> Self {
    AppRegistry {
      inner: Mutex::new(RegistryInner::default()),
      tool_calls_log: Mutex::new(Vec::new()),
      llm_calls_log: Mutex::new(Vec::new()),
      ui_revision: AtomicU64::new(0),
    }
  }

  fn mark_ui_dirty(&self) {
    self.ui_revision.fetch_add(1, Ordering::SeqCst);
  }

  /// Monotonically incrementing revision; pollers refetch when it moves.
  pub fn ui_revision(&self) -> u64 {
    return self.ui_revision.load(Ordering::SeqCst);
  }

  pub fn enqueue_symbols(&self, symbols: &[String]) {
    let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    for symbol in symbols {
      inner.analysis_queue.push_back(symbol.to_uppercase());
    }
  }

  /// Pop the next ticker for analysis, initializing or resetting its state.
  pub fn next_symbol(&self) -> Option<String> {
    let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let next: Option<String> = inner.analysis_queue.pop_front();

    match next {
      Some(symbol) => {
        if let Some(state) = inner.symbol_states.get_mut(&symbol) {
          state.start_new_session();
        }
        else {
          inner.symbol_states.insert(symbol.clone(), SymbolState::new(&symbol));
        }
        inner.analyzing_symbol = Some(symbol.clone());
        return Some(symbol);
      }
      None => {
        inner.analyzing_symbol = None;
        return None;
      }
    }
  }

  pub fn init_symbol_state(&self, symbol: &str) {
    let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if !inner.symbol_states.contains_key(symbol) {
      inner.symbol_states.insert(symbol.to_string(), SymbolState::new(symbol));
    }
  }

  pub fn start_new_session_for_symbol(&self, symbol: &str) {
    let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(state) = inner.symbol_states.get_mut(symbol) {
      state.start_new_session();
    }
  }

  pub fn analyzing_symbol(&self) -> Option<String> {
    let inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    return inner.analyzing_symbol.clone();
  }

  pub fn get_state(&self, symbol: &str) -> Option<SymbolState> {
    let inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    return inner.symbol_states.get(symbol).cloned();
  }

  pub fn is_complete(&self, symbol: &str) -> bool {
    let inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    return inner.symbol_states.get(symbol).map(|state| state.analysis_complete).unwrap_or(false);
  }

  pub fn set_active_analysts(&self, analysts: Vec<AnalystType>) {
    let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    inner.active_analysts = analysts;
  }

  /// The fixed UI progression sequence, filtered by the active selection.
  fn sequence_of(inner: &RegistryInner) -> Vec<AgentName> {
    let selected: &[AnalystType] = if inner.active_analysts.is_empty() { &AnalystType::ALL } else { &inner.active_analysts };
    return selected.iter().map(|analyst| analyst.agent_name()).collect();
  }

  /// Forward-only status update outside of chunk processing, used by the
  /// parallel coordinator when it launches analysts.
  pub fn update_agent_status(&self, agent: AgentName, status: AgentStatus, symbol: &str) {
    let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let changed: bool = match inner.symbol_states.get_mut(symbol) {
      Some(state) => merge::set_agent_status(state, agent, status),
      None => {
        log::warn!("Status update for unknown symbol {}", symbol);
        false
      }
    };
    drop(inner);
    if changed {
      self.mark_ui_dirty();
    }
  }

  /// The single mutation entry point for SymbolState: fold one chunk from the
  /// pipeline stream into the symbol's record.
  pub fn process_chunk(&self, symbol: &str, chunk: &StateChunk) {
    let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let sequence: Vec<AgentName> = Self::sequence_of(&inner);

    let changed: bool = match inner.symbol_states.get_mut(symbol) {
      Some(state) => merge::apply_chunk(state, chunk, &sequence),
      None => {
        log::warn!("Dropping chunk for unknown symbol {}", symbol);
        false
      }
    };
    drop(inner);

    if !chunk.messages.is_empty() {
      let mut llm_log = self.llm_calls_log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
      for message in &chunk.messages {
        let kind: &str = match message.role {
          MessageRole::Assistant => "Reasoning",
          _ => "System",
        };
        llm_log.push(LlmCallRecord {
          timestamp: Utc::now(),
          kind: kind.to_string(),
          detail: message.content.clone(),
        });
      }
    }

    if changed {
      self.mark_ui_dirty();
    }
  }

  pub fn record_tool_call(&self, record: ToolCallRecord) {
    let mut log_guard = self.tool_calls_log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    log_guard.push(record);
    let total = log_guard.len();
    drop(log_guard);
    log::info!("[TOOL TRACKER] Registered tool call (Total: {})", total);
    self.mark_ui_dirty();
  }

  /// Tool calls for display, optionally filtered by agent label substring and
  /// by symbol (case-insensitive exact match). Insertion order preserved.
  pub fn get_tool_calls(&self, agent_filter: Option<&str>, symbol_filter: Option<&str>) -> Vec<ToolCallRecord> {
    let log_guard = self.tool_calls_log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let calls: Vec<ToolCallRecord> = log_guard.iter().filter(|record| {
      if let Some(agent) = agent_filter {
        if !record.agent_type.to_lowercase().contains(&agent.to_lowercase()) {
          return false;
        }
      }
      if let Some(symbol) = symbol_filter {
        if !record.symbol.eq_ignore_ascii_case(symbol) {
          return false;
        }
      }
      return true;
    }).cloned().collect();
    return calls;
  }

  pub fn tool_calls_count(&self) -> usize {
    let log_guard = self.tool_calls_log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    return log_guard.len();
  }

  pub fn register_llm_call(&self, model_name: Option<&str>, purpose: Option<&str>) {
    let mut llm_log = self.llm_calls_log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    llm_log.push(LlmCallRecord {
      timestamp: Utc::now(),
      kind: "LLM_CALL".to_string(),
      detail: format!("model={} purpose={}", model_name.unwrap_or("?"), purpose.unwrap_or("?")),
    });
    drop(llm_log);
    self.mark_ui_dirty();
  }

  pub fn llm_calls_count(&self) -> usize {
    let llm_log = self.llm_calls_log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    return llm_log.iter().filter(|record| record.kind == "LLM_CALL" || record.kind == "Reasoning").count();
  }

  pub fn generated_reports_count(&self) -> usize {
    let inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    return inner.symbol_states.values().map(|state| state.generated_reports_count()).sum();
  }

  pub fn reset(&self) {
    log::info!("[STATE] Resetting application state");
    let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    inner.symbol_states.clear();
    inner.analysis_queue.clear();
    inner.analyzing_symbol = None;
    inner.active_analysts.clear();
    drop(inner);
    self.tool_calls_log.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clear();
    self.llm_calls_log.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clear();
    self.mark_ui_dirty();
  }
}

impl Default for AppRegistry {
  fn default() -> Self {
    AppRegistry::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ai_agent::tools::invocation::ToolCallStatus;
  use crate::app::state::symbol::ReportField;
  use std::collections::HashMap;

  fn record_for(agent: &str, symbol: &str) -> ToolCallRecord {
    ToolCallRecord {
      timestamp: Utc::now(),
      tool_name: "get_stock_price_history".to_string(),
      inputs: HashMap::new(),
      output: "ok".to_string(),
      execution_time: 0.1,
      status: ToolCallStatus::Success,
      agent_type: agent.to_string(),
      symbol: symbol.to_string(),
    }
  }

  #[test]
  fn queue_pops_and_resets_existing_sessions() {
    let registry = AppRegistry::new();
    registry.enqueue_symbols(&["aapl".to_string(), "msft".to_string()]);

    assert_eq!(registry.next_symbol().as_deref(), Some("AAPL"));
    let first_session = registry.get_state("AAPL").unwrap().session_id;

    registry.enqueue_symbols(&["aapl".to_string()]);
    assert_eq!(registry.next_symbol().as_deref(), Some("MSFT"));
    assert_eq!(registry.next_symbol().as_deref(), Some("AAPL"));
    let second_session = registry.get_state("AAPL").unwrap().session_id;
    assert_ne!(first_session, second_session);

    assert_eq!(registry.next_symbol(), None);
    assert_eq!(registry.analyzing_symbol(), None);
  }

  #[test]
  fn revision_bumps_only_on_accepted_mutation() {
    let registry = AppRegistry::new();
    registry.init_symbol_state("AAPL");
    registry.update_agent_status(AgentName::MarketAnalyst, AgentStatus::InProgress, "AAPL");

    let before = registry.ui_revision();
    let chunk = StateChunk::new().with_report(ReportField::Market, "report body");
    registry.process_chunk("AAPL", &chunk);
    assert!(registry.ui_revision() > before);

    // Same chunk again is a merge no-op.
    let after_first = registry.ui_revision();
    registry.process_chunk("AAPL", &chunk);
    assert_eq!(registry.ui_revision(), after_first);
  }

  #[test]
  fn tool_call_filters() {
    let registry = AppRegistry::new();
    registry.record_tool_call(record_for("Market Analyst", "AAPL"));
    registry.record_tool_call(record_for("News Analyst", "AAPL"));
    registry.record_tool_call(record_for("Market Analyst", "MSFT"));

    assert_eq!(registry.get_tool_calls(None, None).len(), 3);
    assert_eq!(registry.get_tool_calls(Some("market"), None).len(), 2);
    assert_eq!(registry.get_tool_calls(None, Some("aapl")).len(), 2);
    assert_eq!(registry.get_tool_calls(Some("market"), Some("MSFT")).len(), 1);
  }

  #[test]
  fn audit_counts_track_recorded_activity() {
    let registry = AppRegistry::new();
    assert_eq!(registry.tool_calls_count(), 0);
    assert_eq!(registry.llm_calls_count(), 0);

    registry.record_tool_call(record_for("Market Analyst", "AAPL"));
    registry.record_tool_call(record_for("News Analyst", "AAPL"));
    registry.register_llm_call(Some("gpt-4o-mini"), Some("market analysis"));

    assert_eq!(registry.tool_calls_count(), 2);
    assert_eq!(registry.llm_calls_count(), 1);

    registry.reset();
    assert_eq!(registry.tool_calls_count(), 0);
    assert_eq!(registry.llm_calls_count(), 0);
  }

  #[test]
  fn distinct_symbols_do_not_cross_talk() {
    let registry = AppRegistry::new();
    registry.init_symbol_state("AAPL");
    registry.init_symbol_state("MSFT");
    registry.update_agent_status(AgentName::MarketAnalyst, AgentStatus::InProgress, "AAPL");

    registry.process_chunk("AAPL", &StateChunk::new().with_report(ReportField::Market, "apple report"));

    let apple = registry.get_state("AAPL").unwrap();
    let microsoft = registry.get_state("MSFT").unwrap();
    assert_eq!(apple.report(ReportField::Market), Some("apple report"));
    assert!(microsoft.report(ReportField::Market).is_none());
    assert_eq!(microsoft.status(AgentName::MarketAnalyst), AgentStatus::Pending);
  }
}
