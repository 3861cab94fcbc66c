use std::collections::HashMap;
use serde::{Serialize, Deserialize};
use std::result::Result::{Ok};
use anyhow::Error;

use crate::ai_agent::llm::model_provider::{ChatMessage, MessageRole};
use crate::app::state::symbol::{DebateState, ReportField};

/// The full pipeline state one analysis run flows through. Owned data only,
/// so `clone()` is the deep copy handed to each parallel analyst.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
  pub messages : Vec<ChatMessage>,
  pub company_of_interest : String,
  pub trade_date : String,
  pub market_report : String,
  pub sentiment_report : String,
  pub news_report : String,
  pub fundamentals_report : String,
  pub macro_report : String,
  pub investment_debate_state : DebateState,
  pub risk_debate_state : DebateState,
  pub investment_plan : String,
  pub trader_investment_plan : String,
  pub final_trade_decision : String,
}

impl AgentState {

  /// Initial state for one ticker's run. The opening human message is what
  /// flips the first analyst to in-progress downstream.
  pub fn initial(ticker: &str, trade_date: &str) -> Self {
    let mut state = AgentState::default();
    state.company_of_interest = ticker.to_string();
    state.trade_date = trade_date.to_string();
    state.messages.push(ChatMessage::human(ticker));
    return state;
  }

  pub fn add_message(&mut self, message: ChatMessage) -> Result<(), Error> {
    self.messages.push(message);
    return Ok(());
  }

  pub fn clear_messages(&mut self) {
    self.messages.clear();
  }

  pub fn last_assistant_content(&self) -> Option<&str> {
    self.messages.iter().rev().find(|message| {
      message.role == MessageRole::Assistant && !message.content.trim().is_empty()
    }).map(|message| message.content.as_str())
  }

  pub fn analyst_report(&self, field: ReportField) -> &str {
    match field {
      ReportField::Market => &self.market_report,
      ReportField::Sentiment => &self.sentiment_report,
      ReportField::News => &self.news_report,
      ReportField::Fundamentals => &self.fundamentals_report,
      ReportField::Macro => &self.macro_report,
      _ => "",
    }
  }

  pub fn set_analyst_report(&mut self, field: ReportField, content: &str) {
    match field {
      ReportField::Market => self.market_report = content.to_string(),
      ReportField::Sentiment => self.sentiment_report = content.to_string(),
      ReportField::News => self.news_report = content.to_string(),
      ReportField::Fundamentals => self.fundamentals_report = content.to_string(),
      ReportField::Macro => self.macro_report = content.to_string(),
      _ => log::warn!("Ignoring non-analyst report field {:?}", field),
    }
  }

  pub fn update_from_chunk(&mut self, chunk: &StateChunk) -> Result<(), Error> {
    for message in &chunk.messages {
      self.messages.push(message.clone());
    }
    for (field, content) in &chunk.reports {
      self.set_analyst_report(*field, content);
    }
    if let Some(debate) = &chunk.investment_debate_state {
      self.investment_debate_state = debate.clone();
      if let Some(decision) = debate.judge_decision_text() {
        self.investment_plan = decision.to_string();
      }
    }
    if let Some(risk) = &chunk.risk_debate_state {
      self.risk_debate_state = risk.clone();
      if let Some(decision) = risk.judge_decision_text() {
        self.final_trade_decision = decision.to_string();
      }
    }
    if let Some(plan) = &chunk.trader_investment_plan {
      self.trader_investment_plan = plan.clone();
    }
    return Ok(());
  }
}

/// One field-sparse partial update emitted by a pipeline step. Chunks flow
/// both into the pipeline state and, through the registry, into the
/// per-symbol UI state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateChunk {
  pub messages: Vec<ChatMessage>,
  pub reports: HashMap<ReportField, String>,
  pub investment_debate_state: Option<DebateState>,
  pub risk_debate_state: Option<DebateState>,
  pub trader_investment_plan: Option<String>,
  pub recommended_action: Option<String>,
}

impl StateChunk {

  pub fn new() -> Self {
    StateChunk::default()
  }

  pub fn is_empty(&self) -> bool {
    self.messages.is_empty()
      && self.reports.is_empty()
      && self.investment_debate_state.is_none()
      && self.risk_debate_state.is_none()
      && self.trader_investment_plan.is_none()
      && self.recommended_action.is_none()
  }

  pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
    self.messages = messages;
    return self;
  }

  pub fn with_report(mut self, field: ReportField, content: &str) -> Self {
    self.reports.insert(field, content.to_string());
    return self;
  }

  pub fn with_investment_debate(mut self, debate: DebateState) -> Self {
    self.investment_debate_state = Some(debate);
    return self;
  }

  pub fn with_risk_debate(mut self, debate: DebateState) -> Self {
    self.risk_debate_state = Some(debate);
    return self;
  }

  pub fn with_trader_plan(mut self, plan: &str) -> Self {
    self.trader_investment_plan = Some(plan.to_string());
    return self;
  }

  pub fn with_recommended_action(mut self, action: &str) -> Self {
    self.recommended_action = Some(action.to_string());
    return self;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::app::state::symbol::Speaker;

  #[test]
  fn deep_copy_is_isolated() {
    let base = AgentState::initial("NVDA", "2025-06-01");
    let mut copy_a = base.clone();
    let mut copy_b = base.clone();

    copy_a.messages.push(ChatMessage::assistant("analyst a output"));
    copy_a.market_report = "report a".to_string();
    copy_b.investment_debate_state.add_turn(Speaker::Bull, "bull turn");

    assert_eq!(base.messages.len(), 1);
    assert!(base.market_report.is_empty());
    assert_eq!(base.investment_debate_state.count, 0);
    assert_eq!(copy_b.messages.len(), 1);
    assert!(copy_b.market_report.is_empty());
    assert_eq!(copy_a.investment_debate_state.count, 0);
  }

  #[test]
  fn chunk_updates_reports_and_plans() {
    let mut state = AgentState::initial("NVDA", "2025-06-01");
    let chunk = StateChunk::new()
      .with_report(ReportField::Sentiment, "sentiment text")
      .with_trader_plan("buy the dip");
    state.update_from_chunk(&chunk).unwrap();

    assert_eq!(state.sentiment_report, "sentiment text");
    assert_eq!(state.trader_investment_plan, "buy the dip");
  }

  #[test]
  fn judge_decision_lands_in_plan_fields() {
    let mut state = AgentState::initial("NVDA", "2025-06-01");
    let mut debate = DebateState::new();
    debate.add_turn(Speaker::Bull, "case");
    debate.judge_decision = Some("BUY".to_string());
    state.update_from_chunk(&StateChunk::new().with_investment_debate(debate)).unwrap();

    assert_eq!(state.investment_plan, "BUY");
  }
}
