use std::collections::HashMap;
use serde::{Serialize, Deserialize};
use serde_json::Value;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Agent lifecycle. Variant order matters: transitions may only move to a
/// strictly greater status within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgentStatus {
  Pending,
  InProgress,
  Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentName {
  MarketAnalyst,
  SocialAnalyst,
  NewsAnalyst,
  FundamentalsAnalyst,
  MacroAnalyst,
  BullResearcher,
  BearResearcher,
  ResearchManager,
  Trader,
  RiskyAnalyst,
  SafeAnalyst,
  NeutralAnalyst,
  PortfolioManager,
}

impl AgentName {

  pub const ALL: [AgentName; 13] = [
    AgentName::MarketAnalyst,
    AgentName::SocialAnalyst,
    AgentName::NewsAnalyst,
    AgentName::FundamentalsAnalyst,
    AgentName::MacroAnalyst,
    AgentName::BullResearcher,
    AgentName::BearResearcher,
    AgentName::ResearchManager,
    AgentName::Trader,
    AgentName::RiskyAnalyst,
    AgentName::SafeAnalyst,
    AgentName::NeutralAnalyst,
    AgentName::PortfolioManager,
  ];

  pub fn display_name(&self) -> &'static str {
    match self {
      AgentName::MarketAnalyst => "Market Analyst",
      AgentName::SocialAnalyst => "Social Analyst",
      AgentName::NewsAnalyst => "News Analyst",
      AgentName::FundamentalsAnalyst => "Fundamentals Analyst",
      AgentName::MacroAnalyst => "Macro Analyst",
      AgentName::BullResearcher => "Bull Researcher",
      AgentName::BearResearcher => "Bear Researcher",
      AgentName::ResearchManager => "Research Manager",
      AgentName::Trader => "Trader",
      AgentName::RiskyAnalyst => "Risky Analyst",
      AgentName::SafeAnalyst => "Safe Analyst",
      AgentName::NeutralAnalyst => "Neutral Analyst",
      AgentName::PortfolioManager => "Portfolio Manager",
    }
  }
}

/// One slot per analyst or debate role in the per-symbol report table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportField {
  Market,
  Sentiment,
  News,
  Fundamentals,
  Macro,
  Bull,
  Bear,
  ResearchManager,
  InvestmentPlan,
  TraderInvestmentPlan,
  Risky,
  Safe,
  Neutral,
  PortfolioDecision,
  FinalTradeDecision,
}

impl ReportField {

  pub const ALL: [ReportField; 15] = [
    ReportField::Market,
    ReportField::Sentiment,
    ReportField::News,
    ReportField::Fundamentals,
    ReportField::Macro,
    ReportField::Bull,
    ReportField::Bear,
    ReportField::ResearchManager,
    ReportField::InvestmentPlan,
    ReportField::TraderInvestmentPlan,
    ReportField::Risky,
    ReportField::Safe,
    ReportField::Neutral,
    ReportField::PortfolioDecision,
    ReportField::FinalTradeDecision,
  ];

  /// The five fields written by the parallelizable analysts, in sequence order.
  pub const ANALYST_FIELDS: [ReportField; 5] = [
    ReportField::Market,
    ReportField::Sentiment,
    ReportField::News,
    ReportField::Fundamentals,
    ReportField::Macro,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      ReportField::Market => "market_report",
      ReportField::Sentiment => "sentiment_report",
      ReportField::News => "news_report",
      ReportField::Fundamentals => "fundamentals_report",
      ReportField::Macro => "macro_report",
      ReportField::Bull => "bull_report",
      ReportField::Bear => "bear_report",
      ReportField::ResearchManager => "research_manager_report",
      ReportField::InvestmentPlan => "investment_plan",
      ReportField::TraderInvestmentPlan => "trader_investment_plan",
      ReportField::Risky => "risky_report",
      ReportField::Safe => "safe_report",
      ReportField::Neutral => "neutral_report",
      ReportField::PortfolioDecision => "portfolio_decision",
      ReportField::FinalTradeDecision => "final_trade_decision",
    }
  }

  pub fn owner(&self) -> AgentName {
    match self {
      ReportField::Market => AgentName::MarketAnalyst,
      ReportField::Sentiment => AgentName::SocialAnalyst,
      ReportField::News => AgentName::NewsAnalyst,
      ReportField::Fundamentals => AgentName::FundamentalsAnalyst,
      ReportField::Macro => AgentName::MacroAnalyst,
      ReportField::Bull => AgentName::BullResearcher,
      ReportField::Bear => AgentName::BearResearcher,
      ReportField::ResearchManager => AgentName::ResearchManager,
      ReportField::InvestmentPlan => AgentName::Trader,
      ReportField::TraderInvestmentPlan => AgentName::Trader,
      ReportField::Risky => AgentName::RiskyAnalyst,
      ReportField::Safe => AgentName::SafeAnalyst,
      ReportField::Neutral => AgentName::NeutralAnalyst,
      ReportField::PortfolioDecision => AgentName::PortfolioManager,
      ReportField::FinalTradeDecision => AgentName::PortfolioManager,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
  Bull,
  Bear,
  Risky,
  Safe,
  Neutral,
}

impl Speaker {
  pub fn display_name(&self) -> &'static str {
    match self {
      Speaker::Bull => "Bull Researcher",
      Speaker::Bear => "Bear Researcher",
      Speaker::Risky => "Risky Analyst",
      Speaker::Safe => "Safe Analyst",
      Speaker::Neutral => "Neutral Analyst",
    }
  }
}

/// One completed debate turn. Keeping turns structured means speakers never
/// have to be recovered from concatenated history text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateTurn {
  pub speaker: Speaker,
  pub text: String,
  pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebateState {
  pub turns: Vec<DebateTurn>,
  pub count: u32,
  pub judge_decision: Option<String>,
}

impl DebateState {

  pub fn new() -> Self {
    DebateState { turns: Vec::new(), count: 0, judge_decision: None }
  }

  pub fn add_turn(&mut self, speaker: Speaker, text: &str) {
    self.turns.push(DebateTurn {
      speaker,
      text: text.to_string(),
      timestamp: Utc::now(),
    });
    self.count += 1;
  }

  pub fn has_content(&self, speaker: Speaker) -> bool {
    self.turns.iter().any(|turn| turn.speaker == speaker && !turn.text.trim().is_empty())
  }

  /// Latest single message from this speaker, if any structured turn exists.
  pub fn latest_for(&self, speaker: Speaker) -> Option<&str> {
    self.turns.iter().rev().find(|turn| turn.speaker == speaker).map(|turn| turn.text.as_str())
  }

  /// Full concatenated history for this speaker, oldest first.
  pub fn history_for(&self, speaker: Speaker) -> String {
    let parts: Vec<&str> = self.turns.iter().filter(|turn| turn.speaker == speaker).map(|turn| turn.text.as_str()).collect();
    return parts.join("\n");
  }

  pub fn judge_decision_text(&self) -> Option<&str> {
    match self.judge_decision.as_deref() {
      Some(decision) if !decision.trim().is_empty() => Some(decision),
      _ => None,
    }
  }

  /// Equality on what was said, ignoring turn timestamps. Re-delivered
  /// chunks rebuild turns with fresh timestamps, so derived equality would
  /// treat every replay as new content.
  pub fn content_eq(&self, other: &DebateState) -> bool {
    self.count == other.count
      && self.judge_decision == other.judge_decision
      && self.turns.len() == other.turns.len()
      && self.turns.iter().zip(other.turns.iter()).all(|(mine, theirs)| {
        mine.speaker == theirs.speaker && mine.text == theirs.text
      })
  }
}

/// The authoritative mutable record of one ticker's analysis. Mutated only
/// through the registry's chunk processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolState {
  pub ticker: String,
  pub agent_statuses: HashMap<AgentName, AgentStatus>,
  pub current_reports: HashMap<ReportField, Option<String>>,
  pub report_timestamps: HashMap<ReportField, DateTime<Utc>>,
  pub update_counts: HashMap<ReportField, u32>,
  pub investment_debate_state: Option<DebateState>,
  pub risk_debate_state: Option<DebateState>,
  pub analysis_complete: bool,
  pub recommended_action: Option<String>,
  pub analysis_results: Option<Value>,
  pub chart_data: Option<Value>,
  pub chart_period: String,
  pub session_id: String,
  pub session_start_time: DateTime<Utc>,
}

fn new_session_id() -> String {
  let full = Uuid::new_v4().simple().to_string();
  return full[..8].to_string();
}

impl SymbolState {

  pub fn new(ticker: &str) -> Self {
    let mut agent_statuses: HashMap<AgentName, AgentStatus> = HashMap::new();
    for agent in AgentName::ALL.iter() {
      agent_statuses.insert(*agent, AgentStatus::Pending);
    }

    let mut current_reports: HashMap<ReportField, Option<String>> = HashMap::new();
    for field in ReportField::ALL.iter() {
      current_reports.insert(*field, None);
    }

    SymbolState {
      ticker: ticker.to_string(),
      agent_statuses,
      current_reports,
      report_timestamps: HashMap::new(),
      update_counts: HashMap::new(),
      investment_debate_state: None,
      risk_debate_state: None,
      analysis_complete: false,
      recommended_action: None,
      analysis_results: None,
      chart_data: None,
      chart_period: "1y".to_string(),
      session_id: new_session_id(),
      session_start_time: Utc::now(),
    }
  }

  /// Reset analysis data in place for a fresh session. Ticker identity and
  /// chart data survive the reset.
  pub fn start_new_session(&mut self) {
    for status in self.agent_statuses.values_mut() {
      *status = AgentStatus::Pending;
    }
    for report in self.current_reports.values_mut() {
      *report = None;
    }
    self.report_timestamps.clear();
    self.update_counts.clear();
    self.investment_debate_state = None;
    self.risk_debate_state = None;
    self.analysis_complete = false;
    self.recommended_action = None;
    self.analysis_results = None;
    self.session_id = new_session_id();
    self.session_start_time = Utc::now();
    log::info!("[STATE - {}] Started new analysis session {}", self.ticker, self.session_id);
  }

  pub fn status(&self, agent: AgentName) -> AgentStatus {
    self.agent_statuses.get(&agent).copied().unwrap_or(AgentStatus::Pending)
  }

  pub fn report(&self, field: ReportField) -> Option<&str> {
    self.current_reports.get(&field).and_then(|slot| slot.as_deref())
  }

  pub fn generated_reports_count(&self) -> usize {
    self.current_reports.values().filter(|slot| {
      match slot {
        Some(content) => !content.trim().is_empty(),
        None => false,
      }
    }).count()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_state_is_all_pending_and_empty() {
    let state = SymbolState::new("AAPL");
    assert_eq!(state.agent_statuses.len(), 13);
    assert!(state.agent_statuses.values().all(|s| *s == AgentStatus::Pending));
    assert_eq!(state.generated_reports_count(), 0);
    assert!(!state.analysis_complete);
    assert_eq!(state.session_id.len(), 8);
  }

  #[test]
  fn session_reset_keeps_ticker_and_chart() {
    let mut state = SymbolState::new("BTC-USD");
    state.chart_data = Some(serde_json::json!({"points": [1, 2]}));
    state.agent_statuses.insert(AgentName::MarketAnalyst, AgentStatus::Completed);
    state.current_reports.insert(ReportField::Market, Some("done".to_string()));
    state.analysis_complete = true;
    let old_session = state.session_id.clone();

    state.start_new_session();

    assert_eq!(state.ticker, "BTC-USD");
    assert!(state.chart_data.is_some());
    assert_eq!(state.status(AgentName::MarketAnalyst), AgentStatus::Pending);
    assert!(state.report(ReportField::Market).is_none());
    assert!(!state.analysis_complete);
    assert_ne!(state.session_id, old_session);
  }

  #[test]
  fn debate_state_latest_and_history() {
    let mut debate = DebateState::new();
    debate.add_turn(Speaker::Bull, "first bull point");
    debate.add_turn(Speaker::Bear, "bear rebuttal");
    debate.add_turn(Speaker::Bull, "second bull point");

    assert_eq!(debate.count, 3);
    assert_eq!(debate.latest_for(Speaker::Bull), Some("second bull point"));
    assert_eq!(debate.history_for(Speaker::Bull), "first bull point\nsecond bull point");
    assert!(debate.has_content(Speaker::Bear));
    assert!(!debate.has_content(Speaker::Risky));
    assert!(debate.judge_decision_text().is_none());
  }
}
