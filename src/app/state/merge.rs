use chrono::Utc;

use crate::ai_agent::graph::state::StateChunk;
use crate::ai_agent::llm::model_provider::MessageRole;
use crate::app::state::symbol::{AgentName, AgentStatus, ReportField, Speaker, SymbolState};

/// Streaming engines re-deliver recently-applied values; exact duplicates
/// inside this window are dropped without further checks.
const DUPLICATE_WINDOW_SECS: i64 = 5;

/// Once an agent is completed, a replacement report must be at least 20%
/// longer than the stored one. Content length never decreases after
/// completion.
const LENGTH_GROWTH_NUM: usize = 6;
const LENGTH_GROWTH_DEN: usize = 5;

/// Runaway-update circuit breaker thresholds per report field.
const UPDATE_WARN_LIMIT: u32 = 10;
const UPDATE_HARD_LIMIT: u32 = 15;

/// Forward-only status transition. Returns true when the status actually
/// moved; regressions are dropped.
pub fn set_agent_status(state: &mut SymbolState, agent: AgentName, status: AgentStatus) -> bool {
  let current: AgentStatus = state.status(agent);
  if status <= current {
    if status < current {
      log::debug!("[STATE - {}] Ignoring status regression for {}: {:?} -> {:?}", state.ticker, agent.display_name(), current, status);
    }
    return false;
  }
  state.agent_statuses.insert(agent, status);
  log::info!("[STATE - {}] Updated {} status to {:?}", state.ticker, agent.display_name(), status);
  return true;
}

/// Direct set used for debate-derived report slots. Returns true on change.
fn store_report(state: &mut SymbolState, field: ReportField, content: &str) -> bool {
  let current: Option<&str> = state.report(field);
  if current == Some(content) {
    return false;
  }
  state.current_reports.insert(field, Some(content.to_string()));
  state.report_timestamps.insert(field, Utc::now());
  return true;
}

/// Fold one partial-state chunk into a SymbolState. Invoked once per chunk,
/// serialized per symbol by the owning registry; never call this concurrently
/// on the same state. Returns true when anything observable changed.
pub fn apply_chunk(state: &mut SymbolState, chunk: &StateChunk, sequence: &[AgentName]) -> bool {
  let mut changed: bool = false;

  changed |= apply_analyst_reports(state, chunk, sequence);
  changed |= apply_investment_debate(state, chunk);
  changed |= apply_trader_plan(state, chunk);
  changed |= apply_risk_debate(state, chunk);
  changed |= apply_initial_message(state, chunk, sequence);

  return changed;
}

fn apply_analyst_reports(state: &mut SymbolState, chunk: &StateChunk, sequence: &[AgentName]) -> bool {
  let mut changed: bool = false;

  for field in ReportField::ANALYST_FIELDS.iter() {
    let new_report: &str = match chunk.reports.get(field) {
      Some(content) if !content.trim().is_empty() => content,
      _ => continue,
    };

    let agent: AgentName = field.owner();
    let current_status: AgentStatus = state.status(agent);
    let current_report: Option<String> = state.report(*field).map(|r| r.to_string());
    let is_same = current_report.as_deref() == Some(new_report);

    // Recent exact duplicate after completion: stream spam, drop fast.
    if is_same && current_status == AgentStatus::Completed {
      let recent = state.report_timestamps.get(field).map(|ts| {
        (Utc::now() - *ts).num_seconds() < DUPLICATE_WINDOW_SECS
      }).unwrap_or(false);
      if recent {
        continue;
      }
    }

    let mut accepted: bool = false;
    if !is_same || current_status != AgentStatus::Completed {
      // Once completed, only a clearly larger final report may replace the
      // stored one; shorter streaming leftovers are rejected.
      if current_status == AgentStatus::Completed {
        let current_len: usize = current_report.as_deref().map(|r| r.len()).unwrap_or(0);
        let new_len: usize = new_report.len();
        if new_len * LENGTH_GROWTH_DEN < current_len * LENGTH_GROWTH_NUM {
          log::debug!("[STATE - {}] Blocking {} update: {} chars < required growth over {} chars", state.ticker, field.as_str(), new_len, current_len);
          continue;
        }
        log::info!("[STATE - {}] Accepting larger final {}: {} chars (was {})", state.ticker, field.as_str(), new_len, current_len);
      }

      let update_count: u32 = state.update_counts.get(field).copied().unwrap_or(0);
      if update_count > UPDATE_WARN_LIMIT {
        log::warn!("[STATE - {}] {} has been updated {} times. Possible runaway upstream step.", state.ticker, field.as_str(), update_count);
        if update_count > UPDATE_HARD_LIMIT {
          continue;
        }
      }

      state.current_reports.insert(*field, Some(new_report.to_string()));
      state.report_timestamps.insert(*field, Utc::now());
      state.update_counts.insert(*field, update_count + 1);
      log::info!("[STATE - {}] Updated {} with content length: {} (update #{})", state.ticker, field.as_str(), new_report.len(), update_count + 1);
      accepted = true;
      changed = true;
    }

    // A report landing on an in-progress agent completes it and advances the
    // next pending analyst in the fixed sequence. A report alone never
    // promotes a pending agent; that progression is owned by the sequence.
    if accepted && current_status == AgentStatus::InProgress {
      changed |= set_agent_status(state, agent, AgentStatus::Completed);

      if let Some(position) = sequence.iter().position(|candidate| *candidate == agent) {
        if position + 1 < sequence.len() {
          let next_analyst: AgentName = sequence[position + 1];
          if state.status(next_analyst) == AgentStatus::Pending {
            changed |= set_agent_status(state, next_analyst, AgentStatus::InProgress);
            log::info!("[STATE - {}] Advanced to next analyst: {}", state.ticker, next_analyst.display_name());
          }
        }
        else {
          log::info!("[STATE - {}] All {} analysts completed. Ready for research phase.", state.ticker, sequence.len());
        }
      }
    }
    else if current_status == AgentStatus::Pending {
      log::info!("[STATE - {}] Received {} for {} while still pending", state.ticker, field.as_str(), agent.display_name());
    }
  }

  return changed;
}

fn apply_investment_debate(state: &mut SymbolState, chunk: &StateChunk) -> bool {
  let debate = match &chunk.investment_debate_state {
    Some(debate) => debate,
    None => return false,
  };

  let mut changed: bool = false;

  // Out-of-order fragment carrying fewer turns than already stored: drop it
  // before it can roll the debate back.
  if let Some(current) = state.investment_debate_state.as_ref() {
    if debate.count < current.count {
      log::debug!("[STATE - {}] Dropping stale investment debate fragment ({} turns < {})", state.ticker, debate.count, current.count);
      return false;
    }
  }

  let already_stored = state.investment_debate_state.as_ref().map(|current| current.content_eq(debate)).unwrap_or(false);
  if !already_stored {
    state.investment_debate_state = Some(debate.clone());
    changed = true;
  }

  for (speaker, field, agent) in [
    (Speaker::Bull, ReportField::Bull, AgentName::BullResearcher),
    (Speaker::Bear, ReportField::Bear, AgentName::BearResearcher),
  ] {
    if debate.has_content(speaker) {
      changed |= set_agent_status(state, agent, AgentStatus::InProgress);
      let content: String = match debate.latest_for(speaker) {
        Some(latest) => latest.to_string(),
        None => debate.history_for(speaker),
      };
      changed |= store_report(state, field, &content);
    }
  }

  if let Some(decision) = debate.judge_decision_text() {
    let decision: String = decision.to_string();
    changed |= set_agent_status(state, AgentName::BullResearcher, AgentStatus::Completed);
    changed |= set_agent_status(state, AgentName::BearResearcher, AgentStatus::Completed);
    changed |= set_agent_status(state, AgentName::ResearchManager, AgentStatus::Completed);
    changed |= store_report(state, ReportField::ResearchManager, &decision);
    changed |= store_report(state, ReportField::InvestmentPlan, &decision);
    changed |= set_agent_status(state, AgentName::Trader, AgentStatus::InProgress);
  }

  return changed;
}

fn apply_trader_plan(state: &mut SymbolState, chunk: &StateChunk) -> bool {
  let plan: &str = match chunk.trader_investment_plan.as_deref() {
    Some(plan) if !plan.trim().is_empty() => plan,
    _ => return false,
  };

  let mut changed: bool = store_report(state, ReportField::TraderInvestmentPlan, plan);
  changed |= set_agent_status(state, AgentName::Trader, AgentStatus::Completed);
  changed |= set_agent_status(state, AgentName::RiskyAnalyst, AgentStatus::InProgress);
  return changed;
}

fn apply_risk_debate(state: &mut SymbolState, chunk: &StateChunk) -> bool {
  let risk = match &chunk.risk_debate_state {
    Some(risk) => risk,
    None => return false,
  };

  let mut changed: bool = false;

  if let Some(current) = state.risk_debate_state.as_ref() {
    if risk.count < current.count {
      log::debug!("[STATE - {}] Dropping stale risk debate fragment ({} turns < {})", state.ticker, risk.count, current.count);
      return false;
    }
  }

  let already_stored = state.risk_debate_state.as_ref().map(|current| current.content_eq(risk)).unwrap_or(false);
  if !already_stored {
    state.risk_debate_state = Some(risk.clone());
    changed = true;
  }

  let debaters = [
    (Speaker::Risky, ReportField::Risky, AgentName::RiskyAnalyst),
    (Speaker::Safe, ReportField::Safe, AgentName::SafeAnalyst),
    (Speaker::Neutral, ReportField::Neutral, AgentName::NeutralAnalyst),
  ];

  for (speaker, field, agent) in debaters {
    if risk.has_content(speaker) {
      changed |= set_agent_status(state, agent, AgentStatus::InProgress);
      let content: String = match risk.latest_for(speaker) {
        Some(latest) => latest.to_string(),
        None => risk.history_for(speaker),
      };
      changed |= store_report(state, field, &content);
    }
  }

  if let Some(decision) = risk.judge_decision_text() {
    let decision: String = decision.to_string();

    // Keep individual debater reports populated even when only history made
    // it through the stream.
    for (speaker, field, _) in debaters {
      if state.report(field).is_none() {
        let history: String = risk.history_for(speaker);
        if !history.trim().is_empty() {
          changed |= store_report(state, field, history.trim());
        }
      }
    }

    changed |= set_agent_status(state, AgentName::RiskyAnalyst, AgentStatus::Completed);
    changed |= set_agent_status(state, AgentName::SafeAnalyst, AgentStatus::Completed);
    changed |= set_agent_status(state, AgentName::NeutralAnalyst, AgentStatus::Completed);
    changed |= set_agent_status(state, AgentName::PortfolioManager, AgentStatus::Completed);

    changed |= store_report(state, ReportField::PortfolioDecision, &decision);
    changed |= store_report(state, ReportField::FinalTradeDecision, &decision);

    if let Some(action) = chunk.recommended_action.as_deref() {
      if state.recommended_action.as_deref() != Some(action) {
        state.recommended_action = Some(action.to_string());
        changed = true;
      }
    }

    // The single authoritative completion signal. Set exactly once per
    // session no matter how many judge chunks are replayed.
    if !state.analysis_complete {
      state.analysis_complete = true;
      changed = true;
      log::info!("[STATE - {}] Final decision set, analysis complete", state.ticker);
    }
  }

  return changed;
}

fn apply_initial_message(state: &mut SymbolState, chunk: &StateChunk, sequence: &[AgentName]) -> bool {
  let has_human = chunk.messages.iter().any(|message| message.role == MessageRole::Human);
  if !has_human {
    return false;
  }

  // Only the very first human message may seed progress, and only when no
  // analyst is already running.
  let any_in_progress = sequence.iter().any(|agent| state.status(*agent) == AgentStatus::InProgress);
  if any_in_progress {
    return false;
  }

  for agent in sequence.iter() {
    if state.status(*agent) == AgentStatus::Pending {
      return set_agent_status(state, *agent, AgentStatus::InProgress);
    }
  }

  return false;
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ai_agent::llm::model_provider::ChatMessage;
  use crate::app::state::symbol::DebateState;
  use rand::Rng;

  fn full_sequence() -> Vec<AgentName> {
    vec![
      AgentName::MarketAnalyst,
      AgentName::SocialAnalyst,
      AgentName::NewsAnalyst,
      AgentName::FundamentalsAnalyst,
      AgentName::MacroAnalyst,
    ]
  }

  fn judge_chunk(decision: &str) -> StateChunk {
    let mut risk = DebateState::new();
    risk.add_turn(Speaker::Risky, "aggressive take");
    risk.add_turn(Speaker::Safe, "conservative take");
    risk.add_turn(Speaker::Neutral, "balanced take");
    risk.judge_decision = Some(decision.to_string());
    StateChunk::new().with_risk_debate(risk).with_recommended_action("BUY")
  }

  #[test]
  fn duplicate_chunk_applies_once() {
    let mut state = SymbolState::new("AAPL");
    let sequence = full_sequence();
    set_agent_status(&mut state, AgentName::MarketAnalyst, AgentStatus::InProgress);

    let chunk = StateChunk::new().with_report(ReportField::Market, "the market report");

    assert!(apply_chunk(&mut state, &chunk, &sequence));
    let snapshot = state.clone();

    assert!(!apply_chunk(&mut state, &chunk, &sequence));
    assert_eq!(state, snapshot);
  }

  #[test]
  fn report_never_promotes_pending_agent() {
    let mut state = SymbolState::new("AAPL");
    let sequence = full_sequence();

    let chunk = StateChunk::new().with_report(ReportField::News, "early news report");
    apply_chunk(&mut state, &chunk, &sequence);

    // Content is stored but the pending agent stays pending.
    assert_eq!(state.report(ReportField::News), Some("early news report"));
    assert_eq!(state.status(AgentName::NewsAnalyst), AgentStatus::Pending);
  }

  #[test]
  fn completion_advances_next_in_sequence() {
    let mut state = SymbolState::new("AAPL");
    let sequence = vec![AgentName::MarketAnalyst, AgentName::SocialAnalyst];
    set_agent_status(&mut state, AgentName::MarketAnalyst, AgentStatus::InProgress);

    apply_chunk(&mut state, &StateChunk::new().with_report(ReportField::Market, "A"), &sequence);
    assert_eq!(state.status(AgentName::MarketAnalyst), AgentStatus::Completed);
    assert_eq!(state.status(AgentName::SocialAnalyst), AgentStatus::InProgress);
    assert_eq!(state.status(AgentName::NewsAnalyst), AgentStatus::Pending);

    apply_chunk(&mut state, &StateChunk::new().with_report(ReportField::Sentiment, "B"), &sequence);
    assert_eq!(state.status(AgentName::SocialAnalyst), AgentStatus::Completed);

    let mut debate = DebateState::new();
    debate.judge_decision = Some("BUY".to_string());
    apply_chunk(&mut state, &StateChunk::new().with_investment_debate(debate), &sequence);

    assert_eq!(state.status(AgentName::BullResearcher), AgentStatus::Completed);
    assert_eq!(state.status(AgentName::BearResearcher), AgentStatus::Completed);
    assert_eq!(state.status(AgentName::ResearchManager), AgentStatus::Completed);
    assert_eq!(state.status(AgentName::Trader), AgentStatus::InProgress);
  }

  #[test]
  fn initial_human_message_starts_first_pending_analyst() {
    let mut state = SymbolState::new("AAPL");
    let sequence = full_sequence();

    let chunk = StateChunk::new().with_messages(vec![ChatMessage::human("AAPL")]);
    assert!(apply_chunk(&mut state, &chunk, &sequence));
    assert_eq!(state.status(AgentName::MarketAnalyst), AgentStatus::InProgress);

    // Replay with an analyst already running is a no-op.
    assert!(!apply_chunk(&mut state, &chunk, &sequence));
    assert_eq!(state.status(AgentName::SocialAnalyst), AgentStatus::Pending);
  }

  #[test]
  fn length_guard_after_completion() {
    let mut state = SymbolState::new("AAPL");
    let sequence = full_sequence();
    set_agent_status(&mut state, AgentName::MarketAnalyst, AgentStatus::InProgress);

    let initial = "x".repeat(100);
    apply_chunk(&mut state, &StateChunk::new().with_report(ReportField::Market, &initial), &sequence);
    assert_eq!(state.status(AgentName::MarketAnalyst), AgentStatus::Completed);

    // Shorter than 120% of the stored report: rejected.
    let too_short = "y".repeat(119);
    assert!(!apply_chunk(&mut state, &StateChunk::new().with_report(ReportField::Market, &too_short), &sequence));
    assert_eq!(state.report(ReportField::Market), Some(initial.as_str()));

    // Exactly 120%: accepted.
    let long_enough = "z".repeat(120);
    assert!(apply_chunk(&mut state, &StateChunk::new().with_report(ReportField::Market, &long_enough), &sequence));
    assert_eq!(state.report(ReportField::Market), Some(long_enough.as_str()));
  }

  #[test]
  fn analysis_complete_sets_exactly_once() {
    let mut state = SymbolState::new("AAPL");
    let sequence = full_sequence();

    assert!(apply_chunk(&mut state, &judge_chunk("SELL"), &sequence));
    assert!(state.analysis_complete);
    assert_eq!(state.recommended_action.as_deref(), Some("BUY"));

    let snapshot = state.clone();
    assert!(!apply_chunk(&mut state, &judge_chunk("SELL"), &sequence));
    assert!(!apply_chunk(&mut state, &judge_chunk("SELL"), &sequence));
    assert_eq!(state, snapshot);
  }

  #[test]
  fn redelivered_judge_chunk_with_fresh_timestamps_is_noop() {
    let mut state = SymbolState::new("AAPL");
    let sequence = full_sequence();

    assert!(apply_chunk(&mut state, &judge_chunk("SELL"), &sequence));
    let snapshot = state.clone();
    let stored_revision = state.risk_debate_state.clone().unwrap();

    // A re-delivered chunk rebuilds its turns, so the timestamps differ while
    // the spoken content is identical. That must not count as new content.
    let replay = judge_chunk("SELL");
    let replayed_turns = replay.risk_debate_state.as_ref().unwrap();
    assert!(stored_revision.content_eq(replayed_turns));

    assert!(!apply_chunk(&mut state, &replay, &sequence));
    assert_eq!(state, snapshot);
  }

  #[test]
  fn stale_debate_fragment_does_not_roll_back_turns() {
    let mut state = SymbolState::new("AAPL");
    let sequence = full_sequence();

    let mut debate = DebateState::new();
    debate.add_turn(Speaker::Bull, "opening bull case");
    debate.add_turn(Speaker::Bear, "bear rebuttal");
    apply_chunk(&mut state, &StateChunk::new().with_investment_debate(debate.clone()), &sequence);

    // An older fragment with only the first turn arrives late.
    let mut stale = DebateState::new();
    stale.add_turn(Speaker::Bull, "opening bull case");
    assert!(!apply_chunk(&mut state, &StateChunk::new().with_investment_debate(stale), &sequence));

    let kept = state.investment_debate_state.as_ref().unwrap();
    assert_eq!(kept.count, 2);
    assert_eq!(state.report(ReportField::Bear), Some("bear rebuttal"));
  }

  #[test]
  fn risk_judge_backfills_debater_reports_from_history() {
    let mut state = SymbolState::new("AAPL");
    let sequence = full_sequence();

    let mut risk = DebateState::new();
    risk.add_turn(Speaker::Risky, "leverage up");
    risk.judge_decision = Some("HOLD".to_string());
    apply_chunk(&mut state, &StateChunk::new().with_risk_debate(risk), &sequence);

    assert_eq!(state.report(ReportField::Risky), Some("leverage up"));
    assert_eq!(state.report(ReportField::PortfolioDecision), Some("HOLD"));
    assert_eq!(state.report(ReportField::FinalTradeDecision), Some("HOLD"));
    assert_eq!(state.status(AgentName::PortfolioManager), AgentStatus::Completed);
  }

  #[test]
  fn debate_fold_uses_latest_turn_and_starts_speaker() {
    let mut state = SymbolState::new("AAPL");
    let sequence = full_sequence();

    let mut debate = DebateState::new();
    debate.add_turn(Speaker::Bull, "opening bull case");
    debate.add_turn(Speaker::Bull, "stronger bull case");
    apply_chunk(&mut state, &StateChunk::new().with_investment_debate(debate), &sequence);

    assert_eq!(state.status(AgentName::BullResearcher), AgentStatus::InProgress);
    assert_eq!(state.report(ReportField::Bull), Some("stronger bull case"));
    assert_eq!(state.status(AgentName::BearResearcher), AgentStatus::Pending);
  }

  #[test]
  fn runaway_updates_hit_circuit_breaker() {
    let mut state = SymbolState::new("AAPL");
    let sequence = full_sequence();
    set_agent_status(&mut state, AgentName::MarketAnalyst, AgentStatus::InProgress);

    // Doubling length keeps every update past the post-completion guard
    // until the hard cap cuts them off.
    let mut len: usize = 1;
    let mut last_accepted = String::new();
    for round in 0..20 {
      let report = format!("{}{}", round, "x".repeat(len));
      let accepted = apply_chunk(&mut state, &StateChunk::new().with_report(ReportField::Market, &report), &sequence);
      if accepted {
        last_accepted = report;
      }
      len *= 2;
    }

    let final_count = state.update_counts.get(&ReportField::Market).copied().unwrap();
    assert_eq!(final_count, UPDATE_HARD_LIMIT + 1);
    assert_eq!(state.report(ReportField::Market), Some(last_accepted.as_str()));
  }

  #[test]
  fn statuses_are_monotonic_under_random_chunks() {
    let rank = |status: AgentStatus| -> u8 {
      match status {
        AgentStatus::Pending => 0,
        AgentStatus::InProgress => 1,
        AgentStatus::Completed => 2,
      }
    };

    let mut pool: Vec<StateChunk> = Vec::new();
    pool.push(StateChunk::new().with_messages(vec![ChatMessage::human("AAPL")]));
    pool.push(StateChunk::new().with_report(ReportField::Market, "m1"));
    pool.push(StateChunk::new().with_report(ReportField::Market, &"m".repeat(50)));
    pool.push(StateChunk::new().with_report(ReportField::Sentiment, "s1"));
    pool.push(StateChunk::new().with_report(ReportField::News, "n1"));
    pool.push(StateChunk::new().with_report(ReportField::Fundamentals, "f1"));
    pool.push(StateChunk::new().with_report(ReportField::Macro, "mc1"));
    let mut bull = DebateState::new();
    bull.add_turn(Speaker::Bull, "bull");
    bull.add_turn(Speaker::Bear, "bear");
    pool.push(StateChunk::new().with_investment_debate(bull));
    let mut judged = DebateState::new();
    judged.judge_decision = Some("BUY".to_string());
    pool.push(StateChunk::new().with_investment_debate(judged));
    pool.push(StateChunk::new().with_trader_plan("plan"));
    pool.push(judge_chunk("BUY"));

    let sequence = full_sequence();
    let mut rng = rand::thread_rng();

    for _ in 0..200 {
      let mut state = SymbolState::new("AAPL");
      for _ in 0..40 {
        let before: Vec<(AgentName, u8)> = AgentName::ALL.iter().map(|agent| (*agent, rank(state.status(*agent)))).collect();
        let chunk = &pool[rng.gen_range(0..pool.len())];
        apply_chunk(&mut state, chunk, &sequence);
        for (agent, old_rank) in before {
          assert!(rank(state.status(agent)) >= old_rank, "status regressed for {:?}", agent);
        }
      }
    }
  }
}
