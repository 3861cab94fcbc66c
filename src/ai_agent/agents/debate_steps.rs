use std::sync::Arc;
use async_trait::async_trait;
use anyhow::{Result};
use std::result::Result::{Ok};

use crate::ai_agent::graph::graph::AgentStep;
use crate::ai_agent::graph::state::{AgentState, StateChunk};
use crate::ai_agent::llm::model_provider::{ChatMessage, LLMChatter, LLMModelConfig};
use crate::app::state::registry::AppRegistry;
use crate::app::state::symbol::{DebateState, Speaker};

fn debate_transcript(debate: &DebateState) -> String {
  let lines: Vec<String> = debate.turns.iter().map(|turn| {
    format!("{}: {}", turn.speaker.display_name(), turn.text)
  }).collect();
  return lines.join("\n");
}

fn reports_digest(state: &AgentState) -> String {
  return format!(
    "Market report:\n{}\n\nSentiment report:\n{}\n\nNews report:\n{}\n\nFundamentals report:\n{}\n\nMacro report:\n{}",
    state.market_report, state.sentiment_report, state.news_report, state.fundamentals_report, state.macro_report
  );
}

/// Pull a final BUY/SELL/HOLD call out of free-form judge text. The marker
/// line wins; otherwise the first bare keyword does; otherwise HOLD.
pub fn extract_action(text: &str) -> String {
  let upper: String = text.to_uppercase();

  if let Some(position) = upper.find("FINAL TRANSACTION PROPOSAL:") {
    let tail: &str = &upper[position..];
    for action in ["BUY", "SELL", "HOLD"] {
      if tail.contains(action) {
        return action.to_string();
      }
    }
  }

  for word in upper.split(|ch: char| !ch.is_ascii_alphabetic()) {
    match word {
      "BUY" | "SELL" | "HOLD" => return word.to_string(),
      _ => {}
    }
  }
  return "HOLD".to_string();
}

fn researcher_brief(speaker: Speaker) -> &'static str {
  match speaker {
    Speaker::Bull => "You are the bull researcher. Argue the strongest case FOR investing in the company, engaging directly with the bear's latest points.",
    Speaker::Bear => "You are the bear researcher. Argue the strongest case AGAINST investing in the company, engaging directly with the bull's latest points.",
    Speaker::Risky => "You are the aggressive risk debater. Champion the high-reward reading of the trader's plan and challenge cautious objections.",
    Speaker::Safe => "You are the conservative risk debater. Stress capital protection and challenge the aggressive reading of the trader's plan.",
    Speaker::Neutral => "You are the neutral risk debater. Weigh both sides of the trader's plan and push for a balanced position.",
  }
}

/// One investment-debate voice (bull or bear). Each call appends exactly one
/// structured turn to the debate.
pub struct ResearcherStep {
  speaker: Speaker,
  llm: Arc<dyn LLMChatter>,
  llm_config: LLMModelConfig,
  registry: Arc<AppRegistry>,
}

impl ResearcherStep {
  pub fn new(speaker: Speaker, llm: Arc<dyn LLMChatter>, llm_config: LLMModelConfig, registry: Arc<AppRegistry>) -> Self {
    ResearcherStep { speaker, llm, llm_config, registry }
  }
}

#[async_trait]
impl AgentStep for ResearcherStep {
  async fn call(&self, state: AgentState) -> Result<StateChunk> {
    let messages: Vec<ChatMessage> = vec![
      ChatMessage::system(researcher_brief(self.speaker)),
      ChatMessage::human(&format!(
        "Company: {}.\n\n{}\n\nDebate so far:\n{}\n\nMake your next argument.",
        state.company_of_interest, reports_digest(&state), debate_transcript(&state.investment_debate_state)
      )),
    ];

    self.registry.register_llm_call(Some(&self.llm_config.model_name), Some(&format!("{} turn", self.speaker.display_name())));
    let response = self.llm.chat(messages, &self.llm_config).await?;

    let mut debate: DebateState = state.investment_debate_state.clone();
    debate.add_turn(self.speaker, &response.content);

    return Ok(StateChunk::new()
      .with_messages(vec![ChatMessage::assistant(&response.content)])
      .with_investment_debate(debate));
  }
}

/// The research manager reads the whole bull/bear exchange and issues the
/// investment plan as the debate's judge decision.
pub struct ResearchJudgeStep {
  llm: Arc<dyn LLMChatter>,
  llm_config: LLMModelConfig,
  registry: Arc<AppRegistry>,
}

impl ResearchJudgeStep {
  pub fn new(llm: Arc<dyn LLMChatter>, llm_config: LLMModelConfig, registry: Arc<AppRegistry>) -> Self {
    ResearchJudgeStep { llm, llm_config, registry }
  }
}

#[async_trait]
impl AgentStep for ResearchJudgeStep {
  async fn call(&self, state: AgentState) -> Result<StateChunk> {
    let messages: Vec<ChatMessage> = vec![
      ChatMessage::system("You are the research manager. Judge the bull/bear debate decisively and write an actionable investment plan. Avoid defaulting to a neutral stance."),
      ChatMessage::human(&format!(
        "Company: {}.\n\nDebate transcript:\n{}\n\nDeliver your verdict and plan.",
        state.company_of_interest, debate_transcript(&state.investment_debate_state)
      )),
    ];

    self.registry.register_llm_call(Some(&self.llm_config.model_name), Some("Research Manager decision"));
    let response = self.llm.chat(messages, &self.llm_config).await?;

    let mut debate: DebateState = state.investment_debate_state.clone();
    debate.judge_decision = Some(response.content.clone());

    return Ok(StateChunk::new()
      .with_messages(vec![ChatMessage::assistant(&response.content)])
      .with_investment_debate(debate));
  }
}

/// Turns the investment plan into a concrete trade proposal.
pub struct TraderStep {
  llm: Arc<dyn LLMChatter>,
  llm_config: LLMModelConfig,
  registry: Arc<AppRegistry>,
}

impl TraderStep {
  pub fn new(llm: Arc<dyn LLMChatter>, llm_config: LLMModelConfig, registry: Arc<AppRegistry>) -> Self {
    TraderStep { llm, llm_config, registry }
  }
}

#[async_trait]
impl AgentStep for TraderStep {
  async fn call(&self, state: AgentState) -> Result<StateChunk> {
    let messages: Vec<ChatMessage> = vec![
      ChatMessage::system("You are the trader. Turn the investment plan into a concrete trade proposal. Always end with 'FINAL TRANSACTION PROPOSAL: **BUY/HOLD/SELL**'."),
      ChatMessage::human(&format!(
        "Company: {}.\n\nInvestment plan:\n{}\n\n{}",
        state.company_of_interest, state.investment_plan, reports_digest(&state)
      )),
    ];

    self.registry.register_llm_call(Some(&self.llm_config.model_name), Some("Trader plan"));
    let response = self.llm.chat(messages, &self.llm_config).await?;

    return Ok(StateChunk::new()
      .with_messages(vec![ChatMessage::assistant(&response.content)])
      .with_trader_plan(&response.content));
  }
}

/// One risk-debate voice (risky, safe or neutral).
pub struct RiskDebaterStep {
  speaker: Speaker,
  llm: Arc<dyn LLMChatter>,
  llm_config: LLMModelConfig,
  registry: Arc<AppRegistry>,
}

impl RiskDebaterStep {
  pub fn new(speaker: Speaker, llm: Arc<dyn LLMChatter>, llm_config: LLMModelConfig, registry: Arc<AppRegistry>) -> Self {
    RiskDebaterStep { speaker, llm, llm_config, registry }
  }
}

#[async_trait]
impl AgentStep for RiskDebaterStep {
  async fn call(&self, state: AgentState) -> Result<StateChunk> {
    let messages: Vec<ChatMessage> = vec![
      ChatMessage::system(researcher_brief(self.speaker)),
      ChatMessage::human(&format!(
        "Company: {}.\n\nTrader's plan:\n{}\n\nRisk debate so far:\n{}\n\nMake your next argument.",
        state.company_of_interest, state.trader_investment_plan, debate_transcript(&state.risk_debate_state)
      )),
    ];

    self.registry.register_llm_call(Some(&self.llm_config.model_name), Some(&format!("{} turn", self.speaker.display_name())));
    let response = self.llm.chat(messages, &self.llm_config).await?;

    let mut debate: DebateState = state.risk_debate_state.clone();
    debate.add_turn(self.speaker, &response.content);

    return Ok(StateChunk::new()
      .with_messages(vec![ChatMessage::assistant(&response.content)])
      .with_risk_debate(debate));
  }
}

/// The portfolio manager closes the risk debate and fixes the final action.
pub struct RiskJudgeStep {
  llm: Arc<dyn LLMChatter>,
  llm_config: LLMModelConfig,
  registry: Arc<AppRegistry>,
}

impl RiskJudgeStep {
  pub fn new(llm: Arc<dyn LLMChatter>, llm_config: LLMModelConfig, registry: Arc<AppRegistry>) -> Self {
    RiskJudgeStep { llm, llm_config, registry }
  }
}

#[async_trait]
impl AgentStep for RiskJudgeStep {
  async fn call(&self, state: AgentState) -> Result<StateChunk> {
    let messages: Vec<ChatMessage> = vec![
      ChatMessage::system("You are the portfolio manager. Judge the risk debate and issue the final, binding trade decision. Always end with 'FINAL TRANSACTION PROPOSAL: **BUY/HOLD/SELL**'."),
      ChatMessage::human(&format!(
        "Company: {}.\n\nTrader's plan:\n{}\n\nRisk debate transcript:\n{}\n\nDeliver the final decision.",
        state.company_of_interest, state.trader_investment_plan, debate_transcript(&state.risk_debate_state)
      )),
    ];

    self.registry.register_llm_call(Some(&self.llm_config.model_name), Some("Portfolio Manager decision"));
    let response = self.llm.chat(messages, &self.llm_config).await?;

    let action: String = extract_action(&response.content);
    let mut debate: DebateState = state.risk_debate_state.clone();
    debate.judge_decision = Some(response.content.clone());

    return Ok(StateChunk::new()
      .with_messages(vec![ChatMessage::assistant(&response.content)])
      .with_risk_debate(debate)
      .with_recommended_action(&action));
  }
}
