use std::sync::Arc;
use async_trait::async_trait;
use anyhow::{Result};
use std::result::Result::{Ok};

use crate::ai_agent::graph::graph::AgentStep;
use crate::ai_agent::graph::state::{AgentState, StateChunk};
use crate::ai_agent::llm::model_provider::{ChatMessage, LLMChatter, LLMModelConfig, MessageRole, ToolRequest};
use crate::ai_agent::tools::toolkit::Toolkit;
use crate::ai_agent::utils::analysts::AnalystType;
use crate::app::state::registry::AppRegistry;

fn analyst_brief(analyst: AnalystType) -> &'static str {
  match analyst {
    AnalystType::Market => "You are a market analyst. Study recent price action, trend, momentum and volatility for the company and write a trading-relevant technical report.",
    AnalystType::Social => "You are a social media analyst. Study public sentiment and discussion volume around the company and write a sentiment report.",
    AnalystType::News => "You are a news analyst. Study recent company news and relevant world events and write a news impact report.",
    AnalystType::Fundamentals => "You are a fundamentals analyst. Study the company's financial metrics and write a fundamentals report.",
    AnalystType::Macro => "You are a macro analyst. Study interest rates, inflation and broad market conditions and write a macro environment report.",
  }
}

/// A tool-using analyst. The first round plans and requests data; once tool
/// results are present in the transcript the second round writes the report.
pub struct LlmAnalystStep {
  analyst: AnalystType,
  llm: Arc<dyn LLMChatter>,
  llm_config: LLMModelConfig,
  toolkit: Arc<Toolkit>,
  registry: Arc<AppRegistry>,
}

impl LlmAnalystStep {

  pub fn new(analyst: AnalystType, llm: Arc<dyn LLMChatter>, llm_config: LLMModelConfig, toolkit: Arc<Toolkit>, registry: Arc<AppRegistry>) -> Self {
    LlmAnalystStep { analyst, llm, llm_config, toolkit, registry }
  }

  pub fn analyst(&self) -> AnalystType {
    return self.analyst;
  }

  fn has_tool_results(state: &AgentState) -> bool {
    state.messages.iter().any(|message| message.role == MessageRole::Tool)
  }

  async fn planning_round(&self, state: &AgentState) -> Result<StateChunk> {
    let requests: Vec<ToolRequest> = self.toolkit.default_requests(self.analyst, &state.company_of_interest, &state.trade_date);
    let tool_names: Vec<&str> = requests.iter().map(|request| request.name.as_str()).collect();

    let messages: Vec<ChatMessage> = vec![
      ChatMessage::system(analyst_brief(self.analyst)),
      ChatMessage::human(&format!(
        "Company: {}. Trade date: {}. Available tools: {}. State briefly what data you need before writing your report.",
        state.company_of_interest, state.trade_date, tool_names.join(", ")
      )),
    ];

    self.registry.register_llm_call(Some(&self.llm_config.model_name), Some(&format!("{} planning", self.analyst.display_name())));
    let response = self.llm.chat(messages, &self.llm_config).await?;

    return Ok(StateChunk::new().with_messages(vec![
      ChatMessage::assistant_with_tools(&response.content, requests),
    ]));
  }

  async fn report_round(&self, state: &AgentState) -> Result<StateChunk> {
    let tool_outputs: Vec<&str> = state.messages.iter()
      .filter(|message| message.role == MessageRole::Tool)
      .map(|message| message.content.as_str())
      .collect();

    let messages: Vec<ChatMessage> = vec![
      ChatMessage::system(analyst_brief(self.analyst)),
      ChatMessage::human(&format!(
        "Company: {}. Trade date: {}.\n\nCollected data:\n{}\n\nWrite your full report now. End with a markdown table summarizing the key points.",
        state.company_of_interest, state.trade_date, tool_outputs.join("\n\n")
      )),
    ];

    self.registry.register_llm_call(Some(&self.llm_config.model_name), Some(&format!("{} report", self.analyst.display_name())));
    let response = self.llm.chat(messages, &self.llm_config).await?;

    return Ok(StateChunk::new()
      .with_messages(vec![ChatMessage::assistant(&response.content)])
      .with_report(self.analyst.report_field(), &response.content));
  }
}

#[async_trait]
impl AgentStep for LlmAnalystStep {
  async fn call(&self, state: AgentState) -> Result<StateChunk> {
    if Self::has_tool_results(&state) {
      return self.report_round(&state).await;
    }
    return self.planning_round(&state).await;
  }
}
