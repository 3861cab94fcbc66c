use std::collections::HashMap;
use std::sync::Arc;
use anyhow::{Result, Error, anyhow};
use chrono::Local;
use std::result::Result::{Ok, Err};

use crate::ai_agent::agents::analyst_steps::LlmAnalystStep;
use crate::ai_agent::agents::debate_steps::{ResearcherStep, ResearchJudgeStep, RiskDebaterStep, RiskJudgeStep, TraderStep};
use crate::ai_agent::graph::graph::{AgentStep, CompiledGraph, StateGraph};
use crate::ai_agent::graph::parallel::ParallelAnalystCoordinator;
use crate::ai_agent::graph::runner::AgentRunner;
use crate::ai_agent::graph::sequential::SequentialAnalystCoordinator;
use crate::ai_agent::graph::state::{AgentState, StateChunk};
use crate::ai_agent::llm::model_provider::{LLMChatter, LLMModelConfig, ModelProvider};
use crate::ai_agent::llm::models::{get_available_models, get_model, get_ollama_models};
use crate::ai_agent::tools::toolkit::Toolkit;
use crate::ai_agent::utils::analysts::{get_analyst_order, resolve_selected_analysts, AnalystType};
use crate::app::config::Config;
use crate::app::state::registry::AppRegistry;
use crate::app::state::symbol::Speaker;

/// Orchestrates whole analysis runs: queueing, the analyst phase (parallel or
/// sequential) and the debate graph that follows it.
pub struct AnalysisService {
  config: Config,
  registry: Arc<AppRegistry>,
  toolkit: Arc<Toolkit>,
}

impl AnalysisService {

  pub fn new(config: Config, registry: Arc<AppRegistry>) -> Self {
    let toolkit: Arc<Toolkit> = Arc::new(Toolkit::new(&config, registry.clone()));
    AnalysisService { config, registry, toolkit }
  }

  pub fn registry(&self) -> Arc<AppRegistry> {
    return self.registry.clone();
  }

  pub fn get_available_analysts(&self) -> Result<Vec<HashMap<String, String>>, Error> {
    let analysts = get_analyst_order().iter().map(|(display_name, key)| {
      let mut map = HashMap::new();
      map.insert("display_name".to_string(), display_name.to_string());
      map.insert("key".to_string(), key.to_string());
      map
    }).collect();
    return Ok(analysts);
  }

  pub fn get_available_models(&self) -> Result<Vec<HashMap<String, String>>, Error> {
    let models = get_available_models().iter().chain(get_ollama_models().iter()).map(|model| {
      let mut map = HashMap::new();
      map.insert("display_name".to_string(), model.display_name.clone());
      map.insert("model_name".to_string(), model.model_name.clone());
      map.insert("provider".to_string(), model.provider.to_string());
      map
    }).collect();
    return Ok(models);
  }

  fn llm_for(&self, model_name: &str) -> Result<(Arc<dyn LLMChatter>, LLMModelConfig)> {
    let llm_config = LLMModelConfig {
      provider: ModelProvider::OpenAI,
      model_name: model_name.to_string(),
      api_key: self.config.openai_api_key.clone(),
      base_url: None,
      temperature: Some(0.7),
      max_tokens: None,
      top_p: None,
    };
    let llm: Arc<dyn LLMChatter> = Arc::from(get_model(&llm_config)?);
    return Ok((llm, llm_config));
  }

  /// Queue the symbols and work through them one at a time. Analyses for
  /// different symbols never interleave; within one symbol the analyst phase
  /// may fan out.
  pub async fn run_analysis(&self, symbols: Vec<String>, trade_date: Option<String>, selected_analysts: Option<Vec<String>>) -> Result<()> {
    if symbols.is_empty() {
      return Err(anyhow!("No symbols supplied"));
    }

    let analysts: Vec<AnalystType> = resolve_selected_analysts(&selected_analysts);
    let trade_date: String = trade_date.unwrap_or_else(|| Local::now().format("%Y-%m-%d").to_string());

    self.registry.set_active_analysts(analysts.clone());
    self.registry.enqueue_symbols(&symbols);

    while let Some(symbol) = self.registry.next_symbol() {
      log::info!("Starting analysis for {} on {}", symbol, trade_date);
      if let Err(error) = self.run_symbol(&symbol, &trade_date, &analysts).await {
        log::error!("Analysis for {} failed: {:#}", symbol, error);
      }
    }
    return Ok(());
  }

  async fn run_symbol(&self, symbol: &str, trade_date: &str, analysts: &[AnalystType]) -> Result<()> {
    self.registry.init_symbol_state(symbol);

    let base: AgentState = AgentState::initial(symbol, trade_date);
    self.registry.process_chunk(symbol, &StateChunk::new().with_messages(base.messages.clone()));

    let (quick_llm, quick_config) = self.llm_for(&self.config.quick_think_model)?;
    let (deep_llm, deep_config) = self.llm_for(&self.config.deep_think_model)?;

    let steps: Vec<(AnalystType, Arc<dyn AgentStep>)> = analysts.iter().map(|analyst| {
      let step: Arc<dyn AgentStep> = Arc::new(LlmAnalystStep::new(
        *analyst, quick_llm.clone(), quick_config.clone(), self.toolkit.clone(), self.registry.clone(),
      ));
      (*analyst, step)
    }).collect();

    let runner: Arc<AgentRunner> = Arc::new(AgentRunner::new(
      self.toolkit.clone(),
      self.config.analyst_call_delay_secs,
      self.config.tool_result_delay_secs,
    ));

    let state: AgentState = if self.config.parallel_analysts {
      let coordinator = ParallelAnalystCoordinator::new(runner, self.registry.clone(), self.config.analyst_start_delay_secs);
      coordinator.run_all(steps, base).await
    } else {
      let coordinator = SequentialAnalystCoordinator::new(runner, self.registry.clone());
      coordinator.run_all(steps, base).await
    };

    let graph: CompiledGraph = self.build_decision_graph(quick_llm, quick_config, deep_llm, deep_config)?;
    let final_state: AgentState = graph.invoke(state, self.registry.clone(), symbol).await?;

    log::info!("Analysis for {} finished with decision: {}", symbol, final_state.final_trade_decision);
    return Ok(());
  }

  /// The post-analyst workflow: bull/bear debate, research verdict, trader
  /// plan, risk debate, final decision.
  fn build_decision_graph(&self, quick_llm: Arc<dyn LLMChatter>, quick_config: LLMModelConfig, deep_llm: Arc<dyn LLMChatter>, deep_config: LLMModelConfig) -> Result<CompiledGraph> {
    let registry: Arc<AppRegistry> = self.registry.clone();
    let mut graph = StateGraph::new();

    graph.add_node("bull", Arc::new(ResearcherStep::new(Speaker::Bull, quick_llm.clone(), quick_config.clone(), registry.clone())));
    graph.add_node("bear", Arc::new(ResearcherStep::new(Speaker::Bear, quick_llm.clone(), quick_config.clone(), registry.clone())));
    graph.add_node("research_judge", Arc::new(ResearchJudgeStep::new(deep_llm.clone(), deep_config.clone(), registry.clone())));
    graph.add_node("trader", Arc::new(TraderStep::new(deep_llm.clone(), deep_config.clone(), registry.clone())));
    graph.add_node("risky", Arc::new(RiskDebaterStep::new(Speaker::Risky, quick_llm.clone(), quick_config.clone(), registry.clone())));
    graph.add_node("safe", Arc::new(RiskDebaterStep::new(Speaker::Safe, quick_llm.clone(), quick_config.clone(), registry.clone())));
    graph.add_node("neutral", Arc::new(RiskDebaterStep::new(Speaker::Neutral, quick_llm, quick_config, registry.clone())));
    graph.add_node("risk_judge", Arc::new(RiskJudgeStep::new(deep_llm, deep_config, registry)));

    let debate_turns: u32 = self.config.max_debate_rounds.max(1) * 2;
    let risk_turns: u32 = self.config.max_risk_rounds.max(1) * 3;

    graph.set_entry_point("bull");
    graph.add_edge("bull", "bear");
    graph.add_conditional_edge("bear", move |state: &AgentState| {
      if state.investment_debate_state.count >= debate_turns {
        "research_judge".to_string()
      } else {
        "bull".to_string()
      }
    });
    graph.add_edge("research_judge", "trader");
    graph.add_edge("trader", "risky");
    graph.add_edge("risky", "safe");
    graph.add_edge("safe", "neutral");
    graph.add_conditional_edge("neutral", move |state: &AgentState| {
      if state.risk_debate_state.count >= risk_turns {
        "risk_judge".to_string()
      } else {
        "risky".to_string()
      }
    });
    graph.add_edge("risk_judge", "END");

    return graph.compile();
  }
}
