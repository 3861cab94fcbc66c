use std::result::Result::{Ok};
use std::sync::Arc;
use std::collections::HashMap;
use anyhow::Error;

use crate::ai_agent::tools::invocation::ToolCallRecord;
use crate::app::services::analysis_service::AnalysisService;
use crate::app::state::symbol::SymbolState;

pub struct AnalysisController {
  services: Arc<AnalysisService>,
}

impl AnalysisController {

  pub fn new(services: Arc<AnalysisService>) -> Self {
    AnalysisController { services: services }
  }

  pub async fn get_available_analysts(&self) -> Result<Vec<HashMap<String, String>>, Error> {
    let analysts = match self.services.get_available_analysts() {
      Ok(analysts) => analysts,
      Err(e) => {
        log::error!("Cannot list analysts: {}", e);
        Vec::new()
      }
    };
    return Ok(analysts);
  }

  pub async fn get_available_models(&self) -> Result<Vec<HashMap<String, String>>, Error> {
    let models = match self.services.get_available_models() {
      Ok(models) => models,
      Err(e) => {
        log::error!("Cannot list models: {}", e);
        Vec::new()
      }
    };
    return Ok(models);
  }

  /// Kick an analysis run off in the background and return immediately. The
  /// HTTP caller polls state endpoints for progress.
  pub async fn start_analysis(&self, symbols: Vec<String>, trade_date: Option<String>, selected_analysts: Option<Vec<String>>) -> Result<HashMap<String, String>, Error> {
    let services: Arc<AnalysisService> = self.services.clone();
    let symbol_list: String = symbols.join(", ");

    tokio::spawn(async move {
      if let Err(error) = services.run_analysis(symbols, trade_date, selected_analysts).await {
        log::error!("Background analysis run failed: {:#}", error);
      }
    });

    let mut response: HashMap<String, String> = HashMap::new();
    response.insert("status".to_string(), "started".to_string());
    response.insert("symbols".to_string(), symbol_list);
    return Ok(response);
  }

  pub async fn get_symbol_state(&self, symbol: &str) -> Option<SymbolState> {
    return self.services.registry().get_state(&symbol.to_uppercase());
  }

  pub async fn is_complete(&self, symbol: &str) -> bool {
    return self.services.registry().is_complete(&symbol.to_uppercase());
  }

  pub async fn get_tool_calls(&self, agent: Option<&str>, symbol: Option<&str>) -> Vec<ToolCallRecord> {
    return self.services.registry().get_tool_calls(agent, symbol);
  }

  pub async fn ui_revision(&self) -> u64 {
    return self.services.registry().ui_revision();
  }

  /// Run-wide counters for the dashboard header.
  pub async fn get_stats(&self) -> HashMap<String, serde_json::Value> {
    let registry = self.services.registry();
    let mut stats: HashMap<String, serde_json::Value> = HashMap::new();
    stats.insert("analyzing_symbol".to_string(), serde_json::json!(registry.analyzing_symbol()));
    stats.insert("tool_calls".to_string(), serde_json::json!(registry.tool_calls_count()));
    stats.insert("llm_calls".to_string(), serde_json::json!(registry.llm_calls_count()));
    stats.insert("generated_reports".to_string(), serde_json::json!(registry.generated_reports_count()));
    stats.insert("revision".to_string(), serde_json::json!(registry.ui_revision()));
    return stats;
  }
}
