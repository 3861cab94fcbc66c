use std::env;

use log;

fn env_string(name: &str) -> Option<String> {
  match env::var(name) {
    Ok(value) if !value.trim().is_empty() => Some(value),
    _ => {
      log::warn!("Warning: {} not set, related features will run degraded", name);
      None
    }
  }
}

fn env_f64(name: &str, default: f64) -> f64 {
  match env::var(name) {
    Ok(raw) => raw.parse::<f64>().unwrap_or_else(|_| {
      log::warn!("Warning: {} has invalid value '{}', using default {}", name, raw, default);
      default
    }),
    Err(_) => default,
  }
}

fn env_u64(name: &str, default: u64) -> u64 {
  match env::var(name) {
    Ok(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
      log::warn!("Warning: {} has invalid value '{}', using default {}", name, raw, default);
      default
    }),
    Err(_) => default,
  }
}

fn env_bool(name: &str, default: bool) -> bool {
  match env::var(name) {
    Ok(raw) => matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
    Err(_) => default,
  }
}

#[derive(Clone, Default)]
pub struct Config {
  pub openai_api_key: Option<String>,
  pub financial_datasets_api_key: Option<String>,
  pub search_gateway_url: Option<String>,
  pub quick_think_model: String,
  pub deep_think_model: String,
  pub parallel_analysts: bool,
  pub analyst_start_delay_secs: f64,
  pub analyst_call_delay_secs: f64,
  pub tool_result_delay_secs: f64,
  pub tool_timeout_secs: Option<u64>,
  pub max_debate_rounds: u32,
  pub max_risk_rounds: u32,
}

impl Config {

  pub fn load() -> Self {
    match dotenv::dotenv() {
      Ok(_) => log::info!("Loaded .env file"),
      Err(_) => log::error!("No .env file found"),
    }

    let openai_api_key: Option<String> = env_string("OPENAI_API_KEY");
    let financial_datasets_api_key: Option<String> = env_string("FINANCIAL_DATASETS_API_KEY");
    let search_gateway_url: Option<String> = match env::var("SEARCH_GATEWAY_URL") {
      Ok(value) if !value.trim().is_empty() => Some(value),
      _ => None,
    };

    let quick_think_model: String = env::var("QUICK_THINK_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    let deep_think_model: String = env::var("DEEP_THINK_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

    let parallel_analysts: bool = env_bool("PARALLEL_ANALYSTS", true);
    let analyst_start_delay_secs: f64 = env_f64("ANALYST_START_DELAY_SECS", 0.5);
    let analyst_call_delay_secs: f64 = env_f64("ANALYST_CALL_DELAY_SECS", 1.0);
    let tool_result_delay_secs: f64 = env_f64("TOOL_RESULT_DELAY_SECS", 1.0);
    let tool_timeout_secs: Option<u64> = Some(env_u64("TOOL_TIMEOUT_SECS", 120));

    let max_debate_rounds: u32 = env_u64("MAX_DEBATE_ROUNDS", 1) as u32;
    let max_risk_rounds: u32 = env_u64("MAX_RISK_ROUNDS", 1) as u32;

    return Config {
      openai_api_key,
      financial_datasets_api_key,
      search_gateway_url,
      quick_think_model,
      deep_think_model,
      parallel_analysts,
      analyst_start_delay_secs,
      analyst_call_delay_secs,
      tool_result_delay_secs,
      tool_timeout_secs,
      max_debate_rounds,
      max_risk_rounds,
    };
  }
}
