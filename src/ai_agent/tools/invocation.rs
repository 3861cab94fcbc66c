use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use anyhow::{anyhow, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use std::result::Result::{Ok, Err};

use crate::app::state::registry::AppRegistry;

/// Default execution budget for a wrapped tool.
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 120;
/// Live web-search tools get extra time on top of their base budget.
pub const WEB_SEARCH_EXTRA_SECS: u64 = 180;

const INPUT_TRUNCATE_CHARS: usize = 100;

pub type ToolFuture = Pin<Box<dyn Future<Output = Result<String, Error>> + Send>>;
pub type ToolFn = Arc<dyn Fn(HashMap<String, String>) -> ToolFuture + Send + Sync>;

/// A named, timeout-bounded tool callable.
#[derive(Clone)]
pub struct ToolSpec {
  pub name: String,
  pub uses_web_search: bool,
  pub timeout_secs: u64,
  pub func: ToolFn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolCallStatus {
  Success,
  Timeout,
  Error,
}

/// Append-only audit record for one tool invocation. Never mutated after
/// insertion into the registry log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
  pub timestamp: DateTime<Utc>,
  pub tool_name: String,
  pub inputs: HashMap<String, String>,
  pub output: String,
  pub execution_time: f64,
  pub status: ToolCallStatus,
  pub agent_type: String,
  pub symbol: String,
}

/// Map a raw error message onto an actionable hint for the audit trail.
pub fn classify_error(message: &str) -> String {
  let lowered: String = message.to_lowercase();

  if lowered.contains("api key") {
    return format!("API KEY ERROR: {}. Check your API key configuration in the .env file", message);
  }
  if lowered.contains("organization") && lowered.contains("verification") {
    return format!("PROVIDER ORG ERROR: {}. Your provider organization may need verification or has billing issues", message);
  }
  if lowered.contains("timeout") || lowered.contains("timed out") {
    return format!("TIMEOUT ERROR: {}. Network or API service may be slow, try again in a few minutes", message);
  }
  if lowered.contains("rate limit") {
    return format!("RATE LIMIT ERROR: {}. Wait before retrying", message);
  }
  if lowered.contains("connection") {
    return format!("CONNECTION ERROR: {}. Check your internet connection and API service status", message);
  }
  if lowered.contains("insufficient data") {
    return format!("DATA ERROR: {}. Try a different date range or check if the symbol is correct", message);
  }
  return message.to_string();
}

fn truncate_input(value: &str) -> String {
  if value.chars().count() <= INPUT_TRUNCATE_CHARS {
    return value.to_string();
  }
  let head: String = value.chars().take(INPUT_TRUNCATE_CHARS - 3).collect();
  return format!("{}...", head);
}

/// Executes one tool with a timeout budget and writes exactly one audit
/// record per invocation. Symbol and agent are threaded in explicitly by the
/// caller; the wrapper never reaches into ambient UI state.
pub struct ToolInvocation {
  registry: Arc<AppRegistry>,
}

impl ToolInvocation {

  pub fn new(registry: Arc<AppRegistry>) -> Self {
    ToolInvocation { registry }
  }

  pub async fn invoke(&self, spec: &ToolSpec, args: HashMap<String, String>, agent_type: &str, symbol: &str) -> Result<String> {
    let mut timeout_secs: u64 = spec.timeout_secs;
    if spec.uses_web_search {
      timeout_secs += WEB_SEARCH_EXTRA_SECS;
    }

    let input_summary: HashMap<String, String> = args.iter().map(|(key, value)| {
      (key.clone(), truncate_input(value))
    }).collect();

    log::info!("[{}] Starting tool '{}' with inputs: {:?}", agent_type, spec.name, input_summary);

    let start: Instant = Instant::now();
    let future: ToolFuture = (spec.func)(args);
    let handle = tokio::spawn(future);

    let joined = tokio::time::timeout(Duration::from_secs(timeout_secs), handle).await;

    let elapsed: f64 = start.elapsed().as_secs_f64();

    match joined {
      Err(_) => {
        // The worker keeps running in the background; waiting is cancelled
        // but the task is not killed. Accepted trade-off: no cooperative
        // cancellation reaches into in-flight network calls.
        let timeout_msg = format!("TIMEOUT: Tool '{}' exceeded {}s limit (stopped waiting at {:.1}s)", spec.name, timeout_secs, elapsed);
        log::warn!("[{}] {}", agent_type, timeout_msg);

        self.registry.record_tool_call(ToolCallRecord {
          timestamp: Utc::now(),
          tool_name: spec.name.clone(),
          inputs: input_summary,
          output: format!("TIMEOUT ERROR: {}", timeout_msg),
          execution_time: elapsed,
          status: ToolCallStatus::Timeout,
          agent_type: agent_type.to_string(),
          symbol: symbol.to_string(),
        });

        return Ok(format!("Error: Tool '{}' timed out after {}s. This may indicate network issues, API problems, or insufficient data.", spec.name, timeout_secs));
      }
      Ok(Err(join_error)) => {
        let detail = format!("Tool '{}' worker failed: {}", spec.name, join_error);
        log::error!("[{}] {}", agent_type, detail);

        self.registry.record_tool_call(ToolCallRecord {
          timestamp: Utc::now(),
          tool_name: spec.name.clone(),
          inputs: input_summary,
          output: format!("ERROR: {}", detail),
          execution_time: elapsed,
          status: ToolCallStatus::Error,
          agent_type: agent_type.to_string(),
          symbol: symbol.to_string(),
        });

        return Err(anyhow!(detail));
      }
      Ok(Ok(Ok(result))) => {
        if elapsed > 120.0 {
          log::warn!("[{}] Slow execution warning: {} took {:.1}s", agent_type, spec.name, elapsed);
        }
        log::info!("[{}] Tool '{}' completed in {:.2}s", agent_type, spec.name, elapsed);

        self.registry.record_tool_call(ToolCallRecord {
          timestamp: Utc::now(),
          tool_name: spec.name.clone(),
          inputs: input_summary,
          output: result.clone(),
          execution_time: elapsed,
          status: ToolCallStatus::Success,
          agent_type: agent_type.to_string(),
          symbol: symbol.to_string(),
        });

        return Ok(result);
      }
      Ok(Ok(Err(error))) => {
        let detailed: String = classify_error(&error.to_string());
        log::error!("[{}] Tool '{}' failed after {:.2}s: {}", agent_type, spec.name, elapsed, detailed);

        self.registry.record_tool_call(ToolCallRecord {
          timestamp: Utc::now(),
          tool_name: spec.name.clone(),
          inputs: input_summary,
          output: format!("ERROR: {}", detailed),
          execution_time: elapsed,
          status: ToolCallStatus::Error,
          agent_type: agent_type.to_string(),
          symbol: symbol.to_string(),
        });

        // Unlike the timeout path, exceptions propagate to the caller.
        return Err(error);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn spec_with(name: &str, timeout_secs: u64, func: ToolFn) -> ToolSpec {
    ToolSpec {
      name: name.to_string(),
      uses_web_search: false,
      timeout_secs,
      func,
    }
  }

  #[tokio::test]
  async fn timeout_returns_error_string_without_raising() {
    let registry = Arc::new(AppRegistry::new());
    let invocation = ToolInvocation::new(registry.clone());

    let func: ToolFn = Arc::new(|_args| {
      Box::pin(async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("too late".to_string())
      })
    });
    let spec = spec_with("slow_tool", 1, func);

    let result = invocation.invoke(&spec, HashMap::new(), "Market Analyst", "AAPL").await;
    let message = result.expect("timeout must not raise");
    assert!(message.contains("timed out"));

    let calls = invocation_records(&registry);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].status, ToolCallStatus::Timeout);
    assert_eq!(calls[0].symbol, "AAPL");
  }

  #[tokio::test]
  async fn error_is_classified_and_reraised() {
    let registry = Arc::new(AppRegistry::new());
    let invocation = ToolInvocation::new(registry.clone());

    let func: ToolFn = Arc::new(|_args| {
      Box::pin(async { Err(anyhow!("429 rate limit exceeded for model")) })
    });
    let spec = spec_with("limited_tool", 5, func);

    let result = invocation.invoke(&spec, HashMap::new(), "News Analyst", "MSFT").await;
    assert!(result.is_err());

    let calls = invocation_records(&registry);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].status, ToolCallStatus::Error);
    assert!(calls[0].output.contains("RATE LIMIT ERROR"));
  }

  #[tokio::test]
  async fn success_records_truncated_inputs() {
    let registry = Arc::new(AppRegistry::new());
    let invocation = ToolInvocation::new(registry.clone());

    let func: ToolFn = Arc::new(|args| {
      Box::pin(async move {
        Ok(format!("fetched for {}", args.get("ticker").cloned().unwrap_or_default()))
      })
    });
    let spec = spec_with("fetch_tool", 5, func);

    let mut args = HashMap::new();
    args.insert("ticker".to_string(), "AAPL".to_string());
    args.insert("context".to_string(), "c".repeat(150));

    let result = invocation.invoke(&spec, args, "Fundamentals Analyst", "AAPL").await.unwrap();
    assert_eq!(result, "fetched for AAPL");

    let calls = invocation_records(&registry);
    assert_eq!(calls[0].status, ToolCallStatus::Success);
    let truncated = calls[0].inputs.get("context").unwrap();
    assert_eq!(truncated.chars().count(), 100);
    assert!(truncated.ends_with("..."));
    assert_eq!(calls[0].inputs.get("ticker").unwrap(), "AAPL");
  }

  #[test]
  fn classification_covers_known_failures() {
    assert!(classify_error("invalid api key supplied").starts_with("API KEY ERROR"));
    assert!(classify_error("connection refused").starts_with("CONNECTION ERROR"));
    assert!(classify_error("insufficient data for range").starts_with("DATA ERROR"));
    assert_eq!(classify_error("weird failure"), "weird failure");
  }

  fn invocation_records(registry: &Arc<AppRegistry>) -> Vec<ToolCallRecord> {
    registry.get_tool_calls(None, None)
  }
}
