use std::collections::HashMap;
use std::sync::Arc;
use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDate};
use std::result::Result::{Ok, Err};

use crate::ai_agent::llm::model_provider::ToolRequest;
use crate::ai_agent::tools::api::API;
use crate::ai_agent::tools::invocation::{ToolFn, ToolInvocation, ToolSpec, DEFAULT_TOOL_TIMEOUT_SECS};
use crate::ai_agent::utils::analysts::AnalystType;
use crate::app::config::Config;
use crate::app::state::registry::AppRegistry;

const PRICE_LOOKBACK_DAYS: i64 = 90;
const NEWS_LIMIT: i64 = 25;

fn required(args: &HashMap<String, String>, key: &str) -> Result<String> {
  match args.get(key) {
    Some(value) if !value.trim().is_empty() => Ok(value.clone()),
    _ => Err(anyhow!("Missing required tool argument '{}'", key)),
  }
}

/// Start of the price window for a trade date. Falls back to the trade date
/// itself when the date does not parse.
fn price_window_start(trade_date: &str) -> String {
  match NaiveDate::parse_from_str(trade_date, "%Y-%m-%d") {
    Ok(date) => (date - Duration::days(PRICE_LOOKBACK_DAYS)).format("%Y-%m-%d").to_string(),
    Err(_) => {
      log::warn!("Could not parse trade date '{}', using it as the window start", trade_date);
      trade_date.to_string()
    }
  }
}

/// The full tool surface offered to analysts. Specs are built once at
/// construction; execution always goes through the timeout wrapper.
pub struct Toolkit {
  specs: HashMap<String, ToolSpec>,
  invocation: ToolInvocation,
}

impl Toolkit {

  pub fn new(config: &Config, registry: Arc<AppRegistry>) -> Self {
    let api: Arc<API> = Arc::new(API::new(config.clone()));
    let timeout_secs: u64 = config.tool_timeout_secs.unwrap_or(DEFAULT_TOOL_TIMEOUT_SECS);

    let mut specs: HashMap<String, ToolSpec> = HashMap::new();

    let price_api = api.clone();
    let price_fn: ToolFn = Arc::new(move |args| {
      let api = price_api.clone();
      Box::pin(async move {
        let ticker: String = required(&args, "ticker")?;
        let start_date: String = required(&args, "start_date")?;
        let end_date: String = required(&args, "end_date")?;
        api.get_price_history(&ticker, &start_date, &end_date).await
      })
    });
    specs.insert("get_price_history".to_string(), ToolSpec {
      name: "get_price_history".to_string(),
      uses_web_search: false,
      timeout_secs,
      func: price_fn,
    });

    let news_api = api.clone();
    let news_fn: ToolFn = Arc::new(move |args| {
      let api = news_api.clone();
      Box::pin(async move {
        let ticker: String = required(&args, "ticker")?;
        let curr_date: String = required(&args, "curr_date")?;
        api.get_company_news(&ticker, &curr_date, NEWS_LIMIT).await
      })
    });
    specs.insert("get_company_news".to_string(), ToolSpec {
      name: "get_company_news".to_string(),
      uses_web_search: false,
      timeout_secs,
      func: news_fn,
    });

    let sentiment_api = api.clone();
    let sentiment_fn: ToolFn = Arc::new(move |args| {
      let api = sentiment_api.clone();
      Box::pin(async move {
        let ticker: String = required(&args, "ticker")?;
        let curr_date: String = required(&args, "curr_date")?;
        api.get_social_sentiment(&ticker, &curr_date).await
      })
    });
    specs.insert("get_social_sentiment".to_string(), ToolSpec {
      name: "get_social_sentiment".to_string(),
      uses_web_search: false,
      timeout_secs,
      func: sentiment_fn,
    });

    let fundamentals_api = api.clone();
    let fundamentals_fn: ToolFn = Arc::new(move |args| {
      let api = fundamentals_api.clone();
      Box::pin(async move {
        let ticker: String = required(&args, "ticker")?;
        let curr_date: String = required(&args, "curr_date")?;
        api.get_fundamentals_snapshot(&ticker, &curr_date).await
      })
    });
    specs.insert("get_fundamentals_snapshot".to_string(), ToolSpec {
      name: "get_fundamentals_snapshot".to_string(),
      uses_web_search: false,
      timeout_secs,
      func: fundamentals_fn,
    });

    let macro_api = api.clone();
    let macro_fn: ToolFn = Arc::new(move |args| {
      let api = macro_api.clone();
      Box::pin(async move {
        let curr_date: String = required(&args, "curr_date")?;
        api.get_macro_indicators(&curr_date).await
      })
    });
    specs.insert("get_macro_indicators".to_string(), ToolSpec {
      name: "get_macro_indicators".to_string(),
      uses_web_search: false,
      timeout_secs,
      func: macro_fn,
    });

    let search_api = api.clone();
    let search_fn: ToolFn = Arc::new(move |args| {
      let api = search_api.clone();
      Box::pin(async move {
        let query: String = required(&args, "query")?;
        let curr_date: String = required(&args, "curr_date")?;
        api.search_global_news(&query, &curr_date).await
      })
    });
    specs.insert("search_global_news".to_string(), ToolSpec {
      name: "search_global_news".to_string(),
      uses_web_search: true,
      timeout_secs,
      func: search_fn,
    });

    return Toolkit {
      specs,
      invocation: ToolInvocation::new(registry),
    };
  }

  pub fn tools_for(&self, analyst: AnalystType) -> Vec<&'static str> {
    match analyst {
      AnalystType::Market => vec!["get_price_history"],
      AnalystType::Social => vec!["get_social_sentiment", "get_company_news"],
      AnalystType::News => vec!["get_company_news", "search_global_news"],
      AnalystType::Fundamentals => vec!["get_fundamentals_snapshot"],
      AnalystType::Macro => vec!["get_macro_indicators", "search_global_news"],
    }
  }

  /// The requests an analyst issues when its planning round does not name any
  /// tools itself. Always non-empty so every analyst sees real data.
  pub fn default_requests(&self, analyst: AnalystType, ticker: &str, trade_date: &str) -> Vec<ToolRequest> {
    let mut requests: Vec<ToolRequest> = Vec::new();
    for name in self.tools_for(analyst) {
      let mut args: HashMap<String, String> = HashMap::new();
      match name {
        "get_price_history" => {
          args.insert("ticker".to_string(), ticker.to_string());
          args.insert("start_date".to_string(), price_window_start(trade_date));
          args.insert("end_date".to_string(), trade_date.to_string());
        }
        "search_global_news" => {
          args.insert("query".to_string(), format!("{} stock outlook", ticker));
          args.insert("curr_date".to_string(), trade_date.to_string());
        }
        "get_macro_indicators" => {
          args.insert("curr_date".to_string(), trade_date.to_string());
        }
        _ => {
          args.insert("ticker".to_string(), ticker.to_string());
          args.insert("curr_date".to_string(), trade_date.to_string());
        }
      }
      requests.push(ToolRequest { name: name.to_string(), args });
    }
    return requests;
  }

  pub fn has_tool(&self, name: &str) -> bool {
    self.specs.contains_key(name)
  }

  pub async fn execute(&self, request: &ToolRequest, agent_type: &str, symbol: &str) -> Result<String> {
    let spec: &ToolSpec = self.specs.get(&request.name).ok_or_else(|| {
      anyhow!("Unknown tool '{}' requested by {}", request.name, agent_type)
    })?;
    return self.invocation.invoke(spec, request.args.clone(), agent_type, symbol).await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn toolkit() -> Toolkit {
    Toolkit::new(&Config::default(), Arc::new(AppRegistry::new()))
  }

  #[test]
  fn every_analyst_has_registered_tools() {
    let kit = toolkit();
    for analyst in AnalystType::ALL {
      let names = kit.tools_for(analyst);
      assert!(!names.is_empty());
      for name in names {
        assert!(kit.has_tool(name), "unregistered tool {}", name);
      }
    }
  }

  #[test]
  fn market_defaults_use_lookback_window() {
    let kit = toolkit();
    let requests = kit.default_requests(AnalystType::Market, "NVDA", "2025-06-01");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].name, "get_price_history");
    assert_eq!(requests[0].args.get("start_date").unwrap(), "2025-03-03");
    assert_eq!(requests[0].args.get("end_date").unwrap(), "2025-06-01");
  }

  #[tokio::test]
  async fn unknown_tool_is_rejected() {
    let kit = toolkit();
    let request = ToolRequest { name: "not_a_tool".to_string(), args: HashMap::new() };
    let result = kit.execute(&request, "Market Analyst", "NVDA").await;
    assert!(result.is_err());
  }
}
