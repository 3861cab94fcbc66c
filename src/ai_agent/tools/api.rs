use std::result::Result::{Ok, Err};
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;

use crate::app::config::Config;

/// Thin market-data client. Every fetcher returns an already formatted text
/// block because downstream consumers are LLM prompts, not typed pipelines.
pub struct API {
  header_key: &'static str,
  config: Config,
  client: Client,
}

impl API {

  pub fn new(config: Config) -> Self {
    let header_key: &'static str = "X-API-KEY";
    API {
      header_key,
      config,
      client: Client::new(),
    }
  }

  fn headers(&self) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = &self.config.financial_datasets_api_key {
      let value = HeaderValue::from_str(api_key).context("Invalid characters in financial data API key")?;
      headers.insert(self.header_key, value);
    }
    return Ok(headers);
  }

  async fn get_json(&self, url: &str) -> Result<Value> {
    let request = self.client.get(url);
    return self.send_json(request, url).await;
  }

  async fn send_json(&self, request: reqwest::RequestBuilder, url: &str) -> Result<Value> {
    let response = request
      .headers(self.headers()?)
      .send()
      .await
      .with_context(|| format!("Connection error requesting {}", url))?;

    let status = response.status();
    if !status.is_success() {
      let body: String = response.text().await.unwrap_or_default();
      return Err(anyhow!("Request to {} failed with status {}: {}", url, status, body));
    }

    let value: Value = response.json().await.with_context(|| format!("Invalid JSON body from {}", url))?;
    return Ok(value);
  }

  pub async fn get_price_history(&self, ticker: &str, start_date: &str, end_date: &str) -> Result<String> {
    let url: String = format!(
      "https://api.financialdatasets.ai/prices/?ticker={}&interval=day&interval_multiplier=1&start_date={}&end_date={}",
      ticker, start_date, end_date
    );
    let value: Value = self.get_json(&url).await?;

    let prices = value.get("prices").and_then(Value::as_array).cloned().unwrap_or_default();
    if prices.is_empty() {
      return Err(anyhow!("insufficient data: no price rows for {} between {} and {}", ticker, start_date, end_date));
    }

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("## Daily price history for {} ({} to {})", ticker, start_date, end_date));
    lines.push("date | open | high | low | close | volume".to_string());
    for row in &prices {
      lines.push(format!(
        "{} | {:.2} | {:.2} | {:.2} | {:.2} | {}",
        row.get("time").and_then(Value::as_str).unwrap_or("?"),
        row.get("open").and_then(Value::as_f64).unwrap_or(0.0),
        row.get("high").and_then(Value::as_f64).unwrap_or(0.0),
        row.get("low").and_then(Value::as_f64).unwrap_or(0.0),
        row.get("close").and_then(Value::as_f64).unwrap_or(0.0),
        row.get("volume").and_then(Value::as_u64).unwrap_or(0),
      ));
    }
    return Ok(lines.join("\n"));
  }

  pub async fn get_company_news(&self, ticker: &str, end_date: &str, limit: i64) -> Result<String> {
    let url: String = format!(
      "https://api.financialdatasets.ai/news/?ticker={}&end_date={}&limit={}",
      ticker, end_date, limit
    );
    let value: Value = self.get_json(&url).await?;

    let items = value.get("news").and_then(Value::as_array).cloned().unwrap_or_default();
    if items.is_empty() {
      log::info!("No company news returned for {} up to {}", ticker, end_date);
      return Ok(format!("No recent company news found for {} up to {}.", ticker, end_date));
    }

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("## Recent company news for {} (up to {})", ticker, end_date));
    for item in &items {
      lines.push(format!(
        "- [{}] {} ({}): {}",
        item.get("date").and_then(Value::as_str).unwrap_or("?"),
        item.get("title").and_then(Value::as_str).unwrap_or("untitled"),
        item.get("source").and_then(Value::as_str).unwrap_or("unknown source"),
        item.get("url").and_then(Value::as_str).unwrap_or(""),
      ));
    }
    return Ok(lines.join("\n"));
  }

  pub async fn get_social_sentiment(&self, ticker: &str, end_date: &str) -> Result<String> {
    // Sentiment is derived from the news feed sentiment labels. There is no
    // dedicated social endpoint on this provider.
    let url: String = format!(
      "https://api.financialdatasets.ai/news/?ticker={}&end_date={}&limit=50",
      ticker, end_date
    );
    let value: Value = self.get_json(&url).await?;

    let items = value.get("news").and_then(Value::as_array).cloned().unwrap_or_default();
    let mut positive: u32 = 0;
    let mut negative: u32 = 0;
    let mut neutral: u32 = 0;
    for item in &items {
      match item.get("sentiment").and_then(Value::as_str) {
        Some("positive") => positive += 1,
        Some("negative") => negative += 1,
        _ => neutral += 1,
      }
    }

    let total: u32 = positive + negative + neutral;
    if total == 0 {
      return Err(anyhow!("insufficient data: no sentiment signals for {} up to {}", ticker, end_date));
    }

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("## Public sentiment summary for {} (up to {})", ticker, end_date));
    lines.push(format!("Positive mentions: {} / {}", positive, total));
    lines.push(format!("Negative mentions: {} / {}", negative, total));
    lines.push(format!("Neutral mentions: {} / {}", neutral, total));
    return Ok(lines.join("\n"));
  }

  pub async fn get_fundamentals_snapshot(&self, ticker: &str, end_date: &str) -> Result<String> {
    let url: String = format!(
      "https://api.financialdatasets.ai/financial-metrics/?ticker={}&report_period_lte={}&limit=4&period=ttm",
      ticker, end_date
    );
    let value: Value = self.get_json(&url).await?;

    let metrics = value.get("financial_metrics").and_then(Value::as_array).cloned().unwrap_or_default();
    let latest = metrics.first().ok_or_else(|| {
      anyhow!("insufficient data: no financial metrics for {} up to {}", ticker, end_date)
    })?;

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("## Fundamentals snapshot for {} (as of {})", ticker, end_date));
    let fields: [(&str, &str); 8] = [
      ("market_cap", "Market cap"),
      ("price_to_earnings_ratio", "P/E ratio"),
      ("price_to_book_ratio", "P/B ratio"),
      ("net_margin", "Net margin"),
      ("operating_margin", "Operating margin"),
      ("return_on_equity", "Return on equity"),
      ("debt_to_equity", "Debt to equity"),
      ("free_cash_flow_yield", "FCF yield"),
    ];
    for (key, label) in fields {
      match latest.get(key).and_then(Value::as_f64) {
        Some(number) => lines.push(format!("{}: {:.4}", label, number)),
        None => lines.push(format!("{}: n/a", label)),
      }
    }
    return Ok(lines.join("\n"));
  }

  pub async fn get_macro_indicators(&self, end_date: &str) -> Result<String> {
    let url: String = format!(
      "https://api.financialdatasets.ai/macro/indicators/?end_date={}&limit=12",
      end_date
    );
    let value: Value = self.get_json(&url).await?;

    let indicators = value.get("indicators").and_then(Value::as_array).cloned().unwrap_or_default();
    if indicators.is_empty() {
      return Err(anyhow!("insufficient data: no macro indicators up to {}", end_date));
    }

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("## Macro indicators (up to {})", end_date));
    for indicator in &indicators {
      lines.push(format!(
        "- {} [{}]: {}",
        indicator.get("name").and_then(Value::as_str).unwrap_or("unknown"),
        indicator.get("date").and_then(Value::as_str).unwrap_or("?"),
        indicator.get("value").and_then(Value::as_f64).map(|number| format!("{:.3}", number)).unwrap_or_else(|| "n/a".to_string()),
      ));
    }
    return Ok(lines.join("\n"));
  }

  /// Free-text web search through the configured search gateway. Slower than
  /// the structured endpoints, so callers budget extra time for it.
  pub async fn search_global_news(&self, query: &str, end_date: &str) -> Result<String> {
    let gateway: &str = self.config.search_gateway_url.as_deref().unwrap_or("https://api.financialdatasets.ai/search");
    let request = self.client.get(gateway).query(&[
      ("query", query),
      ("end_date", end_date),
      ("limit", "10"),
    ]);
    let value: Value = self.send_json(request, gateway).await?;

    let results = value.get("results").and_then(Value::as_array).cloned().unwrap_or_default();
    if results.is_empty() {
      return Ok(format!("No web results found for '{}' up to {}.", query, end_date));
    }

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("## Web search results for '{}' (up to {})", query, end_date));
    for result in &results {
      lines.push(format!(
        "- {}: {}",
        result.get("title").and_then(Value::as_str).unwrap_or("untitled"),
        result.get("snippet").and_then(Value::as_str).unwrap_or(""),
      ));
    }
    return Ok(lines.join("\n"));
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn search_query_parameters_are_percent_encoded() {
    let client = Client::new();
    let request = client.get("https://example.com/search")
      .query(&[("query", "NVDA p/e outlook"), ("end_date", "2025-06-01"), ("limit", "10")])
      .build()
      .unwrap();

    let url: &str = request.url().as_str();
    assert!(url.contains("query=NVDA+p%2Fe+outlook"));
    assert!(url.contains("end_date=2025-06-01"));
    assert!(url.contains("limit=10"));
  }
}
