use serde::{Serialize, Deserialize};
use std::str::FromStr;

use crate::app::state::symbol::{AgentName, ReportField};

/// The five parallelizable analyst roles, in their fixed display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalystType {
  Market,
  Social,
  News,
  Fundamentals,
  Macro,
}

impl AnalystType {

  pub const ALL: [AnalystType; 5] = [
    AnalystType::Market,
    AnalystType::Social,
    AnalystType::News,
    AnalystType::Fundamentals,
    AnalystType::Macro,
  ];

  pub fn key(&self) -> &'static str {
    match self {
      AnalystType::Market => "market",
      AnalystType::Social => "social",
      AnalystType::News => "news",
      AnalystType::Fundamentals => "fundamentals",
      AnalystType::Macro => "macro",
    }
  }

  pub fn display_name(&self) -> &'static str {
    match self {
      AnalystType::Market => "Market Analyst",
      AnalystType::Social => "Social Analyst",
      AnalystType::News => "News Analyst",
      AnalystType::Fundamentals => "Fundamentals Analyst",
      AnalystType::Macro => "Macro Analyst",
    }
  }

  pub fn agent_name(&self) -> AgentName {
    match self {
      AnalystType::Market => AgentName::MarketAnalyst,
      AnalystType::Social => AgentName::SocialAnalyst,
      AnalystType::News => AgentName::NewsAnalyst,
      AnalystType::Fundamentals => AgentName::FundamentalsAnalyst,
      AnalystType::Macro => AgentName::MacroAnalyst,
    }
  }

  /// The social analyst writes into `sentiment_report`, not `social_report`.
  /// Downstream consumers rely on this mapping.
  pub fn report_field(&self) -> ReportField {
    match self {
      AnalystType::Market => ReportField::Market,
      AnalystType::Social => ReportField::Sentiment,
      AnalystType::News => ReportField::News,
      AnalystType::Fundamentals => ReportField::Fundamentals,
      AnalystType::Macro => ReportField::Macro,
    }
  }
}

impl FromStr for AnalystType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "market" => Ok(AnalystType::Market),
      "social" | "sentiment" => Ok(AnalystType::Social),
      "news" => Ok(AnalystType::News),
      "fundamentals" => Ok(AnalystType::Fundamentals),
      "macro" => Ok(AnalystType::Macro),
      _ => Err(format!("Unknown analyst type: {}", s)),
    }
  }
}

/// Parse user-selected analyst keys, keeping the fixed display order and
/// dropping unknown entries. Empty selection means all analysts.
pub fn resolve_selected_analysts(selected: &Option<Vec<String>>) -> Vec<AnalystType> {
  let requested: Vec<AnalystType> = match selected {
    Some(keys) if !keys.is_empty() => keys.iter().filter_map(|key| key.parse().ok()).collect(),
    _ => AnalystType::ALL.to_vec(),
  };

  let ordered: Vec<AnalystType> = AnalystType::ALL.iter().copied().filter(|analyst| requested.contains(analyst)).collect();
  return ordered;
}

pub fn get_analyst_order() -> Vec<(String, String)> {
  let mut order_vec: Vec<(String, String)> = Vec::new();
  for analyst in AnalystType::ALL.iter() {
    order_vec.push((analyst.display_name().to_string(), analyst.key().to_string()));
  }
  return order_vec;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn selection_keeps_fixed_order() {
    let selected = Some(vec!["macro".to_string(), "market".to_string(), "bogus".to_string()]);
    let resolved = resolve_selected_analysts(&selected);
    assert_eq!(resolved, vec![AnalystType::Market, AnalystType::Macro]);
  }

  #[test]
  fn empty_selection_means_all() {
    assert_eq!(resolve_selected_analysts(&None).len(), 5);
    assert_eq!(resolve_selected_analysts(&Some(Vec::new())).len(), 5);
  }

  #[test]
  fn social_maps_to_sentiment_report() {
    assert_eq!(AnalystType::Social.report_field(), ReportField::Sentiment);
    assert_eq!(AnalystType::Market.report_field(), ReportField::Market);
  }
}
