use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::fmt;
use anyhow::{Result};
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelProvider {
  Anthropic,
  DeepSeek,
  Gemini,
  Groq,
  OpenAI,
  Ollama,
}

impl ModelProvider {

  pub fn _as_str(&self) -> &'static str {
    match self {
      &ModelProvider::Anthropic => "Anthropic",
      &ModelProvider::DeepSeek => "DeepSeek",
      &ModelProvider::Gemini => "Gemini",
      &ModelProvider::Groq => "Groq",
      &ModelProvider::Ollama => "Ollama",
      &ModelProvider::OpenAI => "OpenAI"
    }
  }
}

impl fmt::Display for ModelProvider {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ModelProvider::Anthropic => write!(f, "Anthropic"),
      ModelProvider::DeepSeek => write!(f, "DeepSeek"),
      ModelProvider::Gemini => write!(f, "Gemini"),
      ModelProvider::Groq => write!(f, "Groq"),
      ModelProvider::OpenAI => write!(f, "OpenAI"),
      ModelProvider::Ollama => write!(f, "Ollama"),
    }
  }
}

impl FromStr for ModelProvider {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "anthropic" => Ok(ModelProvider::Anthropic),
      "deepseek" => Ok(ModelProvider::DeepSeek),
      "gemini" => Ok(ModelProvider::Gemini),
      "groq" => Ok(ModelProvider::Groq),
      "ollama" => Ok(ModelProvider::Ollama),
      "openai" => Ok(ModelProvider::OpenAI),
      _ => Err(format!("Unknown model provider: {}", s)),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMModelConfig {
  pub provider: ModelProvider,
  pub model_name: String,
  pub api_key: Option<String>, // API keys are often better handled via env vars or a dedicated secret management
  pub base_url: Option<String>, // Useful for Ollama or other self-hosted/proxy setups
  pub temperature: Option<f32>,
  pub max_tokens: Option<u32>,
  pub top_p : Option<f32>
}

/// Message roles are a closed set. Content is normalized to a plain string at
/// this boundary so nothing downstream has to sniff message shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
  Human,
  Assistant,
  System,
  Tool,
}

impl MessageRole {
  pub fn as_str(&self) -> &'static str {
    match self {
      MessageRole::Human => "user",
      MessageRole::Assistant => "assistant",
      MessageRole::System => "system",
      MessageRole::Tool => "tool",
    }
  }
}

/// A tool invocation requested by an agent's reasoning step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
  pub name: String,
  pub args: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
  pub role: MessageRole,
  pub content: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tool_calls: Vec<ToolRequest>,
}

impl ChatMessage {
  pub fn human(content: &str) -> Self {
    ChatMessage { role: MessageRole::Human, content: content.to_string(), tool_calls: Vec::new() }
  }

  pub fn assistant(content: &str) -> Self {
    ChatMessage { role: MessageRole::Assistant, content: content.to_string(), tool_calls: Vec::new() }
  }

  pub fn system(content: &str) -> Self {
    ChatMessage { role: MessageRole::System, content: content.to_string(), tool_calls: Vec::new() }
  }

  pub fn tool_result(tool_name: &str, content: &str) -> Self {
    ChatMessage {
      role: MessageRole::Tool,
      content: format!("[{}] {}", tool_name, content),
      tool_calls: Vec::new(),
    }
  }

  pub fn assistant_with_tools(content: &str, tool_calls: Vec<ToolRequest>) -> Self {
    ChatMessage { role: MessageRole::Assistant, content: content.to_string(), tool_calls }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
  pub content: String,
}

#[async_trait]
pub trait LLMChatter : Send + Sync {
  async fn chat(&self, messages: Vec<ChatMessage>, config : &LLMModelConfig) -> Result<LLMResponse>;
}
