use crate::ai_agent::llm::model_provider::{ChatMessage, LLMChatter, LLMModelConfig, LLMResponse};

use reqwest::{header::{HeaderMap}, Client, Response};
use serde::{Deserialize, Serialize};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::result::Result::Ok;


#[derive(Serialize, Debug)]
struct OpenAIWireMessage {
  role: &'static str,
  content: String,
}

#[derive(Serialize, Debug)]
struct OpenAIChatRequest {
  messages: Vec<OpenAIWireMessage>,
  model: String, // e.g., "gpt-4o-mini"
  #[serde(skip_serializing_if = "Option::is_none")]
  temperature: Option<f32>,
  #[serde(rename = "max_tokens")]
  #[serde(skip_serializing_if = "Option::is_none")]
  max_completion_tokens: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  top_p: Option<f32>,
}

#[derive(Deserialize, Debug)]
struct OpenAIResponseMessage {
  content: String,
}

#[derive(Deserialize, Debug)]
struct OpenAIChoice {
  message: OpenAIResponseMessage,
}

#[derive(Deserialize, Debug)]
struct OpenAIChatResponse {
  choices: Vec<OpenAIChoice>,
}

pub struct OpenAIProvider {
  chat_url : String,
  api_key : String,
  model_name: String,
  client : Client
}

impl OpenAIProvider {

  pub fn new(model_name: &str, api_key: &str) -> Self {
    let chat_url: String = "https://api.openai.com/v1/chat/completions".to_string();
    OpenAIProvider { chat_url, api_key: api_key.to_string(), model_name: model_name.to_string(), client: Client::new() }
  }

  /// Tool results ride along as user-role context; this keeps the wire format
  /// compatible with every OpenAI-style completions endpoint.
  fn to_wire(messages: &[ChatMessage]) -> Vec<OpenAIWireMessage> {
    let wire: Vec<OpenAIWireMessage> = messages.iter().map(|message| {
      let role: &'static str = match message.role.as_str() {
        "tool" => "user",
        other => match other {
          "user" => "user",
          "system" => "system",
          _ => "assistant",
        },
      };
      OpenAIWireMessage { role, content: message.content.clone() }
    }).collect();
    return wire;
  }
}

#[async_trait]
impl LLMChatter for OpenAIProvider {
  async fn chat(&self, messages: Vec<ChatMessage>, config: &LLMModelConfig) -> Result<LLMResponse> {
    let request: OpenAIChatRequest = OpenAIChatRequest {
      model: self.model_name.clone(),
      messages: Self::to_wire(&messages),
      temperature: config.temperature,
      max_completion_tokens: config.max_tokens,
      top_p: config.top_p,
    };

    let mut headers = HeaderMap::new();
    headers.insert("Authorization", format!("Bearer {}", self.api_key).parse().context("Invalid API key header")?);
    headers.insert("Content-Type", "application/json".parse().context("Invalid content type header")?);
    let response: Response = self.client.post(&self.chat_url).headers(headers).json(&request).send().await?;

    if response.status().is_success() {
      let chat_response : OpenAIChatResponse = response.json().await?;
      // Pull out the first choice (or fail)
      let first : OpenAIChoice = chat_response.choices.into_iter().next().ok_or_else(|| anyhow!("No response choices received from provider"))?;
      return Ok(LLMResponse {
        content: first.message.content
      });
    }
    else {
      let status = response.status();
      log::error!("Error getting chat response from provider: {:?}", status);
      return Err(anyhow!("Chat completions request failed with status {}", status));
    }
  }
}
