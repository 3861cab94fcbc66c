use serde::{Serialize, Deserialize};
use std::env; // For environment variables
use std::sync::OnceLock;
use anyhow::{Result, anyhow};


use crate::ai_agent::llm::model_provider::{LLMModelConfig, ModelProvider, LLMChatter};
use crate::ai_agent::llm::openai::OpenAIProvider;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMModel {
  pub display_name: String,
  pub model_name: String, // The actual name used in API calls
  pub provider: ModelProvider,
}

impl LLMModel {
  pub fn new(display_name: &str, model_name: &str, provider: ModelProvider) -> Self {
    LLMModel {
      display_name: display_name.to_string(),
      model_name: model_name.to_string(),
      provider,
    }
  }
}

// --- Static Lists of Available Model Descriptors ---
fn available_models_data() -> Vec<LLMModel> {
  vec![
    // Quick-thinking candidates (analysts, debaters)
    LLMModel::new("[openai] gpt-4o-mini", "gpt-4o-mini", ModelProvider::OpenAI),
    LLMModel::new("[openai] gpt-4o", "gpt-4o", ModelProvider::OpenAI),
    LLMModel::new("[openai] gpt-4-turbo", "gpt-4-turbo", ModelProvider::OpenAI),

    // Deep-thinking candidates (judges, trader)
    LLMModel::new("[anthropic] claude-3.5-sonnet", "claude-3-5-sonnet-latest", ModelProvider::Anthropic),
    LLMModel::new("[deepseek] deepseek-chat", "deepseek-chat", ModelProvider::DeepSeek),
    LLMModel::new("[groq] llama3-70b", "llama3-70b-8192", ModelProvider::Groq),
  ]
}

fn ollama_models_data() -> Vec<LLMModel> {
  vec![
    LLMModel::new("[meta] llama3.1 (8B)", "llama3.1:latest", ModelProvider::Ollama),
    LLMModel::new("[google] gemma3 (12B)", "gemma3:12b", ModelProvider::Ollama),
    LLMModel::new("[alibaba] qwen3 (30B-a3B)", "qwen3:30b-a3b", ModelProvider::Ollama),
  ]
}

pub static AVAILABLE_MODELS: OnceLock<Vec<LLMModel>> = OnceLock::new();
pub static OLLAMA_MODELS: OnceLock<Vec<LLMModel>> = OnceLock::new();


pub fn get_available_models() -> &'static [LLMModel] {
  AVAILABLE_MODELS.get_or_init(available_models_data).as_slice()
}

pub fn get_ollama_models() -> &'static [LLMModel] {
  OLLAMA_MODELS.get_or_init(ollama_models_data).as_slice()
}

pub fn get_model(config: &LLMModelConfig) -> Result<Box<dyn LLMChatter>> {
  log::info!("Initializing LLM client for provider: {}, model: {}", config.provider, config.model_name);

  match config.provider {
    ModelProvider::OpenAI => {
      let api_key: String = match config.api_key.as_ref() {
        Some(key) => key.clone(),
        None => env::var("OPENAI_API_KEY").map_err(|_| anyhow!("OpenAI API key not found in config or OPENAI_API_KEY"))?,
      };
      let client = OpenAIProvider::new(&config.model_name, &api_key);
      return Ok(Box::new(client));
    }
    ModelProvider::Anthropic => {
      Err(anyhow!("Anthropic client not yet implemented"))
    }
    ModelProvider::DeepSeek => {
      Err(anyhow!("DeepSeek client not yet implemented"))
    }
    ModelProvider::Gemini => {
      Err(anyhow!("Gemini client not yet implemented"))
    }
    ModelProvider::Groq => {
      Err(anyhow!("Groq client not yet implemented"))
    }
    ModelProvider::Ollama => {
      let ollama_host = env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost".to_string());
      let default_base_url = format!("http://{}:11434", ollama_host);
      let base_url = config.base_url.as_ref().cloned().unwrap_or(default_base_url);
      log::info!("Ollama configured with base_url: {}", base_url);
      Err(anyhow!("Ollama client not yet implemented"))
    }
  }
}
