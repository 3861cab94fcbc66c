pub mod model_provider;
pub mod models;
pub mod openai;
