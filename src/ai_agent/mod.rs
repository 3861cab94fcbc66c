pub mod agents;
pub mod graph;
pub mod llm;
pub mod tools;
pub mod utils;
