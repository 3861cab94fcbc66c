pub mod analyst_steps;
pub mod debate_steps;
