pub mod graph;
pub mod parallel;
pub mod runner;
pub mod sequential;
pub mod state;
