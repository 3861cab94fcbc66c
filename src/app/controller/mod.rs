pub mod analysis_controllers;
