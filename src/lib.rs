pub mod agent;
pub mod chart;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod llm;
pub mod prompts;
pub mod server;
pub mod store;
pub mod ticket;
