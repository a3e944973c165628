pub mod analyzer;
pub mod chunk;
pub mod config;
pub mod llm;
pub mod movement;
pub mod prompts;
pub mod sanitize;
pub mod script;
pub mod stats;
pub mod timing;
pub mod workflow;
