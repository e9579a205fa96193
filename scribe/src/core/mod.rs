pub mod blocks;
pub mod config;
pub mod generator;
pub mod llm;
pub mod metrics;
pub mod participants;
pub mod postprocess;
pub mod quality;
pub mod regen;
pub mod summarize;
pub mod template;
