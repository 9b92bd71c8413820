pub mod app;
pub mod atlassian;
pub mod config;
pub mod docs;
pub mod error;
pub mod llm;
pub mod platform;
pub mod review;
pub mod tracker;
pub mod workflow;
