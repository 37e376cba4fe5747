pub mod constants;
pub mod error;
pub mod logging;

pub mod config;
pub mod dataset;
pub mod domain;
pub mod pipeline;

// Layered boundaries for application ports and infrastructure
pub mod app;
pub mod infra;
