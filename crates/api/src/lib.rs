//! HTTP API: webhook endpoints, job submission, and server configuration.

pub mod app;
pub mod config;
