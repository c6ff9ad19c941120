//! CLI command handlers

pub mod ask;
pub mod classify;
pub mod config;
pub mod mcp;
