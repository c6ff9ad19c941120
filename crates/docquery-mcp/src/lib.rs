//! DocQuery MCP Server
//!
//! Model Context Protocol server exposing the query pipeline to AI
//! assistants over newline-delimited JSON-RPC on stdio.

pub mod protocol;
mod server;
pub mod tools;

pub use server::{start_server, McpServer};
