//! DocQuery Core Library
//!
//! Natural-language query resolution and dispatch for a document-oriented
//! ERP backend.
//!
//! # Features
//! - Deterministic preprocessing of obvious list queries
//! - LLM intent extraction with a regex fallback router
//! - Entity resolution through backend search
//! - LLM parameter synthesis for aggregate, report, create and update
//! - Anti-hallucination response formatting with rate-limit degradation

pub mod config;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod intent;
pub mod llm;
pub mod orchestrator;
pub mod resolve;
pub mod store;
pub mod synth;
pub mod tables;

pub use config::{Config, LLMServiceConfig, RoutingConfig, StoreConfig};
pub use dispatch::{ToolCall, ToolDispatcher, ToolOutput};
pub use error::{DocQueryError, Error, Result};
pub use format::{DataQuality, FormattedResponse, ResponseFormatter};
pub use intent::{Action, Intent, IntentSource, Tool};
pub use llm::{build_llm_client, ChatMessage, LLMClient};
pub use orchestrator::{ChatResponse, Classified, Orchestrator};
pub use resolve::{EntityResolver, SearchResult};
pub use store::{Document, DocumentStore, FrappeStore};
pub use tables::RoutingTables;

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "docquery";
