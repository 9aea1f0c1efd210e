//! Agent execution core: a provider-agnostic Reason-Act loop runtime with
//! guardrails, retries, bounded concurrency, memory continuity and
//! structured output validation.
//!
//! [`AgentExecutor`] is the crate's front door; it wraps
//! [`AgentExecutionCoordinator`] with concurrency limiting and a per-request
//! deadline. Everything the coordinator fans out to (guards, hooks, intent
//! resolution, caching, RAG, tool dispatch, retries, finalization) is an
//! external collaborator behind a trait in one of the modules below, built
//! via `AgentExecutionCoordinator`'s `with_*` builder methods.

pub mod approval;
pub mod cache;
pub mod chat_client;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod fallback;
pub mod finalize;
pub mod guard;
pub mod hook;
pub mod intent;
pub mod memory;
pub mod message_trimmer;
pub mod metrics;
pub mod model;
pub mod output_guard;
pub mod pre_execution;
pub mod rag;
pub mod react_loop;
pub mod retry;
pub mod stream;
pub mod streaming_react_loop;
pub mod structured_output;
pub mod system_prompt;
pub mod token_estimator;
pub mod tool;
pub mod tool_orchestrator;
pub mod tool_preparation;

pub use chat_client::{ChatClient, ChatOptions, ChatResponse, PromptSpec, ToolDefinition};
pub use config::AgentConfig;
pub use coordinator::AgentExecutionCoordinator;
pub use error::{AgentError, ErrorCode};
pub use executor::AgentExecutor;
pub use model::{AgentCommand, AgentResult, ExecutionMode, Message, Role};
