//! ask-dbx - documentation-grounded planning for Databricks work
//!
//! A Tech Lead loop turns free-text requirements into tasks: it asks a model
//! for a search query, retrieves documentation, filters it for relevance,
//! drafts a plan, verifies the plan against the documents and rates it, and
//! repeats until the plan is accepted or retrieval stops paying off. A Worker
//! then applies each task and records its state.
//!
//! # Modules
//!
//! - [`planning`] - the planning state machine
//! - [`gateway`] - prompt rendering and validated structured model output
//! - [`llm`] - chat-completions client
//! - [`retriever`] - vector search and local docstore retrieval
//! - [`worker`] - validate/plan/apply for produced tasks
//! - [`state`] - task state actor over `taskstore`
//! - [`report`] - markdown task report
//! - [`runlog`] - per-run JSONL event log
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod gateway;
pub mod llm;
pub mod planning;
pub mod prompts;
pub mod report;
pub mod retriever;
pub mod runlog;
pub mod state;
pub mod worker;

pub use config::{Config, LlmConfig, PlanningConfig};
pub use domain::{Task, TaskState};
pub use gateway::{Gateway, GatewayError, LlmGateway, Schema, StructuredValue};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, create_client};
pub use planning::{PlanOutcome, PlanningController, PlanningError, PlanningState, Termination};
pub use retriever::{Chunk, Retriever, RetrieverError, SearchMode, SearchQuery, create_retriever};
pub use state::StateManager;
pub use worker::Worker;
