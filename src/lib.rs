//! # UBO Trace Engine
//!
//! Staged evidence gathering over AI research agents and search APIs to
//! assess whether a named individual is a beneficial owner of a company.
//!
//! ## Overview
//!
//! A trace runs four evidence stages strictly in order:
//!
//! | Stage | Evidence | Time scope |
//! |-------|----------|------------|
//! | 1A | Direct | All time |
//! | 1B | Direct | Since the configured lower bound |
//! | 2A | Indirect | All time |
//! | 2B | Indirect | Since the configured lower bound |
//!
//! Each stage issues one primary agent query plus people search, domain
//! search and domain confidence enrichments, retries the primary query while
//! it yields nothing, and the aggregator folds the results into a
//! [`TraceSummary`](types::TraceSummary) with a tri-state connection verdict.
//!
//! The engine can be used in two ways:
//!
//! 1. **As a standalone server or CLI** - Run the `ubo-trace` binary
//! 2. **As a library** - Drive a [`TraceOrchestrator`] with your own sources
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ubo_trace::{EvidenceSources, HeuristicParser, TraceOrchestrator, TraceSettings};
//! use ubo_trace::types::TraceRequest;
//!
//! let sources = EvidenceSources::new(Arc::new(my_agent));
//! let orchestrator =
//!     TraceOrchestrator::new(sources, Arc::new(HeuristicParser), TraceSettings::default());
//!
//! let request = TraceRequest::new("Acme Corp", "Jane Doe", "United Kingdom", None);
//! let summary = orchestrator.run_trace(&request).await;
//! println!("{}", summary.connection_status);
//! ```
//!
//! ## Modules
//!
//! - [`api`] - REST API handlers and routes
//! - [`cli`] - Command line interface
//! - [`db`] - Trace persistence
//! - [`parser`] - Evidence payload parsing strategies
//! - [`sources`] - Evidence source traits and HTTP clients
//! - [`trace`] - Stage execution, orchestration and aggregation
//! - [`types`] - Common types and error handling
//! - [`utils`] - TOML configuration with hot reload

/// HTTP API handlers and routes.
pub mod api;
/// Command line interface.
pub mod cli;
/// Trace persistence.
pub mod db;
/// Evidence payload parsers.
pub mod parser;
/// Evidence source adapters.
pub mod sources;
/// Stage execution, orchestration and aggregation.
pub mod trace;
/// Core types and errors.
pub mod types;
/// Configuration utilities.
pub mod utils;

pub use db::{InMemoryTraceStore, TraceStore};
pub use parser::{HeuristicParser, ResultParser, StrictJsonParser};
pub use sources::EvidenceSources;
pub use trace::{StageExecutor, TraceOrchestrator, TraceSettings};
pub use types::{AppError, Result};
pub use utils::toml_config::{UboConfig, UboConfigManager};

use std::sync::Arc;

/// Where request handlers obtain their orchestrator.
#[derive(Clone)]
enum OrchestratorSource {
    /// A prebuilt orchestrator, typically with test doubles
    Fixed(Arc<TraceOrchestrator>),
    /// Rebuilt from the current configuration on every execution
    Config(Arc<UboConfigManager>),
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Trace records, stage results and summaries
    pub store: Arc<dyn TraceStore>,
    orchestrator: OrchestratorSource,
}

impl AppState {
    /// State around a prebuilt orchestrator, which is attached to `store`
    /// so executions always persist their stages and summary.
    pub fn new(store: Arc<dyn TraceStore>, orchestrator: TraceOrchestrator) -> Self {
        let orchestrator = orchestrator.with_store(Arc::clone(&store));
        Self {
            store,
            orchestrator: OrchestratorSource::Fixed(Arc::new(orchestrator)),
        }
    }

    /// State that picks up configuration changes between executions
    pub fn from_config_manager(store: Arc<dyn TraceStore>, manager: Arc<UboConfigManager>) -> Self {
        Self {
            store,
            orchestrator: OrchestratorSource::Config(manager),
        }
    }

    /// Orchestrator for the next trace execution
    pub fn orchestrator(&self) -> Result<Arc<TraceOrchestrator>> {
        match &self.orchestrator {
            OrchestratorSource::Fixed(orchestrator) => Ok(Arc::clone(orchestrator)),
            OrchestratorSource::Config(manager) => {
                let orchestrator = build_orchestrator(&manager.config())?;
                Ok(Arc::new(orchestrator.with_store(Arc::clone(&self.store))))
            }
        }
    }
}

/// Build an HTTP-backed orchestrator from configuration.
pub fn build_orchestrator(config: &UboConfig) -> Result<TraceOrchestrator> {
    let sources = EvidenceSources::from_config(config)?;
    Ok(TraceOrchestrator::new(
        sources,
        Arc::new(HeuristicParser::new()),
        TraceSettings::from_config(config),
    ))
}
