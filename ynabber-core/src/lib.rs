//! ynabber core - bank transactions from Nordigen into YNAB
//!
//! This crate implements the core logic following hexagonal architecture:
//!
//! - **domain**: Core entities (Requisition, Transaction, errors)
//! - **ports**: Trait definitions for external dependencies (Source, Sink, ConsentStore)
//! - **services**: Authorization lifecycle, sync orchestration, reader/writer registry
//! - **adapters**: Concrete implementations (Nordigen, YNAB, JSON files)
//! - **server**: The HTTP trigger and scheduler around a sync service

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod server;
pub mod services;

use std::sync::Arc;

use config::Config;
use services::{Registry, SyncService};

// Re-export commonly used types at crate root
pub use domain::result::{Error, Result};
pub use domain::{Amount, ConsentState, Requisition, RequisitionStatus, Transaction};
pub use server::{RunMode, TriggerState};
pub use services::SyncReport;

/// Main context for ynabber operations
///
/// Holds the configuration and the sync service built from it.
pub struct YnabberContext {
    pub config: Config,
    pub sync_service: Arc<SyncService>,
}

impl YnabberContext {
    /// Build every configured reader and writer with the built-in registry
    pub fn new(config: Config) -> Result<Self> {
        Self::with_registry(config, &Registry::new())
    }

    pub fn with_registry(config: Config, registry: &Registry) -> Result<Self> {
        let sync_service = Arc::new(registry.build(&config)?);
        Ok(Self {
            config,
            sync_service,
        })
    }

    /// Trigger state matching the configured interval and detached flag
    pub fn trigger_state(&self) -> TriggerState {
        TriggerState::new(
            Arc::clone(&self.sync_service),
            RunMode::from_interval(self.config.interval()),
        )
        .detached(self.config.detached)
    }
}
