//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - JSON files (and an in-memory map) for the ConsentStore port
//! - Nordigen HTTP client for RequisitionClient / AccountData, plus the
//!   `nordigen` Source built on it
//! - YNAB HTTP client and a JSON dump for the Sink port
//! - An external executable for the RequisitionHook port

pub mod command_hook;
pub mod file_store;
pub mod json;
pub mod memory_store;
pub mod nordigen;
pub mod ynab;

pub use command_hook::CommandHook;
pub use file_store::FileConsentStore;
pub use json::JsonSink;
pub use memory_store::MemoryConsentStore;
pub use nordigen::{NordigenClient, NordigenSource};
pub use ynab::YnabSink;
