//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. The authorization
//! manager owns the consent lifecycle, the sync service runs sources into
//! sinks, and the registry turns configured names into both.

mod authorization;
pub mod registry;
mod sync;

pub use authorization::{AuthorizationManager, DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVAL};
pub use registry::{build_sync_service, Registry};
pub use sync::{run, SyncReport, SyncService};
