//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The services depend
//! only on these traits, never on concrete adapters.

mod aggregator;
mod clock;
mod consent_store;
mod hook;
mod pipeline;

pub use aggregator::{AccountData, AccountDetails, RequisitionClient};
pub use clock::{Sleeper, TokioSleeper};
pub use consent_store::{ConsentStore, LoadOutcome};
pub use hook::RequisitionHook;
pub use pipeline::{Sink, Source};
