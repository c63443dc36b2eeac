//! Requisition notification hook port

use async_trait::async_trait;

use crate::domain::Requisition;

/// Side channel that tells the user a requisition changed (typically that a
/// consent link is waiting to be visited).
///
/// Fire-and-forget: implementations log their own failures and never return
/// them.
#[async_trait]
pub trait RequisitionHook: Send + Sync {
    async fn notify(&self, requisition: &Requisition);
}
