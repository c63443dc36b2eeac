//! Sync service - read every source, write the aggregate to every sink

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::Transaction;
use crate::ports::{Sink, Source};

/// Outcome of one successful run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub bank_id: String,
    pub transactions: usize,
    pub sources: Vec<String>,
    pub sinks: Vec<String>,
    pub elapsed_ms: u64,
}

/// Run the pipeline once.
///
/// Sources are read in order and the first failure aborts the run before any
/// sink is touched. The aggregate keeps source order and is not deduplicated.
/// Sinks then receive the whole batch in order; a failing sink stops the run
/// but earlier sinks have already written.
pub async fn run(
    sources: &[Arc<dyn Source>],
    sinks: &[Arc<dyn Sink>],
    bank_id: &str,
) -> Result<SyncReport> {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("run", %run_id, bank_id);

    async {
        let started = Instant::now();
        tracing::info!("run started");

        let mut transactions: Vec<Transaction> = Vec::new();
        for source in sources {
            let batch = source.bulk(bank_id).await.map_err(|e| {
                tracing::error!(source = source.name(), error = %e, "source failed");
                Error::reading(e)
            })?;
            tracing::info!(source = source.name(), count = batch.len(), "read transactions");
            transactions.extend(batch);
        }

        for sink in sinks {
            sink.bulk(&transactions).await.map_err(|e| {
                tracing::error!(sink = sink.name(), error = %e, "sink failed");
                Error::writing(e)
            })?;
            tracing::debug!(sink = sink.name(), "sink done");
        }

        let report = SyncReport {
            run_id,
            bank_id: bank_id.to_string(),
            transactions: transactions.len(),
            sources: sources.iter().map(|s| s.name().to_string()).collect(),
            sinks: sinks.iter().map(|s| s.name().to_string()).collect(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            transactions = report.transactions,
            elapsed_ms = report.elapsed_ms,
            "run succeeded"
        );
        Ok(report)
    }
    .instrument(span)
    .await
}

/// Configured sources and sinks plus the default bank id
pub struct SyncService {
    sources: Vec<Arc<dyn Source>>,
    sinks: Vec<Arc<dyn Sink>>,
    default_bank_id: String,
}

impl SyncService {
    pub fn new(
        sources: Vec<Arc<dyn Source>>,
        sinks: Vec<Arc<dyn Sink>>,
        default_bank_id: impl Into<String>,
    ) -> Self {
        Self {
            sources,
            sinks,
            default_bank_id: default_bank_id.into(),
        }
    }

    pub fn default_bank_id(&self) -> &str {
        &self.default_bank_id
    }

    /// An explicit non-empty bank id wins over the configured default
    pub fn resolve_bank_id<'a>(&'a self, bank_id: Option<&'a str>) -> &'a str {
        match bank_id {
            Some(id) if !id.is_empty() => id,
            _ => &self.default_bank_id,
        }
    }

    pub async fn run(&self, bank_id: Option<&str>) -> Result<SyncReport> {
        run(&self.sources, &self.sinks, self.resolve_bank_id(bank_id)).await
    }
}
