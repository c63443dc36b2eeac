//! JSON sink - dumps the batch as a pretty JSON array

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::file_store::atomic_write;
use crate::domain::result::{Error, Result};
use crate::domain::Transaction;
use crate::ports::Sink;

/// Writes to `path` (atomically replaced) or to stdout when no path is set
#[derive(Debug, Clone, Default)]
pub struct JsonSink {
    path: Option<PathBuf>,
}

impl JsonSink {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Sink for JsonSink {
    fn name(&self) -> &str {
        "json"
    }

    async fn bulk(&self, transactions: &[Transaction]) -> Result<()> {
        let mut data = serde_json::to_vec_pretty(transactions)?;
        data.push(b'\n');

        match &self.path {
            Some(path) => {
                let path = path.clone();
                tokio::task::spawn_blocking(move || atomic_write(&path, &data))
                    .await
                    .map_err(|e| Error::Io(std::io::Error::other(e)))??;
            }
            None => {
                let mut stdout = tokio::io::stdout();
                stdout.write_all(&data).await?;
                stdout.flush().await?;
            }
        }
        Ok(())
    }
}
