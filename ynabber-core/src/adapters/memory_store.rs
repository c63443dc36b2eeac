//! In-memory consent store
//!
//! Keeps serialized blobs rather than structs so it behaves like durable
//! storage: a blob that doesn't parse loads as `Corrupt`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::result::{Error, Result};
use crate::domain::Requisition;
use crate::ports::{ConsentStore, LoadOutcome};

#[derive(Debug, Default)]
pub struct MemoryConsentStore {
    override_name: Option<String>,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryConsentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(name: impl Into<String>) -> Self {
        Self {
            override_name: Some(name.into()).filter(|n| !n.is_empty()),
            blobs: Mutex::new(HashMap::new()),
        }
    }

    /// Store raw bytes under the resolved key for `bank_id`
    pub fn put_raw(&self, bank_id: &str, blob: impl Into<Vec<u8>>) {
        let key = self.key_for(bank_id);
        self.lock_blobs().insert(key, blob.into());
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.lock_blobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_blobs(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        // A poisoned map is still a consistent map; writers never panic mid-insert.
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ConsentStore for MemoryConsentStore {
    fn key_for(&self, bank_id: &str) -> String {
        self.override_name.clone().unwrap_or_else(|| bank_id.to_string())
    }

    async fn load(&self, bank_id: &str) -> Result<LoadOutcome> {
        let key = self.key_for(bank_id);
        let blobs = self.lock_blobs();
        let Some(blob) = blobs.get(&key) else {
            return Ok(LoadOutcome::Absent);
        };
        Ok(match serde_json::from_slice::<Requisition>(blob) {
            Ok(requisition) => LoadOutcome::Found(requisition),
            Err(e) => LoadOutcome::Corrupt(format!("{}: {}", key, e)),
        })
    }

    async fn save(&self, bank_id: &str, requisition: &Requisition) -> Result<()> {
        let blob = serde_json::to_vec(requisition).map_err(Error::Json)?;
        let key = self.key_for(bank_id);
        self.lock_blobs().insert(key, blob);
        Ok(())
    }
}
