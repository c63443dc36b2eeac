//! Registry - maps configured reader/writer names to constructors

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::{CommandHook, FileConsentStore, JsonSink, NordigenClient, NordigenSource, YnabSink};
use crate::config::Config;
use crate::domain::result::{Error, Result};
use crate::ports::{Sink, Source};
use crate::services::{AuthorizationManager, SyncService};

pub type SourceFactory = Box<dyn Fn(&Config) -> Result<Arc<dyn Source>> + Send + Sync>;
pub type SinkFactory = Box<dyn Fn(&Config) -> Result<Arc<dyn Sink>> + Send + Sync>;

/// Named source and sink constructors
pub struct Registry {
    sources: HashMap<String, SourceFactory>,
    sinks: HashMap<String, SinkFactory>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Registry with the built-in readers and writers
    pub fn new() -> Self {
        let mut registry = Self::empty();

        // Register built-in readers
        registry.register_source("nordigen", nordigen_source);

        // Register built-in writers
        registry.register_sink("ynab", |config| Ok(Arc::new(YnabSink::new(&config.ynab)?)));
        registry.register_sink("json", |config| Ok(Arc::new(JsonSink::new(config.json.path.clone()))));

        registry
    }

    pub fn empty() -> Self {
        Self {
            sources: HashMap::new(),
            sinks: HashMap::new(),
        }
    }

    pub fn register_source<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Config) -> Result<Arc<dyn Source>> + Send + Sync + 'static,
    {
        self.sources.insert(name.to_string(), Box::new(factory));
    }

    pub fn register_sink<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Config) -> Result<Arc<dyn Sink>> + Send + Sync + 'static,
    {
        self.sinks.insert(name.to_string(), Box::new(factory));
    }

    pub fn source(&self, name: &str, config: &Config) -> Result<Arc<dyn Source>> {
        let factory = self
            .sources
            .get(name)
            .ok_or_else(|| Error::config(format!("Unknown reader: {}", name)))?;
        factory(config)
    }

    pub fn sink(&self, name: &str, config: &Config) -> Result<Arc<dyn Sink>> {
        let factory = self
            .sinks
            .get(name)
            .ok_or_else(|| Error::config(format!("Unknown writer: {}", name)))?;
        factory(config)
    }

    /// Build every configured reader and writer, failing on the first bad one
    pub fn build(&self, config: &Config) -> Result<SyncService> {
        if config.readers.is_empty() {
            return Err(Error::config("At least one reader must be configured"));
        }
        if config.writers.is_empty() {
            return Err(Error::config("At least one writer must be configured"));
        }

        let sources = config
            .readers
            .iter()
            .map(|name| self.source(name, config))
            .collect::<Result<Vec<_>>>()?;
        let sinks = config
            .writers
            .iter()
            .map(|name| self.sink(name, config))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(readers = ?config.readers, writers = ?config.writers, "pipeline built");
        Ok(SyncService::new(sources, sinks, config.nordigen.bank_id.clone()))
    }
}

/// Shorthand for building with the built-in registry
pub fn build_sync_service(config: &Config) -> Result<SyncService> {
    Registry::new().build(config)
}

fn nordigen_source(config: &Config) -> Result<Arc<dyn Source>> {
    let nordigen = &config.nordigen;
    let client = Arc::new(NordigenClient::new(
        &nordigen.base_url,
        &nordigen.secret_id,
        &nordigen.secret_key,
    )?);
    let store = Arc::new(FileConsentStore::new(
        config.data_dir.clone(),
        nordigen.requisition_file.clone(),
    ));

    let mut auth = AuthorizationManager::new(client.clone(), store, nordigen.bank_id.clone())
        .with_redirect(nordigen.redirect.clone())
        .with_polling(
            Duration::from_secs(nordigen.poll_interval_secs),
            nordigen.max_polls,
        );
    if let Some(hook) = &nordigen.requisition_hook {
        auth = auth.with_hook(Arc::new(CommandHook::new(hook.clone())));
    }

    Ok(Arc::new(NordigenSource::new(
        Arc::new(auth),
        client,
        nordigen.payee_source.clone(),
    )))
}
