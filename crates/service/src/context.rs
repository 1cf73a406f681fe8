//! The service context: every long-lived resource, built once.
//!
//! Pools, the collaborator handle, the profile store, the index backend and
//! the response cache are acquired in [`ServiceContext::start`] and released
//! in [`ServiceContext::shutdown`]. Request handlers borrow the context.

use crate::cache::ResponseCache;
use crate::runtime::WorkerPools;
use quill_config::AppConfig;
use quill_core::error::Error;
use quill_core::provider::Provider;
use quill_index::{FileIndexStore, IndexManager};
use quill_ingest::{Chunker, FactExtractor, ParserRegistry};
use quill_profile::{ProfileStore, Reconciler};
use quill_providers::Collaborator;
use std::sync::Arc;
use tracing::info;

pub struct ServiceContext {
    pub(crate) config: AppConfig,
    pub(crate) pools: WorkerPools,
    pub(crate) collaborator: Collaborator,
    pub(crate) parsers: Arc<ParserRegistry>,
    pub(crate) chunker: Chunker,
    pub(crate) extractor: FactExtractor,
    pub(crate) reconciler: Reconciler,
    pub(crate) profile: ProfileStore,
    pub(crate) index: IndexManager,
    pub(crate) cache: ResponseCache,
}

impl ServiceContext {
    /// Start with the default provider named in the config.
    pub fn start(config: AppConfig) -> Result<Self, Error> {
        let router = quill_providers::build_from_config(&config);
        let provider = router.default().ok_or_else(|| Error::Config {
            message: format!("Provider '{}' is not configured", config.default_provider),
        })?;
        Self::start_with(config, provider)
    }

    /// Start with an explicit provider handle.
    pub fn start_with(config: AppConfig, provider: Arc<dyn Provider>) -> Result<Self, Error> {
        Self::start_with_parsers(config, provider, ParserRegistry::default())
    }

    /// Start with an explicit provider and parser registry.
    pub fn start_with_parsers(
        config: AppConfig,
        provider: Arc<dyn Provider>,
        parsers: ParserRegistry,
    ) -> Result<Self, Error> {
        config.validate().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;

        let pools = WorkerPools::new(&config.runtime)?;
        let collaborator =
            Collaborator::from_config(provider, &config).with_permits(pools.io_permits());

        let extractor = FactExtractor::new(collaborator.clone())
            .with_max_context_chars(config.extraction.max_context_chars);
        let reconciler = Reconciler::new(collaborator.clone(), config.extraction.strategy);
        let profile = ProfileStore::open(&config.profile.path)?;
        let index = IndexManager::new(
            Arc::new(FileIndexStore::new(&config.index.dir, collaborator.clone())),
            config.index.top_k,
        );

        info!(
            provider = collaborator.provider().name(),
            model = collaborator.model(),
            strategy = ?config.extraction.strategy,
            profile = %config.profile.path.display(),
            parsers = ?parsers.extensions(),
            "Service context started"
        );

        Ok(Self {
            chunker: Chunker::from_config(&config.chunking),
            cache: ResponseCache::new(config.runtime.cache_capacity),
            parsers: Arc::new(parsers),
            config,
            pools,
            collaborator,
            extractor,
            reconciler,
            profile,
            index,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn profile(&self) -> &ProfileStore {
        &self.profile
    }

    pub fn index(&self) -> &IndexManager {
        &self.index
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn pools(&self) -> &WorkerPools {
        &self.pools
    }

    /// Release pooled resources. Calls already in flight complete; new
    /// collaborator calls fail.
    pub async fn shutdown(&self) {
        self.pools.close();
        let cached = self.cache.len().await;
        self.cache.clear().await;
        info!(cached, "Service context shut down");
    }
}
