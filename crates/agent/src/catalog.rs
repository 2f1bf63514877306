use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use shelfbot_core::catalog::{CatalogIndex, IndexLimits};
use shelfbot_core::config::{CatalogConfig, MatchingConfig};
use shelfbot_core::domain::product::ProductRecord;
use shelfbot_core::errors::CatalogError;
use shelfbot_core::text::Vocabulary;

#[async_trait]
pub trait CatalogProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn get_all_products(&self) -> Result<Vec<ProductRecord>, CatalogError>;
}

#[derive(Clone, Debug, Default)]
pub struct StaticCatalogProvider {
    records: Vec<ProductRecord>,
}

impl StaticCatalogProvider {
    pub fn new(records: Vec<ProductRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl CatalogProvider for StaticCatalogProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn get_all_products(&self) -> Result<Vec<ProductRecord>, CatalogError> {
        Ok(self.records.clone())
    }
}

/// Reads a JSON array of `{name, sku, price, stock}` objects.
#[derive(Clone, Debug)]
pub struct JsonFileCatalogProvider {
    path: PathBuf,
}

impl JsonFileCatalogProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CatalogProvider for JsonFileCatalogProvider {
    fn name(&self) -> &'static str {
        "json_file"
    }

    async fn get_all_products(&self) -> Result<Vec<ProductRecord>, CatalogError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| CatalogError::Read { path: self.path.clone(), source })?;
        serde_json::from_str(&raw)
            .map_err(|source| CatalogError::Parse { path: self.path.clone(), source })
    }
}

/// Current catalog snapshot plus the settings needed to rebuild it.
///
/// Readers clone the `Arc` and keep resolving against that snapshot even if a
/// refresh swaps in a new one meanwhile. The lock guards the pointer only.
#[derive(Debug)]
pub struct CatalogHandle {
    current: RwLock<Arc<CatalogIndex>>,
    degraded: AtomicBool,
    limits: IndexLimits,
    vocabulary: Vocabulary,
}

impl Default for CatalogHandle {
    fn default() -> Self {
        Self::new(IndexLimits::default(), Vocabulary::default())
    }
}

impl CatalogHandle {
    pub fn new(limits: IndexLimits, vocabulary: Vocabulary) -> Self {
        Self {
            current: RwLock::new(Arc::new(CatalogIndex::build(Vec::new(), limits, &vocabulary))),
            degraded: AtomicBool::new(false),
            limits,
            vocabulary,
        }
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::new(IndexLimits::from(config), Vocabulary::from_config(config))
    }

    pub fn snapshot(&self) -> Arc<CatalogIndex> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Set when the last refresh failed and answers come from an older (or
    /// empty) snapshot.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    pub fn replace(&self, records: Vec<ProductRecord>) -> Arc<CatalogIndex> {
        let index = Arc::new(CatalogIndex::build(records, self.limits, &self.vocabulary));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&index);
        self.degraded.store(false, Ordering::Release);
        index
    }

    /// Rebuild from the provider. A failure keeps the previous snapshot and
    /// marks the handle degraded; an unchanged catalog keeps the same `Arc`.
    pub async fn refresh(
        &self,
        provider: &dyn CatalogProvider,
    ) -> Result<Arc<CatalogIndex>, CatalogError> {
        let records = match provider.get_all_products().await {
            Ok(records) => records,
            Err(error) => {
                self.degraded.store(true, Ordering::Release);
                warn!(
                    event_name = "catalog.refresh.failed",
                    provider = provider.name(),
                    error = %error,
                    "catalog refresh failed; keeping last snapshot"
                );
                return Err(error);
            }
        };

        let current = self.snapshot();
        let candidate = CatalogIndex::build(records, self.limits, &self.vocabulary);
        if candidate.fingerprint() == current.fingerprint() && !current.is_empty() {
            self.degraded.store(false, Ordering::Release);
            return Ok(current);
        }

        let index = Arc::new(candidate);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&index);
        self.degraded.store(false, Ordering::Release);
        info!(
            event_name = "catalog.refresh.swapped",
            provider = provider.name(),
            products = index.len(),
            fingerprint = %index.fingerprint(),
            "catalog snapshot swapped"
        );
        Ok(index)
    }
}

/// Periodic background refresh.
pub struct CatalogRefresher;

impl CatalogRefresher {
    /// Refresh every `catalog.refresh_interval_secs`, starting immediately.
    pub fn from_config(
        handle: Arc<CatalogHandle>,
        provider: Arc<dyn CatalogProvider>,
        config: &CatalogConfig,
    ) -> JoinHandle<()> {
        let every = Self::period(config);
        info!(
            event_name = "catalog.refresher.started",
            provider = provider.name(),
            interval_secs = every.as_secs(),
            "catalog refresher started"
        );
        Self::spawn(handle, provider, every)
    }

    pub fn period(config: &CatalogConfig) -> Duration {
        // validation rejects 0, but a zero period would panic in tokio
        Duration::from_secs(config.refresh_interval_secs.max(1))
    }

    pub fn spawn(
        handle: Arc<CatalogHandle>,
        provider: Arc<dyn CatalogProvider>,
        every: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                // failures are logged and flagged inside refresh
                let _ = handle.refresh(provider.as_ref()).await;
            }
        })
    }
}
