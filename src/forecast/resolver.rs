//! Lazy, memoized forecaster resolution.
//!
//! Resolution order: explicit artifact URI, then discovery of the latest
//! finished forecasting run in the tracking store. The outcome is cached for
//! the process: a loaded handle is reused forever, an `Unavailable` outcome is
//! sticky until [`ForecastResolver::reset`] is called.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::model::{Forecaster, TrendSeasonalModel};
use crate::error::{Result, StrategyError};
use crate::tracking::TrackingStore;

/// A loaded forecaster plus the URI it came from.
pub struct ForecasterHandle {
    model: Arc<dyn Forecaster>,
    source_uri: String,
}

impl ForecasterHandle {
    pub fn new(model: Arc<dyn Forecaster>, source_uri: impl Into<String>) -> Self {
        Self {
            model,
            source_uri: source_uri.into(),
        }
    }

    pub fn model(&self) -> &dyn Forecaster {
        self.model.as_ref()
    }

    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }
}

impl std::fmt::Debug for ForecasterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecasterHandle")
            .field("source_uri", &self.source_uri)
            .finish_non_exhaustive()
    }
}

enum ResolverState {
    Unresolved,
    Loaded(Arc<ForecasterHandle>),
    Unavailable(String),
}

/// Externally visible resolver state (for `/health` and diagnostics).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResolverStatus {
    Unresolved,
    Loaded { source_uri: String },
    Unavailable { reason: String },
}

/// Where forecaster artifacts come from.
#[derive(Debug, Clone)]
pub struct ForecastLocator {
    /// Explicitly configured artifact URI; tried first.
    pub artifact_uri: Option<String>,
    /// Experiment searched during discovery.
    pub experiment: String,
    /// Artifact path logged by the training run.
    pub artifact_name: String,
}

pub struct ForecastResolver {
    locator: ForecastLocator,
    store: TrackingStore,
    state: RwLock<ResolverState>,
    discovery_attempts: AtomicU64,
    load_attempts: AtomicU64,
}

/// Resolution counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverStats {
    pub discovery_attempts: u64,
    pub load_attempts: u64,
}

impl ForecastResolver {
    pub fn new(locator: ForecastLocator, store: TrackingStore) -> Self {
        Self {
            locator,
            store,
            state: RwLock::new(ResolverState::Unresolved),
            discovery_attempts: AtomicU64::new(0),
            load_attempts: AtomicU64::new(0),
        }
    }

    /// Cached handle, resolving on first use. Never fails; `None` means unavailable.
    pub fn resolve(&self) -> Option<Arc<ForecasterHandle>> {
        // Fast path: outcome already known.
        match self.state.read() {
            Ok(guard) => match &*guard {
                ResolverState::Loaded(h) => return Some(Arc::clone(h)),
                ResolverState::Unavailable(_) => return None,
                ResolverState::Unresolved => {}
            },
            Err(e) => {
                warn!(error = %e, "Forecast resolver lock poisoned; proceeding without trend");
                return None;
            }
        }

        // Slow path: one caller resolves while the others wait on the write lock.
        let mut guard = match self.state.write() {
            Ok(g) => g,
            Err(e) => {
                warn!(error = %e, "Forecast resolver lock poisoned; proceeding without trend");
                return None;
            }
        };
        match &*guard {
            ResolverState::Loaded(h) => return Some(Arc::clone(h)),
            ResolverState::Unavailable(_) => return None,
            ResolverState::Unresolved => {}
        }

        match self.resolve_uncached() {
            Ok(handle) => {
                info!(source = %handle.source_uri(), "Forecaster loaded");
                let handle = Arc::new(handle);
                *guard = ResolverState::Loaded(Arc::clone(&handle));
                Some(handle)
            }
            Err(e) => {
                warn!(error = %e, "Forecaster unavailable; proceeding without trend data");
                *guard = ResolverState::Unavailable(e.to_string());
                None
            }
        }
    }

    /// True once `resolve` has a cached outcome, i.e. the next call will not touch the store.
    pub fn is_settled(&self) -> bool {
        self.state
            .read()
            .map(|g| !matches!(&*g, ResolverState::Unresolved))
            .unwrap_or(true)
    }

    /// Re-arm resolution after an `Unavailable` outcome. A loaded handle is kept.
    pub fn reset(&self) -> ResolverStatus {
        if let Ok(mut guard) = self.state.write() {
            if matches!(&*guard, ResolverState::Unavailable(_)) {
                debug!("Forecast resolver reset");
                *guard = ResolverState::Unresolved;
            }
        }
        self.status()
    }

    pub fn status(&self) -> ResolverStatus {
        match self.state.read() {
            Ok(guard) => match &*guard {
                ResolverState::Unresolved => ResolverStatus::Unresolved,
                ResolverState::Loaded(h) => ResolverStatus::Loaded {
                    source_uri: h.source_uri().to_string(),
                },
                ResolverState::Unavailable(reason) => ResolverStatus::Unavailable {
                    reason: reason.clone(),
                },
            },
            Err(_) => ResolverStatus::Unavailable {
                reason: "resolver lock poisoned".into(),
            },
        }
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            discovery_attempts: self.discovery_attempts.load(Ordering::Relaxed),
            load_attempts: self.load_attempts.load(Ordering::Relaxed),
        }
    }

    fn resolve_uncached(&self) -> Result<ForecasterHandle> {
        let mut last_err = None;

        if let Some(uri) = self.locator.artifact_uri.as_deref() {
            match self.load(uri) {
                Ok(h) => return Ok(h),
                Err(e) => {
                    warn!(uri, error = %e, "Configured forecaster artifact failed to load; trying discovery");
                    last_err = Some(e);
                }
            }
        }

        match self.discover() {
            Ok(Some(uri)) => self.load(&uri),
            Ok(None) => Err(last_err.unwrap_or_else(|| {
                StrategyError::ForecastUnavailable(format!(
                    "no finished '{}' run with artifact '{}' in {}",
                    self.locator.experiment,
                    self.locator.artifact_name,
                    self.store.root().display()
                ))
            })),
            Err(e) => Err(e),
        }
    }

    fn discover(&self) -> Result<Option<String>> {
        self.discovery_attempts.fetch_add(1, Ordering::Relaxed);
        let run = self
            .store
            .latest_finished_run(&self.locator.experiment, &self.locator.artifact_name)?;
        Ok(run.map(|r| {
            debug!(run_id = %r.meta.run_id, started = %r.meta.start_time, "Discovered forecaster run");
            format!("runs:/{}/{}", r.meta.run_id, self.locator.artifact_name)
        }))
    }

    fn load(&self, uri: &str) -> Result<ForecasterHandle> {
        self.load_attempts.fetch_add(1, Ordering::Relaxed);
        let path = self.store.resolve_artifact_uri(uri)?;
        let model = TrendSeasonalModel::load(&path)?;
        Ok(ForecasterHandle::new(Arc::new(model), uri))
    }
}
