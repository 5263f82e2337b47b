//! Resource gate over the shared pipeline: at most one load in flight, at
//! most one generation in flight, generation requires the loaded variant

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::pipeline::traits::{EditOutput, EditPipeline, EditRequest};
use crate::pipeline::variants::VariantCatalog;

/// Clears a busy flag on every exit path, including errors and cancellation
struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Gate state machine over two independent exclusive-access sections,
/// *loading* and *generating*. The gate owns its state exclusively and knows
/// nothing about job records.
pub struct PipelineManager {
    pipeline: Arc<dyn EditPipeline>,
    catalog: VariantCatalog,
    load_lock: Mutex<()>,
    generate_lock: Mutex<()>,
    current_variant: parking_lot::RwLock<Option<String>>,
    loaded: AtomicBool,
    is_loading: AtomicBool,
    is_generating: AtomicBool,
}

impl PipelineManager {
    pub fn new(pipeline: Arc<dyn EditPipeline>) -> Self {
        Self::with_catalog(pipeline, VariantCatalog::default())
    }

    pub fn with_catalog(pipeline: Arc<dyn EditPipeline>, catalog: VariantCatalog) -> Self {
        Self {
            pipeline,
            catalog,
            load_lock: Mutex::new(()),
            generate_lock: Mutex::new(()),
            current_variant: parking_lot::RwLock::new(None),
            loaded: AtomicBool::new(false),
            is_loading: AtomicBool::new(false),
            is_generating: AtomicBool::new(false),
        }
    }

    /// Load a variant. Concurrent calls queue behind the load section; a
    /// request for the already-loaded variant returns without reloading.
    pub async fn load_variant(&self, key: &str) -> Result<()> {
        let spec = self
            .catalog
            .get(key)
            .ok_or_else(|| {
                AppError::InvalidRequest(format!(
                    "unknown variant '{}', expected one of {:?}",
                    key,
                    self.catalog.keys()
                ))
            })?
            .clone();

        let _section = self.load_lock.lock().await;

        if self.loaded.load(Ordering::SeqCst) && self.current_variant.read().as_deref() == Some(key)
        {
            debug!(variant = %key, "variant already loaded, using cached pipeline");
            return Ok(());
        }

        // The previous handle is discarded the moment a new load begins; on
        // failure the gate reports nothing loaded rather than a stale variant
        self.loaded.store(false, Ordering::SeqCst);
        *self.current_variant.write() = None;

        let _busy = FlagGuard::set(&self.is_loading);
        info!(variant = %key, "loading pipeline variant");

        self.pipeline.load(&spec).await?;

        *self.current_variant.write() = Some(key.to_string());
        self.loaded.store(true, Ordering::SeqCst);
        info!(variant = %key, "pipeline variant loaded");
        Ok(())
    }

    /// Run one generation against the loaded variant. A concurrent generation
    /// observes `Conflict`; a mismatched or absent variant observes
    /// `NotLoaded` — the gate never loads on behalf of a generate call.
    pub async fn generate(&self, key: &str, mut request: EditRequest) -> Result<EditOutput> {
        let spec = self
            .catalog
            .get(key)
            .ok_or_else(|| {
                AppError::InvalidRequest(format!(
                    "unknown variant '{}', expected one of {:?}",
                    key,
                    self.catalog.keys()
                ))
            })?
            .clone();

        let _section = self
            .generate_lock
            .try_lock()
            .map_err(|_| AppError::Conflict("a generation is already in progress".to_string()))?;

        if !self.loaded.load(Ordering::SeqCst) {
            return Err(AppError::NotLoaded("no variant is loaded".to_string()));
        }
        let current = self.current_variant.read().clone();
        if current.as_deref() != Some(key) {
            return Err(AppError::NotLoaded(format!(
                "variant '{}' is not loaded (current: {})",
                key,
                current.as_deref().unwrap_or("none")
            )));
        }

        let seed = request.seed.unwrap_or_else(random_seed);
        request.seed = Some(seed);

        let _busy = FlagGuard::set(&self.is_generating);
        debug!(variant = %key, seed, "starting generation");

        self.pipeline.generate(&spec, request).await
    }

    /// Identifier of the loaded variant, if any
    pub fn current_variant(&self) -> Option<String> {
        self.current_variant.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// Best-effort snapshot for status reporting; may be stale between polls
    pub fn is_loading(&self) -> bool {
        self.is_loading.load(Ordering::SeqCst)
    }

    /// Best-effort snapshot for status reporting; may be stale between polls
    pub fn is_generating(&self) -> bool {
        self.is_generating.load(Ordering::SeqCst)
    }

    pub fn is_busy(&self) -> bool {
        self.is_loading() || self.is_generating()
    }

    pub fn catalog(&self) -> &VariantCatalog {
        &self.catalog
    }
}

fn random_seed() -> i64 {
    rand::thread_rng().gen_range(0..=u32::MAX as i64)
}
