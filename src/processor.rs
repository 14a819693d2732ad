//! Boolean cutout orchestrator
//!
//! [`BooleanCutout`] owns the public operation surface of one inpaint mask
//! layer's cutout module: the range/iteration parameters, the processing
//! flag, the last-result cache, and the dispatch between local segmentation
//! ("fit" operations) and the remote graph service (plain operations).
//!
//! At most one operation runs per module. A second request while one is in
//! flight is rejected with a warning, never queued.

use crate::acquisition::{ImageAcquisition, SourceImages};
use crate::canvas::{Compositor, LayerStore, MaskLayer};
use crate::config::CutoutConfig;
use crate::engine::{self, FitMode};
use crate::error::{CutoutError, Result};
use crate::graph::{BooleanOpClient, Graph, GraphExecutor, HttpGraphExecutor};
use crate::parameters::CutoutParameters;
use crate::services::i18n::{keys, FallbackLocalizer, Localizer};
use crate::services::io::{self, BitmapLoader, UrlBitmapLoader};
use crate::services::notify::{Notices, Notifier, TracingNotifier};
use crate::types::{
    CutoutSnapshot, ImageObject, ImageResource, LayerPlacement, OperationKind, Rect,
};
use crate::vision::{MatScope, NativeRuntime, VisionRuntime};
use async_trait::async_trait;
use instant::Instant;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

/// Module type, also the prefix of module ids
pub const MODULE_TYPE: &str = "canvas_boolean_cutout";

/// Callback invoked with a fresh snapshot whenever observable state changes
pub type Observer = Box<dyn Fn(&CutoutSnapshot) + Send + Sync>;

type SharedObserver = Arc<dyn Fn(&CutoutSnapshot) + Send + Sync>;

/// Handle returned by [`BooleanCutout::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

struct State {
    params: CutoutParameters,
    last_result: Option<ImageObject>,
    is_processing: bool,
    run_id: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Observers {
    next_id: u64,
    entries: Vec<(u64, SharedObserver)>,
}

/// Executor used when no graph endpoint is configured
struct UnconfiguredExecutor;

#[async_trait]
impl GraphExecutor for UnconfiguredExecutor {
    async fn run_graph(&self, _graph: &Graph, _output_node_id: &str) -> Result<ImageResource> {
        Err(CutoutError::remote_op(
            "no graph execution endpoint configured",
        ))
    }
}

/// Cutout module of one inpaint mask layer
pub struct BooleanCutout {
    id: String,
    mask_layer: Arc<dyn MaskLayer>,
    store: Arc<dyn LayerStore>,
    acquisition: ImageAcquisition,
    loader: Arc<dyn BitmapLoader>,
    remote: BooleanOpClient,
    runtime: Option<tokio::sync::Mutex<Box<dyn VisionRuntime>>>,
    notices: Notices,
    state: Mutex<State>,
    observers: Mutex<Observers>,
}

impl BooleanCutout {
    /// Create a new builder
    #[must_use]
    pub fn builder() -> BooleanCutoutBuilder {
        BooleanCutoutBuilder::new()
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self) {
        let snapshot = self.repr();
        // Call outside the lock so observers may touch the module again
        let callbacks: Vec<SharedObserver> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in callbacks {
            observer(&snapshot);
        }
    }

    #[must_use]
    pub fn range(&self) -> u32 {
        self.state().params.range()
    }

    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.state().params.iterations()
    }

    #[must_use]
    pub fn parameters(&self) -> CutoutParameters {
        self.state().params
    }

    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.state().is_processing
    }

    #[must_use]
    pub fn has_last_result(&self) -> bool {
        self.state().last_result.is_some()
    }

    #[must_use]
    pub fn last_result(&self) -> Option<ImageObject> {
        self.state().last_result.clone()
    }

    /// Set the range for fit operations, clamped to 1-100
    pub fn set_range(&self, range: i64) -> u32 {
        let stored = self.state().params.set_range(range);
        trace!(range = stored, requested = range, "Set range");
        self.emit();
        stored
    }

    /// Set the iterations for fit operations, clamped to 2-15
    pub fn set_iterations(&self, iterations: i64) -> u32 {
        let stored = self.state().params.set_iterations(iterations);
        trace!(iterations = stored, requested = iterations, "Set iterations");
        self.emit();
        stored
    }

    /// Restore range 50 and iterations 5 and forget the last result
    ///
    /// Configured defaults only seed a new module; reset ignores them. The
    /// processing flag is left alone.
    pub fn reset(&self) {
        debug!("Module reset");
        {
            let mut state = self.state();
            state.params = CutoutParameters::default();
            state.last_result = None;
        }
        self.emit();
    }

    pub fn start(&self) {
        debug!(module = %self.id, "Module interaction started");
    }

    /// Abort the in-flight operation, if any
    ///
    /// Pending image loads, the remote call and persistence stop at their
    /// next await and the run ends with [`CutoutError::Cancelled`]. A
    /// segmentation pass that is already running completes first.
    pub fn cancel(&self) {
        let was_processing = {
            let mut state = self.state();
            let was_processing = state.is_processing;
            state.cancel.cancel();
            state.cancel = CancellationToken::new();
            state.is_processing = false;
            was_processing
        };
        if was_processing {
            warn!("Cancelling in-flight boolean operation");
        }
        debug!("Module interaction canceled");
        self.emit();
    }

    pub fn destroy(&self) {
        debug!(module = %self.id, "Destroying module");
        self.state().cancel.cancel();
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clear();
    }

    /// Serializable view of the module state
    #[must_use]
    pub fn repr(&self) -> CutoutSnapshot {
        let state = self.state();
        CutoutSnapshot {
            id: self.id.clone(),
            kind: MODULE_TYPE.to_string(),
            parent: self.mask_layer.id().to_string(),
            range: state.params.range(),
            iterations: state.params.iterations(),
            is_processing: state.is_processing,
            has_last_result: state.last_result.is_some(),
            last_result_image_name: state
                .last_result
                .as_ref()
                .map(|object| object.image.image_name.clone()),
        }
    }

    /// Register a change observer
    ///
    /// Observers run synchronously on the thread that changed the state. They
    /// may call back into the module; changes made from a callback notify
    /// every observer again before the outer notification continues.
    pub fn subscribe(&self, observer: Observer) -> SubscriptionId {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let id = observers.next_id;
        observers.next_id += 1;
        observers.entries.push((id, Arc::from(observer)));
        SubscriptionId(id)
    }

    /// Remove an observer; returns whether it was registered
    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = observers.entries.len();
        observers.entries.retain(|(id, _)| *id != subscription.0);
        observers.entries.len() != before
    }

    /// Claim the processing flag for a new run
    fn begin(&self) -> Option<(u64, CancellationToken)> {
        let claimed = {
            let mut state = self.state();
            if state.is_processing {
                None
            } else {
                state.is_processing = true;
                state.last_result = None;
                state.run_id += 1;
                Some((state.run_id, state.cancel.clone()))
            }
        };
        if claimed.is_some() {
            self.emit();
        }
        claimed
    }

    /// Release the processing flag, unless a newer run owns it
    fn end(&self, run_id: u64) {
        {
            let mut state = self.state();
            if state.run_id == run_id {
                state.is_processing = false;
            }
        }
        self.emit();
    }

    /// Run a cutout operation and register its result as a new raster layer
    ///
    /// Every failure is logged and surfaced as exactly one notification;
    /// the returned error carries the same condition for programmatic use.
    ///
    /// # Errors
    /// - [`CutoutError::ConcurrentOperationRejected`] if an operation is in flight
    /// - acquisition, engine, bridge or remote failures
    /// - [`CutoutError::Cancelled`] if [`BooleanCutout::cancel`] was called
    #[instrument(skip_all, fields(module = %self.id, operation = %kind))]
    pub async fn perform_operation(&self, kind: OperationKind) -> Result<ImageObject> {
        let Some((run_id, token)) = self.begin() else {
            warn!("Already processing");
            self.notices
                .warning(keys::OP_IN_PROGRESS, "Operation already in progress.");
            return Err(CutoutError::ConcurrentOperationRejected);
        };
        info!(operation = %kind, "Performing boolean operation");

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => Err(CutoutError::Cancelled),
            result = self.execute(kind) => result,
        };

        let result = outcome.and_then(|(resource, bbox)| self.commit(run_id, kind, resource, bbox));
        if let Err(e) = &result {
            self.report_failure(run_id, kind, e);
        }
        self.end(run_id);
        result
    }

    async fn execute(&self, kind: OperationKind) -> Result<(ImageResource, Rect)> {
        let sources = self.acquisition.acquire().await?;
        let bbox = self.mask_layer.bounding_rect();

        let resource = match kind {
            OperationKind::ExtractedFit => self.run_fit(&sources, FitMode::Extract).await?,
            OperationKind::ErasedFit => self.run_fit(&sources, FitMode::Erase).await?,
            OperationKind::Erase | OperationKind::Extract => {
                debug!(operation = %kind, "Using remote graph for basic operation");
                self.remote
                    .run_boolean_op(&sources.composite, &sources.mask, kind, bbox)
                    .await?
            },
        };
        Ok((resource, bbox))
    }

    async fn run_fit(&self, sources: &SourceImages, mode: FitMode) -> Result<ImageResource> {
        let Some(runtime) = &self.runtime else {
            error!("Vision runtime is not configured");
            return Err(CutoutError::EngineUnavailable);
        };
        let mut runtime = runtime.lock().await;
        if !runtime.is_available() {
            error!("Vision runtime is not loaded or is not available");
            return Err(CutoutError::EngineUnavailable);
        }

        let params = self.parameters();
        debug!(
            range = params.range(),
            iterations = params.iterations(),
            "Performing \"fit\" operation"
        );

        let (composite, mask) = futures::try_join!(
            self.loader.load(&sources.composite.image.image_url),
            self.loader.load(&sources.mask.image.image_url),
        )?;

        let started = Instant::now();
        let mut scope = MatScope::new(&mut **runtime);
        let result = engine::run(&mut scope, &composite, &mask, params, mode)?;
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Segmentation pipeline finished"
        );

        let name_hint = format!(
            "{}_{}_grabcut:{}",
            self.mask_layer.id(),
            sources.composite.image.name_base(),
            uuid::Uuid::new_v4()
        );
        let board_id = self.mask_layer.board_id();
        io::buffer_to_image_resource(
            &scope,
            result,
            &name_hint,
            board_id.as_deref(),
            self.store.as_ref(),
            &self.notices,
        )
        .await
    }

    /// Cache the result and register it as a selected raster layer
    fn commit(
        &self,
        run_id: u64,
        kind: OperationKind,
        resource: ImageResource,
        bbox: Rect,
    ) -> Result<ImageObject> {
        let image_object = ImageObject::from(resource);
        {
            let mut state = self.state();
            if state.run_id == run_id {
                state.last_result = Some(image_object.clone());
            }
        }
        debug!(operation = %kind, "Boolean operation successful, adding new raster layer");
        self.store
            .add_raster_layer(LayerPlacement {
                image_object: image_object.clone(),
                position: bbox.origin(),
                is_selected: true,
            })
            .map_err(|e| CutoutError::layer_registration(e.to_string()))?;
        self.notices.success(
            keys::OP_COMPLETE,
            &format!("\"{}\" operation complete.", kind),
        );
        Ok(image_object)
    }

    fn report_failure(&self, run_id: u64, kind: OperationKind, error: &CutoutError) {
        {
            let mut state = self.state();
            if state.run_id == run_id {
                state.last_result = None;
            }
        }

        match error {
            // Reported by acquisition or the buffer bridge already
            CutoutError::NoMaskImage
            | CutoutError::NoVisibleLayers
            | CutoutError::ExportFailed(_) => {},
            CutoutError::InvalidBuffer { .. } | CutoutError::PersistFailed(_) => {
                error!(error = %error, operation = %kind, "Error during boolean operation");
            },
            CutoutError::EngineUnavailable => {
                self.notices.error_detail(
                    keys::ENGINE_ERROR_TITLE,
                    "OpenCV Error",
                    keys::ENGINE_LOAD_ERROR,
                    "OpenCV library failed to load or is invalid.",
                );
            },
            CutoutError::RemoteOpFailed(_) => {
                error!(error = %error, operation = %kind, "Remote boolean operation failed");
                self.notices.error(
                    keys::REMOTE_OP_FAILED,
                    &format!("Boolean operation ({}) failed.", kind),
                );
            },
            CutoutError::Cancelled => {
                warn!(operation = %kind, "Boolean operation cancelled");
                self.notices
                    .warning(keys::OP_CANCELLED, "Operation cancelled.");
            },
            _ => {
                error!(error = %error, operation = %kind, "Error during boolean operation");
                self.notices.error(
                    keys::UNEXPECTED_ERROR,
                    "An unexpected error occurred during operation.",
                );
            },
        }
    }

    /// Promote the last result to a new selected inpaint mask layer
    ///
    /// # Errors
    /// - [`CutoutError::NoResultToSave`] if there is no cached result
    /// - [`CutoutError::LayerRegistration`] if the store rejects the layer
    pub fn save_as_inpaint_mask(&self) -> Result<()> {
        let Some(image_object) = self.last_result() else {
            warn!("No last result image to save as InpaintMask");
            self.notices
                .warning(keys::NO_RESULT_TO_SAVE, "No result to save.");
            return Err(CutoutError::NoResultToSave);
        };

        let bbox = self.mask_layer.bounding_rect();
        debug!(image_name = %image_object.image.image_name, "Saving result as InpaintMask");
        match self.store.add_inpaint_mask(LayerPlacement {
            image_object,
            position: bbox.origin(),
            is_selected: true,
        }) {
            Ok(()) => {
                self.notices
                    .success(keys::SAVE_AS_MASK_SUCCESS, "Result saved as InpaintMask.");
                Ok(())
            },
            Err(e) => {
                error!(error = %e, "Failed to save as InpaintMask");
                self.notices
                    .error(keys::SAVE_AS_MASK_FAILED, "Failed to save as InpaintMask.");
                Err(CutoutError::layer_registration(e.to_string()))
            },
        }
    }
}

impl std::fmt::Debug for BooleanCutout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BooleanCutout")
            .field("id", &self.id)
            .field("state", &self.repr())
            .finish_non_exhaustive()
    }
}

/// Builder for [`BooleanCutout`]
///
/// The mask layer, layer store and compositor are required. Everything else
/// defaults from the [`CutoutConfig`]: a native vision runtime, a URL bitmap
/// loader, an HTTP graph executor when an endpoint is configured, a tracing
/// notifier and fallback localization.
#[derive(Default)]
pub struct BooleanCutoutBuilder {
    config: CutoutConfig,
    mask_layer: Option<Arc<dyn MaskLayer>>,
    store: Option<Arc<dyn LayerStore>>,
    compositor: Option<Arc<dyn Compositor>>,
    executor: Option<Arc<dyn GraphExecutor>>,
    loader: Option<Arc<dyn BitmapLoader>>,
    runtime: Option<Box<dyn VisionRuntime>>,
    without_runtime: bool,
    notifier: Option<Arc<dyn Notifier>>,
    localizer: Option<Arc<dyn Localizer>>,
}

impl BooleanCutoutBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: CutoutConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn mask_layer(mut self, mask_layer: Arc<dyn MaskLayer>) -> Self {
        self.mask_layer = Some(mask_layer);
        self
    }

    #[must_use]
    pub fn layer_store(mut self, store: Arc<dyn LayerStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn compositor(mut self, compositor: Arc<dyn Compositor>) -> Self {
        self.compositor = Some(compositor);
        self
    }

    #[must_use]
    pub fn graph_executor(mut self, executor: Arc<dyn GraphExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    #[must_use]
    pub fn bitmap_loader(mut self, loader: Arc<dyn BitmapLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    #[must_use]
    pub fn runtime(mut self, runtime: Box<dyn VisionRuntime>) -> Self {
        self.runtime = Some(runtime);
        self.without_runtime = false;
        self
    }

    /// Build without any vision runtime; fit operations fail as unavailable
    #[must_use]
    pub fn without_runtime(mut self) -> Self {
        self.runtime = None;
        self.without_runtime = true;
        self
    }

    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    #[must_use]
    pub fn localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = Some(localizer);
        self
    }

    /// Build the module
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Missing mask layer, layer store or compositor
    /// - Failed to create HTTP clients
    pub fn build(self) -> Result<BooleanCutout> {
        self.config.validate()?;
        let mask_layer = self
            .mask_layer
            .ok_or_else(|| CutoutError::invalid_config("mask layer is required"))?;
        let store = self
            .store
            .ok_or_else(|| CutoutError::invalid_config("layer store is required"))?;
        let compositor = self
            .compositor
            .ok_or_else(|| CutoutError::invalid_config("compositor is required"))?;

        let executor: Arc<dyn GraphExecutor> = match (self.executor, &self.config.graph_endpoint) {
            (Some(executor), _) => executor,
            (None, Some(endpoint)) => Arc::new(HttpGraphExecutor::new(
                endpoint.clone(),
                self.config.request_timeout_secs,
            )?),
            (None, None) => Arc::new(UnconfiguredExecutor),
        };
        let loader: Arc<dyn BitmapLoader> = match self.loader {
            Some(loader) => loader,
            None => Arc::new(UrlBitmapLoader::new(self.config.request_timeout_secs)?),
        };
        let runtime = match (self.runtime, self.without_runtime) {
            (Some(runtime), _) => Some(runtime),
            (None, true) => None,
            (None, false) => Some(
                Box::new(NativeRuntime::new(self.config.segmentation.clone()))
                    as Box<dyn VisionRuntime>,
            ),
        };

        let notices = Notices::new(
            self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
            self.localizer.unwrap_or_else(|| Arc::new(FallbackLocalizer)),
        );
        let initial = CutoutParameters::new(
            i64::from(self.config.default_range),
            i64::from(self.config.default_iterations),
        );

        let id = format!("{}:{}", MODULE_TYPE, uuid::Uuid::new_v4());
        debug!(module = %id, parent = mask_layer.id(), "Creating module");

        Ok(BooleanCutout {
            id,
            acquisition: ImageAcquisition::new(
                Arc::clone(&mask_layer),
                Arc::clone(&store),
                compositor,
                notices.clone(),
            ),
            mask_layer,
            store,
            loader,
            remote: BooleanOpClient::new(executor),
            runtime: runtime.map(tokio::sync::Mutex::new),
            notices,
            state: Mutex::new(State {
                params: initial,
                last_result: None,
                is_processing: false,
                run_id: 0,
                cancel: CancellationToken::new(),
            }),
            observers: Mutex::new(Observers::default()),
        })
    }
}
