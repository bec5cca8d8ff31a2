// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! AR session state machine.
//!
//! ```text
//!   Idle ──run──▶ Running ◀──run── Paused
//!                    └────pause────▶
//!   any ──native failure──▶ Failed      (terminal)
//!   any ──dispose──▶ Disposed           (terminal)
//! ```
//!
//! A [`Session`] owns exactly one native session handle and releases it
//! exactly once, on [`Session::dispose`] or on drop. Native callbacks arrive
//! on runtime threads through the trampolines in [`trampoline`]; they only
//! wrap handles and enqueue work on the session's [`CallbackQueue`]. All
//! session state changes driven by native events happen when the queue is
//! drained.
//!
//! # Lock order
//!
//! `core` is taken before any event list. Subscriber snapshots are taken
//! under `core`; subscribers are invoked after it is released, so they may
//! call back into the session.

mod callbacks;
mod trampoline;

use crate::anchor::Anchor;
use crate::cache::AnchorCache;
use crate::config::{
    ArConfiguration, FrameDisposalPolicy, LiveSettings, RunOptions, SessionConfig,
};
use crate::error::{ArError, Error, Result};
use crate::events::{
    emit_to, AnchorsChanged, AnchorsMerged, FrameUpdated, Handler, MapsChanged, MeshUpdated,
    RelocalizationQuery, SessionDeinitialized, SessionEvents, SessionFailed, SessionInterrupted,
    SessionInterruptionEnded, SessionPaused, SessionRan, SubscriptionId, TrackingStateChanged,
};
use crate::frame::{Frame, FrameMailbox};
use crate::generators::DepthPointCloudGenerator;
use crate::location::{LocationAttachment, LocationContext, LocationService};
use crate::map::Map;
use crate::mesh::MeshState;
use crate::native::{
    AwarenessReport, CallbackKind, ContextId, NativeHandle, NativeObjectKind, NativeRuntime,
    Transform,
};
use crate::queue::{CallbackQueue, Dispatcher};
use crate::registry::{ContextTable, HandleOwner};
use crate::telemetry::{self, EnabledCapabilitiesEvent, LogTelemetry, TelemetrySink};
use crate::validation::{CapabilityValidator, ConfigurationValidator};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};
use std::time::Duration;
use uuid::Uuid;

/// Callbacks registered when the session is created. Every other kind is
/// registered on first subscription.
const INIT_CALLBACKS: [CallbackKind; 7] = [
    CallbackKind::FrameUpdated,
    CallbackKind::MeshUpdated,
    CallbackKind::AnchorsAdded,
    CallbackKind::AnchorsUpdated,
    CallbackKind::AnchorsRemoved,
    CallbackKind::AnchorsMerged,
    CallbackKind::Failed,
];

/// Sessions reachable from native callbacks, keyed by callback context.
pub(crate) fn sessions() -> &'static ContextTable<SessionShared> {
    static SESSIONS: OnceLock<ContextTable<SessionShared>> = OnceLock::new();
    SESSIONS.get_or_init(ContextTable::new)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Running,
    Paused,
    Failed,
    Disposed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Idle => "Idle",
            SessionState::Running => "Running",
            SessionState::Paused => "Paused",
            SessionState::Failed => "Failed",
            SessionState::Disposed => "Disposed",
        };
        f.write_str(s)
    }
}

// =======================================================================
// Builder
// =======================================================================

pub struct SessionBuilder {
    runtime: Arc<dyn NativeRuntime>,
    stage: Option<Uuid>,
    config: SessionConfig,
    queue: Option<CallbackQueue>,
    validator: Arc<dyn ConfigurationValidator>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl SessionBuilder {
    pub fn new(runtime: Arc<dyn NativeRuntime>) -> Self {
        Self {
            runtime,
            stage: None,
            config: SessionConfig::default(),
            queue: None,
            validator: Arc::new(CapabilityValidator),
            telemetry: Arc::new(LogTelemetry),
        }
    }

    /// Stage identifier; a random v4 UUID when unset.
    pub fn stage_identifier(mut self, stage: Uuid) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a callback queue with other sessions (one consumer for all).
    pub fn callback_queue(mut self, queue: CallbackQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn validator<V: ConfigurationValidator + 'static>(mut self, validator: V) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn telemetry<T: TelemetrySink + 'static>(mut self, telemetry: T) -> Self {
        self.telemetry = Arc::new(telemetry);
        self
    }

    pub fn build(self) -> Result<Session> {
        let stage = self.stage.unwrap_or_else(Uuid::new_v4);
        let playback = self.config.playback;

        log::debug!(
            "[session] Creating {} session with stage identifier {}",
            if playback { "playback" } else { "live" },
            stage
        );

        let native = self.runtime.init_session(stage, playback);
        if native.is_null() {
            log::error!("[session] Native session creation failed for stage {}", stage);
            return Err(Error::NotInitialized);
        }

        let context = ContextId::next();
        let owns_queue = self.queue.is_none();
        let shared = Arc::new(SessionShared {
            stage,
            context,
            playback,
            runtime: self.runtime,
            queue: self.queue.unwrap_or_default(),
            owns_queue,
            native: AtomicU64::new(native.raw()),
            disposing: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            mailbox: FrameMailbox::default(),
            core: Mutex::new(SessionCore::new()),
            events: SessionEvents::new(),
            registered: AtomicU32::new(0),
            settings: LiveSettings::new(1.0, self.config.frame_disposal),
            validator: self.validator,
            telemetry: self.telemetry,
            dispatch_idle: self.config.dispatch_idle,
            owner_thread: self
                .config
                .enforce_thread_affinity
                .then(|| thread::current().id()),
        });
        shared.settings.set_world_scale(self.config.world_scale);

        sessions().insert(context, Arc::clone(&shared));
        for kind in INIT_CALLBACKS {
            shared.ensure_callback(kind);
        }

        log::debug!(
            "[session] Created session {} (handle {}, context {})",
            stage,
            native,
            context.raw()
        );
        Ok(Session { shared })
    }
}

// =======================================================================
// Shared State
// =======================================================================

/// Consumer-side state, guarded by `SessionShared::core`.
pub(crate) struct SessionCore {
    state: SessionState,
    failure: Option<ArError>,
    configuration: Option<ArConfiguration>,
    run_options: RunOptions,
    current_frame: Option<Arc<Frame>>,
    anchors: AnchorCache,
    depth_generator: Option<DepthPointCloudGenerator>,
    mesh: MeshState,
    location: Option<LocationAttachment>,
}

impl SessionCore {
    fn new() -> Self {
        Self {
            state: SessionState::Idle,
            failure: None,
            configuration: None,
            run_options: RunOptions::NONE,
            current_frame: None,
            anchors: AnchorCache::new(),
            depth_generator: None,
            mesh: MeshState::new(),
            location: None,
        }
    }

    /// Swap the current frame, applying the disposal policy to the old one.
    fn replace_current_frame(&mut self, frame: Option<Arc<Frame>>, policy: FrameDisposalPolicy) {
        let previous = std::mem::replace(&mut self.current_frame, frame);
        if let Some(previous) = previous {
            if policy == FrameDisposalPolicy::DisposeOldFrames {
                previous.dispose();
            }
        }
    }

    fn dispose_generators(&mut self) {
        if let Some(mut generator) = self.depth_generator.take() {
            generator.dispose();
            log::debug!("[session] Disposed depth point cloud generator");
        }
    }

    fn update_generators(&mut self, frame: &Frame) {
        let Some(configuration) = &self.configuration else {
            return;
        };
        if !configuration.wants_depth_point_cloud() {
            return;
        }
        let Some(depth) = frame.depth() else {
            return;
        };
        if !depth.is_keyframe {
            return;
        }

        let generator = self.depth_generator.get_or_insert_with(|| {
            log::debug!("[session] Created depth point cloud generator");
            DepthPointCloudGenerator::default()
        });
        if let Some(cloud) = generator.generate(depth, &frame.camera().transform) {
            log::trace!("[session] Depth point cloud updated ({} points)", cloud.len());
            frame.set_depth_point_cloud(Arc::new(cloud));
        }
    }

    fn failed_error(&self) -> Option<Error> {
        (self.state == SessionState::Failed)
            .then(|| Error::SessionFailed(self.failure.unwrap_or(ArError::Unknown)))
    }
}

pub(crate) struct SessionShared {
    stage: Uuid,
    context: ContextId,
    playback: bool,
    runtime: Arc<dyn NativeRuntime>,
    queue: CallbackQueue,
    /// False when the queue came from [`SessionBuilder::callback_queue`].
    owns_queue: bool,
    native: AtomicU64,
    /// Set when dispose starts; public operations are refused from here on.
    disposing: AtomicBool,
    /// Set under `core` once teardown begins; queued work only cleans up.
    destroyed: AtomicBool,
    mailbox: FrameMailbox,
    core: Mutex<SessionCore>,
    events: SessionEvents,
    registered: AtomicU32,
    settings: LiveSettings,
    validator: Arc<dyn ConfigurationValidator>,
    telemetry: Arc<dyn TelemetrySink>,
    dispatch_idle: Duration,
    owner_thread: Option<ThreadId>,
}

impl SessionShared {
    #[inline]
    fn native_handle(&self) -> NativeHandle {
        NativeHandle::from_raw(self.native.load(Ordering::Acquire))
    }

    #[inline]
    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn check_thread(&self, operation: &str) {
        if let Some(owner) = self.owner_thread {
            if owner != thread::current().id() {
                log::error!(
                    "[session] {} called from {:?}, session belongs to {:?}",
                    operation,
                    thread::current().id(),
                    owner
                );
            }
        }
    }

    /// Native handle for a public operation, or the precondition error.
    fn live_native(&self, operation: &str) -> Result<NativeHandle> {
        if self.disposing.load(Ordering::Acquire) {
            log::debug!("[session] Session was freed before {}", operation);
            return Err(Error::SessionDisposed);
        }
        let native = self.native_handle();
        if native.is_null() {
            log::debug!("[session] No native session for {}", operation);
            return Err(Error::NotInitialized);
        }
        Ok(native)
    }

    /// Register the trampoline for `kind` once.
    fn ensure_callback(&self, kind: CallbackKind) {
        let bit = kind.bit();
        if self.registered.fetch_or(bit, Ordering::AcqRel) & bit != 0 {
            return;
        }
        let native = self.native_handle();
        if native.is_null() {
            return;
        }
        self.runtime
            .set_callback(native, self.context, trampoline::callback_for(kind));
        log::debug!("[session] Subscribed to native {:?}", kind);
    }

    fn dispose(&self) {
        if self.disposing.swap(true, Ordering::AcqRel) {
            log::trace!("[session] {} already disposed", self.stage);
            return;
        }
        log::debug!("[session] Disposing session {}", self.stage);

        self.events.deinitialized.emit(&SessionDeinitialized);

        let (generator, mut anchors, frame, location) = {
            let mut core = self.core.lock();
            self.destroyed.store(true, Ordering::Release);
            core.state = SessionState::Disposed;
            core.mesh.clear();
            (
                core.depth_generator.take(),
                std::mem::take(&mut core.anchors),
                core.current_frame.take(),
                core.location.take(),
            )
        };

        if let Some(mut generator) = generator {
            generator.dispose();
        }
        let disposed = anchors.dispose_all();
        if let Some(frame) = frame {
            frame.dispose();
        }
        if let Some(location) = location {
            location.detach();
        }
        Anchor::purge_session(self.context);
        Map::purge_session(self.context);

        let native = NativeHandle::from_raw(self.native.swap(0, Ordering::AcqRel));
        if !native.is_null() {
            self.runtime.release_session(native);
        }
        sessions().retire(self.context, &self.runtime);

        // Queued tasks see `destroyed` and only release their payloads.
        // A shared queue is left to its own consumer.
        let discarded = if self.owns_queue { self.queue.drain() } else { 0 };

        log::debug!(
            "[session] Released session {} ({} cached anchor(s) disposed, {} queued task(s) discarded)",
            self.stage,
            disposed,
            discarded
        );
    }
}

impl HandleOwner for SessionShared {
    fn context_id(&self) -> ContextId {
        self.context
    }

    fn is_live(&self) -> bool {
        !self.is_destroyed()
    }

    fn runtime(&self) -> &Arc<dyn NativeRuntime> {
        &self.runtime
    }
}

impl Drop for SessionShared {
    fn drop(&mut self) {
        // A frame offered after the last drain task ran.
        if let Some(frame) = self.mailbox.take() {
            self.runtime.release(NativeObjectKind::Frame, frame);
        }
    }
}

// =======================================================================
// Session
// =======================================================================

/// Handle to one native AR session.
///
/// Dropping the session disposes it.
pub struct Session {
    shared: Arc<SessionShared>,
}

impl Session {
    pub fn builder(runtime: Arc<dyn NativeRuntime>) -> SessionBuilder {
        SessionBuilder::new(runtime)
    }

    /// Live session with default settings.
    pub fn new(runtime: Arc<dyn NativeRuntime>) -> Result<Self> {
        SessionBuilder::new(runtime).build()
    }

    // ===================================================================
    // Accessors
    // ===================================================================

    pub fn stage_identifier(&self) -> Uuid {
        self.shared.stage
    }

    pub fn state(&self) -> SessionState {
        self.shared.core.lock().state
    }

    /// Error code of the native failure, once Failed.
    pub fn failure(&self) -> Option<ArError> {
        self.shared.core.lock().failure
    }

    pub fn configuration(&self) -> Option<ArConfiguration> {
        self.shared.core.lock().configuration.clone()
    }

    pub fn run_options(&self) -> RunOptions {
        self.shared.core.lock().run_options
    }

    pub fn current_frame(&self) -> Option<Arc<Frame>> {
        self.shared.core.lock().current_frame.clone()
    }

    pub fn is_playback(&self) -> bool {
        self.shared.playback
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposing.load(Ordering::Acquire)
    }

    /// Current native handle (null after disposal).
    pub fn native_handle(&self) -> NativeHandle {
        self.shared.native_handle()
    }

    pub fn context_id(&self) -> ContextId {
        self.shared.context
    }

    pub fn callback_queue(&self) -> &CallbackQueue {
        &self.shared.queue
    }

    /// Drain this session's callback queue on the calling thread.
    pub fn drain_callbacks(&self) -> usize {
        self.shared.queue.drain()
    }

    /// Drain this session's queue on a background thread instead.
    pub fn spawn_dispatcher(&self) -> Result<Dispatcher> {
        Dispatcher::spawn(self.shared.queue.clone(), self.shared.dispatch_idle)
    }

    pub fn world_scale(&self) -> f32 {
        self.shared.settings.load().world_scale
    }

    pub fn set_world_scale(&self, scale: f32) {
        self.shared.settings.set_world_scale(scale);
    }

    pub fn frame_disposal_policy(&self) -> FrameDisposalPolicy {
        self.shared.settings.load().frame_disposal
    }

    pub fn set_frame_disposal_policy(&self, policy: FrameDisposalPolicy) {
        self.shared.settings.set_frame_disposal(policy);
    }

    pub fn anchor(&self, identifier: &Uuid) -> Option<Arc<Anchor>> {
        self.shared.core.lock().anchors.get(identifier)
    }

    pub fn anchors(&self) -> Vec<Arc<Anchor>> {
        let core = self.shared.core.lock();
        core.anchors
            .identifiers()
            .iter()
            .filter_map(|id| core.anchors.get(id))
            .collect()
    }

    /// Read the accumulated mesh.
    pub fn with_mesh<R>(&self, f: impl FnOnce(&MeshState) -> R) -> R {
        f(&self.shared.core.lock().mesh)
    }

    // ===================================================================
    // Operations
    // ===================================================================

    /// Validate `configuration` and run the native session.
    ///
    /// A refused configuration leaves the session untouched.
    pub fn run(&self, configuration: ArConfiguration, options: RunOptions) -> Result<()> {
        let shared = &self.shared;
        shared.check_thread("run");
        let native = shared.live_native("run")?;

        if let Some(err) = shared.core.lock().failed_error() {
            log::debug!("[session] Refusing run on failed session {}", shared.stage);
            return Err(err);
        }

        let capabilities = shared.runtime.capabilities();
        if let Err(reason) = shared.validator.validate(&configuration, &capabilities) {
            log::error!(
                "[session] Configuration validation failed, not running session: {}",
                reason
            );
            return Err(Error::ValidationFailed(reason));
        }

        let event = EnabledCapabilitiesEvent::from_configuration(shared.stage, &configuration);

        let handlers = {
            let mut core = shared.core.lock();
            if shared.is_destroyed() {
                return Err(Error::SessionDisposed);
            }
            if let Some(err) = core.failed_error() {
                return Err(err);
            }

            core.dispose_generators();
            if options.contains(RunOptions::REMOVE_EXISTING_MESH) {
                core.mesh.clear();
            }

            log::debug!(
                "[session] Running session {} with options 0x{:x}",
                shared.stage,
                options.bits()
            );
            shared.runtime.run(native, &configuration, options);

            core.configuration = Some(configuration);
            core.run_options = options;
            core.state = SessionState::Running;
            shared.events.ran.snapshot()
        };

        telemetry::record_quietly(shared.telemetry.as_ref(), &event);
        emit_to("ran", &handlers, &SessionRan);
        Ok(())
    }

    /// Pause the native session and drop the current frame.
    pub fn pause(&self) -> Result<()> {
        let shared = &self.shared;
        shared.check_thread("pause");
        let native = shared.live_native("pause")?;

        let handlers = {
            let mut core = shared.core.lock();
            if shared.is_destroyed() {
                return Err(Error::SessionDisposed);
            }
            if let Some(err) = core.failed_error() {
                return Err(err);
            }

            let policy = shared.settings.load().frame_disposal;
            core.replace_current_frame(None, policy);

            shared.runtime.pause(native);
            log::debug!("[session] Paused session {}", shared.stage);

            core.state = SessionState::Paused;
            shared.events.paused.snapshot()
        };

        emit_to("paused", &handlers, &SessionPaused);
        Ok(())
    }

    /// Create a native anchor at `transform` and add it to the session.
    pub fn add_anchor(&self, transform: &Transform) -> Result<Arc<Anchor>> {
        let shared = &self.shared;
        shared.check_thread("add_anchor");
        let native = shared.live_native("add_anchor")?;

        let handle = shared.runtime.create_anchor(transform);
        if handle.is_null() {
            log::debug!("[session] Anchor creation failed, did not add native anchor");
            return Err(Error::AnchorCreationFailed);
        }
        let anchor = Anchor::from_handle(&**shared, handle).ok_or(Error::AnchorCreationFailed)?;

        shared.runtime.add_anchor(native, anchor.handle());

        let mut core = shared.core.lock();
        if shared.is_destroyed() {
            drop(core);
            anchor.dispose();
            return Err(Error::SessionDisposed);
        }
        core.anchors.insert(&anchor);
        log::debug!("[session] Added native anchor {}", anchor.identifier());
        Ok(anchor)
    }

    /// Ask the native layer to remove `anchor`.
    ///
    /// The cache is updated when the native removal callback is drained.
    pub fn remove_anchor(&self, anchor: &Anchor) -> Result<()> {
        let shared = &self.shared;
        shared.check_thread("remove_anchor");
        let native = shared.live_native("remove_anchor")?;

        if anchor.is_disposed() {
            log::debug!(
                "[session] Anchor {} already disposed, not removing",
                anchor.identifier()
            );
            return Err(Error::InvalidHandle);
        }

        log::debug!("[session] Removing native anchor {}", anchor.identifier());
        shared.runtime.remove_anchor(native, anchor.handle());
        Ok(())
    }

    /// Attach a location service. A second attachment is refused.
    pub fn setup_location_service(&self, service: Arc<dyn LocationService>) -> Result<()> {
        let shared = &self.shared;
        shared.check_thread("setup_location_service");
        let native = shared.live_native("setup_location_service")?;

        let mut core = shared.core.lock();
        if core.location.is_some() {
            log::error!("[session] This session is already listening to a location service");
            return Err(Error::LocationServiceAlreadyAttached);
        }

        if shared.playback {
            // Playback feeds recorded locations natively.
            core.location = Some(LocationAttachment::Playback);
            return Ok(());
        }

        service.attach(LocationContext {
            stage: shared.stage,
            session: native,
        });
        core.location = Some(LocationAttachment::Live(service));
        log::debug!("[session] Location service attached to {}", shared.stage);
        Ok(())
    }

    pub fn is_location_service_initialized(&self) -> bool {
        self.shared.core.lock().location.is_some()
    }

    pub fn awareness_status(&self) -> Result<AwarenessReport> {
        self.shared.check_thread("awareness_status");
        let native = self.shared.live_native("awareness_status")?;
        Ok(self.shared.runtime.awareness_status(native))
    }

    /// Dispose the session. Idempotent.
    ///
    /// Order: deinitialized event, generators, cached anchors, current
    /// frame, native session, callback context.
    pub fn dispose(&self) {
        self.shared.check_thread("dispose");
        self.shared.dispose();
    }

    // ===================================================================
    // Subscriptions
    // ===================================================================

    /// Subscribe to `ran`. Invoked immediately if already Running.
    pub fn on_ran<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SessionRan) + Send + Sync + 'static,
    {
        self.shared.check_thread("on_ran");
        let handler: Handler<SessionRan> = Arc::new(handler);
        let (id, replay) = {
            let core = self.shared.core.lock();
            let id = self.shared.events.ran.subscribe_handler(Arc::clone(&handler));
            (id, core.state == SessionState::Running)
        };
        if replay {
            emit_to("ran", &[handler], &SessionRan);
        }
        id
    }

    /// Subscribe to `paused`. Invoked immediately if already Paused.
    pub fn on_paused<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SessionPaused) + Send + Sync + 'static,
    {
        self.shared.check_thread("on_paused");
        let handler: Handler<SessionPaused> = Arc::new(handler);
        let (id, replay) = {
            let core = self.shared.core.lock();
            let id = self.shared.events.paused.subscribe_handler(Arc::clone(&handler));
            (id, core.state == SessionState::Paused)
        };
        if replay {
            emit_to("paused", &[handler], &SessionPaused);
        }
        id
    }

    pub fn on_failed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SessionFailed) + Send + Sync + 'static,
    {
        self.shared.check_thread("on_failed");
        self.shared.ensure_callback(CallbackKind::Failed);
        self.shared.events.failed.subscribe(handler)
    }

    pub fn on_deinitialized<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SessionDeinitialized) + Send + Sync + 'static,
    {
        self.shared.events.deinitialized.subscribe(handler)
    }

    pub fn on_frame_updated<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&FrameUpdated) + Send + Sync + 'static,
    {
        self.shared.check_thread("on_frame_updated");
        self.shared.ensure_callback(CallbackKind::FrameUpdated);
        self.shared.events.frame_updated.subscribe(handler)
    }

    pub fn on_mesh_updated<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&MeshUpdated) + Send + Sync + 'static,
    {
        self.shared.ensure_callback(CallbackKind::MeshUpdated);
        self.shared.events.mesh_updated.subscribe(handler)
    }

    pub fn on_anchors_added<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&AnchorsChanged) + Send + Sync + 'static,
    {
        self.shared.check_thread("on_anchors_added");
        self.shared.ensure_callback(CallbackKind::AnchorsAdded);
        self.shared.events.anchors_added.subscribe(handler)
    }

    pub fn on_anchors_updated<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&AnchorsChanged) + Send + Sync + 'static,
    {
        self.shared.check_thread("on_anchors_updated");
        self.shared.ensure_callback(CallbackKind::AnchorsUpdated);
        self.shared.events.anchors_updated.subscribe(handler)
    }

    pub fn on_anchors_removed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&AnchorsChanged) + Send + Sync + 'static,
    {
        self.shared.check_thread("on_anchors_removed");
        self.shared.ensure_callback(CallbackKind::AnchorsRemoved);
        self.shared.events.anchors_removed.subscribe(handler)
    }

    pub fn on_anchors_merged<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&AnchorsMerged) + Send + Sync + 'static,
    {
        self.shared.check_thread("on_anchors_merged");
        self.shared.ensure_callback(CallbackKind::AnchorsMerged);
        self.shared.events.anchors_merged.subscribe(handler)
    }

    pub fn on_maps_added<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&MapsChanged) + Send + Sync + 'static,
    {
        self.shared.check_thread("on_maps_added");
        self.shared.ensure_callback(CallbackKind::MapsAdded);
        self.shared.events.maps_added.subscribe(handler)
    }

    pub fn on_maps_updated<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&MapsChanged) + Send + Sync + 'static,
    {
        self.shared.check_thread("on_maps_updated");
        self.shared.ensure_callback(CallbackKind::MapsUpdated);
        self.shared.events.maps_updated.subscribe(handler)
    }

    pub fn on_tracking_state_changed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&TrackingStateChanged) + Send + Sync + 'static,
    {
        self.shared.check_thread("on_tracking_state_changed");
        self.shared.ensure_callback(CallbackKind::TrackingStateChanged);
        self.shared.events.tracking_state_changed.subscribe(handler)
    }

    pub fn on_interrupted<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SessionInterrupted) + Send + Sync + 'static,
    {
        self.shared.check_thread("on_interrupted");
        self.shared.ensure_callback(CallbackKind::Interrupted);
        self.shared.events.interrupted.subscribe(handler)
    }

    pub fn on_interruption_ended<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SessionInterruptionEnded) + Send + Sync + 'static,
    {
        self.shared.check_thread("on_interruption_ended");
        self.shared.ensure_callback(CallbackKind::InterruptionEnded);
        self.shared.events.interruption_ended.subscribe(handler)
    }

    /// Answer the native "should relocalize?" query.
    ///
    /// Runs synchronously on the native thread that asks, not on the queue.
    pub fn on_relocalization_query<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&mut RelocalizationQuery) + Send + Sync + 'static,
    {
        self.shared.check_thread("on_relocalization_query");
        self.shared.ensure_callback(CallbackKind::RelocalizationQuery);
        self.shared.events.relocalization.subscribe(handler)
    }

    /// Remove a subscription made on this session.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let events = &self.shared.events;
        events.ran.unsubscribe(id)
            || events.paused.unsubscribe(id)
            || events.failed.unsubscribe(id)
            || events.deinitialized.unsubscribe(id)
            || events.frame_updated.unsubscribe(id)
            || events.mesh_updated.unsubscribe(id)
            || events.anchors_added.unsubscribe(id)
            || events.anchors_updated.unsubscribe(id)
            || events.anchors_removed.unsubscribe(id)
            || events.anchors_merged.unsubscribe(id)
            || events.maps_added.unsubscribe(id)
            || events.maps_updated.unsubscribe(id)
            || events.tracking_state_changed.unsubscribe(id)
            || events.interrupted.unsubscribe(id)
            || events.interruption_ended.unsubscribe(id)
            || events.relocalization.unsubscribe(id)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.dispose();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("stage", &self.shared.stage)
            .field("native", &self.shared.native_handle())
            .field("playback", &self.shared.playback)
            .finish()
    }
}
