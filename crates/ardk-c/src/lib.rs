// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # ARDK C FFI Bindings
//!
//! C-compatible bindings for the ARDK session bridge. The host supplies the
//! native AR runtime as a function table (`ArdkNativeRuntime`), creates
//! sessions over it, and drains queued callbacks once per frame.
//!
//! # Safety
//!
//! All public functions are `unsafe` and require the caller to uphold the
//! invariants documented in each function's safety comment.

mod listener;
mod location;
mod logging;
mod runtime;

pub use listener::*;
pub use location::*;
pub use logging::*;
pub use runtime::{
    ArdkAnchorInfo, ArdkAwarenessInfo, ArdkCameraInfo, ArdkCapabilities, ArdkConfiguration,
    ArdkFrameInfo, ArdkIntrinsics, ArdkMapInfo, ArdkMergeBatch, ArdkMergeInfo, ArdkMeshBlock,
    ArdkNativeRuntime, ArdkTransform, ArdkUuid,
};

use std::os::raw::{c_char, c_void};
use std::ptr;
use std::sync::{Arc, Mutex};

use ardk::config::{FrameDisposalPolicy, RunOptions, SessionConfig};
use ardk::native::{AwarenessStatus, NativeRuntime};
use ardk::{Error, Session, SessionState, SubscriptionId, Uuid};
use runtime::ForeignRuntime;

/// Opaque handle to a native runtime function table
#[repr(C)]
pub struct ArdkRuntime {
    _private: [u8; 0],
}

/// Opaque handle to a Session
#[repr(C)]
pub struct ArdkSession {
    _private: [u8; 0],
}

/// Error codes for ARDK C API
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArdkError {
    /// Operation completed successfully
    ArdkOk = 0,
    /// Invalid argument provided (null pointer, invalid value)
    ArdkInvalidArgument = 1,
    /// Requested resource not found
    ArdkNotFound = 2,
    /// Generic operation failure
    ArdkOperationFailed = 3,
    /// Memory allocation failed
    ArdkOutOfMemory = 4,

    // === Session state errors (10-19) ===
    /// Session was already disposed
    ArdkSessionDisposed = 10,
    /// Native session handle was never created
    ArdkNotInitialized = 11,
    /// Session is in the terminal Failed state
    ArdkSessionFailed = 12,

    // === Request errors (20-29) ===
    /// Configuration rejected before reaching the native layer
    ArdkValidationFailed = 20,
    /// A location service is already attached
    ArdkLocationAlreadyAttached = 21,
    /// Native layer could not create an anchor
    ArdkAnchorCreationFailed = 22,
    /// Null, unknown or disposed native handle
    ArdkInvalidHandle = 23,
}

impl From<&Error> for ArdkError {
    fn from(err: &Error) -> Self {
        match err {
            Error::SessionDisposed => ArdkError::ArdkSessionDisposed,
            Error::NotInitialized => ArdkError::ArdkNotInitialized,
            Error::SessionFailed(_) => ArdkError::ArdkSessionFailed,
            Error::ValidationFailed(_) => ArdkError::ArdkValidationFailed,
            Error::LocationServiceAlreadyAttached => ArdkError::ArdkLocationAlreadyAttached,
            Error::AnchorCreationFailed => ArdkError::ArdkAnchorCreationFailed,
            Error::InvalidHandle => ArdkError::ArdkInvalidHandle,
            Error::DispatcherPanicked | Error::Native(_) => ArdkError::ArdkOperationFailed,
        }
    }
}

fn to_ardk(result: ardk::Result<()>, op: &str) -> ArdkError {
    match result {
        Ok(()) => ArdkError::ArdkOk,
        Err(e) => {
            log::debug!("[ffi] {} failed: {}", op, e);
            ArdkError::from(&e)
        }
    }
}

/// Session lifecycle state
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArdkSessionState {
    ArdkStateIdle = 0,
    ArdkStateRunning = 1,
    ArdkStatePaused = 2,
    ArdkStateFailed = 3,
    ArdkStateDisposed = 4,
}

impl From<SessionState> for ArdkSessionState {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Idle => ArdkSessionState::ArdkStateIdle,
            SessionState::Running => ArdkSessionState::ArdkStateRunning,
            SessionState::Paused => ArdkSessionState::ArdkStatePaused,
            SessionState::Failed => ArdkSessionState::ArdkStateFailed,
            SessionState::Disposed => ArdkSessionState::ArdkStateDisposed,
        }
    }
}

/// Callback kinds passed to `ArdkNativeRuntime::set_callback`, with the
/// signature of the function pointer registered for each:
///
/// | Kind | Signature |
/// |------|-----------|
/// | frame, mesh, tracking state | `void (*)(void* ctx, uint64_t handle)` |
/// | anchors added/updated/removed, maps added/updated | `void (*)(void* ctx, const uint64_t* handles, uint64_t count)` |
/// | anchors merged | `void (*)(void* ctx, const ArdkMergeBatch* batch)` |
/// | interrupted, interruption ended | `void (*)(void* ctx)` |
/// | relocalization query | `bool (*)(void* ctx)` |
/// | failed | `void (*)(void* ctx, uint64_t code)` |
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArdkCallbackKind {
    ArdkCallbackFrameUpdated = 0,
    ArdkCallbackMeshUpdated = 1,
    ArdkCallbackAnchorsAdded = 2,
    ArdkCallbackAnchorsUpdated = 3,
    ArdkCallbackAnchorsRemoved = 4,
    ArdkCallbackAnchorsMerged = 5,
    ArdkCallbackMapsAdded = 6,
    ArdkCallbackMapsUpdated = 7,
    ArdkCallbackTrackingStateChanged = 8,
    ArdkCallbackInterrupted = 9,
    ArdkCallbackInterruptionEnded = 10,
    ArdkCallbackRelocalizationQuery = 11,
    ArdkCallbackFailed = 12,
}

/// Frame disposal policy
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArdkFrameDisposal {
    /// Release a frame as soon as it stops being current
    ArdkDisposeOldFrames = 0,
    /// Keep replaced frames alive while the host still holds them
    ArdkReturnOldFrames = 1,
}

// =============================================================================
// Handle plumbing
// =============================================================================

/// What an `ArdkSession` pointer refers to.
pub(crate) struct FfiSession {
    pub(crate) session: Session,
    listener_ids: Mutex<Vec<SubscriptionId>>,
}

impl FfiSession {
    fn new(session: Session) -> Self {
        Self {
            session,
            listener_ids: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn clear_listener(&self) {
        let ids = std::mem::take(&mut *self.listener_ids.lock().unwrap_or_else(|e| e.into_inner()));
        for id in ids {
            self.session.unsubscribe(id);
        }
    }

    pub(crate) fn set_listener_ids(&self, ids: Vec<SubscriptionId>) {
        *self.listener_ids.lock().unwrap_or_else(|e| e.into_inner()) = ids;
    }
}

/// # Safety
/// `session` must be NULL or a live pointer from `ardk_session_create`.
pub(crate) unsafe fn session_ref<'a>(session: *mut ArdkSession) -> Option<&'a FfiSession> {
    session.cast::<FfiSession>().as_ref()
}

unsafe fn runtime_ref<'a>(runtime: *mut ArdkRuntime) -> Option<&'a Arc<dyn NativeRuntime>> {
    runtime.cast::<Arc<dyn NativeRuntime>>().as_ref()
}

// =============================================================================
// Runtime
// =============================================================================

/// Wrap a native runtime function table.
///
/// The table is copied. Its entries and `user_data` may be invoked from any
/// thread, including native callback threads, and must stay valid until the
/// runtime and every session created from it are destroyed.
///
/// # Safety
/// - `vtable` must be a valid pointer to an initialized `ArdkNativeRuntime`.
/// - The returned handle must be released with `ardk_runtime_destroy`.
///
/// # Returns
/// Opaque runtime handle, or NULL if `vtable` is NULL or a required entry
/// is missing.
#[no_mangle]
pub unsafe extern "C" fn ardk_runtime_create(vtable: *const ArdkNativeRuntime) -> *mut ArdkRuntime {
    if vtable.is_null() {
        return ptr::null_mut();
    }
    let vtable = *vtable;

    let missing = vtable.missing_entries();
    if !missing.is_empty() {
        log::error!(
            "[ffi] Native runtime table is missing required entries: {}",
            missing.join(", ")
        );
        return ptr::null_mut();
    }

    let runtime: Arc<dyn NativeRuntime> = Arc::new(ForeignRuntime::new(vtable));
    Box::into_raw(Box::new(runtime)).cast::<ArdkRuntime>()
}

/// Destroy a runtime handle.
///
/// Sessions already created keep their own reference to the table.
///
/// # Safety
/// - `runtime` must be a valid handle from `ardk_runtime_create`, or NULL (no-op).
/// - Must not be called more than once with the same pointer.
#[no_mangle]
pub unsafe extern "C" fn ardk_runtime_destroy(runtime: *mut ArdkRuntime) {
    if !runtime.is_null() {
        let _ = Box::from_raw(runtime.cast::<Arc<dyn NativeRuntime>>());
    }
}

// =============================================================================
// Session lifecycle
// =============================================================================

/// Create a session over `runtime`.
///
/// The calling thread becomes the session thread: every other session call
/// and `ardk_session_drain_callbacks` are expected from it.
///
/// # Safety
/// - `runtime` must be a valid handle from `ardk_runtime_create`.
/// - `stage` must be NULL (a fresh identifier is generated) or point to a valid `ArdkUuid`.
/// - The returned handle must be released with `ardk_session_destroy`.
///
/// # Returns
/// Opaque session handle, or NULL if the native layer could not create one.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_create(
    runtime: *mut ArdkRuntime,
    stage: *const ArdkUuid,
    playback: bool,
) -> *mut ArdkSession {
    let Some(runtime) = runtime_ref(runtime) else {
        return ptr::null_mut();
    };

    let mut builder = Session::builder(Arc::clone(runtime))
        .config(SessionConfig::default().playback(playback));
    if let Some(stage) = stage.as_ref() {
        builder = builder.stage_identifier(Uuid::from(*stage));
    }

    match builder.build() {
        Ok(session) => Box::into_raw(Box::new(FfiSession::new(session))).cast::<ArdkSession>(),
        Err(e) => {
            log::error!("[ffi] Session creation failed: {}", e);
            ptr::null_mut()
        }
    }
}

/// Dispose the session without freeing the handle. Idempotent.
///
/// Queued callbacks that have not been drained release their native objects
/// without notifying the listener.
///
/// # Safety
/// - `session` must be a valid handle from `ardk_session_create`.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_dispose(session: *mut ArdkSession) -> ArdkError {
    let Some(session) = session_ref(session) else {
        return ArdkError::ArdkInvalidArgument;
    };
    session.session.dispose();
    ArdkError::ArdkOk
}

/// Dispose (if needed) and free a session.
///
/// # Safety
/// - `session` must be a valid handle from `ardk_session_create`, or NULL (no-op).
/// - Must not be called more than once with the same pointer.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_destroy(session: *mut ArdkSession) {
    if !session.is_null() {
        let _ = Box::from_raw(session.cast::<FfiSession>());
    }
}

// =============================================================================
// Session operations
// =============================================================================

/// Run (or re-run) the session.
///
/// # Safety
/// - `session` must be a valid handle from `ardk_session_create`.
/// - `configuration` must point to a valid `ArdkConfiguration`.
///
/// # Returns
/// `ArdkOk` on success, `ArdkValidationFailed` if the configuration was
/// rejected (the session state is unchanged), `ArdkSessionDisposed` or
/// `ArdkSessionFailed` when the session can no longer run.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_run(
    session: *mut ArdkSession,
    configuration: *const ArdkConfiguration,
    options: u64,
) -> ArdkError {
    let Some(session) = session_ref(session) else {
        return ArdkError::ArdkInvalidArgument;
    };
    let Some(configuration) = configuration.as_ref() else {
        return ArdkError::ArdkInvalidArgument;
    };

    to_ardk(
        session
            .session
            .run(configuration.into(), RunOptions::from_bits(options)),
        "run",
    )
}

/// Pause the session. The current frame is released.
///
/// # Safety
/// - `session` must be a valid handle from `ardk_session_create`.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_pause(session: *mut ArdkSession) -> ArdkError {
    let Some(session) = session_ref(session) else {
        return ArdkError::ArdkInvalidArgument;
    };
    to_ardk(session.session.pause(), "pause")
}

/// Drain queued native callbacks, invoking listener callbacks in arrival order.
///
/// # Safety
/// - `session` must be a valid handle from `ardk_session_create`.
///
/// # Returns
/// Number of tasks executed (0 if `session` is NULL).
#[no_mangle]
pub unsafe extern "C" fn ardk_session_drain_callbacks(session: *mut ArdkSession) -> usize {
    match session_ref(session) {
        Some(session) => session.session.drain_callbacks(),
        None => 0,
    }
}

/// Current lifecycle state.
///
/// # Safety
/// - `session` must be a valid handle from `ardk_session_create`.
///
/// # Returns
/// The session state; `ArdkStateDisposed` for a NULL handle.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_state(session: *mut ArdkSession) -> ArdkSessionState {
    match session_ref(session) {
        Some(session) => session.session.state().into(),
        None => ArdkSessionState::ArdkStateDisposed,
    }
}

/// Native failure code of a failed session.
///
/// # Safety
/// - `session` must be a valid handle from `ardk_session_create`.
/// - `out_code` must be a valid pointer.
///
/// # Returns
/// `ArdkOk` with `*out_code` set if the session failed, `ArdkNotFound` otherwise.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_failure(
    session: *mut ArdkSession,
    out_code: *mut u64,
) -> ArdkError {
    let Some(session) = session_ref(session) else {
        return ArdkError::ArdkInvalidArgument;
    };
    if out_code.is_null() {
        return ArdkError::ArdkInvalidArgument;
    }
    match session.session.failure() {
        Some(err) => {
            *out_code = err.code();
            ArdkError::ArdkOk
        }
        None => ArdkError::ArdkNotFound,
    }
}

/// Stage identifier the session was created with.
///
/// # Safety
/// - `session` must be a valid handle from `ardk_session_create`.
/// - `out_id` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_stage_identifier(
    session: *mut ArdkSession,
    out_id: *mut ArdkUuid,
) -> ArdkError {
    let Some(session) = session_ref(session) else {
        return ArdkError::ArdkInvalidArgument;
    };
    if out_id.is_null() {
        return ArdkError::ArdkInvalidArgument;
    }
    *out_id = session.session.stage_identifier().into();
    ArdkError::ArdkOk
}

/// Native session handle (0 once disposed).
///
/// # Safety
/// - `session` must be a valid handle from `ardk_session_create`.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_native_handle(session: *mut ArdkSession) -> u64 {
    session_ref(session).map_or(0, |s| s.session.native_handle().raw())
}

/// Set the world scale applied to frames, maps and cameras wrapped from now on.
///
/// Non-finite or non-positive values are ignored.
///
/// # Safety
/// - `session` must be a valid handle from `ardk_session_create`.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_set_world_scale(
    session: *mut ArdkSession,
    scale: f32,
) -> ArdkError {
    let Some(session) = session_ref(session) else {
        return ArdkError::ArdkInvalidArgument;
    };
    session.session.set_world_scale(scale);
    ArdkError::ArdkOk
}

/// Select what happens to a frame when a newer one replaces it.
///
/// # Safety
/// - `session` must be a valid handle from `ardk_session_create`.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_set_frame_disposal(
    session: *mut ArdkSession,
    policy: ArdkFrameDisposal,
) -> ArdkError {
    let Some(session) = session_ref(session) else {
        return ArdkError::ArdkInvalidArgument;
    };
    session.session.set_frame_disposal_policy(match policy {
        ArdkFrameDisposal::ArdkDisposeOldFrames => FrameDisposalPolicy::DisposeOldFrames,
        ArdkFrameDisposal::ArdkReturnOldFrames => FrameDisposalPolicy::ReturnOldFrames,
    });
    ArdkError::ArdkOk
}

/// Query the native awareness feature status.
///
/// `status` uses the `ArdkAwarenessInfo` codes. The message is copied into
/// `message` (NUL-terminated, truncated to `message_len - 1` bytes) when
/// `message` is not NULL.
///
/// # Safety
/// - `session` must be a valid handle from `ardk_session_create`.
/// - `out_status` and `out_error` must be valid pointers.
/// - `message` must be NULL or point to at least `message_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_awareness_status(
    session: *mut ArdkSession,
    out_status: *mut u32,
    out_error: *mut u32,
    message: *mut c_char,
    message_len: libc::size_t,
) -> ArdkError {
    let Some(session) = session_ref(session) else {
        return ArdkError::ArdkInvalidArgument;
    };
    if out_status.is_null() || out_error.is_null() {
        return ArdkError::ArdkInvalidArgument;
    }

    let report = match session.session.awareness_status() {
        Ok(report) => report,
        Err(e) => return ArdkError::from(&e),
    };

    *out_status = match report.status {
        AwarenessStatus::Unknown => 0,
        AwarenessStatus::NotInitialized => 1,
        AwarenessStatus::Initializing => 2,
        AwarenessStatus::Ready => 3,
        AwarenessStatus::Failed => 4,
    };
    *out_error = report.error;

    if !message.is_null() && message_len > 0 {
        let bytes = report.message.as_bytes();
        let len = bytes.len().min(message_len - 1);
        ptr::copy_nonoverlapping(bytes.as_ptr(), message.cast::<u8>(), len);
        *message.add(len) = 0;
    }
    ArdkError::ArdkOk
}

// =============================================================================
// Anchors
// =============================================================================

/// Create a native anchor at `transform` and add it to the session.
///
/// The anchor is cached immediately; the native added callback that echoes
/// it later does not create a second wrapper.
///
/// # Safety
/// - `session` must be a valid handle from `ardk_session_create`.
/// - `transform` must point to a valid `ArdkTransform`.
/// - `out_id` and `out_handle` must be NULL or valid pointers.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_add_anchor(
    session: *mut ArdkSession,
    transform: *const ArdkTransform,
    out_id: *mut ArdkUuid,
    out_handle: *mut u64,
) -> ArdkError {
    let Some(session) = session_ref(session) else {
        return ArdkError::ArdkInvalidArgument;
    };
    let Some(transform) = transform.as_ref() else {
        return ArdkError::ArdkInvalidArgument;
    };

    match session.session.add_anchor(&(*transform).into()) {
        Ok(anchor) => {
            if !out_id.is_null() {
                *out_id = anchor.identifier().into();
            }
            if !out_handle.is_null() {
                *out_handle = anchor.handle().raw();
            }
            ArdkError::ArdkOk
        }
        Err(e) => ArdkError::from(&e),
    }
}

/// Ask the native layer to remove a cached anchor.
///
/// The cache changes when the native removal callback is drained.
///
/// # Safety
/// - `session` must be a valid handle from `ardk_session_create`.
/// - `id` must point to a valid `ArdkUuid`.
///
/// # Returns
/// `ArdkOk` on success, `ArdkNotFound` if the anchor is not cached.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_remove_anchor(
    session: *mut ArdkSession,
    id: *const ArdkUuid,
) -> ArdkError {
    let Some(session) = session_ref(session) else {
        return ArdkError::ArdkInvalidArgument;
    };
    let Some(id) = id.as_ref() else {
        return ArdkError::ArdkInvalidArgument;
    };

    let Some(anchor) = session.session.anchor(&Uuid::from(*id)) else {
        return ArdkError::ArdkNotFound;
    };
    to_ardk(session.session.remove_anchor(&anchor), "remove_anchor")
}

/// Identifiers of every cached anchor.
///
/// `*out_ids` receives an array allocated with `malloc` (free it with
/// `ardk_free`), or NULL when there are no anchors.
///
/// # Safety
/// - `session` must be a valid handle from `ardk_session_create`.
/// - `out_ids` and `out_count` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_anchor_ids(
    session: *mut ArdkSession,
    out_ids: *mut *mut ArdkUuid,
    out_count: *mut usize,
) -> ArdkError {
    let Some(session) = session_ref(session) else {
        return ArdkError::ArdkInvalidArgument;
    };
    if out_ids.is_null() || out_count.is_null() {
        return ArdkError::ArdkInvalidArgument;
    }

    let ids: Vec<ArdkUuid> = session
        .session
        .anchors()
        .iter()
        .map(|a| a.identifier().into())
        .collect();

    *out_count = ids.len();
    if ids.is_empty() {
        *out_ids = ptr::null_mut();
        return ArdkError::ArdkOk;
    }

    let bytes = ids.len() * std::mem::size_of::<ArdkUuid>();
    let buf = libc::malloc(bytes).cast::<ArdkUuid>();
    if buf.is_null() {
        *out_count = 0;
        *out_ids = ptr::null_mut();
        return ArdkError::ArdkOutOfMemory;
    }
    ptr::copy_nonoverlapping(ids.as_ptr(), buf, ids.len());
    *out_ids = buf;
    ArdkError::ArdkOk
}

/// Free memory returned by this library.
///
/// # Safety
/// - `ptr` must be NULL or a pointer returned by this library and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn ardk_free(ptr: *mut c_void) {
    if !ptr.is_null() {
        libc::free(ptr);
    }
}
