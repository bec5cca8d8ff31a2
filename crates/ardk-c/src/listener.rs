// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session Listener FFI Bindings
//!
//! C-compatible callback table for session events. Callbacks run on the
//! thread that drains the session (`ardk_session_drain_callbacks`), except
//! `on_relocalization_query`, which is answered on the native thread that
//! asks.
//!
//! # Usage from C
//!
//! ```c
//! void my_on_frame(double timestamp, uint64_t frame, void* user_data) {
//!     // read the frame
//! }
//!
//! ArdkSessionListener listener = {0};
//! listener.on_frame_updated = my_on_frame;
//! listener.user_data = my_context;
//! ardk_session_set_listener(session, &listener);
//! ```
//!
//! Pointer arguments (identifier arrays) are borrowed for the duration of
//! the callback only.

use std::os::raw::c_void;
use std::sync::Arc;

use ardk::{Anchor, Session, SubscriptionId};

use super::runtime::ArdkUuid;
use super::{session_ref, ArdkError, ArdkSession};

// =============================================================================
// Callback type aliases (C function pointers)
// =============================================================================

/// Payload-free session event (ran, paused, interrupted, ...).
pub type ArdkOnSignal = Option<unsafe extern "C" fn(user_data: *mut c_void)>;

/// Terminal native failure with its raw code.
pub type ArdkOnFailed = Option<unsafe extern "C" fn(code: u64, user_data: *mut c_void)>;

/// New current frame. `frame` stays valid until the next frame or pause.
pub type ArdkOnFrameUpdated =
    Option<unsafe extern "C" fn(timestamp: f64, frame: u64, user_data: *mut c_void)>;

/// Anchor or map identifiers.
pub type ArdkOnIdentifiers =
    Option<unsafe extern "C" fn(ids: *const ArdkUuid, count: usize, user_data: *mut c_void)>;

/// One merge: surviving parent and absorbed children.
pub type ArdkOnAnchorsMerged = Option<
    unsafe extern "C" fn(
        parent: *const ArdkUuid,
        children: *const ArdkUuid,
        count: usize,
        user_data: *mut c_void,
    ),
>;

/// Tracking state and reason codes (see `ArdkCameraInfo`).
pub type ArdkOnTrackingStateChanged =
    Option<unsafe extern "C" fn(state: u32, reason: u32, user_data: *mut c_void)>;

/// Mesh update summary.
pub type ArdkOnMeshUpdated = Option<
    unsafe extern "C" fn(changed: u32, removed: u32, version: u64, user_data: *mut c_void),
>;

/// Return true to let the native layer attempt relocalization.
pub type ArdkOnRelocalizationQuery = Option<unsafe extern "C" fn(user_data: *mut c_void) -> bool>;

// =============================================================================
// Listener struct
// =============================================================================

/// C-compatible session listener.
///
/// Callbacks left NULL are not subscribed. The `user_data` pointer is passed
/// through to every callback invocation.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ArdkSessionListener {
    pub on_ran: ArdkOnSignal,
    pub on_paused: ArdkOnSignal,
    pub on_failed: ArdkOnFailed,
    pub on_deinitialized: ArdkOnSignal,
    pub on_frame_updated: ArdkOnFrameUpdated,
    pub on_mesh_updated: ArdkOnMeshUpdated,
    pub on_anchors_added: ArdkOnIdentifiers,
    pub on_anchors_updated: ArdkOnIdentifiers,
    pub on_anchors_removed: ArdkOnIdentifiers,
    pub on_anchors_merged: ArdkOnAnchorsMerged,
    pub on_maps_added: ArdkOnIdentifiers,
    pub on_maps_updated: ArdkOnIdentifiers,
    pub on_tracking_state_changed: ArdkOnTrackingStateChanged,
    pub on_interrupted: ArdkOnSignal,
    pub on_interruption_ended: ArdkOnSignal,
    pub on_relocalization_query: ArdkOnRelocalizationQuery,
    /// User-provided context pointer, passed to all callbacks.
    pub user_data: *mut c_void,
}

/// Listener copy shared by the subscribed closures.
struct ListenerShim(ArdkSessionListener);

// Safety: The C caller is responsible for thread safety of user_data and callbacks.
unsafe impl Send for ListenerShim {}
unsafe impl Sync for ListenerShim {}

fn anchor_ids(anchors: &[Arc<Anchor>]) -> Vec<ArdkUuid> {
    anchors.iter().map(|a| a.identifier().into()).collect()
}

fn tracking_codes(camera: &ardk::Camera) -> (u32, u32) {
    use ardk::native::{TrackingState, TrackingStateReason};
    let state = match camera.tracking_state() {
        TrackingState::NotAvailable => 0,
        TrackingState::Limited => 1,
        TrackingState::Normal => 2,
    };
    let reason = match camera.tracking_state_reason() {
        TrackingStateReason::None => 0,
        TrackingStateReason::Initializing => 1,
        TrackingStateReason::Relocalizing => 2,
        TrackingStateReason::ExcessiveMotion => 3,
        TrackingStateReason::InsufficientFeatures => 4,
        TrackingStateReason::Unknown => 5,
    };
    (state, reason)
}

macro_rules! subscribe_signal {
    ($ids:ident, $session:ident, $shim:ident, $field:ident, $method:ident) => {
        if let Some(f) = $shim.0.$field {
            let shim = Arc::clone(&$shim);
            $ids.push($session.$method(move |_| unsafe { f(shim.0.user_data) }));
        }
    };
}

macro_rules! subscribe_ids {
    ($ids:ident, $session:ident, $shim:ident, $field:ident, $method:ident, $list:ident) => {
        if let Some(f) = $shim.0.$field {
            let shim = Arc::clone(&$shim);
            $ids.push($session.$method(move |args| {
                let ids: Vec<ArdkUuid> = args.$list.iter().map(|x| x.identifier().into()).collect();
                unsafe { f(ids.as_ptr(), ids.len(), shim.0.user_data) }
            }));
        }
    };
}

/// Subscribe every non-NULL callback. Returns the subscription ids.
fn subscribe(session: &Session, listener: ArdkSessionListener) -> Vec<SubscriptionId> {
    let shim = Arc::new(ListenerShim(listener));
    let mut ids = Vec::new();

    subscribe_signal!(ids, session, shim, on_ran, on_ran);
    subscribe_signal!(ids, session, shim, on_paused, on_paused);
    subscribe_signal!(ids, session, shim, on_deinitialized, on_deinitialized);
    subscribe_signal!(ids, session, shim, on_interrupted, on_interrupted);
    subscribe_signal!(ids, session, shim, on_interruption_ended, on_interruption_ended);

    if let Some(f) = shim.0.on_failed {
        let s = Arc::clone(&shim);
        ids.push(session.on_failed(move |args| unsafe { f(args.error.code(), s.0.user_data) }));
    }

    if let Some(f) = shim.0.on_frame_updated {
        let s = Arc::clone(&shim);
        ids.push(session.on_frame_updated(move |args| unsafe {
            f(args.frame.timestamp(), args.frame.handle().raw(), s.0.user_data)
        }));
    }

    if let Some(f) = shim.0.on_mesh_updated {
        let s = Arc::clone(&shim);
        ids.push(session.on_mesh_updated(move |args| unsafe {
            f(
                args.update.changed.len() as u32,
                args.update.removed.len() as u32,
                args.update.version,
                s.0.user_data,
            )
        }));
    }

    subscribe_ids!(ids, session, shim, on_anchors_added, on_anchors_added, anchors);
    subscribe_ids!(ids, session, shim, on_anchors_updated, on_anchors_updated, anchors);
    subscribe_ids!(ids, session, shim, on_anchors_removed, on_anchors_removed, anchors);
    subscribe_ids!(ids, session, shim, on_maps_added, on_maps_added, maps);
    subscribe_ids!(ids, session, shim, on_maps_updated, on_maps_updated, maps);

    if let Some(f) = shim.0.on_anchors_merged {
        let s = Arc::clone(&shim);
        ids.push(session.on_anchors_merged(move |args| {
            let parent = ArdkUuid::from(args.parent.identifier());
            let children = anchor_ids(&args.children);
            unsafe { f(&parent, children.as_ptr(), children.len(), s.0.user_data) }
        }));
    }

    if let Some(f) = shim.0.on_tracking_state_changed {
        let s = Arc::clone(&shim);
        ids.push(session.on_tracking_state_changed(move |args| {
            let (state, reason) = tracking_codes(&args.camera);
            unsafe { f(state, reason, s.0.user_data) }
        }));
    }

    if let Some(f) = shim.0.on_relocalization_query {
        let s = Arc::clone(&shim);
        ids.push(session.on_relocalization_query(move |query| {
            if unsafe { f(s.0.user_data) } {
                query.should_attempt = true;
            }
        }));
    }

    ids
}

// =============================================================================
// FFI functions
// =============================================================================

/// Install a listener on a session, replacing any previous one.
///
/// The listener struct is copied internally. The caller must ensure that
/// any `user_data` pointer and callback functions remain valid until the
/// listener is cleared or the session is destroyed. Subscribing to `ran` or
/// `paused` while the session is already in that state invokes the callback
/// immediately.
///
/// # Safety
///
/// - `session` must be a valid pointer returned from `ardk_session_create`.
/// - `listener` must be a valid pointer to a properly initialized `ArdkSessionListener`.
///
/// # Returns
///
/// `ArdkOk` on success, `ArdkInvalidArgument` if either pointer is null.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_set_listener(
    session: *mut ArdkSession,
    listener: *const ArdkSessionListener,
) -> ArdkError {
    if listener.is_null() {
        return ArdkError::ArdkInvalidArgument;
    }
    let Some(session) = session_ref(session) else {
        return ArdkError::ArdkInvalidArgument;
    };
    let listener = *listener;

    session.clear_listener();
    let ids = subscribe(&session.session, listener);
    log::debug!("[ffi] listener installed ({} callbacks)", ids.len());
    session.set_listener_ids(ids);
    ArdkError::ArdkOk
}

/// Remove the listener from a session.
///
/// After this call, no more listener callbacks will be invoked.
///
/// # Safety
///
/// - `session` must be a valid pointer returned from `ardk_session_create`.
///
/// # Returns
///
/// `ArdkOk` on success, `ArdkInvalidArgument` if the pointer is null.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_clear_listener(session: *mut ArdkSession) -> ArdkError {
    let Some(session) = session_ref(session) else {
        return ArdkError::ArdkInvalidArgument;
    };
    session.clear_listener();
    ArdkError::ArdkOk
}
