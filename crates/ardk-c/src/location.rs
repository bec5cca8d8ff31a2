// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Location service FFI bindings.
//!
//! A host that feeds device locations registers an `ArdkLocationService`.
//! `attach` is called once, on the calling thread, with the stage identifier
//! and native session handle. `detach` is called once when the session is
//! disposed. Playback sessions never call either.

use std::os::raw::c_void;
use std::sync::Arc;

use ardk::{LocationContext, LocationService};

use super::runtime::ArdkUuid;
use super::{session_ref, to_ardk, ArdkError, ArdkSession};

/// Location service callbacks. `attach` is required.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ArdkLocationService {
    pub attach:
        Option<unsafe extern "C" fn(stage: *const ArdkUuid, session: u64, user_data: *mut c_void)>,
    pub detach: Option<unsafe extern "C" fn(user_data: *mut c_void)>,
    pub user_data: *mut c_void,
}

struct ForeignLocationService(ArdkLocationService);

// SAFETY: the host guarantees `user_data` may be used from the thread that
// owns the session; the bridge only calls in from that thread.
unsafe impl Send for ForeignLocationService {}
unsafe impl Sync for ForeignLocationService {}

impl LocationService for ForeignLocationService {
    fn attach(&self, context: LocationContext) {
        let Some(attach) = self.0.attach else {
            return;
        };
        let stage = ArdkUuid::from(context.stage);
        // SAFETY: host-supplied callback; `stage` outlives the call.
        unsafe { attach(&stage, context.session.raw(), self.0.user_data) };
    }

    fn detach(&self) {
        if let Some(detach) = self.0.detach {
            // SAFETY: host-supplied callback.
            unsafe { detach(self.0.user_data) };
        }
    }
}

/// Attach a location service. At most one per session.
///
/// # Returns
/// `ArdkLocationAlreadyAttached` on a second call, `ArdkSessionDisposed`
/// after dispose.
///
/// # Safety
/// - `session` must be a valid handle from `ardk_session_create`.
/// - `service` must point to a valid `ArdkLocationService`; it is copied.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_setup_location_service(
    session: *mut ArdkSession,
    service: *const ArdkLocationService,
) -> ArdkError {
    let Some(session) = session_ref(session) else {
        return ArdkError::ArdkInvalidArgument;
    };
    let Some(service) = service.as_ref() else {
        return ArdkError::ArdkInvalidArgument;
    };
    if service.attach.is_none() {
        return ArdkError::ArdkInvalidArgument;
    }
    to_ardk(
        session
            .session
            .setup_location_service(Arc::new(ForeignLocationService(*service))),
        "setup_location_service",
    )
}

/// Whether a location service (or playback replay) is attached.
///
/// # Safety
/// - `session` must be NULL or a valid handle from `ardk_session_create`.
#[no_mangle]
pub unsafe extern "C" fn ardk_session_location_service_attached(session: *mut ArdkSession) -> bool {
    session_ref(session).is_some_and(|s| s.session.is_location_service_initialized())
}
