// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Location service attachment.

use crate::native::NativeHandle;
use std::sync::Arc;
use uuid::Uuid;

/// What a location service needs to feed the native session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationContext {
    pub stage: Uuid,
    pub session: NativeHandle,
}

/// Source of device location updates, attached at most once per session.
pub trait LocationService: Send + Sync {
    /// Begin forwarding updates for `context`.
    fn attach(&self, context: LocationContext);

    /// Stop forwarding. Called once when the session is disposed.
    fn detach(&self) {}
}

/// Attachment state held by the session.
pub(crate) enum LocationAttachment {
    /// Playback sessions replay recorded locations natively.
    Playback,
    Live(Arc<dyn LocationService>),
}

impl LocationAttachment {
    pub(crate) fn detach(self) {
        if let LocationAttachment::Live(service) = self {
            service.detach();
        }
    }
}
