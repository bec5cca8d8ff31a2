// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # ARDK - Native AR Session Bridge
//!
//! Safe ownership and threading layer between an application and a native
//! AR runtime. The runtime reports frames, anchors, maps, meshes and failures
//! from its own threads through C callbacks; this crate turns those into
//! ordered events delivered on one consumer thread, while guaranteeing every
//! native reference it is handed is released exactly once.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ardk::native::recording::RecordingRuntime;
//! use ardk::{ArConfiguration, RunOptions, Session, Result};
//! use std::sync::Arc;
//!
//! fn main() -> Result<()> {
//!     let runtime = Arc::new(RecordingRuntime::new());
//!     let session = Session::new(runtime)?;
//!
//!     session.on_frame_updated(|args| {
//!         println!("frame at {}", args.frame.timestamp());
//!     });
//!     session.run(ArConfiguration::world_tracking(), RunOptions::RESET_TRACKING)?;
//!
//!     // Once per host frame, on the session thread:
//!     session.drain_callbacks();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                         Application                                 |
//! |   Session (run/pause/anchors) | event subscriptions                 |
//! +---------------------------------------------------------------------+
//! |                     Consumer thread                                 |
//! |   CallbackQueue drain -> state machine -> AnchorCache -> events     |
//! +---------------------------------------------------------------------+
//! |                     Native threads                                  |
//! |   trampolines -> HandleRegistry wrap -> enqueue                     |
//! +---------------------------------------------------------------------+
//! |                     NativeRuntime (FFI)                             |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Session`] | One native AR session and its state machine |
//! | [`CallbackQueue`] | Multi-producer, single-consumer task queue |
//! | [`Dispatcher`] | Optional background thread draining a queue |
//! | [`Anchor`] | Registry-unique wrapper around a native anchor |
//! | [`Frame`] | Current camera frame with optional depth |
//! | [`NativeRuntime`] | The native surface the bridge drives |

pub mod anchor;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod generators;
pub mod location;
pub mod map;
pub mod mesh;
pub mod native;
pub mod object;
pub mod queue;
pub mod registry;
pub mod session;
pub mod telemetry;
pub mod validation;

pub use anchor::Anchor;
pub use cache::AnchorCache;
pub use config::{
    ArConfiguration, FrameDisposalPolicy, LiveSettings, PlaneDetection, RunOptions, SessionConfig,
};
pub use error::{ArError, Error, Result};
pub use events::{
    AnchorsChanged, AnchorsMerged, FrameUpdated, MapsChanged, MeshUpdated, RelocalizationQuery,
    SessionDeinitialized, SessionFailed, SessionInterrupted, SessionInterruptionEnded,
    SessionPaused, SessionRan, SubscriptionId, TrackingStateChanged,
};
pub use frame::Frame;
pub use generators::{DepthPointCloudGenerator, PointCloud};
pub use location::{LocationContext, LocationService};
pub use map::{Camera, Map};
pub use mesh::{MeshState, MeshUpdate};
pub use native::{NativeHandle, NativeObjectKind, NativeRuntime, Transform};
pub use queue::{CallbackQueue, Dispatcher};
pub use session::{Session, SessionBuilder, SessionState};
pub use telemetry::{EnabledCapabilitiesEvent, LogTelemetry, TelemetrySink};
pub use validation::{CapabilityValidator, ConfigurationValidator};

pub use uuid::Uuid;
