// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fire-and-forget usage events.

use crate::config::ArConfiguration;
use crate::queue::panic_message;
use std::panic::{self, AssertUnwindSafe};
use uuid::Uuid;

/// Emitted once per successful `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnabledCapabilitiesEvent {
    pub stage: Uuid,
    pub depth: bool,
    pub depth_point_cloud: bool,
    pub meshing: bool,
    pub semantics: bool,
    pub plane_detection: bool,
}

impl EnabledCapabilitiesEvent {
    pub(crate) fn from_configuration(stage: Uuid, configuration: &ArConfiguration) -> Self {
        Self {
            stage,
            depth: configuration.depth_enabled,
            depth_point_cloud: configuration.wants_depth_point_cloud(),
            meshing: configuration.meshing_enabled,
            semantics: configuration.semantic_segmentation_enabled,
            plane_detection: configuration.plane_detection.bits() != 0,
        }
    }
}

pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: &EnabledCapabilitiesEvent) -> Result<(), String>;
}

/// Default sink: one debug log line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn record(&self, event: &EnabledCapabilitiesEvent) -> Result<(), String> {
        log::debug!(
            "[telemetry] stage={} depth={} point_cloud={} meshing={} semantics={} planes={}",
            event.stage,
            event.depth,
            event.depth_point_cloud,
            event.meshing,
            event.semantics,
            event.plane_detection
        );
        Ok(())
    }
}

/// Record `event`, swallowing errors and panics.
pub(crate) fn record_quietly(sink: &dyn TelemetrySink, event: &EnabledCapabilitiesEvent) {
    match panic::catch_unwind(AssertUnwindSafe(|| sink.record(event))) {
        Ok(Ok(())) => {}
        Ok(Err(reason)) => log::debug!("[telemetry] failed to record event: {}", reason),
        Err(payload) => log::debug!("[telemetry] sink panicked: {}", panic_message(&payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaneDetection;

    struct Failing;

    impl TelemetrySink for Failing {
        fn record(&self, _: &EnabledCapabilitiesEvent) -> Result<(), String> {
            Err("offline".into())
        }
    }

    struct Panicking;

    impl TelemetrySink for Panicking {
        fn record(&self, _: &EnabledCapabilitiesEvent) -> Result<(), String> {
            panic!("sink bug")
        }
    }

    #[test]
    fn test_event_from_configuration() {
        let config = ArConfiguration::world_tracking()
            .with_meshing(true)
            .with_plane_detection(PlaneDetection::VERTICAL);
        let event = EnabledCapabilitiesEvent::from_configuration(Uuid::nil(), &config);

        assert!(event.meshing);
        assert!(event.plane_detection);
        assert!(!event.depth);
        assert!(!event.semantics);
    }

    #[test]
    fn test_failures_swallowed() {
        let event = EnabledCapabilitiesEvent::from_configuration(Uuid::nil(), &ArConfiguration::default());
        record_quietly(&Failing, &event);
        record_quietly(&Panicking, &event);
        record_quietly(&LogTelemetry, &event);
    }
}
