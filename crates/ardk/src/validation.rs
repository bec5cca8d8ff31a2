// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Configuration checks run before a configuration reaches the native layer.

use crate::config::ArConfiguration;
use crate::native::RuntimeCapabilities;

/// Decides whether a configuration may be run. `Err` carries the reason.
pub trait ConfigurationValidator: Send + Sync {
    fn validate(
        &self,
        configuration: &ArConfiguration,
        capabilities: &RuntimeCapabilities,
    ) -> Result<(), String>;
}

impl<F> ConfigurationValidator for F
where
    F: Fn(&ArConfiguration, &RuntimeCapabilities) -> Result<(), String> + Send + Sync,
{
    fn validate(
        &self,
        configuration: &ArConfiguration,
        capabilities: &RuntimeCapabilities,
    ) -> Result<(), String> {
        self(configuration, capabilities)
    }
}

/// Rejects features the runtime reports as unsupported.
#[derive(Debug, Default, Clone, Copy)]
pub struct CapabilityValidator;

impl ConfigurationValidator for CapabilityValidator {
    fn validate(
        &self,
        configuration: &ArConfiguration,
        capabilities: &RuntimeCapabilities,
    ) -> Result<(), String> {
        let mut missing = Vec::new();

        if configuration.world_tracking && !capabilities.world_tracking {
            missing.push("world tracking");
        }
        if configuration.depth_enabled && !capabilities.depth {
            missing.push("depth");
        }
        if configuration.meshing_enabled && !capabilities.meshing {
            missing.push("meshing");
        }
        if configuration.semantic_segmentation_enabled && !capabilities.semantic_segmentation {
            missing.push("semantic segmentation");
        }

        if !missing.is_empty() {
            return Err(format!("unsupported on this device: {}", missing.join(", ")));
        }

        if configuration.meshing_enabled && !configuration.world_tracking {
            return Err("meshing requires world tracking".into());
        }

        Ok(())
    }
}
