// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge logging for C hosts.
//!
//! The bridge logs through `log` with module targets (`ardk::session`,
//! `ardk::queue`, ...). `ardk_logging_init` installs `env_logger` with the
//! bridge at the requested level and every other target at `warn`. The
//! `ARDK_LOG` environment variable, when set, replaces that filter.

use super::ArdkError;

/// Environment variable that overrides the default filter.
const FILTER_ENV: &str = "ARDK_LOG";

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArdkLogLevel {
    ArdkLogOff = 0,
    ArdkLogError = 1,
    ArdkLogWarn = 2,
    ArdkLogInfo = 3,
    ArdkLogDebug = 4,
    ArdkLogTrace = 5,
}

impl From<ArdkLogLevel> for log::LevelFilter {
    fn from(level: ArdkLogLevel) -> Self {
        match level {
            ArdkLogLevel::ArdkLogOff => log::LevelFilter::Off,
            ArdkLogLevel::ArdkLogError => log::LevelFilter::Error,
            ArdkLogLevel::ArdkLogWarn => log::LevelFilter::Warn,
            ArdkLogLevel::ArdkLogInfo => log::LevelFilter::Info,
            ArdkLogLevel::ArdkLogDebug => log::LevelFilter::Debug,
            ArdkLogLevel::ArdkLogTrace => log::LevelFilter::Trace,
        }
    }
}

/// Bridge component, for `ardk_logging_enabled`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArdkLogComponent {
    /// Session state machine and native callback handling.
    ArdkLogSession = 0,
    /// Callback queue and dispatcher.
    ArdkLogQueue = 1,
    /// Handle registry and context table.
    ArdkLogRegistry = 2,
    /// Anchor lifecycle cache.
    ArdkLogCache = 3,
    /// This C API.
    ArdkLogFfi = 4,
}

impl ArdkLogComponent {
    fn target(self) -> &'static str {
        match self {
            ArdkLogComponent::ArdkLogSession => "ardk::session",
            ArdkLogComponent::ArdkLogQueue => "ardk::queue",
            ArdkLogComponent::ArdkLogRegistry => "ardk::registry",
            ArdkLogComponent::ArdkLogCache => "ardk::cache",
            ArdkLogComponent::ArdkLogFfi => "ardk_c",
        }
    }
}

fn default_filter(level: log::LevelFilter) -> String {
    let level = level.to_string().to_lowercase();
    format!("warn,ardk={level},ardk_c={level}")
}

/// Install the process logger.
///
/// # Returns
/// `ArdkOk`, or `ArdkOperationFailed` if a logger is already installed.
///
/// # Example (C)
/// ```c
/// ardk_logging_init(ARDK_LOG_INFO);
/// // ARDK_LOG="ardk::queue=trace" overrides the default filter
/// ```
#[no_mangle]
pub extern "C" fn ardk_logging_init(level: ArdkLogLevel) -> ArdkError {
    let filter = default_filter(level.into());
    let env = env_logger::Env::new().filter_or(FILTER_ENV, filter.as_str());
    match env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init()
    {
        Ok(()) => {
            log::debug!("[ffi] logging initialised ({})", filter);
            ArdkError::ArdkOk
        }
        Err(_) => ArdkError::ArdkOperationFailed,
    }
}

/// Cap verbosity at runtime. Cannot raise it above what the filter installed
/// by `ardk_logging_init` lets through.
#[no_mangle]
pub extern "C" fn ardk_logging_set_level(level: ArdkLogLevel) {
    log::set_max_level(level.into());
}

/// Whether a record from `component` at `level` would be emitted.
#[no_mangle]
pub extern "C" fn ardk_logging_enabled(component: ArdkLogComponent, level: ArdkLogLevel) -> bool {
    let Some(level) = log::LevelFilter::from(level).to_level() else {
        return false;
    };
    log::log_enabled!(target: component.target(), level)
}
