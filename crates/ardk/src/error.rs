// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for session operations and native failure codes.

/// Failure code reported asynchronously by the native AR runtime.
///
/// Codes follow the platform framework numbering (100 range: configuration
/// and sensors, 200 range: tracking, 300 range: reference data). Unknown
/// codes are preserved in [`ArError::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArError {
    /// Native layer reported a failure without a specific reason.
    Unknown,
    /// Configuration is not supported on this device.
    UnsupportedConfiguration,
    /// A required sensor is not available.
    SensorUnavailable,
    /// A required sensor failed to provide input.
    SensorFailed,
    /// Camera access was denied by the user.
    CameraUnauthorized,
    /// World tracking hit an unrecoverable error.
    WorldTrackingFailed,
    /// A reference image in the configuration is invalid.
    InvalidReferenceImage,
    /// Code not covered by the variants above.
    Other(u64),
}

impl ArError {
    /// Decode a raw native error code.
    pub fn from_code(code: u64) -> Self {
        match code {
            0 => ArError::Unknown,
            100 => ArError::UnsupportedConfiguration,
            101 => ArError::SensorUnavailable,
            102 => ArError::SensorFailed,
            103 => ArError::CameraUnauthorized,
            200 => ArError::WorldTrackingFailed,
            300 => ArError::InvalidReferenceImage,
            other => ArError::Other(other),
        }
    }

    /// Raw native error code.
    pub fn code(self) -> u64 {
        match self {
            ArError::Unknown => 0,
            ArError::UnsupportedConfiguration => 100,
            ArError::SensorUnavailable => 101,
            ArError::SensorFailed => 102,
            ArError::CameraUnauthorized => 103,
            ArError::WorldTrackingFailed => 200,
            ArError::InvalidReferenceImage => 300,
            ArError::Other(code) => code,
        }
    }
}

impl std::fmt::Display for ArError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArError::Unknown => write!(f, "unknown native failure"),
            ArError::UnsupportedConfiguration => write!(f, "unsupported configuration"),
            ArError::SensorUnavailable => write!(f, "sensor unavailable"),
            ArError::SensorFailed => write!(f, "sensor failed"),
            ArError::CameraUnauthorized => write!(f, "camera unauthorized"),
            ArError::WorldTrackingFailed => write!(f, "world tracking failed"),
            ArError::InvalidReferenceImage => write!(f, "invalid reference image"),
            ArError::Other(code) => write!(f, "native error code {}", code),
        }
    }
}

/// Errors returned by session operations.
///
/// Precondition failures (disposed or uninitialized session) are returned as
/// errors but never leave the session in a different state; callers may treat
/// them as no-ops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ========================================================================
    // Precondition Errors
    // ========================================================================
    /// Session was already disposed.
    SessionDisposed,
    /// Native session handle was never created.
    NotInitialized,
    /// Session is in the terminal Failed state.
    SessionFailed(ArError),

    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// Configuration rejected before reaching the native layer.
    ValidationFailed(String),

    // ========================================================================
    // Collaborator Errors
    // ========================================================================
    /// A location service is already attached to this session.
    LocationServiceAlreadyAttached,
    /// Native layer could not create an anchor.
    AnchorCreationFailed,
    /// Null or unknown native handle.
    InvalidHandle,

    // ========================================================================
    // Dispatch Errors
    // ========================================================================
    /// Dispatcher thread panicked.
    DispatcherPanicked,
    /// Native runtime reported an error.
    Native(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::SessionDisposed => write!(f, "Session was disposed"),
            Error::NotInitialized => write!(f, "Session has no native handle"),
            Error::SessionFailed(err) => write!(f, "Session failed: {}", err),
            Error::ValidationFailed(msg) => write!(f, "Configuration validation failed: {}", msg),
            Error::LocationServiceAlreadyAttached => {
                write!(f, "Session is already listening to a location service")
            }
            Error::AnchorCreationFailed => write!(f, "Anchor creation failed"),
            Error::InvalidHandle => write!(f, "Invalid native handle"),
            Error::DispatcherPanicked => write!(f, "Dispatcher thread panicked"),
            Error::Native(msg) => write!(f, "Native runtime error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Convenient alias for session results.
pub type Result<T> = core::result::Result<T, Error>;
