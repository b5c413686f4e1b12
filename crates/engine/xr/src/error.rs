//! Error types for the session controller

use thiserror::Error;

use crate::types::{FormFactor, SessionState, ViewConfiguration};

/// Result type for controller and runtime operations
pub type Result<T> = std::result::Result<T, XrError>;

/// How far an error is allowed to propagate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Startup cannot continue
    Fatal,
    /// An optional capability is unavailable; the loop carries on without it
    Degraded,
    /// Contained to the frame that produced it
    Frame,
    /// The session is gone and must be recreated
    SessionLoss,
}

/// Errors raised by the controller, the runtime seam or a backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum XrError {
    /// The runtime could not be reached or refused the instance
    #[error("runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// A required instance extension is not offered by the runtime
    #[error("required extension {0} is not supported by the runtime")]
    MissingExtension(String),

    /// An optional extension is not offered; the feature is disabled
    #[error("extension {0} is not supported")]
    ExtensionUnsupported(&'static str),

    /// No system matches the configured form factor
    #[error("no system available for form factor {0}")]
    FormFactorUnavailable(FormFactor),

    /// The system does not expose the configured view configuration
    #[error("view configuration {0} is not supported by the system")]
    ViewConfigurationUnsupported(ViewConfiguration),

    /// The runtime supports no environment blend mode at all
    #[error("no environment blend mode available")]
    NoBlendMode,

    /// No swapchain format is shared by the runtime and the graphics backend
    #[error("no swapchain format shared by runtime and graphics backend")]
    NoCompatibleSwapchainFormat,

    /// The view configuration reported no views
    #[error("view configuration reported no views")]
    NoViews,

    /// A lifecycle phase was invoked before its prerequisite
    #[error("{operation} requires {requirement}")]
    PhaseOrder {
        operation: &'static str,
        requirement: &'static str,
    },

    /// A call that needs the instance was made without one
    #[error("no instance exists")]
    NoInstance,

    /// A frame or action call was made while the session is not running
    #[error("session is not running (state {0:?})")]
    SessionNotRunning(SessionState),

    /// The runtime reported that the session was lost
    #[error("session lost")]
    SessionLost,

    /// The runtime reported that the instance was lost
    #[error("instance lost")]
    InstanceLost,

    /// The marker database no longer accepts images
    #[error("marker database is sealed")]
    MarkerDatabaseSealed,

    /// A marker image was rejected by the runtime
    #[error("marker image {label} rejected: {reason}")]
    MarkerImageRejected { label: String, reason: String },

    /// An option had a value outside its allowed set
    #[error("invalid value {value:?} for option {option}")]
    InvalidOption { option: &'static str, value: String },

    /// Failure inside the graphics backend
    #[error("graphics backend error: {0}")]
    Graphics(String),

    /// Any other failure reported by the runtime
    #[error("runtime call {call} failed: {reason}")]
    Runtime { call: &'static str, reason: String },
}

impl XrError {
    /// Wrap a runtime failure with the name of the call that produced it
    pub fn runtime(call: &'static str, reason: impl Into<String>) -> Self {
        Self::Runtime {
            call,
            reason: reason.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::SessionLost | Self::InstanceLost => Severity::SessionLoss,
            Self::ExtensionUnsupported(_)
            | Self::MarkerDatabaseSealed
            | Self::MarkerImageRejected { .. } => Severity::Degraded,
            Self::SessionNotRunning(_) | Self::Graphics(_) | Self::Runtime { .. } => {
                Severity::Frame
            }
            _ => Severity::Fatal,
        }
    }

    pub fn is_session_loss(&self) -> bool {
        self.severity() == Severity::SessionLoss
    }
}
