//! Error types for the host boundary.

use thiserror::Error;

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Errors that can occur when talking to the host application's skin
/// deformer.
#[derive(Debug, Error)]
pub enum HostError {
    /// The bound mesh node is no longer valid in the host scene.
    #[error("mesh node '{name}' is not valid in the host scene")]
    InvalidMesh { name: String },

    /// The mesh carries no skin deformer.
    #[error("mesh '{name}' has no skin deformer")]
    NoDeformer { name: String },

    /// A bone id is unknown to the deformer.
    #[error("bone id {bone} is unknown to the deformer")]
    UnknownBone { bone: u32 },

    /// An interactive session is already active on the deformer.
    #[error("an interactive session is already active")]
    SessionActive,

    /// No interactive session to commit.
    #[error("no interactive session is active")]
    NoSession,

    /// The host refused to enter its interactive paint mode.
    #[error("host refused to start the paint session: {reason}")]
    PaintStartRefused { reason: String },

    /// The host's topology query produced no adjacency data.
    #[error("host returned no topology for mesh '{name}'")]
    NoTopology { name: String },

    /// A host-side call failed for an unspecified reason.
    #[error("host call '{call}' failed: {reason}")]
    CallFailed { call: &'static str, reason: String },
}

impl HostError {
    /// Stable error code for reporting, `HOST_xxx`.
    pub fn code(&self) -> &'static str {
        match self {
            HostError::InvalidMesh { .. } => "HOST_001",
            HostError::NoDeformer { .. } => "HOST_002",
            HostError::UnknownBone { .. } => "HOST_003",
            HostError::SessionActive => "HOST_004",
            HostError::NoSession => "HOST_005",
            HostError::PaintStartRefused { .. } => "HOST_006",
            HostError::NoTopology { .. } => "HOST_007",
            HostError::CallFailed { .. } => "HOST_008",
        }
    }

    /// Creates a new call-failed error.
    pub fn call_failed(call: &'static str, reason: impl Into<String>) -> Self {
        Self::CallFailed {
            call,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HostError::NoDeformer {
            name: "Hero_Body".into(),
        };
        assert!(err.to_string().contains("no skin deformer"));
        assert_eq!(err.code(), "HOST_002");

        let err = HostError::call_failed("inject_weights", "scene locked");
        assert!(err.to_string().contains("scene locked"));
        assert_eq!(err.code(), "HOST_008");
    }
}
