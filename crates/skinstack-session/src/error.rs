//! Session-level errors.
//!
//! Most session operations degrade to `false`/`None`/empty on failure — the
//! host scene is a moving target and the tooling is expected to shrug off
//! transient misses. `SessionError` is reserved for the preconditions a
//! caller explicitly violated: binding to an invalid mesh, or rebinding
//! while an interactive session is open.

use thiserror::Error;

/// Errors raised by session entry points with hard preconditions.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The mesh (or its skin deformer) is not valid in the host scene.
    #[error("mesh '{name}' is not valid in the host scene or has no skin deformer")]
    InvalidMesh { name: String },

    /// An interactive paint or manual-edit session is still open.
    #[error("an interactive session is active; commit it before rebinding")]
    SessionActive,
}
