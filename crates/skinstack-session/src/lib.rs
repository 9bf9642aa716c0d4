//! skinstack Session Layer
//!
//! Sidecar persistence plus the interactive session controller. This is the
//! orchestration tier: the pure data model and algorithms live in
//! `skinstack-doc`, the host deformer hides behind `skinstack-host`, and
//! this crate wires them into the edit loop a rigging panel drives —
//! flatten, inject, paint, capture, persist.
//!
//! # Example
//!
//! ```
//! use skinstack_host::MemoryHost;
//! use skinstack_doc::BoneWeights;
//! use skinstack_session::{SidecarStore, SkinLayerController, StoreConfig};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = SidecarStore::new(StoreConfig::with_cache_dir(dir.path()));
//!
//! let mut host = MemoryHost::new("Hero Body").with_bones(&["Hip", "Spine"]);
//! host.set_vertex_weights(1, BoneWeights::new(vec![1], vec![1.0]));
//!
//! let mut controller = SkinLayerController::new(store, host).unwrap();
//! controller.capture_into_layer(0, true);
//! assert_eq!(controller.document().bones, vec!["Hip", "Spine"]);
//! ```
//!
//! # Modules
//!
//! - [`store`]: Sidecar and bone-list persistence
//! - [`controller`]: The session state machine and layer operations
//! - [`error`]: Session precondition errors

pub mod controller;
pub mod error;
pub mod store;

// Re-export commonly used types at the crate root
pub use controller::{SessionState, SkinLayerController};
pub use error::SessionError;
pub use store::{SidecarStore, StoreConfig};
