//! skinstack Host Boundary
//!
//! The host 3D application owns the scene graph, the viewport, and the
//! native skin deformer. This crate pins down the slice of that surface the
//! layer tooling consumes — as a trait, so the deformer arrives by injection
//! rather than through import-time fallbacks.
//!
//! [`SkinHost`] is implemented once per host integration (and bound to one
//! mesh at a time); [`MemoryHost`] is the deterministic in-memory
//! implementation the test suites and offline tooling run against.
//!
//! # Example
//!
//! ```
//! use skinstack_host::{MemoryHost, SkinHost};
//! use skinstack_doc::BoneWeights;
//!
//! let mut host = MemoryHost::new("Hero Body").with_bones(&["Hip", "Spine"]);
//! host.set_vertex_weights(1, BoneWeights::new(vec![1], vec![1.0]));
//!
//! assert_eq!(host.mesh_name(), "Hero Body");
//! assert_eq!(host.bones().unwrap().len(), 2);
//! ```
//!
//! # Modules
//!
//! - [`traits`]: The [`SkinHost`] trait and boundary types
//! - [`memory`]: The in-memory implementation
//! - [`error`]: Host error taxonomy

pub mod error;
pub mod memory;
pub mod traits;

// Re-export commonly used types at the crate root
pub use error::{HostError, HostResult};
pub use memory::MemoryHost;
pub use traits::{BoneInfo, SkinHost, WeightOp};
