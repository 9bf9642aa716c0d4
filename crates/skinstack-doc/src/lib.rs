//! skinstack Skin Document Library
//!
//! This crate provides the layered skin-weight data model, its sidecar JSON
//! serialization, and the pure algorithms that operate on it: stack
//! flattening, topology-aware smooth/heal relaxation, mask operations, and
//! advisory validation.
//!
//! # Overview
//!
//! A [`SkinDocument`] holds an ordered stack of [`Layer`]s, base first. Each
//! layer carries per-vertex bone influences, a blend mode, an opacity, an
//! enable flag, and an optional per-bone vertex mask. [`flatten`] reduces
//! the stack into one resolved vertex → weight mapping ready for bulk
//! injection into a host deformer; [`smooth_layer`] and [`heal_layer`]
//! relax a single layer over a mesh adjacency oracle.
//!
//! UI row order is the reverse of storage order — the topmost row is the
//! last stored layer. [`SkinDocument::data_index`] is the one place that
//! transform lives; everything in this workspace calls through it.
//!
//! # Example
//!
//! ```
//! use skinstack_doc::{flatten, BlendMode, BoneWeights, SkinDocument};
//!
//! let mut doc = SkinDocument::new();
//! doc.layers[0]
//!     .weights
//!     .insert(1, BoneWeights::new(vec![1], vec![1.0]));
//!
//! let idx = doc.add_layer("Tweak");
//! let layer = doc.layer_mut(idx).unwrap();
//! layer.blend_mode = BlendMode::Add;
//! layer.opacity = 0.5;
//! layer.weights.insert(1, BoneWeights::new(vec![2], vec![0.5]));
//!
//! let resolved = flatten(&doc, None).unwrap();
//! assert!((resolved[&1].total() - 1.0).abs() < 1e-9);
//! ```
//!
//! # Modules
//!
//! - [`document`]: Document and layer types, the UI↔storage index transform
//! - [`weights`]: Per-vertex weight containers and the sparse accumulator
//! - [`flatten`]: The stack compositing engine
//! - [`relax`]: Smooth and heal operators over a topology oracle
//! - [`mask`]: Per-layer mask operations
//! - [`validation`]: Advisory document validation
//! - [`sidecar`]: Sidecar naming and the bone-list side-file
//! - [`error`]: Error, warning, and validation-result types

pub mod document;
pub mod error;
pub mod flatten;
pub mod mask;
pub mod relax;
pub mod sidecar;
pub mod validation;
pub mod weights;

// Re-export commonly used types at the crate root
pub use document::{BlendMode, Layer, Mask, SkinDocument, BASE_LAYER_NAME, DOC_VERSION};
pub use error::{
    DocError, ErrorCode, ValidationError, ValidationResult, ValidationWarning, WarningCode,
};
pub use flatten::{blend_vertex, flatten, ResolvedWeights, OPACITY_OPAQUE};
pub use relax::{heal_layer, smooth_layer, HealParams, SmoothParams, Topology};
pub use sidecar::{sanitize_mesh_name, sidecar_file_name, BoneListFile, SIDECAR_EXTENSION};
pub use validation::validate_document;
pub use weights::{
    prune, renormalize, round6, BoneId, BoneWeights, VertId, WeightMap, WEIGHT_EPSILON,
};
