//! The native skin deformer behind a trait.
//!
//! The host 3D application owns the skin deformer; this crate only specifies
//! the calls the layer tooling needs. An implementation is bound to exactly
//! one mesh and its deformer. Everything here can fail — the host scene is a
//! mutable resource the user edits concurrently with the tooling — so every
//! method returns [`HostResult`].

use skinstack_doc::{BoneId, BoneWeights, ResolvedWeights, Topology, VertId, WeightMap};

use crate::error::HostResult;

/// One bone as the deformer reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoneInfo {
    /// Display name.
    pub name: String,
    /// Deformer-local bone id, 1-indexed.
    pub id: BoneId,
    /// Scene-graph node handle.
    pub handle: u64,
    /// Handle of the parent bone's node, 0 at the root.
    pub parent_handle: u64,
}

/// Single-bone weight arithmetic the host performs on the live selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightOp {
    /// Set the bone's weight to the value.
    Set,
    /// Add the value to the bone's weight.
    Add,
    /// Subtract the value from the bone's weight.
    Subtract,
}

impl WeightOp {
    /// Returns the operation name the host protocol uses.
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightOp::Set => "set",
            WeightOp::Add => "add",
            WeightOp::Subtract => "subtract",
        }
    }
}

/// The host application's skin deformer for one mesh.
///
/// The layer tooling treats the deformer as an opaque mutable sink: it
/// injects bulk vertex → (bone, weight) assignments, reads them back, and
/// brackets the host's interactive paint / manual-edit modes. Weight
/// arithmetic (set/add/subtract, transfer, prune) stays host-side; the
/// tooling only pulls the results back into its layers.
pub trait SkinHost {
    /// Display name of the bound mesh, used to key the sidecar file.
    fn mesh_name(&self) -> &str;

    /// True while the bound mesh and its deformer are valid in the scene.
    fn is_valid(&self) -> bool;

    // --- queries ---

    /// Bones in deformer order.
    fn bones(&self) -> HostResult<Vec<BoneInfo>>;

    /// Vertex indices currently selected in the host viewport.
    fn selected_vertices(&self) -> HostResult<Vec<VertId>>;

    /// Per-vertex influences for the requested vertices. Vertices the
    /// deformer does not know are omitted from the result.
    fn vertex_weights(&self, verts: &[VertId]) -> HostResult<Vec<(VertId, BoneWeights)>>;

    /// Per-vertex influences for every vertex of the mesh.
    fn all_vertex_weights(&self) -> HostResult<Vec<(VertId, BoneWeights)>>;

    /// The mesh adjacency oracle (1-indexed).
    fn topology(&self) -> HostResult<Topology>;

    // --- mutations ---

    /// Bulk-injects a resolved weight assignment into the deformer.
    fn inject_weights(&mut self, weights: &ResolvedWeights) -> HostResult<()>;

    /// Adds bones by name, skipping names already present. Returns how many
    /// were added.
    fn add_bones(&mut self, names: &[String]) -> HostResult<usize>;

    /// Replaces the host-side vertex selection.
    fn select_vertices(&mut self, verts: &[VertId]) -> HostResult<()>;

    /// Enters the host's interactive weight-paint mode, optionally
    /// pre-selecting a bone.
    fn begin_paint(&mut self, bone: Option<BoneId>) -> HostResult<()>;

    /// Finalizes the interactive session and returns the painted per-vertex
    /// weights.
    fn commit_paint(&mut self) -> HostResult<Vec<(VertId, BoneWeights)>>;

    /// Enters the host's raw vertex-weight edit mode (no bone
    /// pre-selection).
    fn begin_manual_edit(&mut self) -> HostResult<()>;

    /// Applies single-bone weight arithmetic to the live selection.
    fn apply_weight_op(&mut self, bone: BoneId, value: f64, op: WeightOp) -> HostResult<()>;

    /// Pastes a bone → weight mapping onto the live selection.
    fn paste_weights(&mut self, weights: &WeightMap) -> HostResult<()>;

    /// Moves all weight from one bone to another across the mesh.
    fn transfer_weights(&mut self, source: BoneId, target: BoneId) -> HostResult<()>;

    /// Removes bones that influence no vertex. Returns how many were
    /// removed.
    fn remove_unused_bones(&mut self) -> HostResult<usize>;

    /// Drops influences below the threshold deformer-wide, renormalizing
    /// each affected vertex. Returns how many vertices changed.
    fn prune_weights(&mut self, threshold: f64) -> HostResult<usize>;
}
