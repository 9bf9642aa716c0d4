//! Test fixture utilities for building hosts, topologies, and controllers.

use tempfile::TempDir;

use skinstack_doc::{BoneId, BoneWeights, Topology, VertId};
use skinstack_host::MemoryHost;
use skinstack_session::{SidecarStore, SkinLayerController, StoreConfig};

/// Bone names every fixture host carries, in id order (Hip=1, Spine=2,
/// Head=3).
pub const FIXTURE_BONES: [&str; 3] = ["Hip", "Spine", "Head"];

/// Shorthand for building a [`BoneWeights`] pair from (bone, weight) tuples.
pub fn bw(pairs: &[(BoneId, f64)]) -> BoneWeights {
    BoneWeights::new(
        pairs.iter().map(|(b, _)| *b).collect(),
        pairs.iter().map(|(_, w)| *w).collect(),
    )
}

/// A linear-strip topology: vertex v neighbors v-1 and v+1.
pub fn strip_topology(vertex_count: usize) -> Topology {
    let adjacency = (1..=vertex_count as VertId)
        .map(|v| {
            let mut neighbors = Vec::new();
            if v > 1 {
                neighbors.push(v - 1);
            }
            if (v as usize) < vertex_count {
                neighbors.push(v + 1);
            }
            neighbors
        })
        .collect();
    Topology::from_adjacency(adjacency)
}

/// A host with the fixture bone table and the given per-vertex weights.
pub fn skinned_host(mesh_name: &str, verts: &[(VertId, &[(BoneId, f64)])]) -> MemoryHost {
    let mut host = MemoryHost::new(mesh_name).with_bones(&FIXTURE_BONES);
    for (vert, pairs) in verts {
        host.set_vertex_weights(*vert, bw(pairs));
    }
    host
}

/// A project fixture holding the sidecar cache directory.
pub struct ProjectFixture {
    root: TempDir,
}

impl ProjectFixture {
    /// Creates an empty project with a temp cache directory.
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// A store over the project's cache directory.
    pub fn store(&self) -> SidecarStore {
        SidecarStore::new(StoreConfig::with_cache_dir(self.root.path()))
    }

    /// The cache directory path.
    pub fn path(&self) -> &std::path::Path {
        self.root.path()
    }

    /// Binds a controller over this project's store.
    pub fn controller(&self, host: MemoryHost) -> SkinLayerController<MemoryHost> {
        SkinLayerController::new(self.store(), host).expect("Failed to bind controller")
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}
