//! In-memory host implementation.
//!
//! `MemoryHost` stands in for a live host application: it keeps a bone
//! table, per-vertex weights, a vertex selection, and an optional topology
//! table, and records interactive sessions the way the real deformer does.
//! The session controller's failure paths are reachable through the
//! `fail_next_paint` / `invalidate` hooks.

use std::collections::BTreeMap;

use skinstack_doc::{
    renormalize, BoneId, BoneWeights, ResolvedWeights, Topology, VertId, WeightMap,
    WEIGHT_EPSILON,
};

use crate::error::{HostError, HostResult};
use crate::traits::{BoneInfo, SkinHost, WeightOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    Paint,
    ManualEdit,
}

/// A scripted, deterministic [`SkinHost`] for tests and offline tooling.
#[derive(Debug)]
pub struct MemoryHost {
    mesh_name: String,
    valid: bool,
    bones: Vec<BoneInfo>,
    weights: BTreeMap<VertId, BoneWeights>,
    selection: Vec<VertId>,
    topology: Option<Topology>,
    mode: Mode,
    fail_next_paint: bool,
    injections: usize,
}

impl MemoryHost {
    /// Creates an empty host bound to a mesh name.
    pub fn new(mesh_name: impl Into<String>) -> Self {
        Self {
            mesh_name: mesh_name.into(),
            valid: true,
            bones: Vec::new(),
            weights: BTreeMap::new(),
            selection: Vec::new(),
            topology: None,
            mode: Mode::Idle,
            fail_next_paint: false,
            injections: 0,
        }
    }

    /// Adds bones by name, returning self for chaining.
    pub fn with_bones(mut self, names: &[&str]) -> Self {
        for name in names {
            self.add_bone(name);
        }
        self
    }

    /// Installs a topology table, returning self for chaining.
    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = Some(topology);
        self
    }

    /// Appends one bone and returns its id.
    pub fn add_bone(&mut self, name: &str) -> BoneId {
        let id = self.bones.len() as BoneId + 1;
        self.bones.push(BoneInfo {
            name: name.to_string(),
            id,
            handle: 1000 + id as u64,
            parent_handle: if id == 1 { 0 } else { 1000 + id as u64 - 1 },
        });
        id
    }

    /// Writes one vertex's influences directly, simulating user edits made
    /// through the host's own tools (inside or outside a session).
    pub fn set_vertex_weights(&mut self, vert: VertId, bw: BoneWeights) {
        if bw.is_empty() {
            self.weights.remove(&vert);
        } else {
            self.weights.insert(vert, bw);
        }
    }

    /// Makes the next `begin_paint` call fail, exercising rollback paths.
    pub fn fail_next_paint(&mut self) {
        self.fail_next_paint = true;
    }

    /// Marks the mesh invalid, as if it was deleted from the scene.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Number of bulk injections performed so far.
    pub fn injection_count(&self) -> usize {
        self.injections
    }

    /// True while an interactive session (paint or manual edit) is open.
    pub fn session_open(&self) -> bool {
        self.mode != Mode::Idle
    }

    fn ensure_valid(&self) -> HostResult<()> {
        if self.valid {
            Ok(())
        } else {
            Err(HostError::InvalidMesh {
                name: self.mesh_name.clone(),
            })
        }
    }

    fn ensure_bone(&self, bone: BoneId) -> HostResult<()> {
        if self.bones.iter().any(|b| b.id == bone) {
            Ok(())
        } else {
            Err(HostError::UnknownBone { bone })
        }
    }

    fn write_map(&mut self, vert: VertId, mut map: WeightMap) {
        map.retain(|_, w| *w > WEIGHT_EPSILON);
        if renormalize(&mut map) {
            self.weights.insert(vert, BoneWeights::from_map(&map));
        } else {
            self.weights.remove(&vert);
        }
    }
}

impl SkinHost for MemoryHost {
    fn mesh_name(&self) -> &str {
        &self.mesh_name
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn bones(&self) -> HostResult<Vec<BoneInfo>> {
        self.ensure_valid()?;
        Ok(self.bones.clone())
    }

    fn selected_vertices(&self) -> HostResult<Vec<VertId>> {
        self.ensure_valid()?;
        Ok(self.selection.clone())
    }

    fn vertex_weights(&self, verts: &[VertId]) -> HostResult<Vec<(VertId, BoneWeights)>> {
        self.ensure_valid()?;
        Ok(verts
            .iter()
            .filter_map(|v| self.weights.get(v).map(|bw| (*v, bw.clone())))
            .collect())
    }

    fn all_vertex_weights(&self) -> HostResult<Vec<(VertId, BoneWeights)>> {
        self.ensure_valid()?;
        Ok(self
            .weights
            .iter()
            .map(|(v, bw)| (*v, bw.clone()))
            .collect())
    }

    fn topology(&self) -> HostResult<Topology> {
        self.ensure_valid()?;
        self.topology.clone().ok_or_else(|| HostError::NoTopology {
            name: self.mesh_name.clone(),
        })
    }

    fn inject_weights(&mut self, weights: &ResolvedWeights) -> HostResult<()> {
        self.ensure_valid()?;
        self.injections += 1;
        log::debug!(
            "memory host '{}': injecting {} vertices",
            self.mesh_name,
            weights.len()
        );
        // Only the supplied vertices are touched, like the bulk injector.
        for (vert, bw) in weights {
            self.weights.insert(*vert, bw.clone());
        }
        Ok(())
    }

    fn add_bones(&mut self, names: &[String]) -> HostResult<usize> {
        self.ensure_valid()?;
        let mut added = 0;
        for name in names {
            if !self.bones.iter().any(|b| &b.name == name) {
                self.add_bone(name);
                added += 1;
            }
        }
        Ok(added)
    }

    fn select_vertices(&mut self, verts: &[VertId]) -> HostResult<()> {
        self.ensure_valid()?;
        self.selection = verts.to_vec();
        Ok(())
    }

    fn begin_paint(&mut self, bone: Option<BoneId>) -> HostResult<()> {
        self.ensure_valid()?;
        if self.fail_next_paint {
            self.fail_next_paint = false;
            return Err(HostError::PaintStartRefused {
                reason: "scripted failure".to_string(),
            });
        }
        if self.mode != Mode::Idle {
            return Err(HostError::SessionActive);
        }
        if let Some(bone) = bone {
            self.ensure_bone(bone)?;
        }
        self.mode = Mode::Paint;
        Ok(())
    }

    fn commit_paint(&mut self) -> HostResult<Vec<(VertId, BoneWeights)>> {
        self.ensure_valid()?;
        if self.mode != Mode::Paint {
            return Err(HostError::NoSession);
        }
        self.mode = Mode::Idle;
        self.all_vertex_weights()
    }

    fn begin_manual_edit(&mut self) -> HostResult<()> {
        self.ensure_valid()?;
        if self.mode != Mode::Idle {
            return Err(HostError::SessionActive);
        }
        self.mode = Mode::ManualEdit;
        Ok(())
    }

    fn apply_weight_op(&mut self, bone: BoneId, value: f64, op: WeightOp) -> HostResult<()> {
        self.ensure_valid()?;
        self.ensure_bone(bone)?;
        let selection = self.selection.clone();
        for vert in selection {
            let mut map = self
                .weights
                .get(&vert)
                .map(|bw| bw.to_map())
                .unwrap_or_default();
            let current = map.get(&bone).copied().unwrap_or(0.0);
            let next = match op {
                WeightOp::Set => value,
                WeightOp::Add => current + value,
                WeightOp::Subtract => current - value,
            };
            map.insert(bone, next.max(0.0));
            self.write_map(vert, map);
        }
        Ok(())
    }

    fn paste_weights(&mut self, weights: &WeightMap) -> HostResult<()> {
        self.ensure_valid()?;
        for bone in weights.keys() {
            self.ensure_bone(*bone)?;
        }
        let selection = self.selection.clone();
        for vert in selection {
            self.write_map(vert, weights.clone());
        }
        Ok(())
    }

    fn transfer_weights(&mut self, source: BoneId, target: BoneId) -> HostResult<()> {
        self.ensure_valid()?;
        self.ensure_bone(source)?;
        self.ensure_bone(target)?;
        let verts: Vec<VertId> = self.weights.keys().copied().collect();
        for vert in verts {
            let mut map = match self.weights.get(&vert) {
                Some(bw) => bw.to_map(),
                None => continue,
            };
            if let Some(moved) = map.remove(&source) {
                *map.entry(target).or_insert(0.0) += moved;
                self.write_map(vert, map);
            }
        }
        Ok(())
    }

    fn remove_unused_bones(&mut self) -> HostResult<usize> {
        self.ensure_valid()?;
        let mut used: Vec<BoneId> = Vec::new();
        for bw in self.weights.values() {
            for (bone, w) in bw.iter() {
                if w > WEIGHT_EPSILON && !used.contains(&bone) {
                    used.push(bone);
                }
            }
        }
        let before = self.bones.len();
        self.bones.retain(|b| used.contains(&b.id));
        Ok(before - self.bones.len())
    }

    fn prune_weights(&mut self, threshold: f64) -> HostResult<usize> {
        self.ensure_valid()?;
        let verts: Vec<VertId> = self.weights.keys().copied().collect();
        let mut changed = 0;
        for vert in verts {
            let map = match self.weights.get(&vert) {
                Some(bw) => bw.to_map(),
                None => continue,
            };
            let mut pruned = map.clone();
            pruned.retain(|_, w| *w >= threshold);
            if pruned.len() != map.len() {
                self.write_map(vert, pruned);
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn host() -> MemoryHost {
        let mut host = MemoryHost::new("Test Mesh").with_bones(&["Hip", "Spine", "Head"]);
        host.set_vertex_weights(1, BoneWeights::new(vec![1], vec![1.0]));
        host.set_vertex_weights(2, BoneWeights::new(vec![1, 2], vec![0.5, 0.5]));
        host
    }

    #[test]
    fn test_bone_table() {
        let host = host();
        let bones = host.bones().unwrap();
        assert_eq!(bones.len(), 3);
        assert_eq!(bones[1].name, "Spine");
        assert_eq!(bones[1].id, 2);
    }

    #[test]
    fn test_add_bones_skips_existing() {
        let mut host = host();
        let added = host
            .add_bones(&["Spine".to_string(), "Tail".to_string()])
            .unwrap();
        assert_eq!(added, 1);
        assert_eq!(host.bones().unwrap().len(), 4);
    }

    #[test]
    fn test_inject_touches_only_supplied_vertices() {
        let mut host = host();
        let mut resolved = ResolvedWeights::new();
        resolved.insert(2, BoneWeights::new(vec![3], vec![1.0]));
        host.inject_weights(&resolved).unwrap();
        assert_eq!(host.injection_count(), 1);
        let all: BTreeMap<_, _> = host.all_vertex_weights().unwrap().into_iter().collect();
        assert_eq!(all[&1], BoneWeights::new(vec![1], vec![1.0]));
        assert_eq!(all[&2], BoneWeights::new(vec![3], vec![1.0]));
    }

    #[test]
    fn test_paint_session_lifecycle() {
        let mut host = host();
        host.begin_paint(Some(2)).unwrap();
        assert!(host.session_open());
        // Re-entry is refused while a session is open.
        assert!(matches!(
            host.begin_manual_edit(),
            Err(HostError::SessionActive)
        ));
        host.set_vertex_weights(3, BoneWeights::new(vec![2], vec![1.0]));
        let painted = host.commit_paint().unwrap();
        assert!(!host.session_open());
        assert!(painted.iter().any(|(v, _)| *v == 3));
        // Nothing left to commit.
        assert!(matches!(host.commit_paint(), Err(HostError::NoSession)));
    }

    #[test]
    fn test_begin_paint_unknown_bone() {
        let mut host = host();
        assert!(matches!(
            host.begin_paint(Some(99)),
            Err(HostError::UnknownBone { bone: 99 })
        ));
        assert!(!host.session_open());
    }

    #[test]
    fn test_fail_next_paint_fires_once() {
        let mut host = host();
        host.fail_next_paint();
        assert!(host.begin_paint(None).is_err());
        assert!(host.begin_paint(None).is_ok());
    }

    #[test]
    fn test_apply_weight_op_renormalizes() {
        let mut host = host();
        host.select_vertices(&[2]).unwrap();
        host.apply_weight_op(2, 0.0, WeightOp::Set).unwrap();
        let w = host.vertex_weights(&[2]).unwrap();
        assert_eq!(w[0].1, BoneWeights::new(vec![1], vec![1.0]));
    }

    #[test]
    fn test_transfer_weights() {
        let mut host = host();
        host.transfer_weights(1, 2).unwrap();
        let all: BTreeMap<_, _> = host.all_vertex_weights().unwrap().into_iter().collect();
        assert_eq!(all[&1], BoneWeights::new(vec![2], vec![1.0]));
        assert_eq!(all[&2], BoneWeights::new(vec![2], vec![1.0]));
    }

    #[test]
    fn test_remove_unused_bones() {
        let mut host = host();
        // Head (id 3) influences nothing.
        let removed = host.remove_unused_bones().unwrap();
        assert_eq!(removed, 1);
        assert_eq!(host.bones().unwrap().len(), 2);
    }

    #[test]
    fn test_prune_weights() {
        let mut host = host();
        host.set_vertex_weights(4, BoneWeights::new(vec![1, 2], vec![0.98, 0.02]));
        let changed = host.prune_weights(0.05).unwrap();
        assert_eq!(changed, 1);
        let w = host.vertex_weights(&[4]).unwrap();
        assert_eq!(w[0].1, BoneWeights::new(vec![1], vec![1.0]));
    }

    #[test]
    fn test_invalidated_mesh_errors() {
        let mut host = host();
        host.invalidate();
        assert!(!host.is_valid());
        assert!(matches!(
            host.bones(),
            Err(HostError::InvalidMesh { .. })
        ));
    }

    #[test]
    fn test_topology_absent() {
        let host = host();
        assert!(matches!(host.topology(), Err(HostError::NoTopology { .. })));
        let host = MemoryHost::new("M").with_topology(Topology::from_adjacency(vec![vec![2]]));
        assert_eq!(host.topology().unwrap().vertex_count(), 1);
    }
}
