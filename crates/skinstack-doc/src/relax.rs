//! Topology-aware relaxation operators.
//!
//! Smooth relaxes a selection toward the neighbor average; heal detects
//! weight discontinuities against the neighbor average and drops them. Both
//! operate on a single layer's stored weights, stage their changes while
//! reading the original data (so processing order never matters), and report
//! how many vertices actually changed. Re-syncing the layer from the live
//! deformer beforehand and re-flattening/injecting afterwards is the session
//! controller's job.

use std::collections::{BTreeMap, BTreeSet};

use crate::document::Layer;
use crate::weights::{round6, BoneId, BoneWeights, VertId, WeightMap, WEIGHT_EPSILON};

/// Healed contributions below this value are dropped after renormalization.
const HEAL_MIN_WEIGHT: f64 = 0.001;

/// Per-vertex adjacency oracle, 1-indexed to match host vertex ids.
///
/// `adjacency[v - 1]` lists the neighbors of vertex `v`. Vertices outside
/// the table are silently skipped by both operators — the cache is rebuilt
/// whenever the bound mesh changes, so out-of-range indices only occur
/// transiently.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    adjacency: Vec<Vec<VertId>>,
}

impl Topology {
    /// Builds the oracle from raw adjacency lists (entry 0 = vertex 1).
    pub fn from_adjacency(adjacency: Vec<Vec<VertId>>) -> Self {
        Self { adjacency }
    }

    /// Number of vertices covered by the table.
    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    /// True when the oracle covers no vertices.
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Neighbors of a 1-indexed vertex, or `None` when the vertex lies
    /// outside the table.
    pub fn neighbors(&self, vert: VertId) -> Option<&[VertId]> {
        if vert == 0 {
            return None;
        }
        self.adjacency.get(vert as usize - 1).map(|v| v.as_slice())
    }
}

/// Tuning for the smooth operator.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothParams {
    /// Interpolation factor toward the neighbor average: 1.0 replaces the
    /// vertex outright, 0.0 leaves it unchanged.
    pub strength: f64,
    /// Maximum surviving influences per vertex, kept by descending weight.
    pub bone_limit: usize,
    /// Blended contributions at or below this value are discarded before the
    /// bone limit applies.
    pub prune_threshold: f64,
}

impl Default for SmoothParams {
    fn default() -> Self {
        Self {
            strength: 1.0,
            bone_limit: 4,
            prune_threshold: 0.02,
        }
    }
}

impl SmoothParams {
    /// Sets the interpolation strength.
    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = strength;
        self
    }

    /// Sets the per-vertex influence limit.
    pub fn with_bone_limit(mut self, bone_limit: usize) -> Self {
        self.bone_limit = bone_limit;
        self
    }

    /// Sets the prune threshold.
    pub fn with_prune_threshold(mut self, prune_threshold: f64) -> Self {
        self.prune_threshold = prune_threshold;
        self
    }
}

/// Tuning for the heal operator.
#[derive(Debug, Clone, PartialEq)]
pub struct HealParams {
    /// A bone whose neighbor average falls below this value is considered a
    /// discontinuity and dropped from the vertex.
    pub tolerance: f64,
}

impl Default for HealParams {
    fn default() -> Self {
        Self { tolerance: 0.05 }
    }
}

impl HealParams {
    /// Sets the discontinuity tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Averages the per-bone weights of the neighbors that carry any weight data
/// in the layer. Returns `None` when no neighbor has data.
fn neighbor_average(
    weights: &BTreeMap<VertId, BoneWeights>,
    neighbors: &[VertId],
) -> Option<WeightMap> {
    let mut sum = WeightMap::new();
    let mut populated = 0usize;
    for n in neighbors {
        if let Some(bw) = weights.get(n) {
            for (bone, w) in bw.iter() {
                *sum.entry(bone).or_insert(0.0) += w;
            }
            populated += 1;
        }
    }
    if populated == 0 {
        return None;
    }
    let inv = 1.0 / populated as f64;
    for w in sum.values_mut() {
        *w *= inv;
    }
    Some(sum)
}

/// Relaxes the selected vertices of a layer toward their neighbor average.
///
/// Vertices outside the layer's active mask, outside the topology table,
/// without neighbors, or whose neighbors carry no weight data are left
/// untouched. Returns the number of vertices changed.
pub fn smooth_layer(
    layer: &mut Layer,
    topology: &Topology,
    selection: &[VertId],
    params: &SmoothParams,
) -> usize {
    let mask_union = layer.active_mask_union();
    let mut staged: BTreeMap<VertId, BoneWeights> = BTreeMap::new();

    for &vert in selection {
        if let Some(ref union) = mask_union {
            if !union.contains(&vert) {
                continue;
            }
        }
        let own: WeightMap = layer
            .weights
            .get(&vert)
            .map(|bw| bw.to_map())
            .unwrap_or_default();
        let neighbors = match topology.neighbors(vert) {
            Some(n) if !n.is_empty() => n,
            _ => continue,
        };
        let avg = match neighbor_average(&layer.weights, neighbors) {
            Some(avg) => avg,
            None => continue,
        };

        let mut blended = WeightMap::new();
        let bones: BTreeSet<_> = own.keys().chain(avg.keys()).copied().collect();
        for bone in bones {
            let mine = own.get(&bone).copied().unwrap_or(0.0);
            let theirs = avg.get(&bone).copied().unwrap_or(0.0);
            let value = mine * (1.0 - params.strength) + theirs * params.strength;
            if value > params.prune_threshold {
                blended.insert(bone, value);
            }
        }

        let mut items: Vec<(BoneId, f64)> = blended.into_iter().collect();
        items.sort_by(|a, b| b.1.total_cmp(&a.1));
        items.truncate(params.bone_limit);
        let total: f64 = items.iter().map(|(_, w)| w).sum();
        if total > WEIGHT_EPSILON {
            let scale = 1.0 / total;
            staged.insert(
                vert,
                BoneWeights::new(
                    items.iter().map(|(b, _)| *b).collect(),
                    items.iter().map(|(_, w)| round6(w * scale)).collect(),
                ),
            );
        }
    }

    let changed = staged.len();
    layer.weights.extend(staged);
    changed
}

/// Detects and repairs weight discontinuities over the selection plus its
/// one-ring neighborhood.
///
/// A vertex's own per-bone weight is dirty when the neighbor average for
/// that bone falls below the tolerance; dirty bones are dropped. A vertex
/// left with no bones adopts the full neighbor average instead. Untouched
/// vertices do not count as changed. Returns the number of vertices
/// repaired.
pub fn heal_layer(
    layer: &mut Layer,
    topology: &Topology,
    selection: &[VertId],
    params: &HealParams,
) -> usize {
    let mask_union = layer.active_mask_union();

    // One-ring expansion catches boundary artifacts at the selection edge.
    let mut process: BTreeSet<VertId> = selection.iter().copied().collect();
    for &vert in selection {
        if let Some(neighbors) = topology.neighbors(vert) {
            process.extend(neighbors.iter().copied());
        }
    }

    let mut changed = 0usize;
    let mut staged: Vec<(VertId, Option<BoneWeights>)> = Vec::new();

    for vert in process {
        if let Some(ref union) = mask_union {
            if !union.contains(&vert) {
                continue;
            }
        }
        let own = match layer.weights.get(&vert) {
            Some(bw) if !bw.is_empty() => bw.to_map(),
            _ => continue,
        };
        let neighbors = match topology.neighbors(vert) {
            Some(n) if !n.is_empty() => n,
            _ => continue,
        };
        let avg = match neighbor_average(&layer.weights, neighbors) {
            Some(avg) => avg,
            None => continue,
        };

        let mut kept = WeightMap::new();
        let mut dirty = false;
        for (bone, weight) in &own {
            if avg.get(bone).copied().unwrap_or(0.0) < params.tolerance {
                dirty = true;
            } else {
                kept.insert(*bone, *weight);
            }
        }
        if !dirty {
            continue;
        }
        if kept.is_empty() {
            kept = avg;
        }

        let total: f64 = kept.values().sum();
        let mut repaired = BoneWeights::default();
        if total > WEIGHT_EPSILON {
            let scale = 1.0 / total;
            let mut items: Vec<(BoneId, f64)> = kept.into_iter().collect();
            items.sort_by(|a, b| b.1.total_cmp(&a.1));
            for (bone, weight) in items {
                let scaled = weight * scale;
                if scaled > HEAL_MIN_WEIGHT {
                    repaired.bones.push(bone);
                    repaired.weights.push(round6(scaled));
                }
            }
        }
        if repaired.is_empty() {
            staged.push((vert, None));
        } else {
            staged.push((vert, Some(repaired)));
        }
        changed += 1;
    }

    for (vert, repaired) in staged {
        match repaired {
            Some(bw) => {
                layer.weights.insert(vert, bw);
            }
            None => {
                layer.weights.remove(&vert);
            }
        }
    }
    changed
}
