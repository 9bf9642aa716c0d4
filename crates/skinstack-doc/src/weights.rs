//! Per-vertex bone-weight containers.
//!
//! Two representations coexist. [`BoneWeights`] is the stored form: parallel
//! bone-id / weight arrays, serialized in the sidecar as
//! `[[bone, ...], [weight, ...]]`. [`WeightMap`] is the working form: a sparse
//! bone-id → weight map that the flattening and relaxation algorithms blend
//! into before converting back.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Vertex index, 1-indexed (host application convention).
pub type VertId = u32;

/// Bone index inside the host's skin deformer, 1-indexed.
pub type BoneId = u32;

/// Sparse per-vertex accumulator: bone id to un-normalized weight.
pub type WeightMap = BTreeMap<BoneId, f64>;

/// Contributions at or below this value are dropped when post-processing a
/// blended vertex, and a vertex whose total falls below it is dropped
/// entirely.
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// Rounds a weight to the 6-decimal precision stored in sidecar files.
pub fn round6(w: f64) -> f64 {
    (w * 1e6).round() / 1e6
}

/// Removes every entry at or below `threshold`; strictly-greater entries
/// survive.
pub fn prune(map: &mut WeightMap, threshold: f64) {
    map.retain(|_, w| *w > threshold);
}

/// Rescales the map so its values sum to 1.0. Returns false (leaving the map
/// untouched) when the total is too small to renormalize.
pub fn renormalize(map: &mut WeightMap) -> bool {
    let total: f64 = map.values().sum();
    if total <= WEIGHT_EPSILON {
        return false;
    }
    let scale = 1.0 / total;
    for w in map.values_mut() {
        *w *= scale;
    }
    true
}

type RawBoneWeights = (Vec<BoneId>, Vec<f64>);

/// Parallel bone-id / weight arrays for one vertex.
///
/// Positions pair up: `bones[i]` carries `weights[i]`. An instance attached
/// to a layer is expected to be normalized (weights summing to 1.0), but the
/// container itself does not enforce that.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawBoneWeights", into = "RawBoneWeights")]
pub struct BoneWeights {
    /// Bone ids, parallel to `weights`.
    pub bones: Vec<BoneId>,
    /// Weight values, parallel to `bones`.
    pub weights: Vec<f64>,
}

impl From<RawBoneWeights> for BoneWeights {
    fn from((bones, weights): RawBoneWeights) -> Self {
        Self { bones, weights }
    }
}

impl From<BoneWeights> for RawBoneWeights {
    fn from(bw: BoneWeights) -> Self {
        (bw.bones, bw.weights)
    }
}

impl BoneWeights {
    /// Creates a new pair from parallel arrays.
    pub fn new(bones: Vec<BoneId>, weights: Vec<f64>) -> Self {
        Self { bones, weights }
    }

    /// Number of bone influences.
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    /// True when no bone influences the vertex.
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Iterates (bone, weight) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (BoneId, f64)> + '_ {
        self.bones.iter().copied().zip(self.weights.iter().copied())
    }

    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Converts to the sparse working form. A duplicated bone id keeps the
    /// last occurrence, matching map-insertion semantics.
    pub fn to_map(&self) -> WeightMap {
        self.iter().collect()
    }

    /// Builds the stored form from a sparse map, ordered by ascending bone id.
    pub fn from_map(map: &WeightMap) -> Self {
        Self {
            bones: map.keys().copied().collect(),
            weights: map.values().copied().collect(),
        }
    }

    /// Builds the stored form from a sparse map, ordered by descending weight
    /// (the order the relaxation operators persist).
    pub fn from_map_by_weight(map: &WeightMap) -> Self {
        let mut items: Vec<(BoneId, f64)> = map.iter().map(|(b, w)| (*b, *w)).collect();
        items.sort_by(|a, b| b.1.total_cmp(&a.1));
        Self {
            bones: items.iter().map(|(b, _)| *b).collect(),
            weights: items.iter().map(|(_, w)| *w).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round6() {
        assert_eq!(round6(0.1234564), 0.123456);
        assert_eq!(round6(0.1234567), 0.123457);
        assert_eq!(round6(1.0), 1.0);
    }

    #[test]
    fn test_prune_keeps_strictly_greater() {
        let mut map = WeightMap::new();
        map.insert(1, 0.02);
        map.insert(2, 0.019999);
        map.insert(3, 0.5);
        prune(&mut map, 0.02);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&3));
    }

    #[test]
    fn test_renormalize() {
        let mut map = WeightMap::new();
        map.insert(1, 0.2);
        map.insert(2, 0.6);
        assert!(renormalize(&mut map));
        assert!((map.values().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((map[&1] - 0.25).abs() < 1e-12);

        let mut tiny = WeightMap::new();
        tiny.insert(1, 1e-9);
        assert!(!renormalize(&mut tiny));
        assert_eq!(tiny[&1], 1e-9);
    }

    #[test]
    fn test_bone_weights_serde_shape() {
        let bw = BoneWeights::new(vec![3, 7], vec![0.75, 0.25]);
        let json = serde_json::to_string(&bw).unwrap();
        assert_eq!(json, "[[3,7],[0.75,0.25]]");

        let parsed: BoneWeights = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, bw);
    }

    #[test]
    fn test_to_map_duplicate_bone_keeps_last() {
        let bw = BoneWeights::new(vec![1, 1], vec![0.4, 0.6]);
        let map = bw.to_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&1], 0.6);
    }

    #[test]
    fn test_from_map_by_weight_orders_descending() {
        let mut map = WeightMap::new();
        map.insert(1, 0.1);
        map.insert(2, 0.7);
        map.insert(3, 0.2);
        let bw = BoneWeights::from_map_by_weight(&map);
        assert_eq!(bw.bones, vec![2, 3, 1]);
        assert_eq!(bw.weights, vec![0.7, 0.2, 0.1]);
    }
}
