//! Weight flattening engine.
//!
//! Composites an ordered layer stack into one resolved vertex → bone-weight
//! mapping, ready for bulk injection into the native deformer. The stack can
//! be truncated at a UI row to reproduce "the state of the mesh up to and
//! including this layer", which is what a paint session injects before the
//! user starts painting.

use std::collections::BTreeMap;

use crate::document::{BlendMode, SkinDocument};
use crate::weights::{prune, BoneWeights, VertId, WeightMap, WEIGHT_EPSILON};

/// A fully composited weight assignment: vertex to normalized influences.
pub type ResolvedWeights = BTreeMap<VertId, BoneWeights>;

/// At or above this opacity an Overwrite layer replaces the accumulator
/// outright instead of interpolating.
pub const OPACITY_OPAQUE: f64 = 0.999;

/// Flattens the layer stack into one resolved mapping.
///
/// `up_to_ui_index` truncates the stack to the layers up to and including
/// the given UI row; `None` processes the entire stack.
///
/// Returns `None` when there is nothing to composite (empty stack, or a
/// truncation row that does not exist) — callers must treat this as "nothing
/// to inject", not as zero weights. A stack whose truncated range contains
/// no enabled layer yields `Some` of an empty mapping.
///
/// The compositing algorithm:
///
/// 1. The first enabled layer in storage order seeds the accumulator with a
///    direct copy of its weights.
/// 2. Each later enabled, non-blank layer blends its vertices in according
///    to its blend mode and opacity, restricted to its mask union when a
///    non-empty mask is enabled.
/// 3. Every vertex is post-processed: contributions at or below 1e-6 drop,
///    vertices whose total falls below 1e-6 drop entirely, and the survivors
///    rescale to sum exactly 1.0.
pub fn flatten(doc: &SkinDocument, up_to_ui_index: Option<usize>) -> Option<ResolvedWeights> {
    if doc.layers.is_empty() {
        return None;
    }
    let count = match up_to_ui_index {
        Some(ui) => doc.data_index(ui)? + 1,
        None => doc.layers.len(),
    };
    let target = &doc.layers[..count];

    let start = match target.iter().position(|l| l.enabled) {
        Some(i) => i,
        None => return Some(ResolvedWeights::new()),
    };

    // Seed from the base contributor: direct copy, no blending.
    let mut accum: BTreeMap<VertId, WeightMap> = target[start]
        .weights
        .iter()
        .map(|(v, bw)| (*v, bw.to_map()))
        .collect();

    for layer in &target[start + 1..] {
        if !layer.enabled || layer.is_blank() {
            continue;
        }
        let mask_union = layer.active_mask_union();
        for (vert, bw) in &layer.weights {
            if let Some(ref union) = mask_union {
                if !union.contains(vert) {
                    continue;
                }
            }
            let entry = accum.entry(*vert).or_default();
            blend_vertex(entry, &bw.to_map(), layer.blend_mode, layer.opacity);
        }
    }

    let mut resolved = ResolvedWeights::new();
    for (vert, mut map) in accum {
        prune(&mut map, WEIGHT_EPSILON);
        let total: f64 = map.values().sum();
        if total < WEIGHT_EPSILON {
            continue;
        }
        let scale = 1.0 / total;
        for w in map.values_mut() {
            *w *= scale;
        }
        resolved.insert(vert, BoneWeights::from_map(&map));
    }
    Some(resolved)
}

/// Blends one vertex's incoming weights into the running accumulator.
pub fn blend_vertex(accum: &mut WeightMap, incoming: &WeightMap, mode: BlendMode, opacity: f64) {
    match mode {
        BlendMode::Overwrite if opacity >= OPACITY_OPAQUE => {
            accum.clear();
            accum.extend(incoming.iter().map(|(b, w)| (*b, *w)));
        }
        // Normal intentionally shares Overwrite's interpolation branch; the
        // two differ only in the full-replacement cutoff above.
        BlendMode::Overwrite | BlendMode::Normal => lerp_union(accum, incoming, opacity),
        BlendMode::Add => {
            for (bone, w) in incoming {
                *accum.entry(*bone).or_insert(0.0) += w * opacity;
            }
        }
        BlendMode::Subtract => {
            for (bone, w) in incoming {
                *accum.entry(*bone).or_insert(0.0) -= w * opacity;
            }
        }
    }
}

/// Per-bone linear interpolation over the union of both key sets:
/// `old * (1 - opacity) + new * opacity`.
fn lerp_union(accum: &mut WeightMap, incoming: &WeightMap, opacity: f64) {
    let bones: Vec<_> = accum.keys().chain(incoming.keys()).copied().collect();
    for bone in bones {
        let old = accum.get(&bone).copied().unwrap_or(0.0);
        let new = incoming.get(&bone).copied().unwrap_or(0.0);
        accum.insert(bone, old * (1.0 - opacity) + new * opacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SkinDocument;
    use crate::weights::BoneId;
    use pretty_assertions::assert_eq;

    fn bw(pairs: &[(BoneId, f64)]) -> BoneWeights {
        BoneWeights::new(
            pairs.iter().map(|(b, _)| *b).collect(),
            pairs.iter().map(|(_, w)| *w).collect(),
        )
    }

    fn doc_with_base(verts: &[(VertId, &[(BoneId, f64)])]) -> SkinDocument {
        let mut doc = SkinDocument::new();
        for (v, pairs) in verts {
            doc.layers[0].weights.insert(*v, bw(pairs));
        }
        doc
    }

    #[test]
    fn test_empty_stack_is_nothing_to_inject() {
        let mut doc = SkinDocument::new();
        doc.layers.clear();
        assert_eq!(flatten(&doc, None), None);
    }

    #[test]
    fn test_invalid_truncation_row_is_nothing_to_inject() {
        let doc = doc_with_base(&[(1, &[(1, 1.0)])]);
        assert_eq!(flatten(&doc, Some(4)), None);
    }

    #[test]
    fn test_all_disabled_yields_empty_mapping() {
        let mut doc = doc_with_base(&[(1, &[(1, 1.0)])]);
        doc.layers[0].enabled = false;
        let resolved = flatten(&doc, None).unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_single_layer_flatten_is_idempotent() {
        let doc = doc_with_base(&[(1, &[(1, 0.5), (2, 0.5)]), (2, &[(3, 1.0)])]);
        let first = flatten(&doc, None).unwrap();
        let second = flatten(&doc, None).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[&1], bw(&[(1, 0.5), (2, 0.5)]));
        assert_eq!(first[&2], bw(&[(3, 1.0)]));
    }

    #[test]
    fn test_single_layer_flatten_renormalizes_and_prunes() {
        let doc = doc_with_base(&[(1, &[(1, 0.5), (2, 0.3), (3, 1e-8)])]);
        let resolved = flatten(&doc, None).unwrap();
        let out = &resolved[&1];
        assert_eq!(out.bones, vec![1, 2]);
        assert!((out.total() - 1.0).abs() < 1e-9);
        assert!((out.weights[0] - 0.625).abs() < 1e-9);
    }

    #[test]
    fn test_overwrite_at_full_opacity_replaces() {
        let mut doc = doc_with_base(&[(1, &[(1, 0.7), (2, 0.3)])]);
        let idx = doc.add_layer("Top");
        let layer = doc.layer_mut(idx).unwrap();
        layer.weights.insert(1, bw(&[(5, 1.0)]));

        let resolved = flatten(&doc, None).unwrap();
        // Old bones gone: full replacement, not a union blend.
        assert_eq!(resolved[&1], bw(&[(5, 1.0)]));
    }

    #[test]
    fn test_overwrite_below_full_opacity_interpolates() {
        let mut doc = doc_with_base(&[(1, &[(1, 1.0)])]);
        let idx = doc.add_layer("Half");
        let layer = doc.layer_mut(idx).unwrap();
        layer.opacity = 0.5;
        layer.weights.insert(1, bw(&[(2, 1.0)]));

        let resolved = flatten(&doc, None).unwrap();
        assert_eq!(resolved[&1], bw(&[(1, 0.5), (2, 0.5)]));
    }

    #[test]
    fn test_normal_interpolates_even_at_full_opacity() {
        let mut doc = doc_with_base(&[(1, &[(1, 1.0)])]);
        let idx = doc.add_layer("N");
        let layer = doc.layer_mut(idx).unwrap();
        layer.blend_mode = BlendMode::Normal;
        layer.weights.insert(1, bw(&[(2, 1.0)]));

        // At opacity 1.0 the lerp lands on the incoming weights anyway, but
        // through the union path: old bone 1 lerps to 0 and gets pruned.
        let resolved = flatten(&doc, None).unwrap();
        assert_eq!(resolved[&1], bw(&[(2, 1.0)]));

        let layer = doc.layer_mut(idx).unwrap();
        layer.opacity = 0.25;
        let resolved = flatten(&doc, None).unwrap();
        assert_eq!(resolved[&1], bw(&[(1, 0.75), (2, 0.25)]));
    }

    #[test]
    fn test_two_layer_add_stack_scenario() {
        // Base {v0: bone1=1.0}, Add layer opacity 0.5 {v0: bone1=0.2}:
        // accumulator 1.0 + 0.1 = 1.1, renormalizes back to [1.0].
        let mut doc = doc_with_base(&[(0, &[(1, 1.0)])]);
        let idx = doc.add_layer("Add");
        let layer = doc.layer_mut(idx).unwrap();
        layer.blend_mode = BlendMode::Add;
        layer.opacity = 0.5;
        layer.weights.insert(0, bw(&[(1, 0.2)]));

        let resolved = flatten(&doc, None).unwrap();
        assert_eq!(resolved[&0], bw(&[(1, 1.0)]));
    }

    #[test]
    fn test_subtract_can_remove_a_vertex_entirely() {
        let mut doc = doc_with_base(&[(1, &[(1, 1.0)])]);
        let idx = doc.add_layer("Sub");
        let layer = doc.layer_mut(idx).unwrap();
        layer.blend_mode = BlendMode::Subtract;
        layer.weights.insert(1, bw(&[(1, 1.0)]));

        let resolved = flatten(&doc, None).unwrap();
        assert!(!resolved.contains_key(&1));
    }

    #[test]
    fn test_mask_gates_layer_contribution() {
        let build = |mask_enabled: bool| {
            let mut doc = doc_with_base(&[(10, &[(1, 1.0)]), (11, &[(1, 1.0)])]);
            let idx = doc.add_layer("Masked");
            let layer = doc.layer_mut(idx).unwrap();
            layer.blend_mode = BlendMode::Add;
            layer.weights.insert(10, bw(&[(5, 1.0)]));
            layer.update_mask(5, &[11], false);
            layer.set_mask_enabled(mask_enabled);
            doc
        };

        // Mask restricts to vertex 11, so the layer's vertex-10 data is
        // never applied.
        let gated = flatten(&build(true), None).unwrap();
        assert_eq!(gated[&10], bw(&[(1, 1.0)]));

        // Disabling the mask lets it through.
        let open = flatten(&build(false), None).unwrap();
        assert_eq!(open[&10], bw(&[(1, 0.5), (5, 0.5)]));
    }

    #[test]
    fn test_empty_mask_object_does_not_gate() {
        let mut doc = doc_with_base(&[(10, &[(1, 1.0)])]);
        let idx = doc.add_layer("Masked");
        let layer = doc.layer_mut(idx).unwrap();
        layer.blend_mode = BlendMode::Add;
        layer.weights.insert(10, bw(&[(5, 1.0)]));
        layer.add_mask();

        let resolved = flatten(&doc, None).unwrap();
        assert_eq!(resolved[&10], bw(&[(1, 0.5), (5, 0.5)]));
    }

    #[test]
    fn test_disabled_layer_skipped() {
        let mut doc = doc_with_base(&[(1, &[(1, 1.0)])]);
        let idx = doc.add_layer("Off");
        let layer = doc.layer_mut(idx).unwrap();
        layer.enabled = false;
        layer.weights.insert(1, bw(&[(9, 1.0)]));

        let resolved = flatten(&doc, None).unwrap();
        assert_eq!(resolved[&1], bw(&[(1, 1.0)]));
    }

    #[test]
    fn test_disabled_base_promotes_next_enabled_layer_to_seed() {
        let mut doc = doc_with_base(&[(1, &[(1, 1.0)])]);
        doc.layers[0].enabled = false;
        let idx = doc.add_layer("Seed");
        let layer = doc.layer_mut(idx).unwrap();
        // Subtract would remove weight if blended; as the seed it is copied
        // directly instead.
        layer.blend_mode = BlendMode::Subtract;
        layer.weights.insert(2, bw(&[(4, 1.0)]));

        let resolved = flatten(&doc, None).unwrap();
        assert!(!resolved.contains_key(&1));
        assert_eq!(resolved[&2], bw(&[(4, 1.0)]));
    }

    #[test]
    fn test_truncation_matches_prefix_document() {
        let mut doc = doc_with_base(&[(1, &[(1, 1.0)])]);
        for (name, bone) in [("A", 2), ("B", 3), ("C", 4)] {
            let idx = doc.add_layer(name);
            let layer = doc.layer_mut(idx).unwrap();
            layer.blend_mode = BlendMode::Add;
            layer.opacity = 0.5;
            layer.weights.insert(1, bw(&[(bone, 1.0)]));
        }

        // flatten(up to UI row k) == flatten of the document holding only
        // the first len-k stored layers.
        let len = doc.layer_count();
        for ui in 0..len {
            let truncated = flatten(&doc, Some(ui));
            let mut prefix = doc.clone();
            prefix.layers.truncate(len - ui);
            assert_eq!(truncated, flatten(&prefix, None), "ui row {}", ui);
        }
    }

    #[test]
    fn test_upper_layer_vertex_absent_from_base() {
        let mut doc = doc_with_base(&[(1, &[(1, 1.0)])]);
        let idx = doc.add_layer("Extra");
        let layer = doc.layer_mut(idx).unwrap();
        layer.blend_mode = BlendMode::Add;
        layer.weights.insert(7, bw(&[(2, 0.5)]));

        let resolved = flatten(&doc, None).unwrap();
        // Vertex 7 starts from an empty accumulator and renormalizes.
        assert_eq!(resolved[&7], bw(&[(2, 1.0)]));
    }
}
