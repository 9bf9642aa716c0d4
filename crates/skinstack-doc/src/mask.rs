//! Per-layer mask operations.
//!
//! A mask restricts which vertices a layer's blend applies to, keyed by bone
//! id. An absent mask, a disabled mask, and an empty mask object all leave
//! the layer unmasked — flattening, relaxation, and paint-commit gating go
//! through [`Layer::active_mask_union`] so the three cases stay consistent.

use std::collections::BTreeSet;

use crate::document::{Layer, Mask};
use crate::weights::{BoneId, VertId};

impl Layer {
    /// Attaches an empty mask to the layer if none exists, enabling it.
    /// Returns false (no-op) when a mask is already present.
    pub fn add_mask(&mut self) -> bool {
        if self.mask.is_some() {
            return false;
        }
        self.mask = Some(Mask::new());
        self.mask_enabled = true;
        true
    }

    /// Removes the mask and resets the enable gate to its default.
    pub fn remove_mask(&mut self) {
        self.mask = None;
        self.mask_enabled = true;
    }

    /// Flips whether an existing mask is honored, without touching its
    /// contents.
    pub fn set_mask_enabled(&mut self, enabled: bool) {
        self.mask_enabled = enabled;
    }

    /// Adds or removes vertices from the set keyed by `bone`.
    ///
    /// Auto-creates the mask (enabled) when absent and `remove` is false; a
    /// removal against a layer with no mask is a no-op returning false. A
    /// per-bone set that becomes empty is deleted outright.
    pub fn update_mask(&mut self, bone: BoneId, verts: &[VertId], remove: bool) -> bool {
        if self.mask.is_none() {
            if remove {
                return false;
            }
            self.mask_enabled = true;
        }
        let mask = self.mask.get_or_insert_with(Mask::new);
        let set = mask.entry(bone).or_default();
        if remove {
            for v in verts {
                set.remove(v);
            }
        } else {
            set.extend(verts.iter().copied());
        }
        if set.is_empty() {
            mask.remove(&bone);
        }
        true
    }

    /// The masked vertices for one bone; empty when the bone has no entry or
    /// the layer has no mask.
    pub fn mask_vertices_for_bone(&self, bone: BoneId) -> Vec<VertId> {
        self.mask
            .as_ref()
            .and_then(|m| m.get(&bone))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The union of all masked vertices across every bone, when the mask is
    /// actually in force.
    ///
    /// Returns `None` when the layer is unmasked: no mask object, mask
    /// disabled, or an empty mask object (which the compositor treats as no
    /// restriction).
    pub fn active_mask_union(&self) -> Option<BTreeSet<VertId>> {
        let mask = self.mask.as_ref()?;
        if !self.mask_enabled || mask.is_empty() {
            return None;
        }
        let mut union = BTreeSet::new();
        for verts in mask.values() {
            union.extend(verts.iter().copied());
        }
        Some(union)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_mask_once() {
        let mut layer = Layer::new("L");
        assert!(layer.add_mask());
        assert!(layer.mask.is_some());
        assert!(layer.mask_enabled);
        // Second add is a no-op.
        layer.update_mask(3, &[1, 2], false);
        assert!(!layer.add_mask());
        assert_eq!(layer.mask_vertices_for_bone(3), vec![1, 2]);
    }

    #[test]
    fn test_remove_mask_resets_gate() {
        let mut layer = Layer::new("L");
        layer.add_mask();
        layer.set_mask_enabled(false);
        layer.remove_mask();
        assert!(layer.mask.is_none());
        assert!(layer.mask_enabled);
    }

    #[test]
    fn test_update_mask_autocreates_and_prunes_empty_bone() {
        let mut layer = Layer::new("L");
        assert!(layer.update_mask(5, &[10, 11], false));
        assert_eq!(layer.mask_vertices_for_bone(5), vec![10, 11]);

        assert!(layer.update_mask(5, &[10, 11], true));
        assert!(layer.mask.as_ref().unwrap().is_empty());

        // Removal with no mask at all is a no-op.
        layer.remove_mask();
        assert!(!layer.update_mask(5, &[10], true));
        assert!(layer.mask.is_none());
    }

    #[test]
    fn test_active_mask_union() {
        let mut layer = Layer::new("L");
        assert!(layer.active_mask_union().is_none());

        layer.add_mask();
        // Empty mask object behaves as unmasked.
        assert!(layer.active_mask_union().is_none());

        layer.update_mask(1, &[10, 11], false);
        layer.update_mask(2, &[11, 12], false);
        let union = layer.active_mask_union().unwrap();
        assert_eq!(union.into_iter().collect::<Vec<_>>(), vec![10, 11, 12]);

        layer.set_mask_enabled(false);
        assert!(layer.active_mask_union().is_none());
    }
}
