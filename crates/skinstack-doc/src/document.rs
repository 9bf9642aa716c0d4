//! Skin document and layer types.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::DocError;
use crate::weights::{BoneId, BoneWeights, VertId};

/// Current sidecar document version.
pub const DOC_VERSION: &str = "1.6";

/// Name given to the mandatory first layer of every document.
pub const BASE_LAYER_NAME: &str = "Base Weights";

/// Per-layer, per-bone vertex mask: bone id to the set of vertex indices the
/// layer may affect. Serialized with string bone keys and sorted vertex
/// arrays.
pub type Mask = BTreeMap<BoneId, BTreeSet<VertId>>;

/// How a layer's weights combine with the accumulated stack below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendMode {
    /// Replace (at full opacity) or linearly blend into the accumulator.
    Overwrite,
    /// Add `weight * opacity` per bone.
    Add,
    /// Subtract `weight * opacity` per bone.
    Subtract,
    /// Linear blend by opacity. Shares Overwrite's interpolation formula and
    /// applies it at every opacity, including 1.0.
    Normal,
}

impl BlendMode {
    /// Returns the blend mode as the sidecar string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlendMode::Overwrite => "Overwrite",
            BlendMode::Add => "Add",
            BlendMode::Subtract => "Subtract",
            BlendMode::Normal => "Normal",
        }
    }

    /// Returns all blend modes.
    pub fn all() -> &'static [BlendMode] {
        &[
            BlendMode::Overwrite,
            BlendMode::Add,
            BlendMode::Subtract,
            BlendMode::Normal,
        ]
    }
}

impl std::fmt::Display for BlendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BlendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Overwrite" => Ok(BlendMode::Overwrite),
            "Add" => Ok(BlendMode::Add),
            "Subtract" => Ok(BlendMode::Subtract),
            "Normal" => Ok(BlendMode::Normal),
            _ => Err(format!("unknown blend mode: {}", s)),
        }
    }
}

fn default_true() -> bool {
    true
}

/// One weighted, maskable, blendable contribution to the final per-vertex
/// bone-weight assignment.
///
/// Field order matches the sidecar schema. `enabled` and `mask_enabled`
/// default to true when absent, upgrading documents written before those
/// fields existed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Display name, unique within the document.
    pub name: String,
    /// Blend opacity in [0, 1].
    pub opacity: f64,
    /// Disabled layers are skipped entirely during flattening.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Optional per-bone vertex mask; `None` means the layer affects every
    /// vertex it defines.
    #[serde(default)]
    pub mask: Option<Mask>,
    /// Gates whether an existing mask is honored, independent of its
    /// contents.
    #[serde(default = "default_true")]
    pub mask_enabled: bool,
    /// How this layer combines with the stack below it.
    pub blend_mode: BlendMode,
    /// Per-vertex influences. Absence of a vertex key means the layer defines
    /// no contribution for that vertex.
    #[serde(default)]
    pub weights: BTreeMap<VertId, BoneWeights>,
}

impl Layer {
    /// Creates a new empty layer with default settings (Overwrite, opacity
    /// 1.0, enabled, unmasked).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            opacity: 1.0,
            enabled: true,
            mask: None,
            mask_enabled: true,
            blend_mode: BlendMode::Overwrite,
            weights: BTreeMap::new(),
        }
    }

    /// Returns the stored influences for a vertex, if the layer defines any.
    pub fn vertex(&self, vert: VertId) -> Option<&BoneWeights> {
        self.weights.get(&vert)
    }

    /// True when the layer carries no weight data.
    pub fn is_blank(&self) -> bool {
        self.weights.is_empty()
    }
}

/// The persisted skin document for one mesh: an ordered layer stack plus a
/// cached bone-name list.
///
/// Storage order is bottom-up: index 0 is the immutable base layer, the last
/// element is the top of the composite stack. UI-facing indices run the other
/// way (row 0 = top); [`SkinDocument::data_index`] is the single place that
/// transform lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinDocument {
    /// Schema version.
    pub version: String,
    /// Bone names known to the native deformer at last save. Informational
    /// cache, rebuilt on save.
    #[serde(default)]
    pub bones: Vec<String>,
    /// Ordered layer stack, base first. Never empty.
    pub layers: Vec<Layer>,
}

impl Default for SkinDocument {
    fn default() -> Self {
        Self {
            version: DOC_VERSION.to_string(),
            bones: Vec::new(),
            layers: vec![Layer::new(BASE_LAYER_NAME)],
        }
    }
}

impl SkinDocument {
    /// Creates a fresh document with one empty base layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of layers in the stack.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Maps a UI row index (0 = top of stack) to a storage index (0 = base).
    /// Returns `None` when the row does not exist.
    pub fn data_index(&self, ui_index: usize) -> Option<usize> {
        let len = self.layers.len();
        if ui_index < len {
            Some(len - 1 - ui_index)
        } else {
            None
        }
    }

    /// Maps a storage index back to its UI row. Same involution as
    /// [`SkinDocument::data_index`].
    pub fn ui_index(&self, data_index: usize) -> Option<usize> {
        self.data_index(data_index)
    }

    /// Returns the layer at a storage index.
    pub fn layer(&self, data_index: usize) -> Option<&Layer> {
        self.layers.get(data_index)
    }

    /// Returns the layer at a storage index, mutably.
    pub fn layer_mut(&mut self, data_index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(data_index)
    }

    /// Returns the layer shown at a UI row.
    pub fn layer_by_ui(&self, ui_index: usize) -> Option<&Layer> {
        self.data_index(ui_index).and_then(|i| self.layers.get(i))
    }

    /// Returns the layer shown at a UI row, mutably.
    pub fn layer_by_ui_mut(&mut self, ui_index: usize) -> Option<&mut Layer> {
        let idx = self.data_index(ui_index)?;
        self.layers.get_mut(idx)
    }

    /// The base layer.
    pub fn base(&self) -> &Layer {
        &self.layers[0]
    }

    /// Derives a layer name not yet taken, appending " 1", " 2", ... to the
    /// requested name until it is unique.
    pub fn unique_layer_name(&self, want: &str) -> String {
        let taken: BTreeSet<&str> = self.layers.iter().map(|l| l.name.as_str()).collect();
        if !taken.contains(want) {
            return want.to_string();
        }
        let mut counter = 1;
        loop {
            let candidate = format!("{} {}", want, counter);
            if !taken.contains(candidate.as_str()) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Appends a new empty layer at the top of the stack (end of storage
    /// order), de-duplicating the name. Returns the storage index of the new
    /// layer.
    pub fn add_layer(&mut self, name: &str) -> usize {
        let unique = self.unique_layer_name(name);
        self.layers.push(Layer::new(unique));
        self.layers.len() - 1
    }

    /// Removes the layer at a storage index. No-op returning false when the
    /// index is the base layer or out of range.
    pub fn remove_layer(&mut self, data_index: usize) -> bool {
        if data_index == 0 || data_index >= self.layers.len() {
            return false;
        }
        self.layers.remove(data_index);
        true
    }

    /// Moves a layer from one storage index to another, preserving all other
    /// order. No-op returning false when either index is the base layer or
    /// out of range.
    pub fn move_layer(&mut self, from_data: usize, to_data: usize) -> bool {
        let len = self.layers.len();
        if from_data == 0 || to_data == 0 || from_data >= len || to_data >= len {
            return false;
        }
        let layer = self.layers.remove(from_data);
        self.layers.insert(to_data, layer);
        true
    }

    /// Renames the layer at a storage index, de-duplicating against the other
    /// layers. Returns false when the index is out of range.
    pub fn rename_layer(&mut self, data_index: usize, name: &str) -> bool {
        if data_index >= self.layers.len() {
            return false;
        }
        let taken: BTreeSet<String> = self
            .layers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != data_index)
            .map(|(_, l)| l.name.clone())
            .collect();
        let mut unique = name.to_string();
        let mut counter = 1;
        while taken.contains(&unique) {
            unique = format!("{} {}", name, counter);
            counter += 1;
        }
        self.layers[data_index].name = unique;
        true
    }

    /// Parses a document from sidecar JSON.
    pub fn from_json(json: &str) -> Result<Self, DocError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the document to pretty-printed sidecar JSON.
    pub fn to_json_pretty(&self) -> Result<String, DocError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_blend_mode_round_trip() {
        for mode in BlendMode::all() {
            let parsed: BlendMode = mode.as_str().parse().unwrap();
            assert_eq!(parsed, *mode);
        }
        assert!("Multiply".parse::<BlendMode>().is_err());
    }

    #[test]
    fn test_default_document_has_base_layer() {
        let doc = SkinDocument::default();
        assert_eq!(doc.layer_count(), 1);
        assert_eq!(doc.base().name, BASE_LAYER_NAME);
        assert_eq!(doc.base().blend_mode, BlendMode::Overwrite);
        assert_eq!(doc.base().opacity, 1.0);
        assert!(doc.base().enabled);
        assert!(doc.base().mask.is_none());
    }

    #[test]
    fn test_index_transform_is_involution() {
        let mut doc = SkinDocument::new();
        doc.add_layer("A");
        doc.add_layer("B");
        // storage: [base, A, B]; UI rows: [B, A, base]
        assert_eq!(doc.data_index(0), Some(2));
        assert_eq!(doc.data_index(2), Some(0));
        assert_eq!(doc.data_index(3), None);
        for ui in 0..3 {
            let data = doc.data_index(ui).unwrap();
            assert_eq!(doc.ui_index(data), Some(ui));
        }
    }

    #[test]
    fn test_add_layer_deduplicates_name() {
        let mut doc = SkinDocument::new();
        doc.add_layer("Detail");
        doc.add_layer("Detail");
        doc.add_layer("Detail");
        let names: Vec<&str> = doc.layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec![BASE_LAYER_NAME, "Detail", "Detail 1", "Detail 2"]);
    }

    #[test]
    fn test_remove_layer_protects_base() {
        let mut doc = SkinDocument::new();
        doc.add_layer("A");
        assert!(!doc.remove_layer(0));
        assert_eq!(doc.layer_count(), 2);
        assert!(doc.remove_layer(1));
        assert_eq!(doc.layer_count(), 1);
        assert!(!doc.remove_layer(5));
    }

    #[test]
    fn test_move_layer_protects_base() {
        let mut doc = SkinDocument::new();
        doc.add_layer("A");
        doc.add_layer("B");
        doc.add_layer("C");
        assert!(!doc.move_layer(0, 2));
        assert!(!doc.move_layer(2, 0));
        assert!(doc.move_layer(1, 3));
        let names: Vec<&str> = doc.layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec![BASE_LAYER_NAME, "B", "C", "A"]);
    }

    #[test]
    fn test_rename_layer_deduplicates() {
        let mut doc = SkinDocument::new();
        doc.add_layer("A");
        doc.add_layer("B");
        assert!(doc.rename_layer(2, "A"));
        assert_eq!(doc.layers[2].name, "A 1");
        // Renaming to its own current name keeps it.
        assert!(doc.rename_layer(1, "A"));
        assert_eq!(doc.layers[1].name, "A");
    }

    #[test]
    fn test_layer_enabled_defaults_on_when_field_missing() {
        let json = r#"{
            "name": "Old Layer",
            "opacity": 0.5,
            "mask": null,
            "blend_mode": "Add",
            "weights": {}
        }"#;
        let layer: Layer = serde_json::from_str(json).unwrap();
        assert!(layer.enabled);
        assert!(layer.mask_enabled);
        assert_eq!(layer.blend_mode, BlendMode::Add);
    }

    #[test]
    fn test_document_json_round_trip() {
        let mut doc = SkinDocument::new();
        doc.bones = vec!["Hip".into(), "Spine".into()];
        let idx = doc.add_layer("Detail");
        let layer = doc.layer_mut(idx).unwrap();
        layer.blend_mode = BlendMode::Add;
        layer.opacity = 0.35;
        layer
            .weights
            .insert(12, BoneWeights::new(vec![1, 2], vec![0.6, 0.4]));
        let mut mask = Mask::new();
        mask.insert(2, [10, 11, 12].into_iter().collect());
        layer.mask = Some(mask);

        let json = doc.to_json_pretty().unwrap();
        let parsed = SkinDocument::from_json(&json).unwrap();
        assert_eq!(parsed, doc);

        // String-keyed maps at the JSON boundary.
        assert!(json.contains("\"12\""));
        assert!(json.contains("\"2\""));
    }
}
