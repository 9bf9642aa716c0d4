//! Document validation logic.
//!
//! Validation is advisory: loading never rejects a parsable document, so a
//! sidecar that drifted out of shape still opens with its data intact. The
//! CLI `validate` command and the test suites are the consumers of these
//! checks.

use std::collections::HashSet;

use crate::document::{SkinDocument, DOC_VERSION};
use crate::error::{
    ErrorCode, ValidationError, ValidationResult, ValidationWarning, WarningCode,
};

/// Tolerance for the per-vertex weight-sum check. Looser than the
/// compositor's epsilon because stored weights are rounded to 6 decimals.
const NORMALIZATION_TOLERANCE: f64 = 1e-4;

/// Validates a skin document and returns a validation result.
///
/// # Example
/// ```
/// use skinstack_doc::{SkinDocument, validate_document};
///
/// let doc = SkinDocument::new();
/// assert!(validate_document(&doc).is_ok());
/// ```
pub fn validate_document(doc: &SkinDocument) -> ValidationResult {
    let mut result = ValidationResult::default();

    validate_stack(doc, &mut result);
    validate_layer_names(doc, &mut result);
    validate_layers(doc, &mut result);
    check_warnings(doc, &mut result);

    result
}

/// Validates that the layer stack is non-empty.
fn validate_stack(doc: &SkinDocument, result: &mut ValidationResult) {
    if doc.layers.is_empty() {
        result.add_error(ValidationError::with_path(
            ErrorCode::EmptyLayerStack,
            "document has no layers; the base layer is mandatory",
            "layers",
        ));
    }
}

/// Validates layer-name uniqueness.
fn validate_layer_names(doc: &SkinDocument, result: &mut ValidationResult) {
    let mut seen: HashSet<&str> = HashSet::new();
    for (i, layer) in doc.layers.iter().enumerate() {
        if !seen.insert(layer.name.as_str()) {
            result.add_error(ValidationError::with_path(
                ErrorCode::DuplicateLayerName,
                format!("layer name '{}' appears more than once", layer.name),
                format!("layers[{}].name", i),
            ));
        }
    }
}

/// Validates opacity ranges and per-vertex weight data.
fn validate_layers(doc: &SkinDocument, result: &mut ValidationResult) {
    for (i, layer) in doc.layers.iter().enumerate() {
        if !(0.0..=1.0).contains(&layer.opacity) {
            result.add_error(ValidationError::with_path(
                ErrorCode::OpacityOutOfRange,
                format!("opacity {} is outside [0, 1]", layer.opacity),
                format!("layers[{}].opacity", i),
            ));
        }

        for (vert, bw) in &layer.weights {
            let path = format!("layers[{}].weights.{}", i, vert);
            if bw.bones.len() != bw.weights.len() {
                result.add_error(ValidationError::with_path(
                    ErrorCode::MismatchedWeightArrays,
                    format!(
                        "{} bone ids but {} weights",
                        bw.bones.len(),
                        bw.weights.len()
                    ),
                    path,
                ));
                continue;
            }
            if let Some(w) = bw.weights.iter().find(|w| **w < 0.0) {
                result.add_error(ValidationError::with_path(
                    ErrorCode::NegativeWeight,
                    format!("negative weight {}", w),
                    path,
                ));
                continue;
            }
            if !bw.is_empty() && (bw.total() - 1.0).abs() > NORMALIZATION_TOLERANCE {
                result.add_error(ValidationError::with_path(
                    ErrorCode::UnnormalizedWeights,
                    format!("weights sum to {} instead of 1.0", bw.total()),
                    path,
                ));
            }
        }
    }
}

/// Checks for warning conditions.
fn check_warnings(doc: &SkinDocument, result: &mut ValidationResult) {
    if doc.version != DOC_VERSION {
        result.add_warning(ValidationWarning::with_path(
            WarningCode::UnknownVersion,
            format!("document version '{}', expected '{}'", doc.version, DOC_VERSION),
            "version",
        ));
    }

    for (i, layer) in doc.layers.iter().enumerate() {
        let Some(mask) = &layer.mask else { continue };
        if i == 0 {
            result.add_warning(ValidationWarning::with_path(
                WarningCode::BaseLayerMask,
                "mask on the base layer is unsupported and ignored by tooling",
                format!("layers[{}].mask", i),
            ));
        }
        if mask.is_empty() && layer.mask_enabled {
            result.add_warning(ValidationWarning::with_path(
                WarningCode::EmptyMask,
                "enabled mask has no bone entries; the compositor treats it as unmasked",
                format!("layers[{}].mask", i),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::BoneWeights;

    #[test]
    fn test_default_document_is_valid() {
        let result = validate_document(&SkinDocument::new());
        assert!(result.is_ok());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_empty_stack_is_an_error() {
        let mut doc = SkinDocument::new();
        doc.layers.clear();
        let result = validate_document(&doc);
        assert!(!result.is_ok());
        assert_eq!(result.errors[0].code, ErrorCode::EmptyLayerStack);
    }

    #[test]
    fn test_duplicate_layer_names() {
        let mut doc = SkinDocument::new();
        doc.add_layer("A");
        doc.add_layer("B");
        doc.layers[2].name = "A".to_string();
        let result = validate_document(&doc);
        let dup = result
            .errors
            .iter()
            .find(|e| e.code == ErrorCode::DuplicateLayerName);
        assert!(dup.is_some());
        assert_eq!(dup.unwrap().path.as_deref(), Some("layers[2].name"));
    }

    #[test]
    fn test_opacity_out_of_range() {
        let mut doc = SkinDocument::new();
        doc.layers[0].opacity = 1.5;
        let result = validate_document(&doc);
        assert!(!result.is_ok());
        assert_eq!(result.errors[0].code, ErrorCode::OpacityOutOfRange);
    }

    #[test]
    fn test_weight_data_errors() {
        let mut doc = SkinDocument::new();
        doc.layers[0]
            .weights
            .insert(1, BoneWeights::new(vec![1, 2], vec![0.5]));
        doc.layers[0]
            .weights
            .insert(2, BoneWeights::new(vec![1, 2], vec![1.2, -0.2]));
        doc.layers[0]
            .weights
            .insert(3, BoneWeights::new(vec![1], vec![0.7]));
        let result = validate_document(&doc);
        let codes: Vec<ErrorCode> = result.errors.iter().map(|e| e.code).collect();
        assert!(codes.contains(&ErrorCode::MismatchedWeightArrays));
        assert!(codes.contains(&ErrorCode::NegativeWeight));
        assert!(codes.contains(&ErrorCode::UnnormalizedWeights));
    }

    #[test]
    fn test_rounded_weights_pass_normalization() {
        let mut doc = SkinDocument::new();
        doc.layers[0]
            .weights
            .insert(1, BoneWeights::new(vec![1, 2, 3], vec![0.333333, 0.333333, 0.333333]));
        assert!(validate_document(&doc).is_ok());
    }

    #[test]
    fn test_base_mask_and_empty_mask_warnings() {
        let mut doc = SkinDocument::new();
        doc.add_layer("Top");
        doc.layers[0].add_mask();
        doc.layers[0].update_mask(1, &[1], false);
        doc.layers[1].add_mask();
        let result = validate_document(&doc);
        assert!(result.is_ok());
        let codes: Vec<WarningCode> = result.warnings.iter().map(|w| w.code).collect();
        assert!(codes.contains(&WarningCode::BaseLayerMask));
        assert!(codes.contains(&WarningCode::EmptyMask));
    }

    #[test]
    fn test_unknown_version_warning() {
        let mut doc = SkinDocument::new();
        doc.version = "0.9".to_string();
        let result = validate_document(&doc);
        assert!(result.is_ok());
        assert_eq!(result.warnings[0].code, WarningCode::UnknownVersion);
    }
}
