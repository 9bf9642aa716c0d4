//! Sidecar persistence.
//!
//! One sidecar file per mesh, keyed by the sanitized mesh name, plus the
//! bone-list side-file. Persistence is deliberately forgiving: a missing or
//! unreadable sidecar loads as a fresh default document, and a failed save
//! reports `false` instead of erroring — callers must not assume the write
//! landed.

use std::fs;
use std::path::{Path, PathBuf};

use skinstack_doc::{sidecar_file_name, BoneListFile, SkinDocument};

/// Configuration for the sidecar store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding the sidecar files, created on first save.
    pub cache_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("data").join("skin_cache"),
        }
    }
}

impl StoreConfig {
    /// Creates a config rooted at the given cache directory.
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }
}

/// Filesystem store for skin documents and bone-list side-files.
#[derive(Debug, Clone)]
pub struct SidecarStore {
    config: StoreConfig,
}

impl SidecarStore {
    /// Creates a store with the given configuration.
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    /// The sidecar path for a mesh display name.
    pub fn sidecar_path(&self, mesh_name: &str) -> PathBuf {
        self.config.cache_dir.join(sidecar_file_name(mesh_name))
    }

    /// Loads the document for a mesh. A missing, unreadable, or malformed
    /// sidecar yields a fresh default document; this never errors.
    pub fn load(&self, mesh_name: &str) -> SkinDocument {
        let path = self.sidecar_path(mesh_name);
        match fs::read_to_string(&path) {
            Ok(json) => match SkinDocument::from_json(&json) {
                Ok(doc) => doc,
                Err(err) => {
                    log::warn!(
                        "sidecar {} is malformed ({}); starting from a fresh document",
                        path.display(),
                        err
                    );
                    SkinDocument::default()
                }
            },
            Err(_) => SkinDocument::default(),
        }
    }

    /// Saves the document for a mesh. Returns false on any I/O failure.
    pub fn save(&self, mesh_name: &str, doc: &SkinDocument) -> bool {
        let path = self.sidecar_path(mesh_name);
        if fs::create_dir_all(&self.config.cache_dir).is_err() {
            log::warn!("cannot create cache dir {}", self.config.cache_dir.display());
            return false;
        }
        let json = match doc.to_json_pretty() {
            Ok(json) => json,
            Err(err) => {
                log::warn!("cannot serialize document for {}: {}", mesh_name, err);
                return false;
            }
        };
        match fs::write(&path, json) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("cannot write sidecar {}: {}", path.display(), err);
                false
            }
        }
    }

    /// Copies the mesh's sidecar file verbatim to a target path.
    pub fn export(&self, mesh_name: &str, target: &Path) -> bool {
        let source = self.sidecar_path(mesh_name);
        match fs::copy(&source, target) {
            Ok(_) => true,
            Err(err) => {
                log::warn!(
                    "export of {} to {} failed: {}",
                    source.display(),
                    target.display(),
                    err
                );
                false
            }
        }
    }

    /// Reads and parses a document of the sidecar schema from an arbitrary
    /// path.
    pub fn import(&self, path: &Path) -> Option<SkinDocument> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(err) => {
                log::warn!("import from {} failed: {}", path.display(), err);
                return None;
            }
        };
        match SkinDocument::from_json(&json) {
            Ok(doc) => Some(doc),
            Err(err) => {
                log::warn!("import from {} failed to parse: {}", path.display(), err);
                None
            }
        }
    }

    /// Writes the bone-list side-file. Returns false on failure.
    pub fn save_bone_list(&self, path: &Path, bones: &[String]) -> bool {
        let file = BoneListFile::new(bones.to_vec());
        let json = match file.to_json_pretty() {
            Ok(json) => json,
            Err(_) => return false,
        };
        match fs::write(path, json) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("cannot write bone list {}: {}", path.display(), err);
                false
            }
        }
    }

    /// Reads the bone-list side-file. `None` on failure or an empty list.
    pub fn load_bone_list(&self, path: &Path) -> Option<Vec<String>> {
        let json = fs::read_to_string(path).ok()?;
        let file = BoneListFile::from_json(&json).ok()?;
        if file.bones.is_empty() {
            None
        } else {
            Some(file.bones)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use skinstack_doc::{BlendMode, BoneWeights};
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> SidecarStore {
        SidecarStore::new(StoreConfig::with_cache_dir(dir.path()))
    }

    #[test]
    fn test_load_missing_returns_default() {
        let dir = TempDir::new().unwrap();
        let doc = store(&dir).load("Never Saved");
        assert_eq!(doc, SkinDocument::default());
    }

    #[test]
    fn test_load_malformed_returns_default() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(store.sidecar_path("Broken"), "{not json").unwrap();
        assert_eq!(store.load("Broken"), SkinDocument::default());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let mut doc = SkinDocument::new();
        doc.bones = vec!["Hip".into()];
        let idx = doc.add_layer("Fix");
        let layer = doc.layer_mut(idx).unwrap();
        layer.blend_mode = BlendMode::Normal;
        layer.opacity = 0.4;
        layer
            .weights
            .insert(7, BoneWeights::new(vec![1], vec![1.0]));
        layer.update_mask(1, &[7, 8], false);

        assert!(store.save("Hero Body", &doc));
        assert!(store.sidecar_path("Hero Body").ends_with("Hero_Body.skinstack"));
        let loaded = store.load("Hero Body");
        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_export_and_import() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let doc = SkinDocument::new();
        assert!(store.save("Mesh", &doc));

        let target = dir.path().join("exported.skinstack");
        assert!(store.export("Mesh", &target));
        let imported = store.import(&target).unwrap();
        assert_eq!(imported, doc);

        // Export of a mesh that was never saved fails quietly.
        assert!(!store.export("Ghost", &dir.path().join("ghost.skinstack")));
        assert!(store.import(&dir.path().join("missing.skinstack")).is_none());
    }

    #[test]
    fn test_bone_list_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let path = dir.path().join("bones.json");
        let bones = vec!["A".to_string(), "B".to_string()];
        assert!(store.save_bone_list(&path, &bones));
        assert_eq!(store.load_bone_list(&path), Some(bones));
        assert_eq!(store.load_bone_list(&dir.path().join("nope.json")), None);
    }
}
