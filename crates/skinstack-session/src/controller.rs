//! The interactive skin-layer session controller.
//!
//! One controller per bound mesh. It owns the cached [`SkinDocument`], the
//! lazily-fetched topology cache, the single-vertex clipboard, and the
//! session state machine that brackets the host's interactive paint and
//! manual-edit modes. The host deformer arrives by injection
//! ([`SkinHost`]), so the whole surface runs unchanged against
//! `MemoryHost` in tests.
//!
//! Failure policy: host calls can fail at any time (the scene is a mutable
//! resource the user edits concurrently), so they are caught where they
//! happen, logged, and degraded to `false`/`None`/empty returns. Only the
//! session *entry* transitions roll back; a downstream failure mid-session
//! never strands the controller in `Painting`/`ManualEditing`.

use std::collections::BTreeMap;
use std::path::Path;

use skinstack_doc::{
    flatten, heal_layer, round6, smooth_layer, BlendMode, BoneId, BoneWeights, HealParams, Layer,
    ResolvedWeights, SkinDocument, SmoothParams, Topology, VertId, WeightMap,
};
use skinstack_host::{SkinHost, WeightOp};

use crate::error::SessionError;
use crate::store::SidecarStore;

/// Influences below this are dropped when pulling host weights back into a
/// layer through the sync contract.
const SYNC_MIN_WEIGHT: f64 = 1e-4;

/// The controller's interactive-session state. Transitions only happen from
/// `Idle`; the two active states are mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No interactive session.
    Idle,
    /// The host is in weight-paint mode for one layer.
    Painting,
    /// The host is in raw vertex-weight edit mode for one layer.
    ManualEditing,
}

/// Coordinates the layer document, the sidecar store, and the host deformer.
pub struct SkinLayerController<H: SkinHost> {
    store: SidecarStore,
    host: H,
    doc: SkinDocument,
    state: SessionState,
    /// UI row the active (or last explicitly targeted) session edits.
    editing_layer: Option<usize>,
    /// Restore point taken before a paint session starts.
    backup_weights: Option<ResolvedWeights>,
    /// Lazily fetched adjacency oracle, dropped on rebind.
    topology: Option<Topology>,
    /// Single-vertex copy/paste buffer.
    clipboard: WeightMap,
}

impl<H: SkinHost> SkinLayerController<H> {
    /// Binds a controller to a mesh's deformer, loading its sidecar
    /// document.
    pub fn new(store: SidecarStore, host: H) -> Result<Self, SessionError> {
        if !host.is_valid() {
            return Err(SessionError::InvalidMesh {
                name: host.mesh_name().to_string(),
            });
        }
        let doc = store.load(host.mesh_name());
        log::info!("bound to mesh '{}', document loaded", host.mesh_name());
        Ok(Self {
            store,
            host,
            doc,
            state: SessionState::Idle,
            editing_layer: None,
            backup_weights: None,
            topology: None,
            clipboard: WeightMap::new(),
        })
    }

    /// Rebinds the controller to another mesh, dropping all per-mesh caches.
    /// Refused while an interactive session is open.
    pub fn rebind(&mut self, host: H) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::SessionActive);
        }
        if !host.is_valid() {
            return Err(SessionError::InvalidMesh {
                name: host.mesh_name().to_string(),
            });
        }
        self.doc = self.store.load(host.mesh_name());
        self.host = host;
        self.topology = None;
        self.editing_layer = None;
        self.backup_weights = None;
        log::info!("rebound to mesh '{}'", self.host.mesh_name());
        Ok(())
    }

    /// The cached document.
    pub fn document(&self) -> &SkinDocument {
        &self.doc
    }

    /// The bound host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The bound host, mutably — the UI drives the host's own weight tools
    /// directly and then pulls results back through the sync contract.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True while a paint session is open.
    pub fn is_painting(&self) -> bool {
        self.state == SessionState::Painting
    }

    /// True while a manual-edit session is open.
    pub fn is_editing_manually(&self) -> bool {
        self.state == SessionState::ManualEditing
    }

    /// UI row targeted by the active session, if any.
    pub fn editing_layer(&self) -> Option<usize> {
        self.editing_layer
    }

    /// The host's current vertex selection; empty when the query fails.
    /// Cheap enough for the UI's periodic poll tick.
    pub fn selection_snapshot(&self) -> Vec<VertId> {
        self.host.selected_vertices().unwrap_or_default()
    }

    // --- persistence ---

    /// Refreshes the document's bone cache from the live deformer
    /// (best-effort) and writes the sidecar. Returns false when the write
    /// fails; the in-memory document is updated either way.
    fn persist(&mut self) -> bool {
        if let Ok(bones) = self.host.bones() {
            self.doc.bones = bones.into_iter().map(|b| b.name).collect();
        }
        self.store.save(self.host.mesh_name(), &self.doc)
    }

    /// Forces a save of the in-memory document, then copies the sidecar
    /// verbatim to a target path.
    pub fn export_document(&mut self, target: &Path) -> bool {
        self.persist();
        self.store.export(self.host.mesh_name(), target)
    }

    /// Replaces the document wholesale from an exported sidecar, pushing its
    /// bone list to the deformer first (adding any missing bones).
    pub fn import_document(&mut self, path: &Path) -> Option<&SkinDocument> {
        let doc = self.store.import(path)?;
        if !doc.bones.is_empty() {
            if let Err(err) = self.host.add_bones(&doc.bones) {
                log::warn!("could not push imported bones to the deformer: {}", err);
            }
        }
        self.doc = doc;
        self.persist();
        Some(&self.doc)
    }

    /// Writes the deformer's current bone names to a bone-list side-file.
    pub fn save_bone_list(&self, path: &Path) -> bool {
        match self.host.bones() {
            Ok(bones) => {
                let names: Vec<String> = bones.into_iter().map(|b| b.name).collect();
                self.store.save_bone_list(path, &names)
            }
            Err(err) => {
                log::warn!("cannot read bones for the side-file: {}", err);
                false
            }
        }
    }

    /// Adds the bones named in a side-file to the deformer. Returns how many
    /// were added.
    pub fn load_bone_list(&mut self, path: &Path) -> usize {
        let Some(bones) = self.store.load_bone_list(path) else {
            return 0;
        };
        match self.host.add_bones(&bones) {
            Ok(added) => added,
            Err(err) => {
                log::warn!("cannot add bones from the side-file: {}", err);
                0
            }
        }
    }

    // --- layer CRUD (UI indices) ---

    /// Appends a new empty layer at the top of the stack, de-duplicating the
    /// name, and persists.
    pub fn add_layer(&mut self, name: &str) -> &SkinDocument {
        self.doc.add_layer(name);
        self.persist();
        &self.doc
    }

    /// Removes the layer at a UI row. No-op when the row resolves to the
    /// base layer.
    pub fn remove_layer(&mut self, ui_index: usize) -> &SkinDocument {
        if let Some(data_index) = self.doc.data_index(ui_index) {
            if self.doc.remove_layer(data_index) {
                self.persist();
            }
        }
        &self.doc
    }

    /// Moves a layer between UI rows. No-op when either row resolves to the
    /// base layer.
    pub fn move_layer(&mut self, ui_from: usize, ui_to: usize) -> &SkinDocument {
        let indices = (self.doc.data_index(ui_from), self.doc.data_index(ui_to));
        if let (Some(from), Some(to)) = indices {
            if self.doc.move_layer(from, to) {
                self.persist();
            }
        }
        &self.doc
    }

    /// Renames the layer at a UI row, de-duplicating the name.
    pub fn rename_layer(&mut self, ui_index: usize, name: &str) -> &SkinDocument {
        if let Some(data_index) = self.doc.data_index(ui_index) {
            if self.doc.rename_layer(data_index, name) {
                self.persist();
            }
        }
        &self.doc
    }

    /// Sets the blend mode of the layer at a UI row.
    pub fn set_blend_mode(&mut self, ui_index: usize, mode: BlendMode) -> &SkinDocument {
        if let Some(layer) = self.doc.layer_by_ui_mut(ui_index) {
            layer.blend_mode = mode;
            self.persist();
        }
        &self.doc
    }

    /// Sets the opacity of the layer at a UI row, clamped to [0, 1].
    pub fn set_opacity(&mut self, ui_index: usize, opacity: f64) -> &SkinDocument {
        if let Some(layer) = self.doc.layer_by_ui_mut(ui_index) {
            layer.opacity = opacity.clamp(0.0, 1.0);
            self.persist();
        }
        &self.doc
    }

    /// Toggles whether the layer at a UI row participates in flattening.
    pub fn toggle_enabled(&mut self, ui_index: usize, enabled: bool) -> &SkinDocument {
        if let Some(layer) = self.doc.layer_by_ui_mut(ui_index) {
            layer.enabled = enabled;
            self.persist();
        }
        &self.doc
    }

    /// Bakes the whole stack: replaces the document with a single base layer
    /// holding the full flattened result. No-op when there is nothing to
    /// flatten.
    pub fn collapse_all(&mut self) -> &SkinDocument {
        let resolved = match self.flatten_all() {
            Some(resolved) if !resolved.is_empty() => resolved,
            _ => return &self.doc,
        };
        let mut doc = SkinDocument::new();
        doc.layers[0].weights = resolved;
        self.doc = doc;
        self.persist();
        &self.doc
    }

    // --- mask CRUD (UI indices) ---

    /// Attaches an empty mask to the layer at a UI row if none exists.
    pub fn add_mask(&mut self, ui_index: usize) -> &SkinDocument {
        if let Some(layer) = self.doc.layer_by_ui_mut(ui_index) {
            if layer.add_mask() {
                self.persist();
            }
        }
        &self.doc
    }

    /// Removes the mask from the layer at a UI row.
    pub fn remove_mask(&mut self, ui_index: usize) -> &SkinDocument {
        if let Some(layer) = self.doc.layer_by_ui_mut(ui_index) {
            if layer.mask.is_some() {
                layer.remove_mask();
                self.persist();
            }
        }
        &self.doc
    }

    /// Adds or removes vertices from the mask set of one bone on the layer
    /// at a UI row.
    pub fn update_mask(
        &mut self,
        ui_index: usize,
        bone: BoneId,
        verts: &[VertId],
        remove: bool,
    ) -> &SkinDocument {
        if let Some(layer) = self.doc.layer_by_ui_mut(ui_index) {
            if layer.update_mask(bone, verts, remove) {
                self.persist();
            }
        }
        &self.doc
    }

    /// Toggles whether the mask of the layer at a UI row is honored.
    pub fn toggle_mask_enabled(&mut self, ui_index: usize, enabled: bool) -> &SkinDocument {
        if let Some(layer) = self.doc.layer_by_ui_mut(ui_index) {
            layer.set_mask_enabled(enabled);
            self.persist();
        }
        &self.doc
    }

    /// The masked vertices for one bone of the layer at a UI row.
    pub fn mask_vertices_for_bone(&self, ui_index: usize, bone: BoneId) -> Vec<VertId> {
        self.doc
            .layer_by_ui(ui_index)
            .map(|l| l.mask_vertices_for_bone(bone))
            .unwrap_or_default()
    }

    // --- flattening and injection ---

    /// Flattens the full stack.
    pub fn flatten_all(&self) -> Option<ResolvedWeights> {
        flatten(&self.doc, None)
    }

    /// Flattens the stack up to and including a UI row.
    pub fn flatten_up_to(&self, ui_index: usize) -> Option<ResolvedWeights> {
        flatten(&self.doc, Some(ui_index))
    }

    /// Bulk-injects a resolved assignment into the deformer. An injection
    /// failure is logged, not propagated — it is not a rollback point.
    fn inject(&mut self, weights: &ResolvedWeights) -> bool {
        match self.host.inject_weights(weights) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("weight injection failed: {}", err);
                false
            }
        }
    }

    /// Flattens the full stack and injects the result, making the deformer
    /// reflect the persistent state of the document.
    pub fn apply_to_host(&mut self) -> bool {
        match self.flatten_all() {
            Some(resolved) => self.inject(&resolved),
            None => false,
        }
    }

    // --- session state machine ---

    /// Idle → Painting. Snapshots the full flatten as the restore point,
    /// injects the stack up to the target row, and asks the host to enter
    /// paint mode. A refused entry restores the snapshot and stays Idle.
    pub fn start_painting(&mut self, ui_index: usize, bone: Option<BoneId>) -> bool {
        if self.state != SessionState::Idle || !self.host.is_valid() {
            return false;
        }
        let backup = self.flatten_all().unwrap_or_default();
        let below = match self.flatten_up_to(ui_index) {
            Some(below) => below,
            None => return false,
        };
        self.backup_weights = Some(backup);
        self.inject(&below);
        match self.host.begin_paint(bone) {
            Ok(()) => {
                log::info!("paint session opened on UI row {}", ui_index);
                self.editing_layer = Some(ui_index);
                self.state = SessionState::Painting;
                true
            }
            Err(err) => {
                log::warn!("paint session refused: {}", err);
                if let Some(backup) = self.backup_weights.take() {
                    self.inject(&backup);
                }
                false
            }
        }
    }

    /// Painting → Idle. Captures the painted per-vertex weights into the
    /// target layer — gated by the layer's active mask, if any — and
    /// persists. Idempotent when no paint session is open.
    pub fn commit_painting(&mut self) -> &SkinDocument {
        if self.state != SessionState::Painting {
            return &self.doc;
        }
        let target_ui = self.editing_layer.unwrap_or(0);
        self.state = SessionState::Idle;
        self.editing_layer = None;
        self.backup_weights = None;

        let captured = match self.host.commit_paint() {
            Ok(captured) => captured,
            Err(err) => {
                log::warn!("could not capture painted weights: {}", err);
                return &self.doc;
            }
        };
        let captured = rounded(captured);

        let Some(data_index) = self.doc.data_index(target_ui) else {
            return &self.doc;
        };
        let layer = &mut self.doc.layers[data_index];
        match layer.active_mask_union() {
            Some(union) => {
                for (vert, bw) in captured {
                    if union.contains(&vert) {
                        layer.weights.insert(vert, bw);
                    }
                }
            }
            None => layer.weights = captured,
        }
        self.persist();
        log::info!("paint session committed to UI row {}", target_ui);
        &self.doc
    }

    /// Idle → ManualEditing. Injects the stack up to the target row and asks
    /// the host to enter its raw vertex-weight edit mode. Unlike painting,
    /// an empty truncated flatten aborts: there is nothing to edit against.
    pub fn enter_manual_edit(&mut self, ui_index: usize) -> bool {
        if self.state != SessionState::Idle || !self.host.is_valid() {
            return false;
        }
        let target = match self.flatten_up_to(ui_index) {
            Some(target) if !target.is_empty() => target,
            _ => return false,
        };
        self.inject(&target);
        match self.host.begin_manual_edit() {
            Ok(()) => {
                log::info!("manual edit opened on UI row {}", ui_index);
                self.editing_layer = Some(ui_index);
                self.state = SessionState::ManualEditing;
                true
            }
            Err(err) => {
                log::warn!("manual edit refused: {}", err);
                false
            }
        }
    }

    /// ManualEditing → Idle. Captures the deformer's entire weight state
    /// into the target layer — full overwrite, no mask gating, because a
    /// manual edit redefines the layer. Idempotent when no edit session is
    /// open.
    pub fn commit_manual_edit(&mut self) -> &SkinDocument {
        if self.state != SessionState::ManualEditing {
            return &self.doc;
        }
        let target_ui = self.editing_layer.unwrap_or(0);
        self.state = SessionState::Idle;
        self.editing_layer = None;
        if let Some(data_index) = self.doc.data_index(target_ui) {
            self.capture_into_layer(data_index, true);
        }
        &self.doc
    }

    /// Pulls the deformer's complete per-vertex weights into one layer by
    /// storage index, optionally persisting. This is also the first-import
    /// path that seeds a base layer from an already-skinned mesh.
    pub fn capture_into_layer(&mut self, data_index: usize, save: bool) -> bool {
        let all = match self.host.all_vertex_weights() {
            Ok(all) => all,
            Err(err) => {
                log::warn!("could not capture deformer weights: {}", err);
                return false;
            }
        };
        let Some(layer) = self.doc.layer_mut(data_index) else {
            return false;
        };
        layer.weights = rounded(all);
        if save {
            self.persist();
        }
        true
    }

    // --- sync contract ---

    /// Pulls the host's current weights for the live-selected vertices into
    /// the target layer (the active session's row, else the top row),
    /// without a formal session commit. Near-zero contributions are dropped
    /// and emptied vertex keys deleted.
    pub fn sync_layer_from_selection(&mut self) {
        let selection = match self.host.selected_vertices() {
            Ok(selection) if !selection.is_empty() => selection,
            _ => return,
        };
        let target_ui = self.editing_layer.unwrap_or(0);
        let Some(data_index) = self.doc.data_index(target_ui) else {
            return;
        };
        let bulk = match self.host.vertex_weights(&selection) {
            Ok(bulk) => bulk,
            Err(err) => {
                log::warn!("selection sync failed: {}", err);
                return;
            }
        };
        let layer = &mut self.doc.layers[data_index];
        for (vert, bw) in bulk {
            let mut bones = Vec::new();
            let mut weights = Vec::new();
            for (bone, weight) in bw.iter() {
                if weight > SYNC_MIN_WEIGHT {
                    bones.push(bone);
                    weights.push(round6(weight));
                }
            }
            if bones.is_empty() {
                layer.weights.remove(&vert);
            } else {
                layer.weights.insert(vert, BoneWeights::new(bones, weights));
            }
        }
    }

    // --- relaxation ---

    fn ensure_topology(&mut self) -> bool {
        if self.topology.is_none() {
            match self.host.topology() {
                Ok(topology) if !topology.is_empty() => self.topology = Some(topology),
                Ok(_) => return false,
                Err(err) => {
                    log::warn!("no topology available: {}", err);
                    return false;
                }
            }
        }
        true
    }

    /// Smooths the selected vertices of the targeted layer toward their
    /// neighbor average, then persists, re-flattens, and injects. Live: it
    /// does not wait for a session commit.
    pub fn apply_smooth(&mut self, ui_index: Option<usize>, params: &SmoothParams) -> bool {
        self.relax_with(ui_index, |layer, topology, selection| {
            smooth_layer(layer, topology, selection, params)
        })
    }

    /// Heals weight discontinuities over the selection plus its one-ring
    /// neighborhood, then persists, re-flattens, and injects.
    pub fn apply_heal(&mut self, ui_index: Option<usize>, params: &HealParams) -> bool {
        self.relax_with(ui_index, |layer, topology, selection| {
            heal_layer(layer, topology, selection, params)
        })
    }

    fn relax_with<F>(&mut self, ui_index: Option<usize>, op: F) -> bool
    where
        F: FnOnce(&mut Layer, &Topology, &[VertId]) -> usize,
    {
        if !self.host.is_valid() {
            return false;
        }
        let selection = match self.host.selected_vertices() {
            Ok(selection) if !selection.is_empty() => selection,
            _ => return false,
        };
        if ui_index.is_some() {
            self.editing_layer = ui_index;
        }
        if !self.ensure_topology() {
            return false;
        }
        // Operate on the latest host-side edits, not the stale layer state.
        self.sync_layer_from_selection();

        let target_ui = self.editing_layer.unwrap_or(0);
        let Some(data_index) = self.doc.data_index(target_ui) else {
            return false;
        };
        let topology = self.topology.take().unwrap_or_default();
        let changed = op(&mut self.doc.layers[data_index], &topology, &selection);
        self.topology = Some(topology);

        if changed == 0 {
            log::info!("relaxation touched no vertices");
            return false;
        }
        self.persist();
        self.apply_to_host();
        log::info!("relaxation changed {} vertices", changed);
        true
    }

    // --- weight math, presets, clipboard ---

    /// Applies single-bone weight arithmetic host-side to the live
    /// selection, then syncs the result back into the targeted layer and
    /// persists.
    pub fn apply_weight(
        &mut self,
        bone: BoneId,
        value: f64,
        op: WeightOp,
        ui_index: Option<usize>,
    ) -> bool {
        if !self.host.is_valid() {
            return false;
        }
        if ui_index.is_some() {
            self.editing_layer = ui_index;
        }
        match self.host.apply_weight_op(bone, value, op) {
            Ok(()) => {
                self.sync_layer_from_selection();
                self.persist();
                true
            }
            Err(err) => {
                log::warn!("weight operation failed: {}", err);
                false
            }
        }
    }

    /// Moves all weight host-side from one bone to another, then syncs the
    /// selection back into the targeted layer.
    pub fn transfer_weights(
        &mut self,
        source: BoneId,
        target: BoneId,
        ui_index: Option<usize>,
    ) -> bool {
        if !self.host.is_valid() {
            return false;
        }
        if ui_index.is_some() {
            self.editing_layer = ui_index;
        }
        match self.host.transfer_weights(source, target) {
            Ok(()) => {
                self.sync_layer_from_selection();
                self.persist();
                true
            }
            Err(err) => {
                log::warn!("weight transfer failed: {}", err);
                false
            }
        }
    }

    /// Copies the first selected vertex's influences into the clipboard.
    pub fn copy_vertex_weights(&mut self) -> bool {
        let selection = match self.host.selected_vertices() {
            Ok(selection) if !selection.is_empty() => selection,
            _ => return false,
        };
        let vert = selection[0];
        match self.host.vertex_weights(&[vert]) {
            Ok(bulk) => {
                self.clipboard = bulk
                    .first()
                    .map(|(_, bw)| bw.to_map())
                    .unwrap_or_default();
                if self.clipboard.is_empty() {
                    false
                } else {
                    log::info!("copied weights from vertex {}", vert);
                    true
                }
            }
            Err(err) => {
                log::warn!("copy failed: {}", err);
                false
            }
        }
    }

    /// Pastes the clipboard onto the live selection host-side, then syncs
    /// back into the targeted layer.
    pub fn paste_vertex_weights(&mut self, ui_index: Option<usize>) -> bool {
        if self.clipboard.is_empty() || !self.host.is_valid() {
            return false;
        }
        if ui_index.is_some() {
            self.editing_layer = ui_index;
        }
        let clipboard = self.clipboard.clone();
        match self.host.paste_weights(&clipboard) {
            Ok(()) => {
                self.sync_layer_from_selection();
                self.persist();
                log::info!("pasted clipboard weights");
                true
            }
            Err(err) => {
                log::warn!("paste failed: {}", err);
                false
            }
        }
    }

    // --- deformer maintenance ---

    /// Removes bones that influence no vertex. Returns the number removed,
    /// or `None` when the host call fails.
    pub fn remove_unused_bones(&mut self) -> Option<usize> {
        match self.host.remove_unused_bones() {
            Ok(removed) => {
                self.persist();
                Some(removed)
            }
            Err(err) => {
                log::warn!("bone cleanup failed: {}", err);
                None
            }
        }
    }

    /// Prunes near-zero influences deformer-wide. Returns the number of
    /// vertices changed, or `None` when the host call fails.
    pub fn prune_weights(&mut self, threshold: f64) -> Option<usize> {
        match self.host.prune_weights(threshold) {
            Ok(changed) => {
                self.sync_layer_from_selection();
                self.persist();
                Some(changed)
            }
            Err(err) => {
                log::warn!("prune failed: {}", err);
                None
            }
        }
    }
}

/// Rounds captured host weights to stored precision.
fn rounded(bulk: Vec<(VertId, BoneWeights)>) -> BTreeMap<VertId, BoneWeights> {
    bulk.into_iter()
        .map(|(vert, bw)| {
            let weights = bw.weights.iter().map(|w| round6(*w)).collect();
            (vert, BoneWeights::new(bw.bones, weights))
        })
        .collect()
}
