//! One LOD level's instance storage.
//!
//! A bucket owns the full set of instances assigned to its LOD plus the
//! dense visible arrays that get uploaded to the GPU. Everything lives
//! behind a single mutex: the mutex is the cell, and the cell wraps exactly
//! the collections whose indices must stay mutually consistent.
//!
//! ## The index web
//!
//! - `instances` is dense and unordered; a record's position is its dense
//!   index, tracked externally by the group's slot directory.
//! - `visible_matrices`/`visible_colors` are the upload payload; always the
//!   same length.
//! - `visible_owner[v]` is the dense index of the record occupying visible
//!   slot `v`, so a swap-delete in the visible arrays can re-point the
//!   record whose entry moved.
//!
//! Both removals are swap-deletes, so every mutation is O(1) and the arrays
//! never hold holes.

use super::buffer::UploadBuffer;
use crate::config::InstancingConfig;
use ember_core::SlotKey;
use glam::{Mat4, Vec4};
use parking_lot::{Mutex, MutexGuard};

/// One placement of the model, stored by value in its bucket.
#[derive(Debug, Clone)]
pub(crate) struct InstanceRecord {
    /// Directory key; lets swap-deletes fix up the directory entry of
    /// whichever record they move.
    pub key: SlotKey,
    /// World transform.
    pub matrix: Mat4,
    /// RGBA tint.
    pub color: Vec4,
    /// Desired visibility. Survives detach/re-attach during LOD moves.
    pub visible: bool,
    /// Current slot in the visible arrays, `None` while hidden.
    pub visible_index: Option<u32>,
}

impl InstanceRecord {
    /// Creates a hidden record at the origin.
    pub(crate) fn new(key: SlotKey) -> Self {
        Self {
            key,
            matrix: Mat4::IDENTITY,
            color: Vec4::ONE,
            visible: false,
            visible_index: None,
        }
    }
}

/// The moved-record fixup a swap-delete asks the caller to apply to the
/// slot directory: (key of the record that moved, its new dense index).
pub(crate) type MovedRecord = Option<(SlotKey, u32)>;

/// The collections guarded by the bucket mutex.
#[derive(Debug)]
pub(crate) struct BucketState {
    /// Every instance assigned to this LOD, visible or not. Dense.
    pub instances: Vec<InstanceRecord>,
    /// Transforms of the visible instances. Dense, upload-ready.
    pub visible_matrices: Vec<Mat4>,
    /// Colors of the visible instances. Same length as the matrices.
    pub visible_colors: Vec<Vec4>,
    /// Dense index of the record occupying each visible slot.
    pub visible_owner: Vec<u32>,
    /// GPU staging, refilled lazily.
    pub upload: UploadBuffer,
    /// Set by any mutation of the visible arrays, cleared by draw.
    pub dirty: bool,
}

impl BucketState {
    fn with_config(config: &InstancingConfig) -> Self {
        Self {
            instances: Vec::with_capacity(config.instance_capacity),
            visible_matrices: Vec::with_capacity(config.visible_capacity),
            visible_colors: Vec::with_capacity(config.visible_capacity),
            visible_owner: Vec::with_capacity(config.visible_capacity),
            upload: UploadBuffer::with_capacity(config.visible_capacity),
            dirty: false,
        }
    }

    /// Appends a record and returns its dense index.
    ///
    /// A record that arrives with its visibility flag set (a LOD move of a
    /// visible instance) is immediately re-inserted into the visible
    /// arrays, so the move is invisible to the render thread's next draw.
    pub(crate) fn attach(&mut self, record: InstanceRecord) -> u32 {
        debug_assert!(record.visible_index.is_none());
        let dense = self.instances.len();
        let show = record.visible;
        self.instances.push(record);
        if show {
            self.apply_visibility(dense, true);
        }
        dense as u32
    }

    /// Detaches the record at `dense`, evicting it from the visible arrays
    /// first.
    ///
    /// Returns the record plus the directory fixup for whichever record was
    /// swapped into the freed dense slot.
    pub(crate) fn detach(&mut self, dense: usize) -> (InstanceRecord, MovedRecord) {
        self.apply_visibility(dense, false);
        let record = self.instances.swap_remove(dense);
        let moved = if dense < self.instances.len() {
            let moved = &self.instances[dense];
            if let Some(v) = moved.visible_index {
                // The moved record kept its visible slot; only the owner
                // table needs the new dense index.
                self.visible_owner[v as usize] = dense as u32;
            }
            Some((moved.key, dense as u32))
        } else {
            None
        };
        (record, moved)
    }

    /// The visibility state machine.
    ///
    /// | current slot | show  | action                                   |
    /// |--------------|-------|------------------------------------------|
    /// | `None`       | false | no-op                                    |
    /// | `None`       | true  | append to the visible arrays             |
    /// | `Some(v)`    | true  | overwrite slot `v` in place              |
    /// | `Some(v)`    | false | swap-delete slot `v`, re-point the moved |
    ///
    /// Hiding the last visible slot degenerates to a copy-onto-self, which
    /// is safe.
    pub(crate) fn apply_visibility(&mut self, dense: usize, show: bool) {
        match (self.instances[dense].visible_index, show) {
            (None, false) => {}
            (None, true) => {
                let record = &self.instances[dense];
                self.visible_matrices.push(record.matrix);
                self.visible_colors.push(record.color);
                self.visible_owner.push(dense as u32);
                self.instances[dense].visible_index = Some((self.visible_owner.len() - 1) as u32);
                self.dirty = true;
            }
            (Some(v), true) => {
                let record = &self.instances[dense];
                self.visible_matrices[v as usize] = record.matrix;
                self.visible_colors[v as usize] = record.color;
                self.dirty = true;
            }
            (Some(v), false) => {
                let v = v as usize;
                let last = self.visible_owner.len() - 1;
                // Read the owner of the last slot before the swap clobbers it.
                let moved_owner = self.visible_owner[last] as usize;
                self.visible_matrices.swap_remove(v);
                self.visible_colors.swap_remove(v);
                self.visible_owner.swap_remove(v);
                self.instances[moved_owner].visible_index = Some(v as u32);
                self.instances[dense].visible_index = None;
                self.dirty = true;
            }
        }
    }

    /// Writes a new transform, updating the visible slot in place if the
    /// record is currently shown.
    pub(crate) fn write_matrix(&mut self, dense: usize, matrix: Mat4) {
        self.instances[dense].matrix = matrix;
        if let Some(v) = self.instances[dense].visible_index {
            self.visible_matrices[v as usize] = matrix;
            self.dirty = true;
        }
    }

    /// Writes a new color, updating the visible slot in place if the record
    /// is currently shown.
    pub(crate) fn write_color(&mut self, dense: usize, color: Vec4) {
        self.instances[dense].color = color;
        if let Some(v) = self.instances[dense].visible_index {
            self.visible_colors[v as usize] = color;
            self.dirty = true;
        }
    }

    /// Repacks the upload staging if a mutation dirtied the visible arrays.
    ///
    /// Returns true if a refill happened.
    pub(crate) fn refresh_upload(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        let Self {
            upload,
            visible_matrices,
            visible_colors,
            ..
        } = self;
        upload.fill(visible_matrices, visible_colors);
        self.dirty = false;
        true
    }

    /// Asserts the index web.
    ///
    /// Called by tests after every scenario; cheap enough to call from
    /// debug assertions as well.
    pub(crate) fn check_consistency(&self) {
        assert_eq!(self.visible_matrices.len(), self.visible_colors.len());
        assert_eq!(self.visible_matrices.len(), self.visible_owner.len());

        let shown = self
            .instances
            .iter()
            .filter(|r| r.visible_index.is_some())
            .count();
        assert_eq!(shown, self.visible_owner.len());

        for (v, &owner) in self.visible_owner.iter().enumerate() {
            let record = &self.instances[owner as usize];
            assert_eq!(record.visible_index, Some(v as u32));
            assert!(record.visible);
            assert_eq!(self.visible_matrices[v], record.matrix);
            assert_eq!(self.visible_colors[v], record.color);
        }
    }
}

/// One LOD level of a model's instance group.
#[derive(Debug)]
pub(crate) struct LodBucket {
    state: Mutex<BucketState>,
}

impl LodBucket {
    /// Creates an empty bucket with the configured reservations.
    pub(crate) fn with_config(config: &InstancingConfig) -> Self {
        Self {
            state: Mutex::new(BucketState::with_config(config)),
        }
    }

    /// Locks the bucket's state.
    pub(crate) fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn state_with(count: u32) -> BucketState {
        let mut state = BucketState::with_config(&InstancingConfig::default());
        for i in 0..count {
            let mut record = InstanceRecord::new(SlotKey::new(i, 0));
            record.matrix = Mat4::from_translation(Vec3::new(i as f32, 0.0, 0.0));
            state.attach(record);
        }
        state
    }

    fn show(state: &mut BucketState, dense: usize) {
        state.instances[dense].visible = true;
        state.apply_visibility(dense, true);
    }

    fn hide(state: &mut BucketState, dense: usize) {
        state.instances[dense].visible = false;
        state.apply_visibility(dense, false);
    }

    #[test]
    fn test_show_appends_in_order() {
        let mut state = state_with(3);
        for dense in 0..3 {
            show(&mut state, dense);
        }

        assert_eq!(state.visible_owner, vec![0, 1, 2]);
        assert_eq!(state.instances[2].visible_index, Some(2));
        state.check_consistency();
    }

    #[test]
    fn test_hide_swaps_last_into_slot() {
        let mut state = state_with(3);
        for dense in 0..3 {
            show(&mut state, dense);
        }

        // Hide B: C's entry moves into slot 1.
        hide(&mut state, 1);

        assert_eq!(state.visible_matrices.len(), 2);
        assert_eq!(state.visible_matrices[1], state.instances[2].matrix);
        assert_eq!(state.visible_owner[1], 2);
        assert_eq!(state.instances[1].visible_index, None);
        assert_eq!(state.instances[2].visible_index, Some(1));
        state.check_consistency();
    }

    #[test]
    fn test_hide_last_slot_self_swap() {
        let mut state = state_with(2);
        show(&mut state, 0);
        show(&mut state, 1);

        hide(&mut state, 1);

        assert_eq!(state.visible_matrices.len(), 1);
        assert_eq!(state.instances[1].visible_index, None);
        assert_eq!(state.instances[0].visible_index, Some(0));
        state.check_consistency();
    }

    #[test]
    fn test_visibility_idempotent() {
        let mut state = state_with(1);
        show(&mut state, 0);
        let len_after_first = state.visible_matrices.len();
        show(&mut state, 0);
        assert_eq!(state.visible_matrices.len(), len_after_first);
        assert_eq!(state.instances[0].visible_index, Some(0));

        hide(&mut state, 0);
        hide(&mut state, 0);
        assert!(state.visible_matrices.is_empty());
        state.check_consistency();
    }

    #[test]
    fn test_detach_swaps_dense_and_reports_move() {
        let mut state = state_with(3);
        for dense in 0..3 {
            show(&mut state, dense);
        }
        let last_key = state.instances[2].key;

        // Remove A: C takes dense slot 0.
        let (removed, moved) = state.detach(0);

        assert_eq!(removed.key, SlotKey::new(0, 0));
        assert_eq!(moved, Some((last_key, 0)));
        assert_eq!(state.instances.len(), 2);
        assert_eq!(state.instances[0].key, last_key);
        // C stays visible and its owner entry follows the dense move.
        let v = state.instances[0].visible_index.unwrap() as usize;
        assert_eq!(state.visible_owner[v], 0);
        state.check_consistency();
    }

    #[test]
    fn test_detach_last_no_move() {
        let mut state = state_with(2);
        let (_, moved) = state.detach(1);
        assert_eq!(moved, None);
        assert_eq!(state.instances.len(), 1);
        state.check_consistency();
    }

    #[test]
    fn test_write_matrix_updates_visible_slot() {
        let mut state = state_with(2);
        show(&mut state, 1);
        let moved = Mat4::from_translation(Vec3::splat(5.0));

        state.write_matrix(1, moved);
        assert_eq!(state.visible_matrices[0], moved);

        // Hidden records update silently.
        state.dirty = false;
        state.write_matrix(0, moved);
        assert!(!state.dirty);
        state.check_consistency();
    }

    #[test]
    fn test_refresh_upload_is_lazy() {
        let mut state = state_with(2);
        show(&mut state, 0);

        assert!(state.refresh_upload());
        assert!(!state.refresh_upload());
        assert_eq!(state.upload.len(), 1);

        state.write_color(0, Vec4::ZERO);
        assert!(state.refresh_upload());
        assert_eq!(state.upload.refill_count(), 2);
    }

    #[test]
    fn test_attach_restores_visibility() {
        let mut state = state_with(1);
        let mut record = InstanceRecord::new(SlotKey::new(9, 3));
        record.visible = true;

        let dense = state.attach(record) as usize;
        assert_eq!(state.instances[dense].visible_index, Some(0));
        assert_eq!(state.visible_matrices.len(), 1);
        state.check_consistency();
    }
}
