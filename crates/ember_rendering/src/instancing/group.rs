//! Per-model instance group: routing, LOD migration and the draw pass.
//!
//! A group owns one [`LodBucket`] per LOD level of its model plus a slot
//! directory mapping every live instance key to its current position
//! (bucket, dense index). The directory is the only structure shared across
//! buckets, and the lock order is always directory before bucket.
//!
//! ## Locking
//!
//! - Field writes (matrix/color/visibility) take the directory **read**
//!   lock to resolve the key, then the one bucket mutex.
//! - Structural changes (create, remove, LOD migration, bulk transfer)
//!   take the directory **write** lock; it serializes them, so touching two
//!   buckets in sequence cannot deadlock.
//! - `draw` takes bucket mutexes only, one at a time, and must be called
//!   from a single render thread.

use super::bucket::{BucketState, InstanceRecord, LodBucket};
use super::instance::ModelInstance;
use crate::bounds::Aabb;
use crate::config::InstancingConfig;
use crate::model::RenderModel;
use crate::queue::RenderQueue;
use ember_core::{SlotDirectory, SlotKey};
use glam::{Mat4, Vec4};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, trace};

/// Where a live instance currently sits.
#[derive(Debug, Clone, Copy)]
struct Location {
    /// LOD level requested by the caller, unclamped.
    lod_level: u32,
    /// Bucket currently holding the record.
    bucket: u32,
    /// Dense index within that bucket's instance array.
    dense: u32,
}

/// Statistics from one draw pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrawStats {
    /// Batches submitted (one per non-empty LOD).
    pub batches: u32,
    /// Instances across all submitted batches.
    pub instances: u32,
    /// Upload buffers that had to be repacked this pass.
    pub refills: u32,
}

/// All placements of one shared model, batched per LOD.
///
/// Simulation threads create and mutate instances through
/// [`ModelInstance`] handles; the render thread calls [`draw`](Self::draw).
/// The group is the unique owner of its storage; handles keep the shared
/// state alive, so dropping the group while handles exist is safe.
pub struct ModelInstanceGroup {
    /// State shared with the outstanding instance handles.
    shared: Arc<GroupShared>,
}

/// The storage behind a group and all of its handles.
pub(crate) struct GroupShared {
    /// The shared model being placed.
    model: RenderModel,
    /// One bucket per LOD level, index = LOD.
    buckets: Vec<LodBucket>,
    /// Key-to-position directory for every live instance.
    directory: RwLock<SlotDirectory<Location>>,
}

impl ModelInstanceGroup {
    /// Creates a group with default capacities.
    #[must_use]
    pub fn new(model: RenderModel) -> Self {
        Self::with_config(model, &InstancingConfig::default())
    }

    /// Creates a group with configured per-bucket reservations.
    #[must_use]
    pub fn with_config(model: RenderModel, config: &InstancingConfig) -> Self {
        let buckets = (0..model.lod_count())
            .map(|_| LodBucket::with_config(config))
            .collect();
        Self {
            shared: Arc::new(GroupShared {
                model,
                buckets,
                directory: RwLock::new(SlotDirectory::new()),
            }),
        }
    }

    /// Returns the model this group places.
    #[must_use]
    pub fn model(&self) -> &RenderModel {
        &self.shared.model
    }

    /// Returns the number of LOD buckets.
    #[must_use]
    pub fn lod_count(&self) -> u32 {
        self.shared.lod_count()
    }

    /// Returns the number of live instances across all LODs.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.shared.directory.read().len()
    }

    /// Returns the number of visible instances at one LOD.
    ///
    /// # Panics
    ///
    /// Panics if `lod` is out of range.
    #[must_use]
    pub fn visible_count(&self, lod: u32) -> usize {
        assert!(lod < self.lod_count(), "LOD {lod} out of range");
        self.shared.buckets[lod as usize]
            .lock()
            .visible_matrices
            .len()
    }

    /// Creates a new instance at `lod`, hidden, at the origin.
    ///
    /// # Panics
    ///
    /// Panics if `lod` is out of range for the model.
    #[must_use]
    pub fn make_instance(&self, lod: u32) -> ModelInstance {
        let shared = &self.shared;
        assert!(
            lod < shared.lod_count(),
            "LOD {lod} out of range for model '{}' ({} LODs)",
            shared.model.name(),
            shared.lod_count()
        );
        let mut directory = shared.directory.write();
        let key = directory.insert(Location {
            lod_level: lod,
            bucket: lod,
            dense: 0,
        });
        let dense = shared.buckets[lod as usize]
            .lock()
            .attach(InstanceRecord::new(key));
        directory
            .get_mut(key)
            .expect("freshly inserted key resolves")
            .dense = dense;
        trace!(model = shared.model.name(), key = ?key, lod, "instance created");
        ModelInstance::new(Arc::clone(shared), key)
    }

    /// Bulk-moves every instance of one LOD into another, preserving each
    /// instance's visibility flag.
    ///
    /// Records are detached and re-attached through the normal paths rather
    /// than memcpy'd, so every index invariant is re-established as they
    /// land. The moved instances' LOD level becomes `into_lod`.
    ///
    /// # Panics
    ///
    /// Panics if either LOD is out of range.
    pub fn take_instances_from(&self, from_lod: u32, into_lod: u32) {
        let shared = &self.shared;
        assert!(from_lod < shared.lod_count(), "LOD {from_lod} out of range");
        assert!(into_lod < shared.lod_count(), "LOD {into_lod} out of range");
        if from_lod == into_lod {
            return;
        }
        let mut directory = shared.directory.write();
        let mut records = Vec::new();
        {
            let mut source = shared.buckets[from_lod as usize].lock();
            // Detach from the back so no record ever moves dense slots.
            while let Some(last) = source.instances.len().checked_sub(1) {
                let (record, moved) = source.detach(last);
                debug_assert!(moved.is_none());
                records.push(record);
            }
        }
        let count = records.len();
        let mut target = shared.buckets[into_lod as usize].lock();
        for record in records {
            let key = record.key;
            let dense = target.attach(record);
            let location = directory
                .get_mut(key)
                .expect("transferred record has a live key");
            location.lod_level = into_lod;
            location.bucket = into_lod;
            location.dense = dense;
        }
        debug!(
            model = shared.model.name(),
            from_lod, into_lod, count, "bulk instance transfer"
        );
    }

    /// Aggregates world-space bounds across every attached instance,
    /// visible or not.
    ///
    /// Returns `None` when the group holds no instances. Buckets are locked
    /// one at a time: the result is consistent per bucket but not a global
    /// snapshot while other threads mutate concurrently.
    #[must_use]
    pub fn calculate_bounds(&self) -> Option<Aabb> {
        self.calculate_matrix_bounds(Mat4::IDENTITY)
    }

    /// Like [`calculate_bounds`](Self::calculate_bounds) with an extra
    /// matrix applied in front of every instance transform.
    #[must_use]
    pub fn calculate_matrix_bounds(&self, view: Mat4) -> Option<Aabb> {
        let local = self.shared.model.bounding_box();
        let mut out = Aabb::empty();
        let mut any = false;
        for bucket in &self.shared.buckets {
            let state = bucket.lock();
            for record in &state.instances {
                out.expand(&local.transform(view * record.matrix));
                any = true;
            }
        }
        any.then_some(out)
    }

    /// Submits one instanced batch per LOD with visible instances.
    ///
    /// The upload staging is repacked only for buckets dirtied since their
    /// last draw. Render thread only: callers must never run two draws
    /// concurrently.
    pub fn draw<Q: RenderQueue>(&self, queue: &mut Q) -> DrawStats {
        let shared = &self.shared;
        let mut stats = DrawStats::default();
        for (lod, bucket) in shared.buckets.iter().enumerate() {
            let mut state = bucket.lock();
            let count = state.visible_matrices.len();
            if count == 0 {
                continue;
            }
            if state.refresh_upload() {
                stats.refills += 1;
            }
            queue.add_instanced_batch(
                state.upload.instances(),
                shared.model.shader_state(lod as u32),
            );
            stats.batches += 1;
            stats.instances += count as u32;
        }
        trace!(
            model = shared.model.name(),
            batches = stats.batches,
            instances = stats.instances,
            "draw"
        );
        stats
    }

    /// Asserts every cross-structure invariant.
    ///
    /// Walks all buckets and the directory; meant for tests and debugging,
    /// not the frame loop.
    pub fn check_consistency(&self) {
        self.shared.check_consistency();
    }
}

impl GroupShared {
    pub(crate) fn model(&self) -> &RenderModel {
        &self.model
    }

    fn lod_count(&self) -> u32 {
        self.buckets.len() as u32
    }

    /// Clamps a requested LOD level onto an existing bucket.
    fn route(&self, lod_level: u32) -> u32 {
        lod_level.min(self.lod_count() - 1)
    }

    /// Shows or hides an instance.
    ///
    /// If the record sits in a bucket its LOD level no longer routes to
    /// (a bulk transfer happened since the last touch), it migrates first;
    /// re-attachment restores visibility through the normal insert path, so
    /// the move is atomic as far as any observer goes.
    pub(crate) fn set_visible(&self, key: SlotKey, show: bool) {
        {
            let directory = self.directory.read();
            let location = *directory.get(key).expect("stale instance key");
            if location.bucket == self.route(location.lod_level) {
                let mut state = self.buckets[location.bucket as usize].lock();
                let dense = location.dense as usize;
                state.instances[dense].visible = show;
                state.apply_visibility(dense, show);
                return;
            }
        }
        let mut directory = self.directory.write();
        self.migrate(&mut directory, key);
        let location = *directory.get(key).expect("stale instance key");
        let mut state = self.buckets[location.bucket as usize].lock();
        let dense = location.dense as usize;
        state.instances[dense].visible = show;
        state.apply_visibility(dense, show);
    }

    /// Overwrites an instance's transform.
    pub(crate) fn set_matrix(&self, key: SlotKey, matrix: Mat4) {
        let directory = self.directory.read();
        let location = directory.get(key).expect("stale instance key");
        self.buckets[location.bucket as usize]
            .lock()
            .write_matrix(location.dense as usize, matrix);
    }

    /// Overwrites an instance's color.
    pub(crate) fn set_color(&self, key: SlotKey, color: Vec4) {
        let directory = self.directory.read();
        let location = directory.get(key).expect("stale instance key");
        self.buckets[location.bucket as usize]
            .lock()
            .write_color(location.dense as usize, color);
    }

    /// Overwrites transform and color under one lock take.
    pub(crate) fn set_transform(&self, key: SlotKey, matrix: Mat4, color: Vec4) {
        let directory = self.directory.read();
        let location = directory.get(key).expect("stale instance key");
        let mut state = self.buckets[location.bucket as usize].lock();
        state.write_matrix(location.dense as usize, matrix);
        state.write_color(location.dense as usize, color);
    }

    /// Changes an instance's LOD level, moving it between buckets.
    pub(crate) fn set_lod_level(&self, key: SlotKey, lod_level: u32) {
        let mut directory = self.directory.write();
        let location = directory.get_mut(key).expect("stale instance key");
        if location.lod_level == lod_level {
            return;
        }
        location.lod_level = lod_level;
        self.migrate(&mut directory, key);
    }

    /// Detaches an instance for good and frees its key.
    pub(crate) fn remove(&self, key: SlotKey) {
        let mut directory = self.directory.write();
        let location = directory.remove(key).expect("instance removed twice");
        let mut state = self.buckets[location.bucket as usize].lock();
        let (_, moved) = state.detach(location.dense as usize);
        drop(state);
        if let Some((moved_key, new_dense)) = moved {
            directory
                .get_mut(moved_key)
                .expect("moved record has a live key")
                .dense = new_dense;
        }
        trace!(model = self.model.name(), key = ?key, "instance removed");
    }

    /// Moves the record into the bucket its LOD level routes to.
    ///
    /// No-op when already there. Caller holds the directory write lock, so
    /// the detach/attach pair is atomic to every other mutator.
    fn migrate(&self, directory: &mut SlotDirectory<Location>, key: SlotKey) {
        let location = *directory.get(key).expect("stale instance key");
        let target = self.route(location.lod_level);
        if location.bucket == target {
            return;
        }
        let record = {
            let mut source = self.buckets[location.bucket as usize].lock();
            let (record, moved) = source.detach(location.dense as usize);
            if let Some((moved_key, new_dense)) = moved {
                directory
                    .get_mut(moved_key)
                    .expect("moved record has a live key")
                    .dense = new_dense;
            }
            record
        };
        let dense = self.buckets[target as usize].lock().attach(record);
        let location = directory.get_mut(key).expect("stale instance key");
        location.bucket = target;
        location.dense = dense;
        trace!(model = self.model.name(), key = ?key, to = target, "instance migrated");
    }

    /// Resolves a key and runs `f` against its record under the bucket lock.
    fn with_record<R>(&self, key: SlotKey, f: impl FnOnce(&BucketState, usize) -> R) -> R {
        let directory = self.directory.read();
        let location = directory.get(key).expect("stale instance key");
        let state = self.buckets[location.bucket as usize].lock();
        f(&state, location.dense as usize)
    }

    /// Returns an instance's transform.
    pub(crate) fn matrix_of(&self, key: SlotKey) -> Mat4 {
        self.with_record(key, |state, dense| state.instances[dense].matrix)
    }

    /// Returns an instance's color.
    pub(crate) fn color_of(&self, key: SlotKey) -> Vec4 {
        self.with_record(key, |state, dense| state.instances[dense].color)
    }

    /// Returns an instance's visibility flag.
    pub(crate) fn visible_of(&self, key: SlotKey) -> bool {
        self.with_record(key, |state, dense| state.instances[dense].visible)
    }

    /// Returns an instance's slot in the visible arrays, if shown.
    pub(crate) fn visible_slot_of(&self, key: SlotKey) -> Option<u32> {
        self.with_record(key, |state, dense| state.instances[dense].visible_index)
    }

    /// Returns an instance's requested LOD level.
    pub(crate) fn lod_level_of(&self, key: SlotKey) -> u32 {
        self.directory
            .read()
            .get(key)
            .expect("stale instance key")
            .lod_level
    }

    /// Returns an instance's current (bucket, dense index) position.
    pub(crate) fn location_of(&self, key: SlotKey) -> (u32, u32) {
        let directory = self.directory.read();
        let location = directory.get(key).expect("stale instance key");
        (location.bucket, location.dense)
    }

    /// Asserts every cross-structure invariant.
    pub(crate) fn check_consistency(&self) {
        let directory = self.directory.read();
        let mut accounted = 0;
        for bucket in &self.buckets {
            let state = bucket.lock();
            state.check_consistency();
            accounted += state.instances.len();
        }
        assert_eq!(accounted, directory.len());

        for (key, location) in directory.iter() {
            assert_eq!(location.bucket, self.route(location.lod_level));
            let state = self.buckets[location.bucket as usize].lock();
            assert_eq!(state.instances[location.dense as usize].key, key);
        }
    }
}
