//! The owning handle to one placement of a model.
//!
//! A handle is the only way simulation code refers to an instance. It is
//! deliberately not `Clone`: exactly one owner exists, and dropping the
//! handle detaches the instance from its group. All mutations are `&self`
//! and thread-safe; the group's locks do the synchronization.

use super::group::GroupShared;
use crate::model::RenderModel;
use ember_core::SlotKey;
use glam::{Mat4, Vec4};
use std::sync::Arc;

/// One placement of a shared model.
///
/// Created by
/// [`ModelInstanceGroup::make_instance`](super::ModelInstanceGroup::make_instance);
/// starts hidden at the origin with a white tint. The handle keeps the
/// group's storage alive, so it outliving the group is fine.
pub struct ModelInstance {
    /// Storage this handle points into, shared with the group.
    shared: Arc<GroupShared>,
    /// Generational key, valid for this handle's whole lifetime.
    key: SlotKey,
}

impl ModelInstance {
    pub(crate) fn new(shared: Arc<GroupShared>, key: SlotKey) -> Self {
        Self { shared, key }
    }

    /// Returns the key identifying this instance inside its group.
    #[must_use]
    pub fn key(&self) -> SlotKey {
        self.key
    }

    /// Returns the model this instance places.
    #[must_use]
    pub fn model(&self) -> &RenderModel {
        self.shared.model()
    }

    /// Shows or hides this instance.
    ///
    /// Showing twice (or hiding twice) is a no-op the second time.
    pub fn set_visible(&self, show: bool) {
        self.shared.set_visible(self.key, show);
    }

    /// Sets the world transform.
    ///
    /// If the instance is visible, its upload slot is updated in place.
    pub fn set_matrix(&self, matrix: Mat4) {
        self.shared.set_matrix(self.key, matrix);
    }

    /// Sets the RGBA tint.
    pub fn set_color(&self, color: Vec4) {
        self.shared.set_color(self.key, color);
    }

    /// Sets transform and tint together, under one lock take.
    pub fn set_transform(&self, matrix: Mat4, color: Vec4) {
        self.shared.set_transform(self.key, matrix, color);
    }

    /// Moves this instance to another LOD level.
    ///
    /// Levels past the model's last LOD are clamped to it at routing time.
    /// Visibility, transform and tint survive the move.
    pub fn set_lod_level(&self, lod_level: u32) {
        self.shared.set_lod_level(self.key, lod_level);
    }

    /// Returns the visibility flag.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.shared.visible_of(self.key)
    }

    /// Returns the world transform.
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        self.shared.matrix_of(self.key)
    }

    /// Returns the RGBA tint.
    #[must_use]
    pub fn color(&self) -> Vec4 {
        self.shared.color_of(self.key)
    }

    /// Returns the requested LOD level (unclamped).
    #[must_use]
    pub fn lod_level(&self) -> u32 {
        self.shared.lod_level_of(self.key)
    }

    /// Returns the current (bucket, dense index) position. Diagnostic.
    #[must_use]
    pub fn location(&self) -> (u32, u32) {
        self.shared.location_of(self.key)
    }

    /// Returns the current slot in the visible arrays, if shown. Diagnostic.
    #[must_use]
    pub fn visible_slot(&self) -> Option<u32> {
        self.shared.visible_slot_of(self.key)
    }
}

impl std::fmt::Debug for ModelInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelInstance")
            .field("model", &self.model().name())
            .field("key", &self.key)
            .finish()
    }
}

impl Drop for ModelInstance {
    fn drop(&mut self) {
        self.shared.remove(self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::Aabb;
    use crate::instancing::ModelInstanceGroup;
    use crate::model::ShaderStateId;
    use glam::Vec3;

    fn group() -> ModelInstanceGroup {
        let bounds = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let model = RenderModel::new("prop", bounds, vec![ShaderStateId(0), ShaderStateId(1)]);
        ModelInstanceGroup::new(model)
    }

    #[test]
    fn test_handle_defaults() {
        let group = group();
        let instance = group.make_instance(0);

        assert!(!instance.is_visible());
        assert_eq!(instance.matrix(), Mat4::IDENTITY);
        assert_eq!(instance.color(), Vec4::ONE);
        assert_eq!(instance.lod_level(), 0);
        assert_eq!(instance.model().name(), "prop");
    }

    #[test]
    fn test_setters_roundtrip() {
        let group = group();
        let instance = group.make_instance(0);
        let matrix = Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0));
        let color = Vec4::new(1.0, 0.0, 0.0, 1.0);

        instance.set_transform(matrix, color);
        instance.set_visible(true);

        assert_eq!(instance.matrix(), matrix);
        assert_eq!(instance.color(), color);
        assert_eq!(instance.visible_slot(), Some(0));
    }

    #[test]
    fn test_handle_outlives_group() {
        let instance = {
            let group = group();
            group.make_instance(1)
        };
        // The group value is gone; the shared storage is not.
        instance.set_visible(true);
        assert!(instance.is_visible());
        assert_eq!(instance.location().0, 1);
    }

    #[test]
    fn test_handles_are_send() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ModelInstance>();
        assert_send_sync::<ModelInstanceGroup>();
    }
}
