//! # Model Collaborator
//!
//! The batching core only needs three facts about a model: how many LOD
//! levels it has, its local-space bounds, and which shader state each LOD
//! draws with. Mesh data and file loading live elsewhere in the engine.

use crate::bounds::Aabb;

/// Opaque identifier for a compiled shader state.
///
/// Allocated by the material system; the batching core only passes it
/// through to the render queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ShaderStateId(pub u32);

/// A shared model as seen by the instance batcher.
#[derive(Debug, Clone)]
pub struct RenderModel {
    /// Debug name, used in logs only.
    name: String,
    /// Local-space bounding box around every LOD's geometry.
    bounds: Aabb,
    /// Shader state per LOD level. Length is the LOD count.
    shader_states: Vec<ShaderStateId>,
}

impl RenderModel {
    /// Creates a model description.
    ///
    /// # Arguments
    ///
    /// * `name` - Debug name for logging
    /// * `bounds` - Local-space bounding box
    /// * `shader_states` - One shader state per LOD, most detailed first
    ///
    /// # Panics
    ///
    /// Panics if `shader_states` is empty: a drawable model has at least
    /// one LOD.
    #[must_use]
    pub fn new(name: impl Into<String>, bounds: Aabb, shader_states: Vec<ShaderStateId>) -> Self {
        assert!(
            !shader_states.is_empty(),
            "a model requires at least one LOD"
        );
        Self {
            name: name.into(),
            bounds,
            shader_states,
        }
    }

    /// Returns the debug name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of LOD levels.
    #[must_use]
    pub fn lod_count(&self) -> u32 {
        u32::try_from(self.shader_states.len()).expect("LOD count exceeds u32")
    }

    /// Returns the local-space bounding box.
    #[must_use]
    pub const fn bounding_box(&self) -> Aabb {
        self.bounds
    }

    /// Returns the shader state for one LOD level.
    ///
    /// # Panics
    ///
    /// Panics if `lod` is out of range.
    #[must_use]
    pub fn shader_state(&self, lod: u32) -> ShaderStateId {
        self.shader_states[lod as usize]
    }
}
