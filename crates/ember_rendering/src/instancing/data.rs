//! Per-instance data uploaded to the GPU.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

/// One instance as the vertex shader sees it.
///
/// Uploaded to the instance buffer and bound with per-instance step mode.
/// Layout is column-major to match the shader's mat4 attribute.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceGpu {
    /// World transform, column-major.
    pub model: [[f32; 4]; 4],
    /// RGBA tint, linear space.
    pub color: [f32; 4],
}

impl InstanceGpu {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Packs a transform and color.
    #[must_use]
    pub fn new(matrix: Mat4, color: Vec4) -> Self {
        Self {
            model: matrix.to_cols_array_2d(),
            color: color.to_array(),
        }
    }

    /// Returns the transform as a matrix.
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.model)
    }

    /// Returns the tint as a vector.
    #[must_use]
    pub fn color_vec(&self) -> Vec4 {
        Vec4::from_array(self.color)
    }
}

impl Default for InstanceGpu {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Vec4::ONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_size() {
        // 4 vec4 columns + 1 color vec4, 16 bytes each.
        assert_eq!(InstanceGpu::SIZE, 80);
    }

    #[test]
    fn test_instance_alignment() {
        assert_eq!(std::mem::align_of::<InstanceGpu>(), 4);
    }

    #[test]
    fn test_pack_roundtrip() {
        let matrix = Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0));
        let color = Vec4::new(0.5, 0.25, 1.0, 1.0);
        let packed = InstanceGpu::new(matrix, color);
        assert_eq!(packed.matrix(), matrix);
        assert_eq!(packed.color_vec(), color);
    }
}
