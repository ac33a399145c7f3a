//! Staging buffer between the dense visible arrays and the GPU.
//!
//! Refilled only when the owning bucket was dirtied since the last draw;
//! a clean frame reuses the previous packing untouched.

use super::data::InstanceGpu;
use glam::{Mat4, Vec4};

/// CPU-side staging for one bucket's instance upload.
#[derive(Debug, Default)]
pub struct UploadBuffer {
    /// Packed instance data, one entry per visible instance.
    staging: Vec<InstanceGpu>,
    /// Number of refills since creation. Diagnostics for the lazy-upload
    /// contract.
    refills: u64,
}

impl UploadBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            staging: Vec::with_capacity(capacity),
            refills: 0,
        }
    }

    /// Repacks the staging buffer from the dense visible arrays.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the arrays disagree in length; they are
    /// maintained in lockstep by the bucket.
    pub fn fill(&mut self, matrices: &[Mat4], colors: &[Vec4]) {
        debug_assert_eq!(matrices.len(), colors.len());
        self.staging.clear();
        self.staging.extend(
            matrices
                .iter()
                .zip(colors)
                .map(|(&matrix, &color)| InstanceGpu::new(matrix, color)),
        );
        self.refills += 1;
    }

    /// Returns the packed instances.
    #[must_use]
    pub fn instances(&self) -> &[InstanceGpu] {
        &self.staging
    }

    /// Returns the packed instances as bytes for GPU upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.staging)
    }

    /// Returns the staged instance count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.staging.len()
    }

    /// Checks whether nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.staging.is_empty()
    }

    /// Returns how many times the buffer has been refilled.
    #[must_use]
    pub const fn refill_count(&self) -> u64 {
        self.refills
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_fill_packs_pairs() {
        let mut buffer = UploadBuffer::new();
        let matrices = vec![Mat4::IDENTITY, Mat4::from_translation(Vec3::X)];
        let colors = vec![Vec4::ONE, Vec4::ZERO];

        buffer.fill(&matrices, &colors);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.instances()[1].matrix(), matrices[1]);
        assert_eq!(buffer.instances()[1].color_vec(), Vec4::ZERO);
        assert_eq!(buffer.as_bytes().len(), 2 * InstanceGpu::SIZE);
    }

    #[test]
    fn test_refill_counter() {
        let mut buffer = UploadBuffer::with_capacity(8);
        assert_eq!(buffer.refill_count(), 0);
        assert!(buffer.is_empty());

        buffer.fill(&[Mat4::IDENTITY], &[Vec4::ONE]);
        buffer.fill(&[], &[]);
        assert_eq!(buffer.refill_count(), 2);
        assert!(buffer.is_empty());
    }
}
