//! # Render Queue Collaborator
//!
//! The seam between host-side batching and the GPU backend. The batcher
//! hands over a packed instance slice and a shader state; issuing the
//! actual draw call is the backend's business.

use crate::instancing::InstanceGpu;
use crate::model::ShaderStateId;

/// Sink for instanced draw batches.
///
/// Implemented by the GPU backend's command recorder. The instance count of
/// the batch is the slice length.
pub trait RenderQueue {
    /// Submits one instanced batch.
    ///
    /// # Arguments
    ///
    /// * `instances` - Packed per-instance data, ready for upload
    /// * `shader_state` - Shader state to draw the batch with
    fn add_instanced_batch(&mut self, instances: &[InstanceGpu], shader_state: ShaderStateId);
}

/// One batch captured by [`RecordingQueue`].
#[derive(Debug, Clone)]
pub struct RecordedBatch {
    /// Copy of the submitted instance data.
    pub instances: Vec<InstanceGpu>,
    /// Shader state the batch was submitted with.
    pub shader_state: ShaderStateId,
}

impl RecordedBatch {
    /// Returns the instance count of the batch.
    #[must_use]
    pub fn count(&self) -> usize {
        self.instances.len()
    }
}

/// Queue implementation that records batches instead of drawing.
///
/// Used by tests and headless verification runs.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    /// Batches in submission order.
    batches: Vec<RecordedBatch>,
}

impl RecordingQueue {
    /// Creates an empty recording queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded batches in submission order.
    #[must_use]
    pub fn batches(&self) -> &[RecordedBatch] {
        &self.batches
    }

    /// Returns the total instance count across all batches.
    #[must_use]
    pub fn total_instances(&self) -> usize {
        self.batches.iter().map(RecordedBatch::count).sum()
    }

    /// Forgets all recorded batches.
    pub fn clear(&mut self) {
        self.batches.clear();
    }
}

impl RenderQueue for RecordingQueue {
    fn add_instanced_batch(&mut self, instances: &[InstanceGpu], shader_state: ShaderStateId) {
        self.batches.push(RecordedBatch {
            instances: instances.to_vec(),
            shader_state,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_queue_captures() {
        let mut queue = RecordingQueue::new();
        let instances = vec![InstanceGpu::default(); 3];

        queue.add_instanced_batch(&instances, ShaderStateId(4));
        assert_eq!(queue.batches().len(), 1);
        assert_eq!(queue.batches()[0].count(), 3);
        assert_eq!(queue.batches()[0].shader_state, ShaderStateId(4));
        assert_eq!(queue.total_instances(), 3);

        queue.clear();
        assert!(queue.batches().is_empty());
    }
}
