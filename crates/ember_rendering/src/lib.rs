//! # EMBER Instance Batching
//!
//! Host-side bookkeeping for GPU instanced rendering. One shared model,
//! placed many times: this crate tracks which placements are visible and
//! keeps a dense, upload-ready array of their transforms and colors per
//! level of detail, so the render thread can issue one instanced draw call
//! per LOD instead of one call per placement.
//!
//! ## Design Principles
//!
//! 1. **Dense or nothing** - The visible arrays are packed, hole-free, and
//!    castable straight to bytes for upload
//! 2. **O(1) mutations** - Insert, remove, visibility toggle and LOD
//!    migration are all swap-delete based, amortized constant time
//! 3. **Keys, not pointers** - Callers hold generational keys; internal
//!    swap-deletes can never invalidate an outstanding reference
//! 4. **Lazy upload** - The staging buffer is refilled only when a mutation
//!    dirtied the visible arrays since the last draw
//!
//! ## Thread Safety
//!
//! Simulation threads mutate instances concurrently; each LOD bucket has its
//! own mutex, and a per-group slot directory serializes structural changes.
//! `draw` is reserved for a single render thread.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ember_rendering::{ModelInstanceGroup, RenderModel, RecordingQueue};
//! use glam::Mat4;
//!
//! let model = RenderModel::new("rock", bounds, vec![state_lod0, state_lod1]);
//! let group = ModelInstanceGroup::new(model);
//!
//! let rock = group.make_instance(0);
//! rock.set_matrix(Mat4::from_translation(position));
//! rock.set_visible(true);
//!
//! let mut queue = RecordingQueue::new();
//! group.draw(&mut queue);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bounds;
pub mod config;
pub mod error;
pub mod instancing;
pub mod model;
pub mod queue;

pub use bounds::Aabb;
pub use config::InstancingConfig;
pub use error::{InstancingError, InstancingResult};
pub use instancing::{DrawStats, InstanceGpu, ModelInstance, ModelInstanceGroup, UploadBuffer};
pub use model::{RenderModel, ShaderStateId};
pub use queue::{RecordedBatch, RecordingQueue, RenderQueue};
