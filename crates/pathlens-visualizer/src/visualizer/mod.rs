//! 3D toolpath visualization
//!
//! This module provides:
//! - Orbit camera and per-frame view state (camera)
//! - Instanced per-mode geometry batches (geometry)
//! - The GPU backend seam with OpenGL and headless implementations
//! - Distance-based level of detail (lod)
//! - State-change minimizing draw ordering (render_queue)
//! - Ray-cast point picking, tooltips, and scrub seeking
//! - The viewer session that owns all of the above

pub mod backend;
pub mod camera;
pub mod geometry;
pub mod glow_backend;
pub mod lod;
pub mod picking;
pub mod render_queue;
pub mod seek;
pub mod session;
pub mod timer;
pub mod toolpath_cache;
pub mod toolpath_shaders;
pub mod tooltip;

pub use backend::{DrawCall, GpuBackend, GpuHandle, HeadlessBackend};
pub use camera::{Camera, Ray, ViewState, ViewportRect};
pub use geometry::{
    cylinder_mesh, radial_segments_for, segment_transform, GeometryManager, InstanceData,
    PrimitiveKey, PrimitiveVertex, RenderBatch,
};
pub use glow_backend::{GlowBackend, ToolpathLighting};
pub use lod::{LodSystem, LodUpdate};
pub use picking::{PickStats, ToolpathPointDetector};
pub use render_queue::{count_state_changes, MaterialKey, QueueStats, RenderObject, RenderQueue};
pub use seek::{SeekController, SeekUpdate};
pub use session::{FrameStats, SessionState, ViewerSession};
pub use timer::{Debounce, Throttle};
pub use toolpath_cache::ToolpathCache;
pub use tooltip::{TooltipManager, TooltipRect};
