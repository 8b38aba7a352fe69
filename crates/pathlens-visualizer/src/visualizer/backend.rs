//! GPU backend seam
//!
//! Geometry management and drawing talk to the GPU only through
//! [`GpuBackend`]. The OpenGL implementation lives in `glow_backend`; the
//! headless one here keeps CPU-side bookkeeping for tests and batch tools.

use super::geometry::{InstanceData, PrimitiveVertex};
use glam::Mat4;
use pathlens_core::RenderError;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Opaque handle to a backend resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuHandle(pub u64);

/// One instanced draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub primitive: GpuHandle,
    pub instances: GpuHandle,
    pub instance_count: u32,
    pub color: [f32; 4],
    pub transparent: bool,
}

pub trait GpuBackend {
    /// Upload an indexed triangle mesh shared by many instances.
    fn create_primitive(
        &mut self,
        vertices: &[PrimitiveVertex],
        indices: &[u32],
    ) -> Result<GpuHandle, RenderError>;

    fn create_instance_buffer(&mut self, instances: &[InstanceData])
        -> Result<GpuHandle, RenderError>;

    /// Replace the contents of an instance buffer.
    fn write_instance_buffer(
        &mut self,
        handle: GpuHandle,
        instances: &[InstanceData],
    ) -> Result<(), RenderError>;

    /// Release a primitive or instance buffer. Unknown handles are ignored.
    fn release(&mut self, handle: GpuHandle);

    fn begin_frame(&mut self, view_projection: Mat4) -> Result<(), RenderError>;

    fn draw_instanced(&mut self, call: &DrawCall) -> Result<(), RenderError>;

    /// `Err(RenderError::ContextLost)` once the context is gone.
    fn check_context(&mut self) -> Result<(), RenderError>;

    /// Number of resources currently allocated.
    fn live_resources(&self) -> usize;
}

#[derive(Debug, Clone)]
enum HeadlessResource {
    Primitive { index_count: usize },
    Instances { count: usize },
}

/// A backend with no GPU behind it.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u64,
    resources: HashMap<u64, HeadlessResource>,
    context_lost: bool,
    frames: u64,
    total_draw_calls: u64,
    last_frame: Vec<DrawCall>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing the graphics context.
    pub fn lose_context(&mut self) {
        warn!("Headless backend: context lost");
        self.context_lost = true;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn total_draw_calls(&self) -> u64 {
        self.total_draw_calls
    }

    /// Draws issued since the last `begin_frame`.
    pub fn last_frame(&self) -> &[DrawCall] {
        &self.last_frame
    }

    pub fn instance_count(&self, handle: GpuHandle) -> Option<usize> {
        match self.resources.get(&handle.0) {
            Some(HeadlessResource::Instances { count }) => Some(*count),
            _ => None,
        }
    }

    fn ensure_alive(&self) -> Result<(), RenderError> {
        if self.context_lost {
            Err(RenderError::ContextLost)
        } else {
            Ok(())
        }
    }

    fn allocate(&mut self, resource: HeadlessResource) -> GpuHandle {
        self.next_id += 1;
        self.resources.insert(self.next_id, resource);
        GpuHandle(self.next_id)
    }
}

impl GpuBackend for HeadlessBackend {
    fn create_primitive(
        &mut self,
        vertices: &[PrimitiveVertex],
        indices: &[u32],
    ) -> Result<GpuHandle, RenderError> {
        self.ensure_alive()?;
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(RenderError::Buffer(format!(
                "index {} out of range for {} vertices",
                bad,
                vertices.len()
            )));
        }
        Ok(self.allocate(HeadlessResource::Primitive {
            index_count: indices.len(),
        }))
    }

    fn create_instance_buffer(
        &mut self,
        instances: &[InstanceData],
    ) -> Result<GpuHandle, RenderError> {
        self.ensure_alive()?;
        Ok(self.allocate(HeadlessResource::Instances {
            count: instances.len(),
        }))
    }

    fn write_instance_buffer(
        &mut self,
        handle: GpuHandle,
        instances: &[InstanceData],
    ) -> Result<(), RenderError> {
        self.ensure_alive()?;
        match self.resources.get_mut(&handle.0) {
            Some(HeadlessResource::Instances { count }) => {
                *count = instances.len();
                Ok(())
            }
            _ => Err(RenderError::UnknownHandle(handle.0)),
        }
    }

    fn release(&mut self, handle: GpuHandle) {
        if self.resources.remove(&handle.0).is_none() {
            debug!("Headless backend: release of unknown handle {}", handle.0);
        }
    }

    fn begin_frame(&mut self, _view_projection: Mat4) -> Result<(), RenderError> {
        self.ensure_alive()?;
        self.frames += 1;
        self.last_frame.clear();
        Ok(())
    }

    fn draw_instanced(&mut self, call: &DrawCall) -> Result<(), RenderError> {
        self.ensure_alive()?;
        match self.resources.get(&call.primitive.0) {
            Some(HeadlessResource::Primitive { index_count }) if *index_count > 0 => {}
            _ => return Err(RenderError::UnknownHandle(call.primitive.0)),
        }
        match self.resources.get(&call.instances.0) {
            Some(HeadlessResource::Instances { count }) if call.instance_count as usize <= *count => {}
            Some(HeadlessResource::Instances { count }) => {
                return Err(RenderError::Buffer(format!(
                    "draw of {} instances from a buffer of {}",
                    call.instance_count, count
                )))
            }
            _ => return Err(RenderError::UnknownHandle(call.instances.0)),
        }
        self.total_draw_calls += 1;
        self.last_frame.push(call.clone());
        Ok(())
    }

    fn check_context(&mut self) -> Result<(), RenderError> {
        self.ensure_alive()
    }

    fn live_resources(&self) -> usize {
        self.resources.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> (Vec<PrimitiveVertex>, Vec<u32>) {
        let v = PrimitiveVertex {
            position: [0.0; 3],
            normal: [0.0, 0.0, 1.0],
        };
        (vec![v; 3], vec![0, 1, 2])
    }

    #[test]
    fn test_allocate_and_release() {
        let mut backend = HeadlessBackend::new();
        let (v, i) = triangle();
        let prim = backend.create_primitive(&v, &i).unwrap();
        let inst = backend.create_instance_buffer(&[InstanceData::IDENTITY; 4]).unwrap();
        assert_eq!(backend.live_resources(), 2);
        backend.release(prim);
        backend.release(inst);
        backend.release(inst);
        assert_eq!(backend.live_resources(), 0);
    }

    #[test]
    fn test_bad_index_rejected() {
        let mut backend = HeadlessBackend::new();
        let (v, _) = triangle();
        assert!(matches!(
            backend.create_primitive(&v, &[0, 1, 3]),
            Err(RenderError::Buffer(_))
        ));
    }

    #[test]
    fn test_context_loss_fails_everything() {
        let mut backend = HeadlessBackend::new();
        backend.lose_context();
        assert_eq!(backend.check_context(), Err(RenderError::ContextLost));
        assert_eq!(
            backend.create_instance_buffer(&[]),
            Err(RenderError::ContextLost)
        );
    }

    #[test]
    fn test_draw_records_calls() {
        let mut backend = HeadlessBackend::new();
        let (v, i) = triangle();
        let primitive = backend.create_primitive(&v, &i).unwrap();
        let instances = backend.create_instance_buffer(&[InstanceData::IDENTITY; 2]).unwrap();
        backend.begin_frame(Mat4::IDENTITY).unwrap();
        let call = DrawCall {
            primitive,
            instances,
            instance_count: 2,
            color: [1.0; 4],
            transparent: false,
        };
        backend.draw_instanced(&call).unwrap();
        assert_eq!(backend.last_frame().len(), 1);
        assert!(backend
            .draw_instanced(&DrawCall {
                instance_count: 3,
                ..call
            })
            .is_err());
    }
}
