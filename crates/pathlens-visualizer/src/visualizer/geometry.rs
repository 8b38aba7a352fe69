//! Instanced toolpath geometry
//!
//! Every segment is drawn as an instance of a shared cylinder primitive. One
//! [`RenderBatch`] per motion mode owns the instance transforms of that mode.
//! Primitives are cached per `(radius, radial resolution)` and reference
//! counted across batches so disposal leaves nothing allocated.

use super::backend::{GpuBackend, GpuHandle};
use super::render_queue::MaterialKey;
use bytemuck::{Pod, Zeroable};
use glam::{DMat4, DQuat, DVec3, Mat4};
use pathlens_core::{MotionMode, RenderError, Segment};
use pathlens_settings::{ModeStyle, ModeStyles};
use std::collections::HashMap;
use std::f32::consts::TAU;
use tracing::{debug, trace};

/// Vertex of a shared primitive.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PrimitiveVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Per-instance model matrix, column major.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub model: [[f32; 4]; 4],
}

impl InstanceData {
    pub const IDENTITY: Self = Self {
        model: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub fn from_mat4(m: Mat4) -> Self {
        Self {
            model: m.to_cols_array_2d(),
        }
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.model)
    }
}

/// Cache key of a shared primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimitiveKey {
    radius_bits: u64,
    pub radial_segments: u32,
}

impl PrimitiveKey {
    pub fn new(radius: f64, radial_segments: u32) -> Self {
        Self {
            radius_bits: radius.to_bits(),
            radial_segments,
        }
    }

    pub fn radius(&self) -> f64 {
        f64::from_bits(self.radius_bits)
    }
}

/// Open cylinder along +Y, unit length centered on the origin.
pub fn cylinder_mesh(radius: f32, radial_segments: u32) -> (Vec<PrimitiveVertex>, Vec<u32>) {
    let n = radial_segments.max(3);
    let mut vertices = Vec::with_capacity(2 * n as usize);
    for k in 0..n {
        let (sin, cos) = (TAU * k as f32 / n as f32).sin_cos();
        let normal = [cos, 0.0, sin];
        vertices.push(PrimitiveVertex {
            position: [radius * cos, -0.5, radius * sin],
            normal,
        });
        vertices.push(PrimitiveVertex {
            position: [radius * cos, 0.5, radius * sin],
            normal,
        });
    }

    let mut indices = Vec::with_capacity(6 * n as usize);
    for k in 0..n {
        let bottom = 2 * k;
        let top = bottom + 1;
        let next_bottom = 2 * ((k + 1) % n);
        let next_top = next_bottom + 1;
        indices.extend_from_slice(&[bottom, top, next_bottom, next_bottom, top, next_top]);
    }
    (vertices, indices)
}

/// Instance transform mapping the unit cylinder onto a segment.
///
/// Zero-length segments collapse to a zero-scale matrix at their start point
/// so instance indices stay aligned with segment indices.
pub fn segment_transform(segment: &Segment) -> Mat4 {
    match segment.direction() {
        Some(direction) => DMat4::from_scale_rotation_translation(
            DVec3::new(1.0, segment.length(), 1.0),
            DQuat::from_rotation_arc(DVec3::Y, direction),
            segment.midpoint().to_dvec3(),
        )
        .as_mat4(),
        None => DMat4::from_scale_rotation_translation(
            DVec3::ZERO,
            DQuat::IDENTITY,
            segment.start.to_dvec3(),
        )
        .as_mat4(),
    }
}

/// Radial resolution for a detail fraction, never below a triangle.
pub fn radial_segments_for(base: u32, detail_fraction: f64) -> u32 {
    let scaled = (base as f64 * detail_fraction.clamp(0.0, 1.0)).round() as u32;
    scaled.max(3)
}

/// GPU geometry for the segments of one motion mode.
#[derive(Debug, Clone)]
pub struct RenderBatch {
    pub mode: MotionMode,
    pub color: [f32; 4],
    pub transparent: bool,
    pub material_key: MaterialKey,
    pub radius: f64,
    pub instances: Vec<InstanceData>,
    /// Global segment index of each instance, ascending
    pub segment_indices: Vec<usize>,
    /// Leading instances currently drawn
    pub visible_count: usize,
    pub primitive: PrimitiveKey,
    pub instance_buffer: GpuHandle,
}

impl RenderBatch {
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct PrimitiveEntry {
    handle: GpuHandle,
    refs: usize,
}

/// Builds, updates, and releases per-mode render batches.
#[derive(Debug)]
pub struct GeometryManager {
    styles: ModeStyles,
    detail_fraction: f64,
    primitives: HashMap<PrimitiveKey, PrimitiveEntry>,
    materials: HashMap<(u32, [u32; 4]), u64>,
    batches: Vec<RenderBatch>,
}

impl GeometryManager {
    pub fn new(styles: ModeStyles) -> Self {
        Self {
            styles,
            detail_fraction: 1.0,
            primitives: HashMap::new(),
            materials: HashMap::new(),
            batches: Vec::new(),
        }
    }

    pub fn styles(&self) -> &ModeStyles {
        &self.styles
    }

    pub fn batches(&self) -> &[RenderBatch] {
        &self.batches
    }

    pub fn batch(&self, mode: MotionMode) -> Option<&RenderBatch> {
        self.batches.iter().find(|b| b.mode == mode)
    }

    pub fn detail_fraction(&self) -> f64 {
        self.detail_fraction
    }

    pub fn radial_segments(&self) -> u32 {
        radial_segments_for(self.styles.base_radial_segments, self.detail_fraction)
    }

    pub fn live_primitives(&self) -> usize {
        self.primitives.len()
    }

    pub fn primitive_handle(&self, key: &PrimitiveKey) -> Option<GpuHandle> {
        self.primitives.get(key).map(|p| p.handle)
    }

    fn material_key(&mut self, style: &ModeStyle) -> MaterialKey {
        let shader = if style.is_transparent() {
            MaterialKey::BLENDED_SHADER
        } else {
            MaterialKey::OPAQUE_SHADER
        };
        let rgba = style.rgba().map(f32::to_bits);
        let next = self.materials.len() as u64;
        let material = *self.materials.entry((shader, rgba)).or_insert(next);
        MaterialKey::new(shader, material)
    }

    fn acquire_primitive(
        &mut self,
        backend: &mut dyn GpuBackend,
        key: PrimitiveKey,
    ) -> Result<GpuHandle, RenderError> {
        if let Some(entry) = self.primitives.get_mut(&key) {
            entry.refs += 1;
            return Ok(entry.handle);
        }
        let (vertices, indices) = cylinder_mesh(key.radius() as f32, key.radial_segments);
        let handle = backend.create_primitive(&vertices, &indices)?;
        trace!(
            "Created primitive r={} segments={} -> {:?}",
            key.radius(),
            key.radial_segments,
            handle
        );
        self.primitives.insert(key, PrimitiveEntry { handle, refs: 1 });
        Ok(handle)
    }

    fn release_primitive(&mut self, backend: &mut dyn GpuBackend, key: PrimitiveKey) {
        if let Some(entry) = self.primitives.get_mut(&key) {
            entry.refs = entry.refs.saturating_sub(1);
            if entry.refs == 0 {
                backend.release(entry.handle);
                self.primitives.remove(&key);
            }
        }
    }

    fn instances_for(segments: &[Segment], mode: MotionMode) -> (Vec<InstanceData>, Vec<usize>) {
        segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.mode == mode)
            .map(|(i, s)| (InstanceData::from_mat4(segment_transform(s)), i))
            .unzip()
    }

    /// Build the batch for one mode, `None` when the mode has no segments.
    ///
    /// The returned batch holds GPU resources; hand it back through
    /// [`GeometryManager::release_batch`] when done.
    pub fn build_batch(
        &mut self,
        backend: &mut dyn GpuBackend,
        segments: &[Segment],
        mode: MotionMode,
    ) -> Result<Option<RenderBatch>, RenderError> {
        let (instances, segment_indices) = Self::instances_for(segments, mode);
        if instances.is_empty() {
            return Ok(None);
        }

        let style = *self.styles.for_mode(mode);
        let primitive = PrimitiveKey::new(style.radius, self.radial_segments());
        self.acquire_primitive(backend, primitive)?;
        let instance_buffer = match backend.create_instance_buffer(&instances) {
            Ok(handle) => handle,
            Err(e) => {
                self.release_primitive(backend, primitive);
                return Err(e);
            }
        };

        let material_key = self.material_key(&style);
        debug!(
            "Built {} batch: {} instances, material {:?}",
            mode,
            instances.len(),
            material_key
        );
        Ok(Some(RenderBatch {
            mode,
            color: style.rgba(),
            transparent: style.is_transparent(),
            material_key,
            radius: style.radius,
            visible_count: instances.len(),
            instances,
            segment_indices,
            primitive,
            instance_buffer,
        }))
    }

    /// Recompute a batch's transforms from a new segment list.
    pub fn update_batch(
        &mut self,
        backend: &mut dyn GpuBackend,
        batch: &mut RenderBatch,
        segments: &[Segment],
    ) -> Result<(), RenderError> {
        let (instances, segment_indices) = Self::instances_for(segments, batch.mode);
        backend.write_instance_buffer(batch.instance_buffer, &instances)?;
        batch.visible_count = instances.len();
        batch.instances = instances;
        batch.segment_indices = segment_indices;
        Ok(())
    }

    pub fn release_batch(&mut self, backend: &mut dyn GpuBackend, batch: RenderBatch) {
        backend.release(batch.instance_buffer);
        self.release_primitive(backend, batch.primitive);
    }

    /// Replace all owned batches with ones built from `segments`.
    pub fn load(
        &mut self,
        backend: &mut dyn GpuBackend,
        segments: &[Segment],
    ) -> Result<(), RenderError> {
        self.dispose(backend);
        for mode in MotionMode::ALL {
            if let Some(batch) = self.build_batch(backend, segments, mode)? {
                self.batches.push(batch);
            }
        }
        debug!(
            "Geometry loaded: {} batches, {} primitives",
            self.batches.len(),
            self.primitives.len()
        );
        Ok(())
    }

    /// Rebuild every owned batch in place from `segments`.
    pub fn update_all(
        &mut self,
        backend: &mut dyn GpuBackend,
        segments: &[Segment],
    ) -> Result<(), RenderError> {
        let mut batches = std::mem::take(&mut self.batches);
        let mut result = Ok(());
        for batch in &mut batches {
            result = self.update_batch(backend, batch, segments);
            if result.is_err() {
                break;
            }
        }
        self.batches = batches;
        result
    }

    /// Switch every batch to the primitive resolution for `fraction`.
    ///
    /// Returns whether anything changed.
    pub fn set_detail(
        &mut self,
        backend: &mut dyn GpuBackend,
        fraction: f64,
    ) -> Result<bool, RenderError> {
        let previous = self.radial_segments();
        self.detail_fraction = fraction.clamp(0.0, 1.0);
        let segments = self.radial_segments();
        if segments == previous {
            return Ok(false);
        }

        for i in 0..self.batches.len() {
            let old = self.batches[i].primitive;
            let new = PrimitiveKey::new(old.radius(), segments);
            self.acquire_primitive(backend, new)?;
            self.release_primitive(backend, old);
            self.batches[i].primitive = new;
        }
        debug!("Detail set to {:.2} ({} radial segments)", fraction, segments);
        Ok(true)
    }

    /// Draw only segments with global index below `upto`.
    pub fn set_visible_prefix(&mut self, upto: usize) {
        for batch in &mut self.batches {
            batch.visible_count = batch.segment_indices.partition_point(|&i| i < upto);
        }
    }

    pub fn show_all(&mut self) {
        for batch in &mut self.batches {
            batch.visible_count = batch.instances.len();
        }
    }

    /// Release every batch and primitive.
    pub fn dispose(&mut self, backend: &mut dyn GpuBackend) {
        for batch in std::mem::take(&mut self.batches) {
            self.release_batch(backend, batch);
        }
        for (_, entry) in self.primitives.drain() {
            backend.release(entry.handle);
        }
    }
}
