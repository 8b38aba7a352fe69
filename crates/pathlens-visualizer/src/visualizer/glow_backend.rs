//! # OpenGL Toolpath Backend
//!
//! Instanced drawing of toolpath batches through `glow`. Each primitive owns
//! a vertex and index buffer, each batch an instance buffer of model
//! matrices; vertex arrays are created lazily per primitive/instance pair.

use super::backend::{DrawCall, GpuBackend, GpuHandle};
use super::geometry::{InstanceData, PrimitiveVertex};
use super::toolpath_shaders::{TOOLPATH_FRAGMENT_SHADER, TOOLPATH_VERTEX_SHADER};
use glam::{Mat4, Vec3};
use glow::HasContext;
use pathlens_core::RenderError;
use std::collections::HashMap;
use tracing::{debug, error};

type Result<T> = std::result::Result<T, RenderError>;

const VERTEX_STRIDE: i32 = std::mem::size_of::<PrimitiveVertex>() as i32;
const INSTANCE_STRIDE: i32 = std::mem::size_of::<InstanceData>() as i32;
/// First attribute slot of the per-instance mat4 (occupies four slots)
const INSTANCE_ATTRIB: u32 = 2;

#[derive(Debug)]
struct PrimitiveResources {
    vbo: glow::Buffer,
    ebo: glow::Buffer,
    index_count: i32,
}

#[derive(Debug)]
struct InstanceResources {
    buffer: glow::Buffer,
    count: usize,
}

/// Lighting for the toolpath shader
#[derive(Debug, Clone)]
pub struct ToolpathLighting {
    /// Light direction (normalized)
    pub light_direction: Vec3,
    pub ambient: f32,
}

impl Default for ToolpathLighting {
    fn default() -> Self {
        Self {
            light_direction: Vec3::new(-0.3, -1.0, -0.7).normalize(),
            ambient: 0.35,
        }
    }
}

/// OpenGL implementation of [`GpuBackend`].
pub struct GlowBackend {
    gl: glow::Context,
    program: glow::Program,
    next_id: u64,
    primitives: HashMap<u64, PrimitiveResources>,
    instances: HashMap<u64, InstanceResources>,
    vertex_arrays: HashMap<(u64, u64), glow::VertexArray>,
    lighting: ToolpathLighting,
    context_lost: bool,
}

impl GlowBackend {
    pub fn new(gl: glow::Context) -> Result<Self> {
        let program =
            Self::create_shader_program(&gl, TOOLPATH_VERTEX_SHADER, TOOLPATH_FRAGMENT_SHADER)?;
        Ok(Self {
            gl,
            program,
            next_id: 0,
            primitives: HashMap::new(),
            instances: HashMap::new(),
            vertex_arrays: HashMap::new(),
            lighting: ToolpathLighting::default(),
            context_lost: false,
        })
    }

    pub fn set_lighting(&mut self, lighting: ToolpathLighting) {
        self.lighting = lighting;
    }

    fn next_handle(&mut self) -> GpuHandle {
        self.next_id += 1;
        GpuHandle(self.next_id)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.context_lost {
            Err(RenderError::ContextLost)
        } else {
            Ok(())
        }
    }

    fn create_shader_program(
        gl: &glow::Context,
        vs_source: &str,
        fs_source: &str,
    ) -> Result<glow::Program> {
        unsafe {
            let vs = gl
                .create_shader(glow::VERTEX_SHADER)
                .map_err(RenderError::Shader)?;
            gl.shader_source(vs, vs_source);
            gl.compile_shader(vs);

            if !gl.get_shader_compile_status(vs) {
                let info = gl.get_shader_info_log(vs);
                gl.delete_shader(vs);
                return Err(RenderError::Shader(format!("Vertex shader: {}", info)));
            }

            let fs = gl
                .create_shader(glow::FRAGMENT_SHADER)
                .map_err(RenderError::Shader)?;
            gl.shader_source(fs, fs_source);
            gl.compile_shader(fs);

            if !gl.get_shader_compile_status(fs) {
                let info = gl.get_shader_info_log(fs);
                gl.delete_shader(vs);
                gl.delete_shader(fs);
                return Err(RenderError::Shader(format!("Fragment shader: {}", info)));
            }

            let program = gl.create_program().map_err(RenderError::Shader)?;
            gl.attach_shader(program, vs);
            gl.attach_shader(program, fs);
            gl.link_program(program);

            if !gl.get_program_link_status(program) {
                let info = gl.get_program_info_log(program);
                gl.delete_shader(vs);
                gl.delete_shader(fs);
                gl.delete_program(program);
                return Err(RenderError::Shader(format!("Program linking: {}", info)));
            }

            gl.delete_shader(vs);
            gl.delete_shader(fs);

            Ok(program)
        }
    }

    fn vertex_array(&mut self, primitive: GpuHandle, instances: GpuHandle) -> Result<glow::VertexArray> {
        if let Some(vao) = self.vertex_arrays.get(&(primitive.0, instances.0)) {
            return Ok(*vao);
        }
        let prim = self
            .primitives
            .get(&primitive.0)
            .ok_or(RenderError::UnknownHandle(primitive.0))?;
        let inst = self
            .instances
            .get(&instances.0)
            .ok_or(RenderError::UnknownHandle(instances.0))?;

        let vao = unsafe {
            let vao = self.gl.create_vertex_array().map_err(RenderError::Buffer)?;
            self.gl.bind_vertex_array(Some(vao));

            // Position (location 0), normal (location 1)
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(prim.vbo));
            self.gl
                .vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, VERTEX_STRIDE, 0);
            self.gl.enable_vertex_attrib_array(0);
            self.gl
                .vertex_attrib_pointer_f32(1, 3, glow::FLOAT, false, VERTEX_STRIDE, 12);
            self.gl.enable_vertex_attrib_array(1);
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(prim.ebo));

            // Instance model matrix, one column per slot
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(inst.buffer));
            for column in 0..4u32 {
                let location = INSTANCE_ATTRIB + column;
                self.gl.vertex_attrib_pointer_f32(
                    location,
                    4,
                    glow::FLOAT,
                    false,
                    INSTANCE_STRIDE,
                    (column * 16) as i32,
                );
                self.gl.enable_vertex_attrib_array(location);
                self.gl.vertex_attrib_divisor(location, 1);
            }

            self.gl.bind_vertex_array(None);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, None);
            vao
        };
        self.vertex_arrays.insert((primitive.0, instances.0), vao);
        Ok(vao)
    }

    fn drop_vertex_arrays_for(&mut self, id: u64) {
        let stale: Vec<(u64, u64)> = self
            .vertex_arrays
            .keys()
            .filter(|(p, i)| *p == id || *i == id)
            .copied()
            .collect();
        for key in stale {
            if let Some(vao) = self.vertex_arrays.remove(&key) {
                unsafe { self.gl.delete_vertex_array(vao) };
            }
        }
    }

    fn set_uniform_mat4(&self, name: &str, matrix: &Mat4) {
        unsafe {
            if let Some(loc) = self.gl.get_uniform_location(self.program, name) {
                self.gl
                    .uniform_matrix_4_f32_slice(Some(&loc), false, &matrix.to_cols_array());
            }
        }
    }

    fn set_uniform_vec4(&self, name: &str, v: &[f32; 4]) {
        unsafe {
            if let Some(loc) = self.gl.get_uniform_location(self.program, name) {
                self.gl.uniform_4_f32(Some(&loc), v[0], v[1], v[2], v[3]);
            }
        }
    }

    fn set_uniform_vec3(&self, name: &str, v: &Vec3) {
        unsafe {
            if let Some(loc) = self.gl.get_uniform_location(self.program, name) {
                self.gl.uniform_3_f32(Some(&loc), v.x, v.y, v.z);
            }
        }
    }

    fn set_uniform_f32(&self, name: &str, value: f32) {
        unsafe {
            if let Some(loc) = self.gl.get_uniform_location(self.program, name) {
                self.gl.uniform_1_f32(Some(&loc), value);
            }
        }
    }

    fn clear_all(&mut self) {
        unsafe {
            for (_, vao) in self.vertex_arrays.drain() {
                self.gl.delete_vertex_array(vao);
            }
            for (_, prim) in self.primitives.drain() {
                self.gl.delete_buffer(prim.vbo);
                self.gl.delete_buffer(prim.ebo);
            }
            for (_, inst) in self.instances.drain() {
                self.gl.delete_buffer(inst.buffer);
            }
        }
    }
}

impl GpuBackend for GlowBackend {
    fn create_primitive(
        &mut self,
        vertices: &[PrimitiveVertex],
        indices: &[u32],
    ) -> Result<GpuHandle> {
        self.ensure_alive()?;
        let resources = unsafe {
            let vbo = self.gl.create_buffer().map_err(RenderError::Buffer)?;
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            self.gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(vertices),
                glow::STATIC_DRAW,
            );

            let ebo = match self.gl.create_buffer() {
                Ok(ebo) => ebo,
                Err(e) => {
                    self.gl.delete_buffer(vbo);
                    return Err(RenderError::Buffer(e));
                }
            };
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));
            self.gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(indices),
                glow::STATIC_DRAW,
            );
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, None);

            PrimitiveResources {
                vbo,
                ebo,
                index_count: indices.len() as i32,
            }
        };
        let handle = self.next_handle();
        self.primitives.insert(handle.0, resources);
        Ok(handle)
    }

    fn create_instance_buffer(&mut self, instances: &[InstanceData]) -> Result<GpuHandle> {
        self.ensure_alive()?;
        let buffer = unsafe {
            let buffer = self.gl.create_buffer().map_err(RenderError::Buffer)?;
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            self.gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(instances),
                glow::DYNAMIC_DRAW,
            );
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            buffer
        };
        let handle = self.next_handle();
        self.instances.insert(
            handle.0,
            InstanceResources {
                buffer,
                count: instances.len(),
            },
        );
        Ok(handle)
    }

    fn write_instance_buffer(
        &mut self,
        handle: GpuHandle,
        instances: &[InstanceData],
    ) -> Result<()> {
        self.ensure_alive()?;
        let resources = self
            .instances
            .get_mut(&handle.0)
            .ok_or(RenderError::UnknownHandle(handle.0))?;
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(resources.buffer));
            self.gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(instances),
                glow::DYNAMIC_DRAW,
            );
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
        resources.count = instances.len();
        Ok(())
    }

    fn release(&mut self, handle: GpuHandle) {
        self.drop_vertex_arrays_for(handle.0);
        if let Some(prim) = self.primitives.remove(&handle.0) {
            unsafe {
                self.gl.delete_buffer(prim.vbo);
                self.gl.delete_buffer(prim.ebo);
            }
        } else if let Some(inst) = self.instances.remove(&handle.0) {
            unsafe { self.gl.delete_buffer(inst.buffer) };
        } else {
            debug!("GL backend: release of unknown handle {}", handle.0);
        }
    }

    fn begin_frame(&mut self, view_projection: Mat4) -> Result<()> {
        self.check_context()?;
        unsafe {
            self.gl.use_program(Some(self.program));
            self.gl.enable(glow::DEPTH_TEST);
        }
        self.set_uniform_mat4("view_projection", &view_projection);
        self.set_uniform_vec3("light_direction", &self.lighting.light_direction);
        self.set_uniform_f32("ambient", self.lighting.ambient);
        Ok(())
    }

    fn draw_instanced(&mut self, call: &DrawCall) -> Result<()> {
        self.ensure_alive()?;
        if call.instance_count == 0 {
            return Ok(());
        }
        let vao = self.vertex_array(call.primitive, call.instances)?;
        let index_count = self
            .primitives
            .get(&call.primitive.0)
            .map(|p| p.index_count)
            .ok_or(RenderError::UnknownHandle(call.primitive.0))?;
        let available = self.instances.get(&call.instances.0).map_or(0, |i| i.count);
        if call.instance_count as usize > available {
            return Err(RenderError::Buffer(format!(
                "draw of {} instances from a buffer of {}",
                call.instance_count, available
            )));
        }

        self.set_uniform_vec4("base_color", &call.color);
        unsafe {
            if call.transparent {
                self.gl.enable(glow::BLEND);
                self.gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
                self.gl.depth_mask(false);
            }

            self.gl.bind_vertex_array(Some(vao));
            self.gl.draw_elements_instanced(
                glow::TRIANGLES,
                index_count,
                glow::UNSIGNED_INT,
                0,
                call.instance_count as i32,
            );
            self.gl.bind_vertex_array(None);

            if call.transparent {
                self.gl.depth_mask(true);
                self.gl.disable(glow::BLEND);
            }
        }
        Ok(())
    }

    fn check_context(&mut self) -> Result<()> {
        if !self.context_lost && unsafe { self.gl.get_error() } == glow::CONTEXT_LOST {
            error!("OpenGL context lost");
            self.context_lost = true;
        }
        self.ensure_alive()
    }

    fn live_resources(&self) -> usize {
        self.primitives.len() + self.instances.len()
    }
}

impl Drop for GlowBackend {
    fn drop(&mut self) {
        self.clear_all();
        unsafe {
            self.gl.delete_program(self.program);
        }
    }
}
