//! In-memory [`Gpu`] that records every call.
//!
//! Object lifetimes, bindings, buffer contents and uniform values are
//! tracked the way a GL driver would, and misuse queues diagnostics instead of
//! panicking. Compile and link failures can be injected.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::uniforms::{layout_of, ATTRIBUTE_LOCATIONS, UNIFORM_NAMES};
use super::{
    BufferHandle, Capability, DiagnosticKind, Gpu, GpuDiagnostic, ProgramHandle, ShaderHandle,
    ShaderStage, UniformLocation, UniformValue, VertexArrayHandle,
};

/// Drawing-buffer size before the first resize (an unsized HTML canvas).
const DEFAULT_DRAWING_BUFFER: (u32, u32) = (300, 150);

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    CreateShader(ShaderStage),
    DeleteShader(u64),
    LinkProgram,
    DeleteProgram(u64),
    CreateVertexArray,
    DeleteVertexArray(u64),
    CreateBuffer,
    DeleteBuffer(u64),
    ResizeDrawingBuffer(u32, u32),
    Viewport(i32, i32, u32, u32),
    UseProgram(Option<u64>),
    BindVertexArray(Option<u64>),
    BindArrayBuffer(Option<u64>),
    BufferData { buffer: u64, len: usize },
    VertexAttribPointer { location: u32, components: u32 },
    SetUniform { name: &'static str, value: UniformValue },
    Disable(Capability),
    Clear([f32; 4]),
    DrawTriangles { first: u32, count: u32 },
    Flush,
}

/// Counts of objects that have been created and not yet deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveObjects {
    pub shaders: usize,
    pub programs: usize,
    pub vertex_arrays: usize,
    pub buffers: usize,
}

impl LiveObjects {
    pub fn total(&self) -> usize {
        self.shaders + self.programs + self.vertex_arrays + self.buffers
    }
}

/// A draw together with the `uTime` value bound when it was issued.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRecord {
    pub first: u32,
    pub count: u32,
    pub time: Option<f32>,
    pub drawing_buffer: (u32, u32),
}

#[derive(Debug, Default)]
pub struct RecordingGpu {
    next_id: u64,
    calls: Vec<GpuCall>,
    draws: Vec<DrawRecord>,
    shaders: HashMap<u64, ShaderStage>,
    programs: HashMap<u64, BTreeMap<&'static str, UniformValue>>,
    vertex_arrays: HashMap<u64, BTreeMap<u32, (u64, u32)>>,
    buffers: HashMap<u64, Vec<f32>>,
    bound_program: Option<u64>,
    bound_vertex_array: Option<u64>,
    bound_array_buffer: Option<u64>,
    last_program: Option<u64>,
    drawing_buffer: Option<(u32, u32)>,
    disabled: HashSet<Capability>,
    hidden_attributes: HashSet<String>,
    errors: Vec<GpuDiagnostic>,
    compile_failure: Option<(ShaderStage, String)>,
    link_failure: Option<String>,
}

impl RecordingGpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next compile of `stage` fail with `log`.
    pub fn fail_next_compile(&mut self, stage: ShaderStage, log: impl Into<String>) {
        self.compile_failure = Some((stage, log.into()));
    }

    /// Makes the next link fail with `log`.
    pub fn fail_next_link(&mut self, log: impl Into<String>) {
        self.link_failure = Some(log.into());
    }

    /// Stops reporting a location for the named attribute.
    pub fn hide_attribute(&mut self, name: impl Into<String>) {
        self.hidden_attributes.insert(name.into());
    }

    /// Queues a diagnostic as if the driver had raised it.
    pub fn push_error(&mut self, diagnostic: GpuDiagnostic) {
        self.errors.push(diagnostic);
    }

    pub fn calls(&self) -> &[GpuCall] {
        &self.calls
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn draw_count(&self) -> usize {
        self.draws.len()
    }

    pub fn pending_errors(&self) -> usize {
        self.errors.len()
    }

    pub fn live_objects(&self) -> LiveObjects {
        LiveObjects {
            shaders: self.shaders.len(),
            programs: self.programs.len(),
            vertex_arrays: self.vertex_arrays.len(),
            buffers: self.buffers.len(),
        }
    }

    /// `(program, vertex array, array buffer)` currently bound.
    pub fn bindings(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        (
            self.bound_program,
            self.bound_vertex_array,
            self.bound_array_buffer,
        )
    }

    pub fn is_disabled(&self, capability: Capability) -> bool {
        self.disabled.contains(&capability)
    }

    pub fn buffer_contents(&self, buffer: u64) -> Option<&[f32]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    /// Value last written to `name` on the most recently used program.
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        let program = self.last_program?;
        let name = if name == "uColors" { "uColors[0]" } else { name };
        self.programs.get(&program)?.get(name).copied()
    }

    fn record(&mut self, call: GpuCall) {
        self.calls.push(call);
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn invalid(&mut self, message: impl Into<String>) {
        self.errors.push(GpuDiagnostic::new(
            DiagnosticKind::InvalidOperation,
            message,
        ));
    }
}

impl Gpu for RecordingGpu {
    fn create_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String> {
        self.record(GpuCall::CreateShader(stage));
        if matches!(&self.compile_failure, Some((failing, _)) if *failing == stage) {
            let log = self
                .compile_failure
                .take()
                .map(|(_, log)| log)
                .unwrap_or_default();
            return Err(log);
        }
        if source.trim().is_empty() {
            return Err(format!("ERROR: 0:1: empty {stage} shader source"));
        }
        let id = self.allocate();
        self.shaders.insert(id, stage);
        Ok(ShaderHandle::new(id))
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        self.record(GpuCall::DeleteShader(shader.id()));
        if self.shaders.remove(&shader.id()).is_none() {
            self.invalid(format!("delete of unknown shader {}", shader.id()));
        }
    }

    fn link_program(
        &mut self,
        vertex: &ShaderHandle,
        fragment: &ShaderHandle,
    ) -> Result<ProgramHandle, String> {
        self.record(GpuCall::LinkProgram);
        if let Some(log) = self.link_failure.take() {
            return Err(log);
        }
        match (
            self.shaders.get(&vertex.id()),
            self.shaders.get(&fragment.id()),
        ) {
            (Some(ShaderStage::Vertex), Some(ShaderStage::Fragment)) => {}
            _ => return Err("link requires one vertex and one fragment shader".to_string()),
        }
        let id = self.allocate();
        self.programs.insert(id, BTreeMap::new());
        Ok(ProgramHandle::new(id))
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.record(GpuCall::DeleteProgram(program.id()));
        if self.programs.remove(&program.id()).is_none() {
            self.invalid(format!("delete of unknown program {}", program.id()));
        }
        if self.bound_program == Some(program.id()) {
            self.bound_program = None;
        }
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayHandle, String> {
        self.record(GpuCall::CreateVertexArray);
        let id = self.allocate();
        self.vertex_arrays.insert(id, BTreeMap::new());
        Ok(VertexArrayHandle::new(id))
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.record(GpuCall::DeleteVertexArray(vertex_array.id()));
        if self.vertex_arrays.remove(&vertex_array.id()).is_none() {
            self.invalid(format!("delete of unknown vertex array {}", vertex_array.id()));
        }
        if self.bound_vertex_array == Some(vertex_array.id()) {
            self.bound_vertex_array = None;
        }
    }

    fn create_buffer(&mut self) -> Result<BufferHandle, String> {
        self.record(GpuCall::CreateBuffer);
        let id = self.allocate();
        self.buffers.insert(id, Vec::new());
        Ok(BufferHandle::new(id))
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.record(GpuCall::DeleteBuffer(buffer.id()));
        if self.buffers.remove(&buffer.id()).is_none() {
            self.invalid(format!("delete of unknown buffer {}", buffer.id()));
        }
        if self.bound_array_buffer == Some(buffer.id()) {
            self.bound_array_buffer = None;
        }
    }

    fn attribute_location(&self, program: &ProgramHandle, name: &str) -> Option<u32> {
        if !self.programs.contains_key(&program.id()) || self.hidden_attributes.contains(name) {
            return None;
        }
        ATTRIBUTE_LOCATIONS
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, location)| *location)
    }

    fn uniform_location(&self, program: &ProgramHandle, name: &str) -> Option<UniformLocation> {
        if !self.programs.contains_key(&program.id()) {
            return None;
        }
        super::uniform_index(name)
    }

    fn resize_drawing_buffer(&mut self, width: u32, height: u32) {
        self.record(GpuCall::ResizeDrawingBuffer(width, height));
        self.drawing_buffer = Some((width.max(1), height.max(1)));
    }

    fn drawing_buffer_size(&self) -> (u32, u32) {
        self.drawing_buffer.unwrap_or(DEFAULT_DRAWING_BUFFER)
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.record(GpuCall::Viewport(x, y, width, height));
    }

    fn use_program(&mut self, program: Option<&ProgramHandle>) {
        let id = program.map(ProgramHandle::id);
        self.record(GpuCall::UseProgram(id));
        if let Some(id) = id {
            if !self.programs.contains_key(&id) {
                self.invalid(format!("use of unknown program {id}"));
                return;
            }
            self.last_program = Some(id);
        }
        self.bound_program = id;
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<&VertexArrayHandle>) {
        let id = vertex_array.map(VertexArrayHandle::id);
        self.record(GpuCall::BindVertexArray(id));
        if let Some(id) = id {
            if !self.vertex_arrays.contains_key(&id) {
                self.invalid(format!("bind of unknown vertex array {id}"));
                return;
            }
        }
        self.bound_vertex_array = id;
    }

    fn bind_array_buffer(&mut self, buffer: Option<&BufferHandle>) {
        let id = buffer.map(BufferHandle::id);
        self.record(GpuCall::BindArrayBuffer(id));
        if let Some(id) = id {
            if !self.buffers.contains_key(&id) {
                self.invalid(format!("bind of unknown buffer {id}"));
                return;
            }
        }
        self.bound_array_buffer = id;
    }

    fn buffer_data(&mut self, data: &[f32]) {
        let Some(buffer) = self.bound_array_buffer else {
            self.record(GpuCall::BufferData {
                buffer: 0,
                len: data.len(),
            });
            self.invalid("buffer_data with no array buffer bound");
            return;
        };
        self.record(GpuCall::BufferData {
            buffer,
            len: data.len(),
        });
        if let Some(contents) = self.buffers.get_mut(&buffer) {
            contents.clear();
            contents.extend_from_slice(data);
        }
    }

    fn vertex_attrib_pointer(&mut self, location: u32, components: u32) {
        self.record(GpuCall::VertexAttribPointer {
            location,
            components,
        });
        match (self.bound_vertex_array, self.bound_array_buffer) {
            (Some(vertex_array), Some(buffer)) => {
                if let Some(slots) = self.vertex_arrays.get_mut(&vertex_array) {
                    slots.insert(location, (buffer, components));
                }
            }
            _ => self.invalid("vertex_attrib_pointer needs a bound vertex array and buffer"),
        }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let name = UNIFORM_NAMES
            .get(location.index() as usize)
            .copied()
            .unwrap_or("<unknown>");
        self.record(GpuCall::SetUniform { name, value });

        let Some(program) = self.bound_program else {
            self.invalid(format!("uniform {name} written with no program in use"));
            return;
        };
        match layout_of(location) {
            Some((_, kind)) if kind.matches(&value) => {
                if let Some(values) = self.programs.get_mut(&program) {
                    values.insert(name, value);
                }
            }
            _ => self.invalid(format!("uniform {name} does not accept {value:?}")),
        }
    }

    fn disable(&mut self, capability: Capability) {
        self.record(GpuCall::Disable(capability));
        self.disabled.insert(capability);
    }

    fn clear(&mut self, rgba: [f32; 4]) {
        self.record(GpuCall::Clear(rgba));
    }

    fn draw_triangles(&mut self, first: u32, count: u32) {
        self.record(GpuCall::DrawTriangles { first, count });
        let (Some(program), Some(vertex_array)) = (self.bound_program, self.bound_vertex_array)
        else {
            self.invalid("draw needs a program and a vertex array");
            return;
        };
        let bound_attributes = self
            .vertex_arrays
            .get(&vertex_array)
            .map(|slots| slots.len())
            .unwrap_or(0);
        if bound_attributes < ATTRIBUTE_LOCATIONS.len() {
            self.invalid("draw with unbound vertex attributes");
            return;
        }
        let time = self
            .programs
            .get(&program)
            .and_then(|values| values.get("uTime"))
            .and_then(|value| match value {
                UniformValue::Float(t) => Some(*t),
                _ => None,
            });
        let drawing_buffer = self.drawing_buffer_size();
        self.draws.push(DrawRecord {
            first,
            count,
            time,
            drawing_buffer,
        });
    }

    fn flush(&mut self) {
        self.record(GpuCall::Flush);
    }

    fn take_errors(&mut self) -> Vec<GpuDiagnostic> {
        std::mem::take(&mut self.errors)
    }
}
