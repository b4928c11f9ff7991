//! Backend seam between the border renderer and the graphics API.
//!
//! The surface speaks a small, GL-shaped vocabulary so the ownership and
//! binding rules stay explicit:
//! - `context` implements [`Gpu`] on a headless `wgpu` device that renders
//!   into an offscreen texture (the canvas backing store).
//! - `uniforms` fixes the std140 layout of the `BorderParams` block and maps
//!   uniform names to locations.
//! - `recording` is an in-memory backend that logs every call; tests and dry
//!   runs use it in place of a device.
//!
//! Handles are move-only: deleting one consumes it, so a handle cannot be
//! freed twice or used after deletion.

mod context;
pub mod recording;
mod uniforms;

use std::fmt;

pub use context::{WgpuGpu, WgpuOptions};
pub use recording::RecordingGpu;
pub use uniforms::{uniform_index, UNIFORM_NAMES};

/// Programmable stage of a shader object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, PartialEq, Eq, Hash)]
        pub struct $name(u64);

        impl $name {
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            pub fn id(&self) -> u64 {
                self.0
            }
        }
    };
}

gpu_handle!(
    /// Compiled (unlinked) shader stage.
    ShaderHandle
);
gpu_handle!(
    /// Linked program ready for drawing.
    ProgramHandle
);
gpu_handle!(
    /// Vertex attribute bindings (buffer per attribute location).
    VertexArrayHandle
);
gpu_handle!(
    /// Vertex data store.
    BufferHandle
);

/// Location of a uniform inside a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub(crate) u32);

impl UniformLocation {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Value written to a uniform location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
}

/// Fixed-function state the surface switches off before drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    DepthTest,
    CullFace,
    Blend,
}

/// Class of an entry in the GPU error queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    InvalidFramebufferOperation,
    OutOfMemory,
    ContextLost,
    Unknown,
}

impl DiagnosticKind {
    pub fn name(self) -> &'static str {
        match self {
            DiagnosticKind::InvalidEnum => "INVALID_ENUM",
            DiagnosticKind::InvalidValue => "INVALID_VALUE",
            DiagnosticKind::InvalidOperation => "INVALID_OPERATION",
            DiagnosticKind::InvalidFramebufferOperation => "INVALID_FRAMEBUFFER_OPERATION",
            DiagnosticKind::OutOfMemory => "OUT_OF_MEMORY",
            DiagnosticKind::ContextLost => "CONTEXT_LOST",
            DiagnosticKind::Unknown => "UNKNOWN_ERROR",
        }
    }
}

/// One drained entry of the GPU error queue. Advisory only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuDiagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl GpuDiagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for GpuDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(self.kind.name())
        } else {
            write!(f, "{}: {}", self.kind.name(), self.message)
        }
    }
}

/// Graphics operations used by the border renderer.
///
/// Mirrors the GL object model: one program, vertex array and array buffer
/// may be bound at a time, uploads and attribute pointers act on the bound
/// objects, uniforms act on the bound program. Invalid calls never fail the
/// caller; they queue a [`GpuDiagnostic`] retrievable with
/// [`Gpu::take_errors`].
pub trait Gpu {
    /// Compiles one stage. On failure returns the compiler log.
    fn create_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String>;
    fn delete_shader(&mut self, shader: ShaderHandle);

    /// Links a vertex/fragment pair. On failure returns the linker log.
    fn link_program(
        &mut self,
        vertex: &ShaderHandle,
        fragment: &ShaderHandle,
    ) -> Result<ProgramHandle, String>;
    fn delete_program(&mut self, program: ProgramHandle);

    fn create_vertex_array(&mut self) -> Result<VertexArrayHandle, String>;
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    fn create_buffer(&mut self) -> Result<BufferHandle, String>;
    fn delete_buffer(&mut self, buffer: BufferHandle);

    fn attribute_location(&self, program: &ProgramHandle, name: &str) -> Option<u32>;
    fn uniform_location(&self, program: &ProgramHandle, name: &str) -> Option<UniformLocation>;

    /// Resizes the drawing buffer (the canvas backing store).
    fn resize_drawing_buffer(&mut self, width: u32, height: u32);
    fn drawing_buffer_size(&self) -> (u32, u32);
    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);

    fn use_program(&mut self, program: Option<&ProgramHandle>);
    fn bind_vertex_array(&mut self, vertex_array: Option<&VertexArrayHandle>);
    fn bind_array_buffer(&mut self, buffer: Option<&BufferHandle>);

    /// Replaces the whole contents of the bound array buffer.
    fn buffer_data(&mut self, data: &[f32]);
    /// Enables `location` on the bound vertex array, sourcing `components`
    /// floats per vertex from the bound array buffer.
    fn vertex_attrib_pointer(&mut self, location: u32, components: u32);

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    fn disable(&mut self, capability: Capability);
    fn clear(&mut self, rgba: [f32; 4]);
    fn draw_triangles(&mut self, first: u32, count: u32);
    /// Submits everything recorded since the previous flush.
    fn flush(&mut self);

    /// Drains the error queue.
    fn take_errors(&mut self) -> Vec<GpuDiagnostic>;
}
