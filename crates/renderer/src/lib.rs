//! Renderer crate for glowframe, the animated glowing-border overlay.
//!
//! The crate turns a style and a viewport into GPU work. The overall flow is:
//!
//! ```text
//!   StyleConfig + ViewportState
//!          │
//!          ▼
//!   RenderSurface::configure ──▶ build_border_mesh() ──▶ vertex buffers
//!          │                                        └─▶ BorderParams uniforms
//!          ▼
//!   RenderSurface::draw_frame(t) ──▶ uTime ──▶ draw 24 vertices ──▶ flush
//! ```
//!
//! `RenderSurface` owns every GPU object (program, vertex array, buffers),
//! while the [`gpu::Gpu`] trait keeps it independent of the backend: the
//! headless [`gpu::WgpuGpu`] renders through `wgpu`, and [`gpu::RecordingGpu`]
//! logs calls for tests and dry runs. Pacing and lifecycle live in the
//! scheduler crate.

pub mod compile;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod surface;
pub mod types;

pub use compile::{compile_program, ShaderSources};
pub use error::{RenderError, Result};
pub use geometry::{build_border_mesh, BorderInsets, Mesh, VERTEX_COUNT};
pub use gpu::{Gpu, GpuDiagnostic, RecordingGpu, WgpuGpu, WgpuOptions};
pub use surface::{RenderSurface, SurfaceOptions};
pub use types::{ColorMode, Rgb, StyleConfig, ViewportState, DEFAULT_COLORS, MAX_BORDER_WIDTH};
