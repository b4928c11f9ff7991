use crate::compile::{compile_program, ShaderSources};
use crate::error::{RenderError, Result};
use crate::geometry::{build_border_mesh, Mesh, VERTEX_COUNT};
use crate::gpu::{
    BufferHandle, Capability, Gpu, ProgramHandle, UniformLocation, UniformValue,
    VertexArrayHandle,
};
use crate::types::{StyleConfig, ViewportState, COLOR_COUNT};

/// Components per vertex for both attribute streams.
const COMPONENTS: u32 = 2;

const TRANSPARENT: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

/// Runtime switches for a [`RenderSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceOptions {
    /// Drain and log the backend error queue after every mutating step.
    pub check_errors: bool,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self { check_errors: true }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct UniformLocations {
    resolution: Option<UniformLocation>,
    time: Option<UniformLocation>,
    border_width: Option<UniformLocation>,
    glow_width: Option<UniformLocation>,
    border_radius: Option<UniformLocation>,
    glow_exponent: Option<UniformLocation>,
    glow_factor: Option<UniformLocation>,
    colors: [Option<UniformLocation>; COLOR_COUNT],
}

impl UniformLocations {
    fn resolve<G: Gpu>(gpu: &G, program: &ProgramHandle) -> Self {
        let lookup = |name: &str| {
            let location = gpu.uniform_location(program, name);
            if location.is_none() {
                tracing::debug!(uniform = name, "uniform inactive in border program");
            }
            location
        };
        Self {
            resolution: lookup("uResolution"),
            time: lookup("uTime"),
            border_width: lookup("uBorderWidth"),
            glow_width: lookup("uGlowWidth"),
            border_radius: lookup("uBorderRadius"),
            glow_exponent: lookup("uGlowExponent"),
            glow_factor: lookup("uGlowFactor"),
            colors: [
                lookup("uColors[0]"),
                lookup("uColors[1]"),
                lookup("uColors[2]"),
                lookup("uColors[3]"),
            ],
        }
    }
}

/// Every GPU object owned by one surface; released together in `dispose`.
#[derive(Debug)]
struct GpuResourceSet {
    program: ProgramHandle,
    vertex_array: VertexArrayHandle,
    position_buffer: BufferHandle,
    uv_buffer: BufferHandle,
    position_location: u32,
    uv_location: u32,
    uniforms: UniformLocations,
}

/// Owns the border program, its vertex data and the drawing buffer.
///
/// Every entry point rebinds what it needs and leaves no program, vertex
/// array or array buffer bound on exit.
pub struct RenderSurface<G: Gpu> {
    gpu: G,
    resources: Option<GpuResourceSet>,
    options: SurfaceOptions,
    mesh: Option<Mesh>,
    viewport: Option<ViewportState>,
}

impl<G: Gpu> RenderSurface<G> {
    pub fn new(gpu: G, sources: &ShaderSources) -> Result<Self> {
        Self::with_options(gpu, sources, SurfaceOptions::default())
    }

    pub fn with_options(mut gpu: G, sources: &ShaderSources, options: SurfaceOptions) -> Result<Self> {
        let program = compile_program(&mut gpu, &sources.vertex, &sources.fragment)?;

        let attributes = (
            gpu.attribute_location(&program, "aPosition"),
            gpu.attribute_location(&program, "aUV"),
        );
        let (Some(position_location), Some(uv_location)) = attributes else {
            gpu.delete_program(program);
            let missing = if attributes.0.is_none() { "aPosition" } else { "aUV" };
            return Err(RenderError::Setup(format!(
                "border program has no active attribute {missing}"
            )));
        };
        let uniforms = UniformLocations::resolve(&gpu, &program);

        let vertex_array = match gpu.create_vertex_array() {
            Ok(vertex_array) => vertex_array,
            Err(message) => {
                gpu.delete_program(program);
                return Err(RenderError::Setup(format!(
                    "failed to create vertex array: {message}"
                )));
            }
        };
        let position_buffer = match gpu.create_buffer() {
            Ok(buffer) => buffer,
            Err(message) => {
                gpu.delete_vertex_array(vertex_array);
                gpu.delete_program(program);
                return Err(RenderError::Setup(format!(
                    "failed to create position buffer: {message}"
                )));
            }
        };
        let uv_buffer = match gpu.create_buffer() {
            Ok(buffer) => buffer,
            Err(message) => {
                gpu.delete_vertex_array(vertex_array);
                gpu.delete_buffer(position_buffer);
                gpu.delete_program(program);
                return Err(RenderError::Setup(format!(
                    "failed to create uv buffer: {message}"
                )));
            }
        };

        let mut surface = Self {
            gpu,
            resources: Some(GpuResourceSet {
                program,
                vertex_array,
                position_buffer,
                uv_buffer,
                position_location,
                uv_location,
                uniforms,
            }),
            options,
            mesh: None,
            viewport: None,
        };
        surface.check_gpu_errors("setup");
        tracing::debug!("render surface ready");
        Ok(surface)
    }

    /// Sizes the drawing buffer, rebuilds the mesh and rewrites every uniform.
    pub fn configure(&mut self, viewport: &ViewportState, style: &StyleConfig) -> Result<()> {
        viewport.validate()?;
        let resources = self.resources.as_ref().ok_or(RenderError::Disposed)?;

        let ratio = viewport.device_pixel_ratio as f32;
        let border_px = style.border_width() * ratio;
        let glow_px = style.glow_width() * ratio;
        let radius_px = style.border_radius() * ratio;
        let mesh = build_border_mesh(viewport.pixel_width, viewport.pixel_height, border_px, glow_px)?;

        let gpu = &mut self.gpu;
        gpu.resize_drawing_buffer(viewport.pixel_width, viewport.pixel_height);
        gpu.viewport(0, 0, viewport.pixel_width, viewport.pixel_height);

        gpu.bind_vertex_array(Some(&resources.vertex_array));
        gpu.bind_array_buffer(Some(&resources.position_buffer));
        gpu.buffer_data(mesh.positions());
        gpu.vertex_attrib_pointer(resources.position_location, COMPONENTS);
        gpu.bind_array_buffer(Some(&resources.uv_buffer));
        gpu.buffer_data(mesh.uvs());
        gpu.vertex_attrib_pointer(resources.uv_location, COMPONENTS);

        let uniforms = &resources.uniforms;
        let (glow_exponent, glow_factor) = style.mode().glow_parameters();
        gpu.use_program(Some(&resources.program));
        write_uniform(
            gpu,
            uniforms.resolution,
            UniformValue::Vec2([viewport.pixel_width as f32, viewport.pixel_height as f32]),
        );
        write_uniform(gpu, uniforms.border_width, UniformValue::Float(border_px));
        write_uniform(gpu, uniforms.glow_width, UniformValue::Float(glow_px));
        write_uniform(gpu, uniforms.border_radius, UniformValue::Float(radius_px));
        write_uniform(gpu, uniforms.glow_exponent, UniformValue::Float(glow_exponent));
        write_uniform(gpu, uniforms.glow_factor, UniformValue::Float(glow_factor));
        for (location, color) in uniforms.colors.iter().zip(style.colors()) {
            write_uniform(gpu, *location, UniformValue::Vec3(color.to_array()));
        }

        gpu.bind_array_buffer(None);
        gpu.bind_vertex_array(None);
        gpu.use_program(None);

        tracing::debug!(
            width = viewport.pixel_width,
            height = viewport.pixel_height,
            ratio = viewport.device_pixel_ratio,
            mode = %style.mode(),
            inset_x = mesh.insets().inset_x,
            inset_y = mesh.insets().inset_y,
            "configured border surface"
        );
        self.mesh = Some(mesh);
        self.viewport = Some(*viewport);
        self.check_gpu_errors("configure");
        Ok(())
    }

    /// Draws the border at `time` seconds and flushes.
    pub fn draw_frame(&mut self, time: f32) -> Result<()> {
        let resources = self.resources.as_ref().ok_or(RenderError::Disposed)?;
        if self.mesh.is_none() {
            return Err(RenderError::invalid(
                "draw_frame called before the surface was configured",
            ));
        }

        let gpu = &mut self.gpu;
        gpu.use_program(Some(&resources.program));
        gpu.bind_vertex_array(Some(&resources.vertex_array));
        write_uniform(gpu, resources.uniforms.time, UniformValue::Float(time));

        gpu.disable(Capability::DepthTest);
        gpu.disable(Capability::CullFace);
        gpu.disable(Capability::Blend);
        gpu.clear(TRANSPARENT);
        gpu.draw_triangles(0, VERTEX_COUNT as u32);
        gpu.flush();

        gpu.bind_vertex_array(None);
        gpu.use_program(None);

        tracing::trace!(time, "drew border frame");
        self.check_gpu_errors("draw");
        Ok(())
    }

    /// Releases the vertex array, both buffers and the program, in that order.
    pub fn dispose(&mut self) -> Result<()> {
        let resources = self.resources.take().ok_or(RenderError::Disposed)?;
        self.gpu.delete_vertex_array(resources.vertex_array);
        self.gpu.delete_buffer(resources.position_buffer);
        self.gpu.delete_buffer(resources.uv_buffer);
        self.gpu.delete_program(resources.program);
        self.mesh = None;
        self.check_gpu_errors("dispose");
        tracing::debug!("render surface disposed");
        Ok(())
    }

    /// Drains the backend error queue and logs each entry under `context`.
    ///
    /// Returns the number of diagnostics seen; never fails.
    pub fn check_gpu_errors(&mut self, context: &str) -> usize {
        if !self.options.check_errors {
            return 0;
        }
        let diagnostics = self.gpu.take_errors();
        for diagnostic in &diagnostics {
            tracing::error!(context, error = %diagnostic, "GPU error");
        }
        diagnostics.len()
    }

    /// Mesh uploaded by the last successful `configure`.
    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    pub fn viewport(&self) -> Option<ViewportState> {
        self.viewport
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn gpu_mut(&mut self) -> &mut G {
        &mut self.gpu
    }

    pub fn is_disposed(&self) -> bool {
        self.resources.is_none()
    }
}

fn write_uniform<G: Gpu>(gpu: &mut G, location: Option<UniformLocation>, value: UniformValue) {
    if let Some(location) = location {
        gpu.set_uniform(location, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::recording::{GpuCall, RecordingGpu};
    use crate::gpu::{DiagnosticKind, GpuDiagnostic};
    use crate::types::{ColorMode, DEFAULT_COLORS};

    fn surface() -> RenderSurface<RecordingGpu> {
        RenderSurface::new(RecordingGpu::new(), &ShaderSources::bundled()).unwrap()
    }

    fn viewport(width: f64, height: f64, ratio: f64) -> ViewportState {
        ViewportState::from_logical(width, height, ratio).unwrap()
    }

    #[test]
    fn setup_leaves_nothing_bound() {
        let surface = surface();
        assert_eq!(surface.gpu().bindings(), (None, None, None));
        let live = surface.gpu().live_objects();
        assert_eq!(live.programs, 1);
        assert_eq!(live.vertex_arrays, 1);
        assert_eq!(live.buffers, 2);
        assert_eq!(live.shaders, 0);
    }

    #[test]
    fn missing_attribute_is_a_setup_error() {
        let mut gpu = RecordingGpu::new();
        gpu.hide_attribute("aUV");
        let err = RenderSurface::new(gpu, &ShaderSources::bundled())
            .err()
            .unwrap();
        assert!(matches!(err, RenderError::Setup(ref message) if message.contains("aUV")));
    }

    #[test]
    fn configure_uploads_mesh_and_uniforms() {
        let mut surface = surface();
        let style = StyleConfig::new(8.0, 200.0, 8.0, ColorMode::Dark, DEFAULT_COLORS).unwrap();
        surface.configure(&viewport(300.0, 150.0, 2.0), &style).unwrap();

        let gpu = surface.gpu();
        assert_eq!(gpu.drawing_buffer_size(), (600, 300));
        assert!(gpu.calls().contains(&GpuCall::Viewport(0, 0, 600, 300)));
        assert_eq!(gpu.uniform("uResolution"), Some(UniformValue::Vec2([600.0, 300.0])));
        assert_eq!(gpu.uniform("uBorderWidth"), Some(UniformValue::Float(16.0)));
        assert_eq!(gpu.uniform("uGlowWidth"), Some(UniformValue::Float(400.0)));
        assert_eq!(gpu.uniform("uBorderRadius"), Some(UniformValue::Float(16.0)));
        assert_eq!(gpu.uniform("uGlowExponent"), Some(UniformValue::Float(2.0)));
        assert_eq!(gpu.uniform("uGlowFactor"), Some(UniformValue::Float(1.8)));
        assert_eq!(
            gpu.uniform("uColors[3]"),
            Some(UniformValue::Vec3(DEFAULT_COLORS[3].to_array()))
        );
        assert_eq!(gpu.bindings(), (None, None, None));

        let insets = surface.mesh().unwrap().insets();
        assert_eq!(insets.inset_y, 150.0);
        assert!(insets.is_collapsed());
    }

    #[test]
    fn reconfigure_uploads_both_buffers_in_full() {
        let mut surface = surface();
        let style = StyleConfig::new(8.0, 200.0, 8.0, ColorMode::Light, DEFAULT_COLORS).unwrap();
        surface.configure(&viewport(600.0, 600.0, 1.0), &style).unwrap();
        surface.gpu_mut().clear_calls();
        surface.configure(&viewport(300.0, 150.0, 2.0), &style).unwrap();

        let gpu = surface.gpu();
        let uploads: Vec<(u64, usize)> = gpu
            .calls()
            .iter()
            .filter_map(|call| match call {
                GpuCall::BufferData { buffer, len } => Some((*buffer, *len)),
                _ => None,
            })
            .collect();
        assert_eq!(uploads.len(), 2);
        assert!(uploads.iter().all(|(_, len)| *len == 48));

        let mesh = surface.mesh().unwrap();
        assert_eq!(gpu.buffer_contents(uploads[0].0), Some(&mesh.positions()[..]));
        assert_eq!(gpu.buffer_contents(uploads[1].0), Some(&mesh.uvs()[..]));
    }

    #[test]
    fn reconfigure_is_bit_identical() {
        let mut surface = surface();
        let style = StyleConfig::default();
        let view = viewport(640.0, 480.0, 1.5);
        surface.configure(&view, &style).unwrap();
        let first = surface.mesh().cloned().unwrap();
        surface.configure(&view, &style).unwrap();
        let second = surface.mesh().unwrap();
        let bits = |values: &[f32]| values.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(first.positions()), bits(second.positions()));
        assert_eq!(bits(first.uvs()), bits(second.uvs()));
    }

    #[test]
    fn draw_frame_runs_fixed_sequence() {
        let mut surface = surface();
        surface
            .configure(&viewport(100.0, 100.0, 1.0), &StyleConfig::default())
            .unwrap();
        surface.gpu_mut().clear_calls();
        surface.draw_frame(1.25).unwrap();

        let gpu = surface.gpu();
        let calls = gpu.calls();
        assert!(matches!(calls[0], GpuCall::UseProgram(Some(_))));
        assert!(matches!(calls[1], GpuCall::BindVertexArray(Some(_))));
        assert!(matches!(
            calls[2],
            GpuCall::SetUniform {
                name: "uTime",
                value: UniformValue::Float(t)
            } if t == 1.25
        ));
        assert_eq!(
            &calls[3..9],
            &[
                GpuCall::Disable(Capability::DepthTest),
                GpuCall::Disable(Capability::CullFace),
                GpuCall::Disable(Capability::Blend),
                GpuCall::Clear(TRANSPARENT),
                GpuCall::DrawTriangles { first: 0, count: 24 },
                GpuCall::Flush,
            ]
        );
        assert_eq!(gpu.draws()[0].time, Some(1.25));
        assert!(gpu.is_disabled(Capability::DepthTest));
        assert!(gpu.is_disabled(Capability::CullFace));
        assert!(gpu.is_disabled(Capability::Blend));
        assert_eq!(gpu.bindings(), (None, None, None));
        assert_eq!(gpu.pending_errors(), 0);
    }

    #[test]
    fn draw_before_configure_is_rejected() {
        let mut surface = surface();
        assert!(matches!(
            surface.draw_frame(0.0),
            Err(RenderError::InvalidState(_))
        ));
    }

    #[test]
    fn dispose_releases_in_order_once() {
        let mut surface = surface();
        surface.gpu_mut().clear_calls();
        surface.dispose().unwrap();

        let calls = surface.gpu().calls().to_vec();
        assert!(matches!(
            calls.as_slice(),
            [
                GpuCall::DeleteVertexArray(_),
                GpuCall::DeleteBuffer(_),
                GpuCall::DeleteBuffer(_),
                GpuCall::DeleteProgram(_),
            ]
        ));
        assert_eq!(surface.gpu().live_objects().total(), 0);
        assert!(surface.is_disposed());

        assert!(matches!(surface.dispose(), Err(RenderError::Disposed)));
        assert!(matches!(surface.draw_frame(0.0), Err(RenderError::Disposed)));
        assert!(matches!(
            surface.configure(&viewport(10.0, 10.0, 1.0), &StyleConfig::default()),
            Err(RenderError::Disposed)
        ));
    }

    #[test]
    fn diagnostics_are_drained_without_changing_results() {
        let mut surface = surface();
        surface
            .configure(&viewport(50.0, 50.0, 1.0), &StyleConfig::default())
            .unwrap();
        surface
            .gpu_mut()
            .push_error(GpuDiagnostic::new(DiagnosticKind::OutOfMemory, ""));
        assert!(surface.draw_frame(0.5).is_ok());
        assert_eq!(surface.gpu().pending_errors(), 0);
        assert_eq!(surface.gpu().draw_count(), 1);
    }

    #[test]
    fn disabled_checking_leaves_queue_untouched() {
        let mut surface = RenderSurface::with_options(
            RecordingGpu::new(),
            &ShaderSources::bundled(),
            SurfaceOptions {
                check_errors: false,
            },
        )
        .unwrap();
        surface
            .gpu_mut()
            .push_error(GpuDiagnostic::new(DiagnosticKind::InvalidEnum, ""));
        assert_eq!(surface.check_gpu_errors("test"), 0);
        assert_eq!(surface.gpu().pending_errors(), 1);
    }
}
