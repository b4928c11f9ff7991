use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use wgpu::naga;

use super::uniforms::{BorderUniforms, ATTRIBUTE_LOCATIONS};
use super::{
    BufferHandle, Capability, DiagnosticKind, Gpu, GpuDiagnostic, ProgramHandle, ShaderHandle,
    ShaderStage, UniformLocation, UniformValue, VertexArrayHandle,
};
use crate::error::{RenderError, Result};

/// Pixel format of the offscreen backing store.
const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Bytes per vertex of one two-component float attribute.
const ATTRIBUTE_STRIDE: u64 = 2 * std::mem::size_of::<f32>() as u64;

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x2,
    offset: 0,
    shader_location: 0,
}];

const UV_ATTRIBUTES: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x2,
    offset: 0,
    shader_location: 1,
}];

/// Knobs for headless device bring-up.
#[derive(Debug, Clone)]
pub struct WgpuOptions {
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
    /// Drawing-buffer size before the first resize.
    pub initial_size: (u32, u32),
}

impl Default for WgpuOptions {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::LowPower,
            initial_size: (300, 150),
        }
    }
}

struct ShaderObject {
    stage: ShaderStage,
    module: wgpu::ShaderModule,
}

struct ProgramObject {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    uniforms: BorderUniforms,
}

#[derive(Default)]
struct VertexArrayObject {
    /// attribute location -> buffer id
    slots: BTreeMap<u32, u64>,
}

#[derive(Default)]
struct BufferObject {
    storage: Option<wgpu::Buffer>,
    len: u64,
}

struct RenderTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl RenderTarget {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("glowframe backing store"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }
}

/// Headless `wgpu` implementation of [`Gpu`].
///
/// Programs are render pipelines compiled from GLSL through naga, each with
/// its own std140 uniform buffer. Frames land in an offscreen RGBA texture
/// that plays the role of the canvas backing store; hosts can sample it via
/// [`WgpuGpu::target_view`] or read it back with [`WgpuGpu::read_pixels`].
pub struct WgpuGpu {
    _instance: wgpu::Instance,
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    max_dimension: u32,
    uniform_layout: wgpu::BindGroupLayout,
    target: RenderTarget,
    viewport: Option<(i32, i32, u32, u32)>,
    shaders: HashMap<u64, ShaderObject>,
    programs: HashMap<u64, ProgramObject>,
    vertex_arrays: HashMap<u64, VertexArrayObject>,
    buffers: HashMap<u64, BufferObject>,
    next_id: u64,
    bound_program: Option<u64>,
    bound_vertex_array: Option<u64>,
    bound_array_buffer: Option<u64>,
    encoder: Option<wgpu::CommandEncoder>,
    pending_clear: Option<wgpu::Color>,
    errors: Arc<Mutex<Vec<GpuDiagnostic>>>,
}

impl WgpuGpu {
    pub fn new(options: WgpuOptions) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: options.backends,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: options.power_preference,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|err| RenderError::Setup(format!("failed to find a suitable GPU adapter: {err}")))?;

        let adapter_info = adapter.get_info();
        let limits = adapter.limits();
        tracing::debug!(
            name = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "selected GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("glowframe device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits.clone(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .map_err(|err| RenderError::Setup(format!("failed to create GPU device: {err}")))?;

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        device.on_uncaptured_error(Box::new(move |error: wgpu::Error| {
            let diagnostic = diagnostic_from(&error);
            match sink.lock() {
                Ok(mut queue) => queue.push(diagnostic),
                Err(poisoned) => poisoned.into_inner().push(diagnostic),
            }
        }));

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("border uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(BorderUniforms::SIZE),
                },
                count: None,
            }],
        });

        let max_dimension = limits.max_texture_dimension_2d;
        let (width, height) = options.initial_size;
        let target = RenderTarget::new(
            &device,
            width.clamp(1, max_dimension),
            height.clamp(1, max_dimension),
        );

        Ok(Self {
            _instance: instance,
            device,
            queue,
            adapter_name: adapter_info.name,
            max_dimension,
            uniform_layout,
            target,
            viewport: None,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            vertex_arrays: HashMap::new(),
            buffers: HashMap::new(),
            next_id: 0,
            bound_program: None,
            bound_vertex_array: None,
            bound_array_buffer: None,
            encoder: None,
            pending_clear: None,
            errors,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// View of the backing store, for hosts that composite it themselves.
    pub fn target_view(&self) -> &wgpu::TextureView {
        &self.target.view
    }

    /// Copies the backing store into an RGBA image (rows top to bottom).
    pub fn read_pixels(&mut self) -> Result<image::RgbaImage> {
        self.flush();

        let (width, height) = (self.target.width, self.target.height);
        let unpadded_bytes_per_row = width * 4;
        let padded_bytes_per_row = unpadded_bytes_per_row
            .div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("glowframe readback"),
            size: u64::from(padded_bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("glowframe readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        if let Err(err) = self.device.poll(wgpu::PollType::Wait) {
            tracing::warn!(%err, "device poll failed while reading back pixels");
        }
        receiver
            .recv()
            .map_err(|_| RenderError::Setup("readback callback was dropped".to_string()))?
            .map_err(|err| RenderError::Setup(format!("failed to map readback buffer: {err}")))?;

        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(padded_bytes_per_row as usize) {
                pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
            }
        }
        readback.unmap();

        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| RenderError::Setup("readback size mismatch".to_string()))
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn report(&self, kind: DiagnosticKind, message: impl Into<String>) {
        let diagnostic = GpuDiagnostic::new(kind, message);
        match self.errors.lock() {
            Ok(mut queue) => queue.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("glowframe frame encoder"),
            })
        })
    }

    fn record_clear_pass(&mut self, color: wgpu::Color) {
        let view = self.target.view.clone();
        let encoder = self.encoder();
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("glowframe clear pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
    }

    fn build_pipeline(
        &self,
        vertex: &wgpu::ShaderModule,
        fragment: &wgpu::ShaderModule,
    ) -> wgpu::RenderPipeline {
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("border pipeline layout"),
                bind_group_layouts: &[&self.uniform_layout],
                push_constant_ranges: &[],
            });

        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("border pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: vertex,
                    entry_point: Some("main"),
                    buffers: &[
                        wgpu::VertexBufferLayout {
                            array_stride: ATTRIBUTE_STRIDE,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &POSITION_ATTRIBUTES,
                        },
                        wgpu::VertexBufferLayout {
                            array_stride: ATTRIBUTE_STRIDE,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &UV_ATTRIBUTES,
                        },
                    ],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                // Depth, culling and blending are baked off; `disable` is a no-op.
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: fragment,
                    entry_point: Some("main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TARGET_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview: None,
                cache: None,
            })
    }
}

impl Gpu for WgpuGpu {
    fn create_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String> {
        let naga_stage = match stage {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(match stage {
                    ShaderStage::Vertex => "border vertex",
                    ShaderStage::Fragment => "border fragment",
                }),
                source: wgpu::ShaderSource::Glsl {
                    shader: Cow::Owned(source.to_owned()),
                    stage: naga_stage,
                    defines: &[],
                },
            });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(error.to_string());
        }

        let id = self.allocate();
        self.shaders.insert(id, ShaderObject { stage, module });
        Ok(ShaderHandle::new(id))
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        if self.shaders.remove(&shader.id()).is_none() {
            self.report(
                DiagnosticKind::InvalidValue,
                format!("delete of unknown shader {}", shader.id()),
            );
        }
    }

    fn link_program(
        &mut self,
        vertex: &ShaderHandle,
        fragment: &ShaderHandle,
    ) -> Result<ProgramHandle, String> {
        let (Some(vertex), Some(fragment)) = (
            self.shaders.get(&vertex.id()),
            self.shaders.get(&fragment.id()),
        ) else {
            return Err("link references a deleted shader".to_string());
        };
        if vertex.stage != ShaderStage::Vertex || fragment.stage != ShaderStage::Fragment {
            return Err("link requires one vertex and one fragment shader".to_string());
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self.build_pipeline(&vertex.module, &fragment.module);
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(error.to_string());
        }

        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("border uniforms"),
            size: BorderUniforms::SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("border uniform bind group"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let uniforms = BorderUniforms::default();
        self.queue
            .write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let id = self.allocate();
        self.programs.insert(
            id,
            ProgramObject {
                pipeline,
                bind_group,
                uniform_buffer,
                uniforms,
            },
        );
        Ok(ProgramHandle::new(id))
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        match self.programs.remove(&program.id()) {
            Some(object) => object.uniform_buffer.destroy(),
            None => self.report(
                DiagnosticKind::InvalidValue,
                format!("delete of unknown program {}", program.id()),
            ),
        }
        if self.bound_program == Some(program.id()) {
            self.bound_program = None;
        }
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayHandle, String> {
        let id = self.allocate();
        self.vertex_arrays.insert(id, VertexArrayObject::default());
        Ok(VertexArrayHandle::new(id))
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        if self.vertex_arrays.remove(&vertex_array.id()).is_none() {
            self.report(
                DiagnosticKind::InvalidValue,
                format!("delete of unknown vertex array {}", vertex_array.id()),
            );
        }
        if self.bound_vertex_array == Some(vertex_array.id()) {
            self.bound_vertex_array = None;
        }
    }

    fn create_buffer(&mut self) -> Result<BufferHandle, String> {
        let id = self.allocate();
        self.buffers.insert(id, BufferObject::default());
        Ok(BufferHandle::new(id))
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        match self.buffers.remove(&buffer.id()) {
            Some(object) => {
                if let Some(storage) = object.storage {
                    storage.destroy();
                }
            }
            None => self.report(
                DiagnosticKind::InvalidValue,
                format!("delete of unknown buffer {}", buffer.id()),
            ),
        }
        if self.bound_array_buffer == Some(buffer.id()) {
            self.bound_array_buffer = None;
        }
    }

    fn attribute_location(&self, program: &ProgramHandle, name: &str) -> Option<u32> {
        if !self.programs.contains_key(&program.id()) {
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
        let clamped_width = width.clamp(1, self.max_dimension);
        let clamped_height = height.clamp(1, self.max_dimension);
        if (clamped_width, clamped_height) != (width, height) {
            tracing::warn!(
                width,
                height,
                max = self.max_dimension,
                "drawing buffer exceeds GPU texture limits; clamping"
            );
        }
        if (clamped_width, clamped_height) == (self.target.width, self.target.height) {
            return;
        }
        // Pending work targets the old texture.
        self.flush();
        self.target = RenderTarget::new(&self.device, clamped_width, clamped_height);
        tracing::debug!(
            width = clamped_width,
            height = clamped_height,
            "resized backing store"
        );
    }

    fn drawing_buffer_size(&self) -> (u32, u32) {
        (self.target.width, self.target.height)
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.viewport = Some((x, y, width, height));
    }

    fn use_program(&mut self, program: Option<&ProgramHandle>) {
        let id = program.map(ProgramHandle::id);
        if let Some(id) = id {
            if !self.programs.contains_key(&id) {
                self.report(
                    DiagnosticKind::InvalidOperation,
                    format!("use of unknown program {id}"),
                );
                return;
            }
        }
        self.bound_program = id;
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<&VertexArrayHandle>) {
        let id = vertex_array.map(VertexArrayHandle::id);
        if let Some(id) = id {
            if !self.vertex_arrays.contains_key(&id) {
                self.report(
                    DiagnosticKind::InvalidOperation,
                    format!("bind of unknown vertex array {id}"),
                );
                return;
            }
        }
        self.bound_vertex_array = id;
    }

    fn bind_array_buffer(&mut self, buffer: Option<&BufferHandle>) {
        let id = buffer.map(BufferHandle::id);
        if let Some(id) = id {
            if !self.buffers.contains_key(&id) {
                self.report(
                    DiagnosticKind::InvalidOperation,
                    format!("bind of unknown buffer {id}"),
                );
                return;
            }
        }
        self.bound_array_buffer = id;
    }

    fn buffer_data(&mut self, data: &[f32]) {
        let Some(id) = self.bound_array_buffer else {
            self.report(
                DiagnosticKind::InvalidOperation,
                "buffer_data with no array buffer bound",
            );
            return;
        };
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let len = bytes.len() as u64;
        let Some(object) = self.buffers.get_mut(&id) else {
            return;
        };

        if object.len != len || object.storage.is_none() {
            if let Some(old) = object.storage.take() {
                old.destroy();
            }
            object.storage = (len > 0).then(|| {
                self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("border vertex data"),
                    size: len,
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            });
            object.len = len;
        }
        if let Some(storage) = &object.storage {
            self.queue.write_buffer(storage, 0, bytes);
        }
    }

    fn vertex_attrib_pointer(&mut self, location: u32, components: u32) {
        if components != 2 {
            self.report(
                DiagnosticKind::InvalidValue,
                format!("attribute {location} must have 2 components (got {components})"),
            );
            return;
        }
        match (self.bound_vertex_array, self.bound_array_buffer) {
            (Some(vertex_array), Some(buffer)) => {
                if let Some(object) = self.vertex_arrays.get_mut(&vertex_array) {
                    object.slots.insert(location, buffer);
                }
            }
            _ => self.report(
                DiagnosticKind::InvalidOperation,
                "vertex_attrib_pointer needs a bound vertex array and buffer",
            ),
        }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let Some(program) = self
            .bound_program
            .and_then(|id| self.programs.get_mut(&id))
        else {
            self.report(
                DiagnosticKind::InvalidOperation,
                "uniform written with no program in use",
            );
            return;
        };
        match program.uniforms.write(location, value) {
            Some(range) => {
                let bytes = &bytemuck::bytes_of(&program.uniforms)[range.clone()];
                self.queue
                    .write_buffer(&program.uniform_buffer, range.start as u64, bytes);
            }
            None => self.report(
                DiagnosticKind::InvalidOperation,
                format!(
                    "uniform location {} does not accept {value:?}",
                    location.index()
                ),
            ),
        }
    }

    fn disable(&mut self, capability: Capability) {
        tracing::trace!(?capability, "capability already disabled in pipeline state");
    }

    fn clear(&mut self, rgba: [f32; 4]) {
        self.pending_clear = Some(wgpu::Color {
            r: f64::from(rgba[0]),
            g: f64::from(rgba[1]),
            b: f64::from(rgba[2]),
            a: f64::from(rgba[3]),
        });
    }

    fn draw_triangles(&mut self, first: u32, count: u32) {
        let (Some(program_id), Some(vertex_array_id)) =
            (self.bound_program, self.bound_vertex_array)
        else {
            self.report(
                DiagnosticKind::InvalidOperation,
                "draw needs a program and a vertex array",
            );
            return;
        };

        let needed = u64::from(first + count) * ATTRIBUTE_STRIDE;
        let mut vertex_buffers = Vec::with_capacity(ATTRIBUTE_LOCATIONS.len());
        for (name, location) in ATTRIBUTE_LOCATIONS {
            let storage = self
                .vertex_arrays
                .get(&vertex_array_id)
                .and_then(|object| object.slots.get(&location))
                .and_then(|buffer| self.buffers.get(buffer))
                .filter(|object| object.len >= needed)
                .and_then(|object| object.storage.clone());
            match storage {
                Some(buffer) => vertex_buffers.push((location, buffer)),
                None => {
                    self.report(
                        DiagnosticKind::InvalidOperation,
                        format!("attribute {name} has no buffer large enough for {count} vertices"),
                    );
                    return;
                }
            }
        }

        let Some(program) = self.programs.get(&program_id) else {
            return;
        };
        let pipeline = program.pipeline.clone();
        let bind_group = program.bind_group.clone();
        let view = self.target.view.clone();
        let (target_width, target_height) = (self.target.width, self.target.height);
        let load = self
            .pending_clear
            .take()
            .map(wgpu::LoadOp::Clear)
            .unwrap_or(wgpu::LoadOp::Load);
        let viewport = self.viewport;

        let encoder = self.encoder();
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("glowframe border pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        if let Some((x, y, width, height)) = viewport {
            let x = (x.max(0) as u32).min(target_width - 1);
            let y = (y.max(0) as u32).min(target_height - 1);
            let width = width.min(target_width - x).max(1);
            let height = height.min(target_height - y).max(1);
            pass.set_viewport(
                x as f32,
                y as f32,
                width as f32,
                height as f32,
                0.0,
                1.0,
            );
        }
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        for (location, buffer) in &vertex_buffers {
            pass.set_vertex_buffer(*location, buffer.slice(..));
        }
        pass.draw(first..first + count, 0..1);
    }

    fn flush(&mut self) {
        if let Some(color) = self.pending_clear.take() {
            self.record_clear_pass(color);
        }
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
        }
    }

    fn take_errors(&mut self) -> Vec<GpuDiagnostic> {
        match self.errors.lock() {
            Ok(mut queue) => std::mem::take(&mut *queue),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

fn diagnostic_from(error: &wgpu::Error) -> GpuDiagnostic {
    let kind = match error {
        wgpu::Error::OutOfMemory { .. } => DiagnosticKind::OutOfMemory,
        wgpu::Error::Validation { .. } => DiagnosticKind::InvalidOperation,
        _ => DiagnosticKind::Unknown,
    };
    GpuDiagnostic::new(kind, error.to_string())
}
