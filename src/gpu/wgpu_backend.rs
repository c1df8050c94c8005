/// wgpu backend for the normal map pass chain
///
/// This module manages all the wgpu boilerplate:
/// - Device and queue initialization
/// - Offscreen surfaces and their resize policy
/// - Input texture uploads
/// - One uniform buffer per pass of the chain
/// - Render pipelines for copy, blur and normal passes
/// - Blocking readback into CPU memory
///
/// Surfaces: the base pass renders the input into `targets[0]`, the
/// horizontal blur reads `targets[0]` into `targets[1]` and the vertical blur
/// reads `targets[1]` back into `targets[0]`, which is the offscreen surface
/// that gets read back.

use wgpu::util::DeviceExt;

use super::backend::{BasePass, FrameUniforms, RasterBackend};
use crate::error::{GeneratorError, Result};
use crate::raster::{RgbaRaster, BYTES_PER_PIXEL};
use crate::stages::{BlurAxis, NormalParams};
use crate::state::HeightInversion;

const SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Uniforms for one pass in a GPU-friendly format
/// Must match the WGSL `PassParams` layout (48 bytes)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuPassParams {
    direction: [f32; 2],
    radius: f32,
    dz: f32,
    invert_r: f32,
    invert_g: f32,
    invert_h: f32,
    algorithm: u32,
    height_mode: u32,
    padding0: u32,
    padding1: u32,
    padding2: u32,
}

impl GpuPassParams {
    fn base(normal: &NormalParams) -> Self {
        Self {
            direction: [0.0, 0.0],
            radius: 0.0,
            // WGSL arithmetic on infinities and subnormals is undefined
            dz: normal.dz.clamp(f32::MIN_POSITIVE, f32::MAX),
            invert_r: normal.invert_r,
            invert_g: normal.invert_g,
            invert_h: normal.invert_h,
            algorithm: normal.algorithm.id(),
            height_mode: match normal.height_inversion {
                HeightInversion::Gradient => 0,
                HeightInversion::Depth => 1,
            },
            padding0: 0,
            padding1: 0,
            padding2: 0,
        }
    }

    fn blur(axis: BlurAxis, radius: f32) -> Self {
        Self {
            direction: axis.direction(),
            radius,
            dz: 1.0,
            invert_r: 1.0,
            invert_g: 1.0,
            invert_h: 1.0,
            algorithm: 0,
            height_mode: 0,
            padding0: 0,
            padding1: 0,
            padding2: 0,
        }
    }
}

/// A render target and its view
struct Surface {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// GPU implementation of `RasterBackend`
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    copy_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    normal_pipeline: wgpu::RenderPipeline,
    // One buffer per pass so writes for the same frame don't overwrite each other
    base_uniforms: wgpu::Buffer,
    blur_h_uniforms: wgpu::Buffer,
    blur_v_uniforms: wgpu::Buffer,
    input: Option<Surface>,
    targets: Option<[Surface; 2]>,
    width: u32,
    height: u32,
    adapter_name: String,
}

// Manual Debug implementation (wgpu types don't implement Debug)
impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.adapter_name)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl WgpuBackend {
    /// Request an adapter and device, then build shaders and pipelines
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| GeneratorError::BackendInit("no suitable GPU adapter found".to_string()))?;

        let adapter_name = adapter.get_info().name;
        tracing::info!("🖥️  Using GPU adapter: {}", adapter_name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Normal Map Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|e| GeneratorError::BackendInit(format!("failed to create device: {e}")))?;

        Self::from_device(device, queue, adapter_name).await
    }

    /// Blocking version of `new` for callers without an async runtime
    pub fn new_blocking() -> Result<Self> {
        pollster::block_on(Self::new())
    }

    /// Build the pass chain on an existing device
    pub async fn from_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        adapter_name: String,
    ) -> Result<Self> {
        // Catch shader compilation and pipeline validation errors instead of panicking
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Normal Map Shader"),
            source: wgpu::ShaderSource::Wgsl(super::shaders::get_shader().into()),
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Pass Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Pass Bind Group Layout"),
            entries: &[
                // Input texture
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Sampler (blur taps use linear filtering)
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // Pass uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Pass Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let copy_pipeline = create_pass_pipeline(&device, &pipeline_layout, &shader, "fs_copy");
        let blur_pipeline = create_pass_pipeline(&device, &pipeline_layout, &shader, "fs_blur");
        let normal_pipeline = create_pass_pipeline(&device, &pipeline_layout, &shader, "fs_normal");

        if let Some(error) = device.pop_error_scope().await {
            return Err(GeneratorError::BackendInit(format!(
                "failed to build shader pipelines: {error}"
            )));
        }

        let create_uniforms = |label: &str| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&[GpuPassParams::blur(BlurAxis::Horizontal, 0.0)]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
        };
        let base_uniforms = create_uniforms("Base Pass Uniforms");
        let blur_h_uniforms = create_uniforms("Horizontal Blur Uniforms");
        let blur_v_uniforms = create_uniforms("Vertical Blur Uniforms");

        tracing::debug!("Pass chain pipelines ready on {}", adapter_name);

        Ok(Self {
            device,
            queue,
            bind_group_layout,
            sampler,
            copy_pipeline,
            blur_pipeline,
            normal_pipeline,
            base_uniforms,
            blur_h_uniforms,
            blur_v_uniforms,
            input: None,
            targets: None,
            width: 0,
            height: 0,
            adapter_name,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn create_surface(&self, label: &str, usage: wgpu::TextureUsages) -> Surface {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: self.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SURFACE_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Surface { texture, view }
    }

    fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    fn bind_group(&self, label: &str, view: &wgpu::TextureView, uniforms: &wgpu::Buffer) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniforms.as_entire_binding(),
                },
            ],
        })
    }
}

impl RasterBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if (width, height) == (self.width, self.height) && self.targets.is_some() {
            return Ok(());
        }

        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(GeneratorError::BackendInit(format!(
                "cannot allocate a {width}x{height} surface (device limit {max}x{max})"
            )));
        }

        self.width = width;
        self.height = height;

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let usage = wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC;
        let targets = [
            self.create_surface("Offscreen Surface", usage),
            self.create_surface("Blur Surface", usage),
        ];
        let input = self.create_surface(
            "Input Texture",
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            self.targets = None;
            self.input = None;
            self.width = 0;
            self.height = 0;
            return Err(GeneratorError::BackendInit(format!(
                "failed to allocate {width}x{height} surfaces: {error}"
            )));
        }

        self.targets = Some(targets);
        self.input = Some(input);
        tracing::debug!("Resized offscreen surfaces to {}x{}", width, height);
        Ok(())
    }

    fn upload(&mut self, raster: &RgbaRaster) -> Result<()> {
        if raster.dimensions() != (self.width, self.height) {
            return Err(GeneratorError::InvalidImage(format!(
                "upload of {}x{} into a {}x{} surface",
                raster.width(),
                raster.height(),
                self.width,
                self.height
            )));
        }
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| GeneratorError::BackendInit("surface not allocated".to_string()))?;

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &input.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            raster.pixels(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(BYTES_PER_PIXEL as u32 * self.width),
                rows_per_image: Some(self.height),
            },
            self.extent(),
        );
        tracing::debug!("Uploaded {} bytes to the input texture", raster.pixels().len());
        Ok(())
    }

    fn render_frame(&mut self, base: BasePass, uniforms: &FrameUniforms) -> Result<()> {
        let (input, targets) = match (&self.input, &self.targets) {
            (Some(input), Some(targets)) => (input, targets),
            _ => return Err(GeneratorError::BackendInit("surface not allocated".to_string())),
        };

        self.queue.write_buffer(
            &self.base_uniforms,
            0,
            bytemuck::cast_slice(&[GpuPassParams::base(&uniforms.normal)]),
        );
        self.queue.write_buffer(
            &self.blur_h_uniforms,
            0,
            bytemuck::cast_slice(&[GpuPassParams::blur(BlurAxis::Horizontal, uniforms.blur_h)]),
        );
        self.queue.write_buffer(
            &self.blur_v_uniforms,
            0,
            bytemuck::cast_slice(&[GpuPassParams::blur(BlurAxis::Vertical, uniforms.blur_v)]),
        );

        let base_pipeline = match base {
            BasePass::Copy => &self.copy_pipeline,
            BasePass::Normal => &self.normal_pipeline,
        };
        let base_group = self.bind_group("Base Pass", &input.view, &self.base_uniforms);
        let blur_h_group = self.bind_group("Horizontal Blur", &targets[0].view, &self.blur_h_uniforms);
        let blur_v_group = self.bind_group("Vertical Blur", &targets[1].view, &self.blur_v_uniforms);
        let passes = [
            (base_pipeline, &base_group, &targets[0].view),
            (&self.blur_pipeline, &blur_h_group, &targets[1].view),
            (&self.blur_pipeline, &blur_v_group, &targets[0].view),
        ];

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Pass Chain Encoder"),
        });
        for (pipeline, bind_group, target) in &passes {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Pass Chain Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, bind_group, &[]);
            render_pass.draw(0..3, 0..1); // Full-screen triangle
        }

        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn read_back(&mut self) -> Result<RgbaRaster> {
        let targets = self
            .targets
            .as_ref()
            .ok_or_else(|| GeneratorError::BackendInit("surface not allocated".to_string()))?;

        // Rows must be padded to COPY_BYTES_PER_ROW_ALIGNMENT (256)
        let bytes_per_row = self.width * BYTES_PER_PIXEL as u32;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = (bytes_per_row + align - 1) / align * align;
        let buffer_size = u64::from(padded_bytes_per_row) * u64::from(self.height);

        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &targets[0].texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            self.extent(),
        );
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver only goes away if this function already returned
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| GeneratorError::BackendInit("readback callback was dropped".to_string()))?
            .map_err(|e| GeneratorError::BackendInit(format!("failed to map readback buffer: {e}")))?;

        let data = buffer_slice.get_mapped_range();
        let mut pixels = Vec::with_capacity(bytes_per_row as usize * self.height as usize);
        for row in data.chunks_exact(padded_bytes_per_row as usize) {
            pixels.extend_from_slice(&row[..bytes_per_row as usize]);
        }
        drop(data);
        output_buffer.unmap();

        RgbaRaster::from_pixels(self.width, self.height, pixels)
    }
}

fn create_pass_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    fragment_entry: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(fragment_entry),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: fragment_entry,
            targets: &[Some(wgpu::ColorTargetState {
                format: SURFACE_FORMAT,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None, // Full-screen triangle
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::SoftwareBackend;
    use crate::state::Config;

    /// GPU tests are skipped on machines without an adapter
    fn try_backend() -> Option<WgpuBackend> {
        match WgpuBackend::new_blocking() {
            Ok(backend) => Some(backend),
            Err(e) => {
                eprintln!("skipping GPU test: {e}");
                None
            }
        }
    }

    #[test]
    fn test_gpu_params_layout_matches_wgsl() {
        assert_eq!(std::mem::size_of::<GpuPassParams>(), 48);
        let params = GpuPassParams::blur(BlurAxis::Vertical, 0.25);
        assert_eq!(params.direction, [0.0, 1.0]);
        assert_eq!(params.radius, 0.25);
    }

    #[test]
    fn test_base_params_carry_normal_settings() {
        let config = Config {
            height_inversion: HeightInversion::Depth,
            ..Config::default()
        };
        let params = GpuPassParams::base(&NormalParams::from(&config));
        assert_eq!(params.height_mode, 1);
        assert_eq!(params.radius, 0.0);
        assert!((params.dz - config.depth_scale()).abs() < f32::EPSILON);

        let steep = Config {
            level: 200.0,
            ..Config::default()
        };
        assert_eq!(GpuPassParams::base(&NormalParams::from(&steep)).dz, f32::MAX);
        assert_eq!(GpuPassParams::base(&NormalParams::from(&steep)).algorithm, 1);
    }

    #[test]
    fn test_gpu_copy_frame_round_trips() {
        let Some(mut backend) = try_backend() else { return };
        let input = RgbaRaster::from_fn(70, 33, |x, y| [x as u8 * 3, y as u8 * 7, 90, 255]);

        backend.resize(70, 33).unwrap();
        backend.upload(&input).unwrap();
        let uniforms = FrameUniforms {
            blur_h: 0.0,
            blur_v: 0.0,
            normal: NormalParams::from(&Config::default()),
        };
        backend.render_frame(BasePass::Copy, &uniforms).unwrap();

        assert_eq!(backend.read_back().unwrap(), input);
    }

    #[test]
    fn test_gpu_normal_frame_matches_software() {
        let Some(mut gpu) = try_backend() else { return };
        let mut cpu = SoftwareBackend::new();
        let mask = RgbaRaster::from_fn(24, 16, |x, y| {
            if (x as i32 - 12).pow(2) + (y as i32 - 8).pow(2) < 30 {
                [255, 255, 255, 255]
            } else {
                [0, 0, 0, 255]
            }
        });
        let uniforms = FrameUniforms {
            blur_h: 0.0,
            blur_v: 0.0,
            normal: NormalParams::from(&Config {
                strength: 1.0,
                level: 3.0,
                ..Config::default()
            }),
        };

        let mut outputs = Vec::new();
        for backend in [&mut gpu as &mut dyn RasterBackend, &mut cpu] {
            backend.resize(24, 16).unwrap();
            backend.upload(&mask).unwrap();
            backend.render_frame(BasePass::Normal, &uniforms).unwrap();
            outputs.push(backend.read_back().unwrap());
        }

        // Rounding ties may land differently; allow one step per channel
        for (a, b) in outputs[0].pixels().iter().zip(outputs[1].pixels()) {
            assert!(a.abs_diff(*b) <= 1, "{a} vs {b}");
        }
    }

    #[test]
    fn test_gpu_blur_frame_matches_software() {
        let Some(mut gpu) = try_backend() else { return };
        let mut cpu = SoftwareBackend::new();
        // Step in both directions so each blur pass has an edge to spread
        let step = RgbaRaster::from_fn(32, 16, |x, y| match (x < 16, y < 8) {
            (true, true) => [0, 0, 0, 255],
            (false, false) => [255, 255, 255, 255],
            _ => [200, 40, 120, 255],
        });
        // One whole texel per tap keeps the comparison free of filtering precision
        let uniforms = FrameUniforms {
            blur_h: 1.0 / 32.0,
            blur_v: 1.0 / 16.0,
            normal: NormalParams::from(&Config::default()),
        };

        let mut outputs = Vec::new();
        for backend in [&mut gpu as &mut dyn RasterBackend, &mut cpu] {
            backend.resize(32, 16).unwrap();
            backend.upload(&step).unwrap();
            backend.render_frame(BasePass::Copy, &uniforms).unwrap();
            outputs.push(backend.read_back().unwrap());
        }

        assert_ne!(outputs[1], step);
        for (a, b) in outputs[0].pixels().iter().zip(outputs[1].pixels()) {
            assert!(a.abs_diff(*b) <= 1, "{a} vs {b}");
        }
    }

    #[test]
    fn test_gpu_resize_rejects_oversized_surface() {
        let Some(mut backend) = try_backend() else { return };
        let err = backend.resize(u32::MAX, 4).unwrap_err();
        assert!(matches!(err, GeneratorError::BackendInit(_)));
    }
}
