use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use wgpu::util::DeviceExt;

use crate::error::VisError;
use crate::renderer::camera::CameraState;
use crate::renderer::mesh::{MeshData, MeshResolver};
use crate::renderer::vertex::{CameraUniform, LineVertex, MeshVertex, VisualUniform};
use crate::scene::{EntityId, LoadedModel, SceneGraph};
use crate::settings::ColorSettings;

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Number of leading vertices in the line buffer that draw the axes.
const AXES_VERTICES: u32 = 6;

pub(crate) struct GpuMesh {
    pub(crate) vertex_buffer: wgpu::Buffer,
    pub(crate) index_buffer: wgpu::Buffer,
    pub(crate) num_indices: u32,
}

/// One drawable visual: its mesh plus its own uniform buffer.
pub(crate) struct VisualDraw {
    pub(crate) entity: EntityId,
    pub(crate) mesh: Arc<GpuMesh>,
    pub(crate) color: [f32; 4],
    pub(crate) uniform_buffer: wgpu::Buffer,
    pub(crate) bind_group: wgpu::BindGroup,
}

pub struct Renderer {
    pub(crate) surface: wgpu::Surface<'static>,
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) config: wgpu::SurfaceConfiguration,
    pub(crate) mesh_pipeline: wgpu::RenderPipeline,
    pub(crate) wireframe_pipeline: Option<wgpu::RenderPipeline>,
    pub(crate) line_pipeline: wgpu::RenderPipeline,
    pub(crate) camera_buffer: wgpu::Buffer,
    pub(crate) camera_bind_group: wgpu::BindGroup,
    visual_bind_group_layout: wgpu::BindGroupLayout,
    pub(crate) line_vertex_buffer: wgpu::Buffer,
    pub(crate) num_lines: u32,
    mesh_cache: HashMap<PathBuf, Arc<GpuMesh>>,
    pub(crate) visuals: Vec<VisualDraw>,
    grid_major_color: [f32; 3],
    grid_minor_color: [f32; 3],
    pub(crate) background_color: [f32; 3],
    pub(crate) light_dir: [f32; 3],
    pub camera: CameraState,
    pub(crate) egui_renderer: egui_wgpu::Renderer,
    egui_ctx: egui::Context,
}

fn create_mesh_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    polygon_mode: wgpu::PolygonMode,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[MeshVertex::desc()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // axis remaps may mirror a visual, so both faces are drawn
            cull_mode: None,
            polygon_mode,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}

fn uniform_layout_entry(visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Axes (X red, Y green, Z blue) followed by a grid on the XZ plane.
pub fn grid_lines(major: [f32; 3], minor: [f32; 3]) -> Vec<LineVertex> {
    let mut lines = vec![
        LineVertex { position: [0.0, 0.0, 0.0], color: [1.0, 0.0, 0.0] },
        LineVertex { position: [1.0, 0.0, 0.0], color: [1.0, 0.0, 0.0] },
        LineVertex { position: [0.0, 0.0, 0.0], color: [0.0, 1.0, 0.0] },
        LineVertex { position: [0.0, 1.0, 0.0], color: [0.0, 1.0, 0.0] },
        LineVertex { position: [0.0, 0.0, 0.0], color: [0.0, 0.0, 1.0] },
        LineVertex { position: [0.0, 0.0, 1.0], color: [0.0, 0.0, 1.0] },
    ];

    const HALF: f32 = 5.0;
    const STEP: f32 = 0.25;
    let steps = (HALF / STEP) as i32;
    for i in -steps..=steps {
        let pos = i as f32 * STEP;
        let color = if i % 4 == 0 { major } else { minor };
        lines.push(LineVertex { position: [pos, 0.0, -HALF], color });
        lines.push(LineVertex { position: [pos, 0.0, HALF], color });
        lines.push(LineVertex { position: [-HALF, 0.0, pos], color });
        lines.push(LineVertex { position: [HALF, 0.0, pos], color });
    }
    lines
}

impl Renderer {
    pub async fn new(window: Arc<winit::window::Window>) -> Result<Self, VisError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| VisError::new("wgpu-adapter").push_std(e))?;

        let wireframe_supported = adapter.features().contains(wgpu::Features::POLYGON_MODE_LINE);
        if !wireframe_supported {
            warn!("adapter lacks POLYGON_MODE_LINE, wireframe mode disabled");
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: if wireframe_supported {
                    wgpu::Features::POLYGON_MODE_LINE
                } else {
                    wgpu::Features::empty()
                },
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                ..Default::default()
            })
            .await
            .map_err(|e| VisError::new("wgpu-device").push_std(e))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| VisError::new("wgpu-surface-format"))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Buffer"),
            size: size_of::<CameraUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Camera Bind Group Layout"),
                entries: &[uniform_layout_entry(
                    wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                )],
            });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let visual_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Visual Bind Group Layout"),
                entries: &[uniform_layout_entry(
                    wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                )],
            });

        let mesh_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&camera_bind_group_layout, &visual_bind_group_layout],
            push_constant_ranges: &[],
        });

        let line_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Line Pipeline Layout"),
            bind_group_layouts: &[&camera_bind_group_layout],
            push_constant_ranges: &[],
        });

        let mesh_pipeline = create_mesh_pipeline(
            &device,
            &mesh_pipeline_layout,
            &shader,
            config.format,
            wgpu::PolygonMode::Fill,
            "Mesh Pipeline",
        );
        let wireframe_pipeline = wireframe_supported.then(|| {
            create_mesh_pipeline(
                &device,
                &mesh_pipeline_layout,
                &shader,
                config.format,
                wgpu::PolygonMode::Line,
                "Wireframe Pipeline",
            )
        });

        let line_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Line Pipeline"),
            layout: Some(&line_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_line"),
                buffers: &[LineVertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_line"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let colors = ColorSettings::default();
        let lines = grid_lines(colors.grid_major_color, colors.grid_minor_color);
        let line_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Line Vertex Buffer"),
            contents: bytemuck::cast_slice(&lines),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let egui_ctx = egui::Context::default();
        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, Default::default());

        Ok(Self {
            surface,
            device,
            queue,
            config,
            mesh_pipeline,
            wireframe_pipeline,
            line_pipeline,
            camera_buffer,
            camera_bind_group,
            visual_bind_group_layout,
            line_vertex_buffer,
            num_lines: lines.len() as u32,
            mesh_cache: HashMap::new(),
            visuals: Vec::new(),
            grid_major_color: colors.grid_major_color,
            grid_minor_color: colors.grid_minor_color,
            background_color: colors.background_color,
            light_dir: colors.light_direction,
            camera: CameraState::default(),
            egui_renderer,
            egui_ctx,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    pub fn egui_context(&self) -> egui::Context {
        self.egui_ctx.clone()
    }

    pub fn supports_wireframe(&self) -> bool {
        self.wireframe_pipeline.is_some()
    }

    pub fn visual_count(&self) -> usize {
        self.visuals.len()
    }

    fn mesh_for(&mut self, path: PathBuf) -> Result<Arc<GpuMesh>, VisError> {
        if let Some(mesh) = self.mesh_cache.get(&path) {
            return Ok(mesh.clone());
        }
        let data = MeshData::load_obj(&path)?;
        if data.is_empty() {
            return Err(VisError::new("mesh-empty").with_arg("path", path.display()));
        }
        let label = path.display().to_string();
        let mesh = Arc::new(GpuMesh {
            vertex_buffer: self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label.as_str()),
                contents: bytemuck::cast_slice(&data.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            index_buffer: self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label.as_str()),
                contents: bytemuck::cast_slice(&data.indices),
                usage: wgpu::BufferUsages::INDEX,
            }),
            num_indices: data.indices.len() as u32,
        });
        self.mesh_cache.insert(path, mesh.clone());
        Ok(mesh)
    }

    /// Uploads every visual of `model`. Visuals whose mesh cannot be found or
    /// read are skipped with a warning; their count is returned.
    pub fn set_model(&mut self, model: &LoadedModel, resolver: &MeshResolver) -> usize {
        self.visuals.clear();
        let world = model.scene.world_matrices();
        let mut missing = 0;

        for (id, entity) in model.scene.visuals() {
            let Some(src) = entity.mesh_source() else {
                continue;
            };
            let mesh = match resolver.resolve(src).map(|p| self.mesh_for(p)) {
                Some(Ok(mesh)) => mesh,
                Some(Err(e)) => {
                    warn!("skipping visual '{}': {e}", entity.name);
                    missing += 1;
                    continue;
                }
                None => {
                    missing += 1;
                    continue;
                }
            };
            let color = entity.material().map_or([1.0; 4], |m| m.ambient);
            let uniform = VisualUniform::new(&world[id.0], color);
            let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(entity.name.as_str()),
                contents: bytemuck::cast_slice(&[uniform]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(entity.name.as_str()),
                layout: &self.visual_bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });
            self.visuals.push(VisualDraw {
                entity: id,
                mesh,
                color,
                uniform_buffer,
                bind_group,
            });
        }

        info!(
            "renderer: {} visuals uploaded, {} skipped, {} meshes cached",
            self.visuals.len(),
            missing,
            self.mesh_cache.len()
        );
        missing
    }

    pub fn clear_model(&mut self) {
        self.visuals.clear();
    }

    /// Rewrites the model matrices after the scene was re-posed.
    pub fn update_transforms(&mut self, scene: &SceneGraph) {
        let world = scene.world_matrices();
        for draw in &self.visuals {
            let Some(matrix) = world.get(draw.entity.0) else {
                continue;
            };
            let uniform = VisualUniform::new(matrix, draw.color);
            self.queue
                .write_buffer(&draw.uniform_buffer, 0, bytemuck::cast_slice(&[uniform]));
        }
    }

    pub fn update_colors(&mut self, colors: &ColorSettings) {
        self.background_color = colors.background_color;
        self.light_dir = colors.light_direction;
        if self.grid_major_color != colors.grid_major_color
            || self.grid_minor_color != colors.grid_minor_color
        {
            self.grid_major_color = colors.grid_major_color;
            self.grid_minor_color = colors.grid_minor_color;
            self.regenerate_grid();
        }
    }

    fn regenerate_grid(&mut self) {
        let lines = grid_lines(self.grid_major_color, self.grid_minor_color);
        self.line_vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Line Vertex Buffer"),
                contents: bytemuck::cast_slice(&lines),
                usage: wgpu::BufferUsages::VERTEX,
            });
        self.num_lines = lines.len() as u32;
    }

    pub(crate) fn axes_range(&self) -> std::ops::Range<u32> {
        0..AXES_VERTICES
    }

    pub(crate) fn grid_range(&self) -> std::ops::Range<u32> {
        AXES_VERTICES..self.num_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_starts_with_axes_and_uses_major_lines_every_metre() {
        let lines = grid_lines([1.0; 3], [0.5; 3]);
        assert_eq!(lines[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(lines[3].position, [0.0, 1.0, 0.0]);
        assert_eq!(lines.len() % 2, 0);
        let at_origin = lines
            .iter()
            .skip(AXES_VERTICES as usize)
            .find(|v| v.position == [0.0, 0.0, -5.0])
            .unwrap();
        assert_eq!(at_origin.color, [1.0; 3]);
        assert!(lines.iter().all(|v| v.position[1] == 0.0 || v.position == [0.0, 1.0, 0.0]));
    }
}
