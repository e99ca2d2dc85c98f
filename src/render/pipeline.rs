//! Render pass targets and the Phong graphics pipeline.
//!
//! Everything here depends on the swapchain extent, so it is rebuilt together
//! when the window is resized or wireframe mode is toggled:
//! * Framebuffers: 4x MSAA colour and depth, resolved into the swapchain image
//! * Pipeline: position + normal vertex input, Phong shaders, depth test,
//!   back-face culling, opaque output

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use vulkano::{
  device::DeviceOwned,
  format::Format,
  image::{Image, ImageCreateInfo, ImageType, ImageUsage, SampleCount, view::ImageView},
  memory::allocator::{AllocationCreateInfo, StandardMemoryAllocator},
  pipeline::{
    GraphicsPipeline,
    PipelineLayout,
    PipelineShaderStageCreateInfo,
    graphics::{
      GraphicsPipelineCreateInfo,
      color_blend::{ColorBlendAttachmentState, ColorBlendState},
      depth_stencil::{DepthState, DepthStencilState},
      input_assembly::InputAssemblyState,
      multisample::MultisampleState,
      rasterization::{CullMode, FrontFace, PolygonMode, RasterizationState},
      vertex_input::{Vertex, VertexDefinition},
      viewport::{Viewport, ViewportState},
    },
    layout::PipelineDescriptorSetLayoutCreateInfo,
  },
  render_pass::{Framebuffer, FramebufferCreateInfo, RenderPass, Subpass},
  shader::EntryPoint,
  swapchain::Swapchain,
  sync::GpuFuture,
};
use winit::{dpi::PhysicalSize, window::Window};

use crate::render::vertex::{Normal, Position};

pub const DEPTH_FORMAT: Format = Format::D32_SFLOAT;
pub const SAMPLES: SampleCount = SampleCount::Sample4;

/// Window-bound rendering state, created once the window exists.
pub struct RenderContext {
  /// The window being rendered to
  pub window: Arc<Window>,
  /// Vulkan swapchain for presenting rendered images
  pub swapchain: Arc<Swapchain>,
  /// Scene subpass followed by the overlay subpass
  pub render_pass: Arc<RenderPass>,
  /// Framebuffers for each swapchain image
  pub framebuffers: Vec<Arc<Framebuffer>>,
  pub vs: EntryPoint,
  pub fs: EntryPoint,
  pub pipeline: Arc<GraphicsPipeline>,
  /// Set on resize or when presentation reports the swapchain out of date
  pub recreate_swapchain: bool,
  pub previous_frame_end: Option<Box<dyn GpuFuture>>,
}

/// Inputs for [`window_size_dependent_setup`].
#[derive(Clone)]
pub struct WindowSizeSetupConfig<'a> {
  pub window_size: PhysicalSize<u32>,
  pub images: &'a [Arc<Image>],
  pub render_pass: &'a Arc<RenderPass>,
  pub memory_allocator: &'a Arc<StandardMemoryAllocator>,
  pub vertex_shader: &'a EntryPoint,
  pub fragment_shader: &'a EntryPoint,
  /// Rasterize edges only; ignored when the device lacks `fill_mode_non_solid`
  pub wireframe_mode: bool,
}

/// Creates the framebuffers and graphics pipeline for the current swapchain images.
///
/// Called once when the window is created, then again whenever the swapchain
/// is recreated.
pub fn window_size_dependent_setup(
  config: WindowSizeSetupConfig,
) -> Result<(Vec<Arc<Framebuffer>>, Arc<GraphicsPipeline>)> {
  let device = config.memory_allocator.device();
  let extent = config
    .images
    .first()
    .ok_or_else(|| anyhow!("swapchain has no images"))?
    .extent();

  // One transient depth buffer is shared by every framebuffer
  let depth_buffer = ImageView::new_default(
    Image::new(
      config.memory_allocator.clone(),
      ImageCreateInfo {
        image_type: ImageType::Dim2d,
        format: DEPTH_FORMAT,
        extent,
        usage: ImageUsage::DEPTH_STENCIL_ATTACHMENT | ImageUsage::TRANSIENT_ATTACHMENT,
        samples: SAMPLES,
        ..Default::default()
      },
      AllocationCreateInfo::default(),
    )
    .context("failed to allocate depth buffer")?,
  )?;

  let framebuffers = config
    .images
    .iter()
    .map(|image| -> Result<_> {
      let view = ImageView::new_default(image.clone())?;
      let msaa_color = ImageView::new_default(
        Image::new(
          config.memory_allocator.clone(),
          ImageCreateInfo {
            image_type: ImageType::Dim2d,
            format: image.format(),
            extent: image.extent(),
            usage: ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSIENT_ATTACHMENT,
            samples: SAMPLES,
            ..Default::default()
          },
          AllocationCreateInfo::default(),
        )
        .context("failed to allocate multisampled colour target")?,
      )?;

      // Attachment order matches the render pass: msaa_color, final_color, depth
      let framebuffer = Framebuffer::new(
        config.render_pass.clone(),
        FramebufferCreateInfo {
          attachments: vec![msaa_color, view, depth_buffer.clone()],
          ..Default::default()
        },
      )?;
      Ok(framebuffer)
    })
    .collect::<Result<Vec<_>>>()?;

  let wireframe = config.wireframe_mode && device.enabled_features().fill_mode_non_solid;

  let pipeline = {
    let vertex_input_state = [Position::per_vertex(), Normal::per_vertex()]
      .definition(config.vertex_shader)
      .map_err(|e| anyhow!("vertex layout does not match the shader: {e}"))?;

    let stages = [
      PipelineShaderStageCreateInfo::new(config.vertex_shader.clone()),
      PipelineShaderStageCreateInfo::new(config.fragment_shader.clone()),
    ];

    let layout = PipelineLayout::new(
      device.clone(),
      PipelineDescriptorSetLayoutCreateInfo::from_stages(&stages)
        .into_pipeline_layout_create_info(device.clone())
        .map_err(|e| anyhow!("failed to derive pipeline layout: {e:?}"))?,
    )?;

    let subpass = Subpass::from(config.render_pass.clone(), 0)
      .ok_or_else(|| anyhow!("render pass has no scene subpass"))?;

    GraphicsPipeline::new(
      device.clone(),
      None,
      GraphicsPipelineCreateInfo {
        stages: stages.into_iter().collect(),
        vertex_input_state: Some(vertex_input_state),
        input_assembly_state: Some(InputAssemblyState::default()),
        viewport_state: Some(ViewportState {
          viewports: [Viewport {
            offset: [0.0, 0.0],
            extent: config.window_size.into(),
            depth_range: 0.0..=1.0,
          }]
          .into_iter()
          .collect(),
          ..Default::default()
        }),
        rasterization_state: Some(RasterizationState {
          cull_mode: CullMode::Back,
          front_face: FrontFace::CounterClockwise,
          polygon_mode: if wireframe {
            PolygonMode::Line
          } else {
            PolygonMode::Fill
          },
          ..Default::default()
        }),
        depth_stencil_state: Some(DepthStencilState {
          depth: Some(DepthState::simple()),
          ..Default::default()
        }),
        multisample_state: Some(MultisampleState {
          rasterization_samples: SAMPLES,
          ..Default::default()
        }),
        color_blend_state: Some(ColorBlendState::with_attachment_states(
          subpass.num_color_attachments(),
          ColorBlendAttachmentState::default(),
        )),
        subpass: Some(subpass.into()),
        ..GraphicsPipelineCreateInfo::layout(layout)
      },
    )?
  };

  Ok((framebuffers, pipeline))
}
