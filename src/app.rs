//! Window loop for the lighting demo.
//!
//! Each frame follows this sequence:
//! 1. Move the camera from held keys, scaled by the frame time
//! 2. Recreate the swapchain and pipeline if the window or render mode changed
//! 3. Lay out the overlay and apply any edits made in it
//! 4. Upload the frame's transforms and lighting parameters
//! 5. Record the scene and overlay, submit, present
//!
//! Left click captures the mouse for looking around; right click or Escape
//! releases it.

use std::{sync::Arc, time::Instant};

use anyhow::{Context, Result, anyhow};
use egui_winit_vulkano::{Gui, GuiConfig};
use glam::Mat4;
use vulkano::{
  Validated,
  VulkanError,
  buffer::allocator::SubbufferAllocator,
  command_buffer::{
    AutoCommandBufferBuilder,
    CommandBufferUsage,
    allocator::StandardCommandBufferAllocator,
  },
  descriptor_set::{DescriptorSet, WriteDescriptorSet, allocator::StandardDescriptorSetAllocator},
  device::{Device, Queue},
  format::Format,
  image::ImageUsage,
  instance::Instance,
  memory::allocator::StandardMemoryAllocator,
  pipeline::Pipeline,
  render_pass::Subpass,
  swapchain::{
    PresentMode,
    Surface,
    Swapchain,
    SwapchainCreateInfo,
    SwapchainPresentInfo,
    acquire_next_image,
  },
  sync::{self, GpuFuture},
};
use winit::{
  application::ApplicationHandler,
  dpi::LogicalSize,
  event::{DeviceEvent, DeviceId, ElementState, KeyEvent, MouseButton, WindowEvent},
  event_loop::{ActiveEventLoop, EventLoop},
  keyboard::{KeyCode, PhysicalKey},
  window::{CursorGrabMode, Window, WindowId},
};

use crate::{
  config::{DemoConfig, WINDOW_TITLE},
  gpu::{command_buffer_builder_ext::AutoCommandBufferBuilderExt, init::initialize_vulkan},
  gui::{self, GuiState},
  render::{
    camera::{EulerCamera, MovementKeys},
    lighting::{FrameTransforms, LightingParams},
    model::{Model, ModelBuffers, PackedMesh},
    pipeline::{DEPTH_FORMAT, RenderContext, WindowSizeSetupConfig, window_size_dependent_setup},
  },
  shaders::{fs, vs},
};

/// Longest frame the camera integrates in one step, in milliseconds.
const MAX_FRAME_MS: f32 = 100.0;

/// Application state: GPU handles, the window once it exists, the camera and
/// the lighting parameters.
///
/// Errors raised inside event callbacks stop the event loop and are kept
/// until [`App::take_error`] collects them.
pub struct App {
  config: DemoConfig,

  // Vulkan resources
  instance:                 Arc<Instance>,
  device:                   Arc<Device>,
  queue:                    Arc<Queue>,
  memory_allocator:         Arc<StandardMemoryAllocator>,
  descriptor_set_allocator: Arc<StandardDescriptorSetAllocator>,
  command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
  uniform_buffer_allocator: SubbufferAllocator,
  model_buffers:            ModelBuffers,

  // Window-bound state
  rcx:       Option<RenderContext>,
  gui:       Option<Gui>,
  gui_state: GuiState,

  last_frame_time: Instant,

  camera:   EulerCamera,
  movement: MovementKeys,
  lighting: LightingParams,

  wireframe_mode:        bool,
  needs_pipeline_update: bool,
  cursor_grabbed:        bool,
  pass_events_to_game:   bool,

  error: Option<anyhow::Error>,
}

impl App {
  /// Loads the model named in `config` and sets up the device.
  ///
  /// The window itself is created on the first `resumed` event.
  pub fn new(event_loop: &EventLoop<()>, config: DemoConfig) -> Result<Self> {
    let model = Model::load(&config.model_path)?;
    let mesh = PackedMesh::from_model(&model)
      .with_context(|| format!("failed to pack {}", config.model_path.display()))?;
    log::info!(
      "Loaded {} ({} faces, {} vertices)",
      config.model_path.display(),
      model.faces.len(),
      mesh.vertex_count()
    );

    let initialized = initialize_vulkan(event_loop, &mesh)?;
    let supports_wireframe = initialized.device.enabled_features().fill_mode_non_solid;
    let lighting = LightingParams::from_config(&config);
    let camera = initial_camera(&config);

    Ok(App {
      instance: initialized.instance,
      device: initialized.device,
      queue: initialized.queue,
      memory_allocator: initialized.memory_allocator,
      descriptor_set_allocator: initialized.descriptor_set_allocator,
      command_buffer_allocator: initialized.command_buffer_allocator,
      uniform_buffer_allocator: initialized.uniform_buffer_allocator,
      model_buffers: initialized.model_buffers,
      rcx: None,
      gui: None,
      gui_state: GuiState::new(lighting, supports_wireframe),
      last_frame_time: Instant::now(),
      camera,
      movement: MovementKeys::default(),
      lighting,
      wireframe_mode: false,
      needs_pipeline_update: false,
      cursor_grabbed: false,
      pass_events_to_game: true,
      error: None,
      config,
    })
  }

  /// The error that stopped the event loop, if any.
  pub fn take_error(&mut self) -> Option<anyhow::Error> {
    self.error.take()
  }

  fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
    log::error!("{error:#}");
    if self.error.is_none() {
      self.error = Some(error);
    }
    event_loop.exit();
  }

  fn create_render_context(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
    let window_attrs = Window::default_attributes()
      .with_title(WINDOW_TITLE)
      .with_inner_size(LogicalSize::new(
        self.config.window_width,
        self.config.window_height,
      ));
    let window = Arc::new(
      event_loop
        .create_window(window_attrs)
        .context("failed to create window")?,
    );

    let surface = Surface::from_window(self.instance.clone(), window.clone())
      .map_err(|e| anyhow!("failed to create surface: {e:?}"))?;
    let window_size = window.inner_size();
    let physical_device = self.device.physical_device();

    let (swapchain, images) = {
      let surface_capabilities = physical_device
        .surface_capabilities(&surface, Default::default())
        .context("failed to query surface capabilities")?;

      let present_modes = physical_device
        .surface_present_modes(&surface, Default::default())
        .context("failed to query present modes")?;
      let present_mode = if self.config.vsync {
        PresentMode::Fifo
      } else if present_modes.contains(&PresentMode::Immediate) {
        PresentMode::Immediate
      } else if present_modes.contains(&PresentMode::Mailbox) {
        PresentMode::Mailbox
      } else {
        PresentMode::Fifo
      };
      log::info!("Present mode: {present_mode:?}");

      let formats = physical_device
        .surface_formats(&surface, Default::default())
        .context("failed to query surface formats")?;
      // egui expects a UNORM target
      let (image_format, _) = formats
        .iter()
        .copied()
        .find(|(format, _)| {
          matches!(
            format,
            Format::B8G8R8A8_UNORM | Format::R8G8B8A8_UNORM | Format::A8B8G8R8_UNORM_PACK32
          )
        })
        .or_else(|| formats.first().copied())
        .context("surface reports no formats")?;
      log::info!("Swapchain format: {image_format:?}");

      let composite_alpha = surface_capabilities
        .supported_composite_alpha
        .into_iter()
        .next()
        .context("surface supports no composite alpha mode")?;

      Swapchain::new(self.device.clone(), surface.clone(), SwapchainCreateInfo {
        min_image_count: surface_capabilities.min_image_count.max(2),
        image_format,
        image_extent: window_size.into(),
        image_usage: ImageUsage::COLOR_ATTACHMENT,
        composite_alpha,
        pre_transform: surface_capabilities.current_transform,
        clipped: true,
        present_mode,
        ..Default::default()
      })
      .context("failed to create swapchain")?
    };

    let render_pass = vulkano::ordered_passes_renderpass!(
      self.device.clone(),
      attachments: {
        msaa_color: {
          format: swapchain.image_format(),
          samples: 4,
          load_op: Clear,
          store_op: DontCare,
        },
        final_color: {
          format: swapchain.image_format(),
          samples: 1,
          load_op: DontCare,
          store_op: Store,
        },
        depth: {
          format: DEPTH_FORMAT,
          samples: 4,
          load_op: Clear,
          store_op: DontCare,
        }
      },
      passes: [
        {
          color: [msaa_color],
          color_resolve: [final_color],
          depth_stencil: {depth},
          input: []
        },
        {
          color: [final_color],
          depth_stencil: {},
          input: []
        }
      ]
    )
    .context("failed to create render pass")?;

    let vs = vs::load(self.device.clone())
      .context("failed to load vertex shader")?
      .entry_point("main")
      .context("vertex shader has no main")?;
    let fs = fs::load(self.device.clone())
      .context("failed to load fragment shader")?
      .entry_point("main")
      .context("fragment shader has no main")?;

    let (framebuffers, pipeline) = window_size_dependent_setup(WindowSizeSetupConfig {
      window_size,
      images: &images,
      render_pass: &render_pass,
      memory_allocator: &self.memory_allocator,
      vertex_shader: &vs,
      fragment_shader: &fs,
      wireframe_mode: self.wireframe_mode,
    })?;

    let overlay_subpass =
      Subpass::from(render_pass.clone(), 1).context("render pass has no overlay subpass")?;
    self.gui = Some(Gui::new_with_subpass(
      event_loop,
      surface,
      self.queue.clone(),
      overlay_subpass,
      swapchain.image_format(),
      GuiConfig::default(),
    ));

    self.rcx = Some(RenderContext {
      window,
      swapchain,
      render_pass,
      framebuffers,
      vs,
      fs,
      pipeline,
      recreate_swapchain: false,
      previous_frame_end: Some(sync::now(self.device.clone()).boxed()),
    });

    Ok(())
  }

  fn set_cursor_grab(&mut self, grabbed: bool) {
    let Some(rcx) = self.rcx.as_ref() else {
      return;
    };

    if grabbed {
      let result = rcx
        .window
        .set_cursor_grab(CursorGrabMode::Locked)
        .or_else(|_| rcx.window.set_cursor_grab(CursorGrabMode::Confined));
      if let Err(e) = result {
        log::warn!("Could not grab cursor: {e}");
        return;
      }
    } else if let Err(e) = rcx.window.set_cursor_grab(CursorGrabMode::None) {
      log::warn!("Could not release cursor: {e}");
    }

    rcx.window.set_cursor_visible(!grabbed);
    if self.cursor_grabbed != grabbed {
      log::info!("Mouse {}", if grabbed { "grabbed" } else { "released" });
    }
    self.cursor_grabbed = grabbed;
  }

  fn handle_key(&mut self, key: KeyCode, state: ElementState) {
    let pressed = state == ElementState::Pressed;
    if key == KeyCode::Escape {
      if pressed {
        self.set_cursor_grab(false);
      }
      return;
    }
    self.movement.set(key, pressed);
  }

  fn apply_gui_changes(&mut self, changes: gui::GuiStateChanges) {
    self.pass_events_to_game = changes.pass_events_to_game;
    if let Some(lighting) = changes.lighting {
      self.lighting = lighting;
    }
    if let Some(wireframe) = changes.wireframe_mode {
      if wireframe != self.wireframe_mode {
        self.wireframe_mode = wireframe;
        self.needs_pipeline_update = true;
      }
    }
    if changes.camera_reset {
      let aspect_ratio = self.camera.aspect_ratio;
      self.camera = initial_camera(&self.config);
      self.camera.aspect_ratio = aspect_ratio;
    }
  }

  fn redraw(&mut self) -> Result<()> {
    let now = Instant::now();
    let frame_ms = now.duration_since(self.last_frame_time).as_secs_f32() * 1000.0;
    let delta_ms = frame_ms.min(MAX_FRAME_MS);
    self.last_frame_time = now;

    self
      .camera
      .process_keyboard(&self.movement, delta_ms, self.config.move_speed);

    let Some(rcx) = self.rcx.as_mut() else {
      return Ok(());
    };
    let window_size = rcx.window.inner_size();
    if window_size.width == 0 || window_size.height == 0 {
      return Ok(());
    }

    if let Some(previous_frame_end) = rcx.previous_frame_end.as_mut() {
      previous_frame_end.cleanup_finished();
    }

    if rcx.recreate_swapchain || self.needs_pipeline_update {
      let (new_swapchain, new_images) = rcx
        .swapchain
        .recreate(SwapchainCreateInfo {
          image_extent: window_size.into(),
          ..rcx.swapchain.create_info()
        })
        .context("failed to recreate swapchain")?;

      rcx.swapchain = new_swapchain;
      (rcx.framebuffers, rcx.pipeline) = window_size_dependent_setup(WindowSizeSetupConfig {
        window_size,
        images: &new_images,
        render_pass: &rcx.render_pass,
        memory_allocator: &self.memory_allocator,
        vertex_shader: &rcx.vs,
        fragment_shader: &rcx.fs,
        wireframe_mode: self.wireframe_mode,
      })?;
      rcx.recreate_swapchain = false;
      self.needs_pipeline_update = false;
    }

    let [width, height] = rcx.swapchain.image_extent();
    self.camera.aspect_ratio = width as f32 / height as f32;

    if let Some(gui) = self.gui.as_mut() {
      let changes = gui::draw_gui(gui, &mut self.gui_state, &self.camera);
      self.apply_gui_changes(changes);
    }

    // The GUI pass may have changed the camera or lighting, so look up the
    // context again before recording.
    let Some(rcx) = self.rcx.as_mut() else {
      return Ok(());
    };

    let uniform_buffer = {
      let transforms = FrameTransforms::new(&self.camera, Mat4::IDENTITY, &self.lighting);
      let buffer = self
        .uniform_buffer_allocator
        .allocate_sized::<vs::Data>()
        .context("failed to allocate uniform buffer")?;
      *buffer.write().context("failed to map uniform buffer")? =
        transforms.uniform_data(&self.lighting);
      buffer
    };

    let layout = rcx
      .pipeline
      .layout()
      .set_layouts()
      .first()
      .context("pipeline has no descriptor set layout")?;
    let descriptor_set = DescriptorSet::new(
      self.descriptor_set_allocator.clone(),
      layout.clone(),
      [WriteDescriptorSet::buffer(0, uniform_buffer)],
      [],
    )
    .context("failed to create descriptor set")?;

    let (image_index, suboptimal, acquire_future) =
      match acquire_next_image(rcx.swapchain.clone(), None).map_err(Validated::unwrap) {
        Ok(r) => r,
        Err(VulkanError::OutOfDate) => {
          log::debug!("Swapchain out of date while acquiring");
          rcx.recreate_swapchain = true;
          return Ok(());
        }
        Err(e) => return Err(e).context("failed to acquire next image"),
      };

    if suboptimal {
      rcx.recreate_swapchain = true;
    }

    let mut builder = AutoCommandBufferBuilder::primary(
      self.command_buffer_allocator.clone(),
      self.queue.queue_family_index(),
      CommandBufferUsage::OneTimeSubmit,
    )
    .context("failed to begin command buffer")?;

    builder.build_app_render_pass(
      rcx,
      &descriptor_set,
      image_index,
      &self.model_buffers,
      &mut self.gui,
    )?;

    let command_buffer = builder.build().context("failed to build command buffer")?;

    let previous_frame_end = rcx
      .previous_frame_end
      .take()
      .unwrap_or_else(|| sync::now(self.device.clone()).boxed());

    let final_future = previous_frame_end
      .join(acquire_future)
      .then_execute(self.queue.clone(), command_buffer)
      .context("failed to submit command buffer")?
      .then_swapchain_present(
        self.queue.clone(),
        SwapchainPresentInfo::swapchain_image_index(rcx.swapchain.clone(), image_index),
      )
      .then_signal_fence_and_flush();

    match final_future.map_err(Validated::unwrap) {
      Ok(future) => {
        rcx.previous_frame_end = Some(future.boxed());
      }
      Err(VulkanError::OutOfDate) => {
        rcx.recreate_swapchain = true;
        rcx.previous_frame_end = Some(sync::now(self.device.clone()).boxed());
      }
      Err(e) => {
        log::warn!("Failed to flush future: {e}");
        rcx.previous_frame_end = Some(sync::now(self.device.clone()).boxed());
      }
    }

    Ok(())
  }
}

/// Camera at the configured start position, facing down -Z.
fn initial_camera(config: &DemoConfig) -> EulerCamera {
  let aspect_ratio = config.window_width as f32 / config.window_height as f32;
  let mut camera = EulerCamera::new(aspect_ratio, config.camera_position);
  camera.fov = config.fov;
  camera
}

impl ApplicationHandler for App {
  fn resumed(&mut self, event_loop: &ActiveEventLoop) {
    if self.rcx.is_some() {
      return;
    }
    if let Err(e) = self.create_render_context(event_loop) {
      self.fail(event_loop, e);
    }
  }

  fn window_event(
    &mut self,
    event_loop: &ActiveEventLoop,
    _window_id: WindowId,
    event: WindowEvent,
  ) {
    // The overlay sees every event; only those it does not consume drive the camera
    let consumed_by_gui = self.gui.as_mut().is_some_and(|gui| gui.update(&event));

    match event {
      WindowEvent::CloseRequested => {
        log::info!("Close requested");
        event_loop.exit();
      }
      WindowEvent::Resized(_) => {
        if let Some(rcx) = self.rcx.as_mut() {
          rcx.recreate_swapchain = true;
        }
      }
      WindowEvent::Focused(false) => {
        self.movement.release_all();
        self.set_cursor_grab(false);
      }
      WindowEvent::MouseInput {
        state: ElementState::Pressed,
        button,
        ..
      } => match button {
        MouseButton::Left if !consumed_by_gui && self.pass_events_to_game => {
          self.set_cursor_grab(true);
        }
        MouseButton::Right => self.set_cursor_grab(false),
        _ => {}
      },
      WindowEvent::KeyboardInput {
        event:
          KeyEvent {
            physical_key: PhysicalKey::Code(key),
            state,
            ..
          },
        ..
      } => {
        // Key releases always go through so movement never sticks
        if !consumed_by_gui || state == ElementState::Released {
          self.handle_key(key, state);
        }
      }
      WindowEvent::RedrawRequested => {
        if let Err(e) = self.redraw() {
          self.fail(event_loop, e);
        }
      }
      _ => {}
    }
  }

  fn device_event(
    &mut self,
    _event_loop: &ActiveEventLoop,
    _device_id: DeviceId,
    event: DeviceEvent,
  ) {
    if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
      if self.cursor_grabbed {
        self.camera.process_mouse(
          dx as f32,
          dy as f32,
          self.config.mouse_speed,
          self.config.max_look_up,
          self.config.max_look_down,
        );
      }
    }
  }

  fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
    if let Some(rcx) = self.rcx.as_ref() {
      rcx.window.request_redraw();
    }
  }

  fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
    log::info!("Cleaning up");
    // Overlay resources reference the render pass, so they go first
    self.gui = None;
    self.rcx = None;
  }
}
