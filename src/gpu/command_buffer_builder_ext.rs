use std::sync::Arc;

use anyhow::{Context, Result};
use egui_winit_vulkano::Gui;
use vulkano::{
  command_buffer::{
    AutoCommandBufferBuilder,
    RenderPassBeginInfo,
    SubpassBeginInfo,
    SubpassContents,
    SubpassEndInfo,
  },
  descriptor_set::DescriptorSet,
  pipeline::{Pipeline, PipelineBindPoint},
};

use crate::render::{model::ModelBuffers, pipeline::RenderContext};

pub(crate) trait AutoCommandBufferBuilderExt<L> {
  /// Records the lit model into the first subpass and the overlay into the second.
  fn build_app_render_pass(
    &mut self,
    rcx: &RenderContext,
    descriptor_set: &Arc<DescriptorSet>,
    image_index: u32,
    model_buffers: &ModelBuffers,
    gui: &mut Option<Gui>,
  ) -> Result<()>;
}

impl<L> AutoCommandBufferBuilderExt<L> for AutoCommandBufferBuilder<L> {
  fn build_app_render_pass(
    &mut self,
    rcx: &RenderContext,
    descriptor_set: &Arc<DescriptorSet>,
    image_index: u32,
    model_buffers: &ModelBuffers,
    gui: &mut Option<Gui>,
  ) -> Result<()> {
    let framebuffer = rcx
      .framebuffers
      .get(image_index as usize)
      .context("no framebuffer for acquired image")?
      .clone();

    self.begin_render_pass(
      RenderPassBeginInfo {
        clear_values: vec![
          Some([0.0, 0.0, 0.0, 1.0].into()), // msaa_color
          None,                              // final_color (DontCare)
          Some(1.0.into()),                  // depth
        ],
        ..RenderPassBeginInfo::framebuffer(framebuffer)
      },
      SubpassBeginInfo {
        contents: SubpassContents::Inline,
        ..Default::default()
      },
    )?;

    self
      .bind_pipeline_graphics(rcx.pipeline.clone())?
      .bind_descriptor_sets(
        PipelineBindPoint::Graphics,
        rcx.pipeline.layout().clone(),
        0,
        descriptor_set.clone(),
      )?
      .bind_vertex_buffers(
        0,
        (
          model_buffers.positions.clone(),
          model_buffers.normals.clone(),
        ),
      )?;

    unsafe { self.draw(model_buffers.vertex_count, 1, 0, 0) }?;

    self.next_subpass(SubpassEndInfo::default(), SubpassBeginInfo {
      contents: SubpassContents::SecondaryCommandBuffers,
      ..Default::default()
    })?;

    if let Some(gui) = gui {
      let extent = rcx.swapchain.image_extent();
      let cb = gui.draw_on_subpass_image(extent);
      self.execute_commands(cb)?;
    }

    self.end_render_pass(SubpassEndInfo::default())?;
    Ok(())
  }
}
