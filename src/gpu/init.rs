use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use vulkano::{
  VulkanLibrary,
  buffer::{
    BufferUsage,
    allocator::{SubbufferAllocator, SubbufferAllocatorCreateInfo},
  },
  command_buffer::allocator::StandardCommandBufferAllocator,
  descriptor_set::allocator::StandardDescriptorSetAllocator,
  device::{
    Device,
    DeviceCreateInfo,
    DeviceExtensions,
    DeviceFeatures,
    Queue,
    QueueCreateInfo,
    QueueFlags,
    physical::PhysicalDeviceType,
  },
  instance::{Instance, InstanceCreateFlags, InstanceCreateInfo},
  memory::allocator::{MemoryTypeFilter, StandardMemoryAllocator},
  swapchain::Surface,
};
use winit::event_loop::EventLoop;

use crate::render::model::{ModelBuffers, PackedMesh};

/// Long-lived GPU objects created before the window exists.
pub struct InitializedVulkan {
  pub instance:                 Arc<Instance>,
  pub device:                   Arc<Device>,
  pub queue:                    Arc<Queue>,
  pub memory_allocator:         Arc<StandardMemoryAllocator>,
  pub descriptor_set_allocator: Arc<StandardDescriptorSetAllocator>,
  pub command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
  pub uniform_buffer_allocator: SubbufferAllocator,
  pub model_buffers:            ModelBuffers,
}

/// Picks a device that can present to windows of `event_loop`, creates the
/// allocators and uploads `mesh`.
///
/// Discrete GPUs are preferred over integrated, virtual and software devices.
pub fn initialize_vulkan(
  event_loop: &EventLoop<()>,
  mesh: &PackedMesh,
) -> Result<InitializedVulkan> {
  let library = VulkanLibrary::new().context("failed to load the Vulkan library")?;
  let required_extensions = Surface::required_extensions(event_loop)
    .map_err(|e| anyhow!("failed to query surface extensions: {e}"))?;
  let instance = Instance::new(library, InstanceCreateInfo {
    flags: InstanceCreateFlags::ENUMERATE_PORTABILITY,
    enabled_extensions: required_extensions,
    ..Default::default()
  })
  .context("failed to create Vulkan instance")?;

  let device_extensions = DeviceExtensions {
    khr_swapchain: true,
    ..DeviceExtensions::empty()
  };

  let (physical_device, queue_family_index) = instance
    .enumerate_physical_devices()
    .context("failed to enumerate physical devices")?
    .filter(|p| p.supported_extensions().contains(&device_extensions))
    .filter_map(|p| {
      p.queue_family_properties()
        .iter()
        .enumerate()
        .position(|(i, q)| {
          q.queue_flags.intersects(QueueFlags::GRAPHICS)
            && p.presentation_support(i as u32, event_loop).unwrap_or(false)
        })
        .map(|i| (p, i as u32))
    })
    .min_by_key(|(p, _)| match p.properties().device_type {
      PhysicalDeviceType::DiscreteGpu => 0,
      PhysicalDeviceType::IntegratedGpu => 1,
      PhysicalDeviceType::VirtualGpu => 2,
      PhysicalDeviceType::Cpu => 3,
      PhysicalDeviceType::Other => 4,
      _ => 5,
    })
    .ok_or_else(|| anyhow!("no Vulkan device supports graphics and presentation"))?;

  log::info!(
    "Using device: {} (type: {:?})",
    physical_device.properties().device_name,
    physical_device.properties().device_type,
  );

  // Wireframe is optional; without it the toggle is ignored
  let fill_mode_non_solid = physical_device.supported_features().fill_mode_non_solid;
  if !fill_mode_non_solid {
    log::warn!("Device lacks fill_mode_non_solid, wireframe mode unavailable");
  }

  let (device, mut queues) = Device::new(physical_device, DeviceCreateInfo {
    enabled_extensions: device_extensions,
    enabled_features: DeviceFeatures {
      fill_mode_non_solid,
      ..DeviceFeatures::empty()
    },
    queue_create_infos: vec![QueueCreateInfo {
      queue_family_index,
      ..Default::default()
    }],
    ..Default::default()
  })
  .context("failed to create logical device")?;

  let queue = queues
    .next()
    .ok_or_else(|| anyhow!("device returned no queues"))?;

  let memory_allocator = Arc::new(StandardMemoryAllocator::new_default(device.clone()));
  let descriptor_set_allocator = Arc::new(StandardDescriptorSetAllocator::new(
    device.clone(),
    Default::default(),
  ));
  let command_buffer_allocator = Arc::new(StandardCommandBufferAllocator::new(
    device.clone(),
    Default::default(),
  ));

  let model_buffers = ModelBuffers::upload(memory_allocator.clone(), mesh)?;
  log::debug!("Uploaded {} vertices", model_buffers.vertex_count);

  let uniform_buffer_allocator = SubbufferAllocator::new(
    memory_allocator.clone(),
    SubbufferAllocatorCreateInfo {
      buffer_usage: BufferUsage::UNIFORM_BUFFER,
      memory_type_filter: MemoryTypeFilter::PREFER_DEVICE | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
      ..Default::default()
    },
  );

  Ok(InitializedVulkan {
    instance,
    device,
    queue,
    memory_allocator,
    descriptor_set_allocator,
    command_buffer_allocator,
    uniform_buffer_allocator,
    model_buffers,
  })
}
