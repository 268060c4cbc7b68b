/// Texture - sampled image, view and sampler, uploaded once at creation
///
/// The upload is synchronous: pixels go through a temporary staging buffer,
/// a one-shot command buffer on the graphics queue copies them and moves the
/// image to SHADER_READ_ONLY_OPTIMAL, then the queue is waited on.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use prism_engine::graphics_device::{BufferDesc, BufferUsage, MemoryLocation, TextureDesc, TextureKind};
use prism_engine::prism::{Error, Result};
use prism_engine::{engine_bail, engine_err, engine_error};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_format::texture_format_to_vk;

/// Vulkan texture
pub(crate) struct Texture {
    pub image: vk::Image,
    pub view: vk::ImageView,
    /// Owned by the sampler cache
    pub sampler: vk::Sampler,
    allocation: Option<Allocation>,
}

/// Queue and pool used for one-shot uploads
pub(crate) struct UploadQueue {
    pub queue: vk::Queue,
    pub command_pool: vk::CommandPool,
}

impl Texture {
    pub fn new(
        device: &ash::Device,
        allocator: &mut Allocator,
        upload: &UploadQueue,
        desc: &TextureDesc,
        sampler: vk::Sampler,
    ) -> Result<Self> {
        if desc.width == 0 || desc.height == 0 {
            engine_bail!("prism::vulkan" => Error::InvalidResource,
                "Texture '{}' has a zero dimension ({}x{})", desc.name, desc.width, desc.height);
        }
        if desc.kind == TextureKind::Cubemap && desc.width != desc.height {
            engine_bail!("prism::vulkan" => Error::InvalidResource,
                "Cubemap '{}' faces must be square ({}x{})", desc.name, desc.width, desc.height);
        }
        if desc.data.len() != desc.expected_size() {
            engine_bail!("prism::vulkan" => Error::InvalidResource,
                "Texture '{}': expected {} bytes of pixel data, got {}",
                desc.name, desc.expected_size(), desc.data.len());
        }

        let layers = desc.kind.layer_count();
        let (flags, view_type) = match desc.kind {
            TextureKind::Texture2D => (vk::ImageCreateFlags::empty(), vk::ImageViewType::TYPE_2D),
            TextureKind::Cubemap => (vk::ImageCreateFlags::CUBE_COMPATIBLE, vk::ImageViewType::CUBE),
        };
        let format = texture_format_to_vk(desc.format);

        unsafe {
            let image_create_info = vk::ImageCreateInfo::default()
                .flags(flags)
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
                .mip_levels(1)
                .array_layers(layers)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = device.create_image(&image_create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create image for '{}': {:?}", desc.name, e))?;

            let requirements = device.get_image_memory_requirements(image);
            let allocation = match allocator.allocate(&AllocationCreateDesc {
                name: desc.name,
                requirements,
                location: gpu_allocator::MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(_) => {
                    device.destroy_image(image, None);
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!("prism::vulkan", "Out of GPU memory for texture '{}' ({}x{}, {} layer(s), {:.2} MB)",
                        desc.name, desc.width, desc.height, layers, size_mb);
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
                allocator.free(allocation).ok();
                device.destroy_image(image, None);
                engine_bail!("prism::vulkan", "Failed to bind image memory for '{}': {:?}", desc.name, e);
            }

            let mut texture = Self {
                image,
                view: vk::ImageView::null(),
                sampler,
                allocation: Some(allocation),
            };

            if let Err(e) = upload_pixels(device, allocator, upload, image, desc) {
                texture.destroy(device, allocator);
                return Err(e);
            }

            let subresource = vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(layers);
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(view_type)
                .format(format)
                .subresource_range(subresource);

            match device.create_image_view(&view_info, None) {
                Ok(view) => texture.view = view,
                Err(e) => {
                    texture.destroy(device, allocator);
                    engine_bail!("prism::vulkan", "Failed to create image view for '{}': {:?}", desc.name, e);
                }
            }

            Ok(texture)
        }
    }

    /// # Safety
    ///
    /// The GPU must no longer sample the texture.
    pub unsafe fn destroy(mut self, device: &ash::Device, allocator: &mut Allocator) {
        if self.view != vk::ImageView::null() {
            device.destroy_image_view(self.view, None);
        }
        device.destroy_image(self.image, None);
        if let Some(allocation) = self.allocation.take() {
            allocator.free(allocation).ok();
        }
    }
}

/// Stage `desc.data` and copy every layer into `image`
unsafe fn upload_pixels(
    device: &ash::Device,
    allocator: &mut Allocator,
    upload: &UploadQueue,
    image: vk::Image,
    desc: &TextureDesc,
) -> Result<()> {
    let mut staging = Buffer::new(device, allocator, &BufferDesc {
        name: format!("{} (staging)", desc.name),
        size: desc.data.len() as u64,
        usage: BufferUsage::Staging,
        location: MemoryLocation::CpuToGpu,
    })?;

    let result = staging.write(0, desc.data).and_then(|_| {
        submit_one_shot(device, upload, |command_buffer| {
            record_upload(device, command_buffer, staging.buffer, image, desc);
        })
    });

    staging.destroy(device, allocator);
    result
}

unsafe fn record_upload(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    staging: vk::Buffer,
    image: vk::Image,
    desc: &TextureDesc,
) {
    let layers = desc.kind.layer_count();
    let range = vk::ImageSubresourceRange::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(layers);

    let to_transfer = vk::ImageMemoryBarrier::default()
        .old_layout(vk::ImageLayout::UNDEFINED)
        .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);
    device.cmd_pipeline_barrier(
        command_buffer,
        vk::PipelineStageFlags::TOP_OF_PIPE,
        vk::PipelineStageFlags::TRANSFER,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        &[to_transfer],
    );

    // Layers are packed back to back in the staging buffer
    let layer_size = desc.expected_size() as u64 / layers as u64;
    let regions: Vec<vk::BufferImageCopy> = (0..layers)
        .map(|layer| {
            vk::BufferImageCopy::default()
                .buffer_offset(layer as u64 * layer_size)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: layer,
                    layer_count: 1,
                })
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
        })
        .collect();
    device.cmd_copy_buffer_to_image(
        command_buffer,
        staging,
        image,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        &regions,
    );

    let to_shader_read = vk::ImageMemoryBarrier::default()
        .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
        .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(vk::AccessFlags::SHADER_READ);
    device.cmd_pipeline_barrier(
        command_buffer,
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::FRAGMENT_SHADER,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        &[to_shader_read],
    );
}

/// Record with `record`, submit, wait for the queue, free the command buffer
unsafe fn submit_one_shot(
    device: &ash::Device,
    upload: &UploadQueue,
    record: impl FnOnce(vk::CommandBuffer),
) -> Result<()> {
    let alloc_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(upload.command_pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);
    let command_buffer = device.allocate_command_buffers(&alloc_info)
        .map_err(|e| engine_err!("prism::vulkan", "Failed to allocate upload command buffer: {:?}", e))?[0];

    let result = (|| {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        device.begin_command_buffer(command_buffer, &begin_info)
            .map_err(|e| engine_err!("prism::vulkan", "Failed to begin upload command buffer: {:?}", e))?;

        record(command_buffer);

        device.end_command_buffer(command_buffer)
            .map_err(|e| engine_err!("prism::vulkan", "Failed to end upload command buffer: {:?}", e))?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        device.queue_submit(upload.queue, &[submit_info], vk::Fence::null())
            .map_err(|e| engine_err!("prism::vulkan", "Failed to submit upload: {:?}", e))?;
        device.queue_wait_idle(upload.queue)
            .map_err(|e| engine_err!("prism::vulkan", "Failed to wait for upload: {:?}", e))
    })();

    device.free_command_buffers(upload.command_pool, &[command_buffer]);
    result
}
