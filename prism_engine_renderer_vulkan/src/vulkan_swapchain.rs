/// Swapchain - presentation images plus everything sized to them
///
/// Owns the VkSwapchainKHR, one image view, framebuffer and render-finished
/// semaphore per image, and the depth buffer shared by all framebuffers.
/// Recreation keeps the surface format (so the render pass and pipelines stay
/// valid) and must keep the image count, since the core allocates one
/// descriptor set per swapchain image.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use prism_engine::prism::{Error, Result};
use prism_engine::{engine_bail, engine_debug, engine_err, engine_error, engine_info};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{choose_extent, choose_image_count, choose_present_mode, choose_surface_format};
use crate::vulkan_render_pass::DEPTH_FORMAT;

/// Result of acquiring the next image
pub(crate) enum Acquired {
    Image { index: u32, suboptimal: bool },
    OutOfDate,
}

struct DepthBuffer {
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
}

pub(crate) struct Swapchain {
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    pub framebuffers: Vec<vk::Framebuffer>,
    /// One per image: a semaphore may only be reused once its present finished
    pub render_finished: Vec<vk::Semaphore>,
    depth: Option<DepthBuffer>,
}

/// Pick the surface format the render pass is built for
pub(crate) fn query_surface_format(ctx: &GpuContext) -> Result<vk::SurfaceFormatKHR> {
    let formats = unsafe {
        ctx.surface_loader
            .get_physical_device_surface_formats(ctx.physical_device, ctx.surface)
            .map_err(|e| {
                engine_error!("prism::vulkan", "Failed to query surface formats: {:?}", e);
                Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
            })?
    };
    choose_surface_format(&formats).ok_or_else(|| {
        engine_error!("prism::vulkan", "Surface reports no formats");
        Error::InitializationFailed("Surface reports no formats".to_string())
    })
}

fn query_capabilities(ctx: &GpuContext) -> Result<vk::SurfaceCapabilitiesKHR> {
    unsafe {
        ctx.surface_loader
            .get_physical_device_surface_capabilities(ctx.physical_device, ctx.surface)
            .map_err(|e| engine_err!("prism::vulkan", "Failed to get surface capabilities: {:?}", e))
    }
}

impl Swapchain {
    pub fn new(
        ctx: &GpuContext,
        allocator: &mut Allocator,
        render_pass: vk::RenderPass,
        format: vk::SurfaceFormatKHR,
        vsync: bool,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let present_modes = unsafe {
            ctx.surface_loader
                .get_physical_device_surface_present_modes(ctx.physical_device, ctx.surface)
                .map_err(|e| {
                    engine_error!("prism::vulkan", "Failed to query present modes: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get present modes: {:?}", e))
                })?
        };
        let present_mode = choose_present_mode(vsync, &present_modes);

        let mut swapchain = Self {
            loader: ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device),
            swapchain: vk::SwapchainKHR::null(),
            format,
            extent: vk::Extent2D { width: 0, height: 0 },
            present_mode,
            images: Vec::new(),
            views: Vec::new(),
            framebuffers: Vec::new(),
            render_finished: Vec::new(),
            depth: None,
        };

        let capabilities = query_capabilities(ctx)?;
        let Some(extent) = choose_extent(&capabilities, width, height) else {
            engine_bail!("prism::vulkan" => Error::InitializationFailed,
                "Cannot create a swapchain for a surface of zero area ({}x{})", width, height);
        };
        if let Err(e) = swapchain.build(ctx, allocator, render_pass, &capabilities, extent) {
            unsafe { swapchain.destroy(&ctx.device, allocator) };
            return Err(e);
        }

        engine_info!("prism::vulkan", "Swapchain created: {}x{}, {} images, {:?}, {:?}",
            swapchain.extent.width, swapchain.extent.height, swapchain.images.len(),
            swapchain.format.format, present_mode);

        Ok(swapchain)
    }

    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Rebuild for a new window size
    ///
    /// Returns `false`, leaving the current swapchain untouched, while the
    /// surface has no area. The caller must have waited for the device to go idle.
    pub fn recreate(
        &mut self,
        ctx: &GpuContext,
        allocator: &mut Allocator,
        render_pass: vk::RenderPass,
        width: u32,
        height: u32,
    ) -> Result<bool> {
        let capabilities = query_capabilities(ctx)?;
        let Some(extent) = choose_extent(&capabilities, width, height) else {
            engine_debug!("prism::vulkan", "Surface has zero area, swapchain recreation deferred");
            return Ok(false);
        };

        let previous_count = self.images.len();
        self.destroy_image_resources(&ctx.device, allocator);
        self.build(ctx, allocator, render_pass, &capabilities, extent)?;

        if self.images.len() != previous_count {
            engine_bail!("prism::vulkan" => Error::InvalidState,
                "Swapchain image count changed from {} to {} on recreation", previous_count, self.images.len());
        }

        engine_debug!("prism::vulkan", "Swapchain recreated: {}x{}", self.extent.width, self.extent.height);
        Ok(true)
    }

    /// Acquire the next image, signaling `semaphore` once it is available
    pub fn acquire(&self, semaphore: vk::Semaphore) -> Result<Acquired> {
        unsafe {
            match self.loader.acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null()) {
                Ok((index, suboptimal)) => Ok(Acquired::Image { index, suboptimal }),
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquired::OutOfDate),
                Err(e) => Err(engine_err!("prism::vulkan", "Failed to acquire next swapchain image: {:?}", e)),
            }
        }
    }

    /// Present `image_index` once its render-finished semaphore signals
    ///
    /// Returns `true` when the swapchain no longer matches the surface.
    pub fn present(&self, queue: vk::Queue, image_index: u32) -> Result<bool> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [self.render_finished[image_index as usize]];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe {
            match self.loader.queue_present(queue, &present_info) {
                Ok(suboptimal) => Ok(suboptimal),
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
                Err(e) => Err(engine_err!("prism::vulkan", "Failed to present swapchain image: {:?}", e)),
            }
        }
    }

    /// Create swapchain, views, depth buffer, framebuffers and semaphores
    fn build(
        &mut self,
        ctx: &GpuContext,
        allocator: &mut Allocator,
        render_pass: vk::RenderPass,
        capabilities: &vk::SurfaceCapabilitiesKHR,
        extent: vk::Extent2D,
    ) -> Result<()> {
        let device = &ctx.device;
        unsafe {
            let family_indices = [ctx.families.graphics, ctx.families.present];

            let old_swapchain = self.swapchain;
            let mut create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(ctx.surface)
                .min_image_count(choose_image_count(capabilities))
                .image_format(self.format.format)
                .image_color_space(self.format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(self.present_mode)
                .clipped(true)
                .old_swapchain(old_swapchain);
            create_info = if ctx.families.graphics != ctx.families.present {
                create_info
                    .image_sharing_mode(vk::SharingMode::CONCURRENT)
                    .queue_family_indices(&family_indices)
            } else {
                create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            };

            let swapchain = self.loader.create_swapchain(&create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create swapchain: {:?}", e))?;
            if old_swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(old_swapchain, None);
            }
            self.swapchain = swapchain;
            self.extent = extent;

            self.images = self.loader.get_swapchain_images(swapchain)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to get swapchain images: {:?}", e))?;

            for &image in &self.images {
                let view = create_view(device, image, self.format.format, vk::ImageAspectFlags::COLOR)?;
                self.views.push(view);
            }

            let depth = create_depth_buffer(device, allocator, extent)?;
            let depth_view = depth.view;
            self.depth = Some(depth);

            for &view in &self.views {
                let attachments = [view, depth_view];
                let framebuffer_info = vk::FramebufferCreateInfo::default()
                    .render_pass(render_pass)
                    .attachments(&attachments)
                    .width(extent.width)
                    .height(extent.height)
                    .layers(1);
                let framebuffer = device.create_framebuffer(&framebuffer_info, None)
                    .map_err(|e| engine_err!("prism::vulkan", "Failed to create framebuffer: {:?}", e))?;
                self.framebuffers.push(framebuffer);
            }

            let semaphore_info = vk::SemaphoreCreateInfo::default();
            for _ in 0..self.images.len() {
                let semaphore = device.create_semaphore(&semaphore_info, None)
                    .map_err(|e| engine_err!("prism::vulkan", "Failed to create render-finished semaphore: {:?}", e))?;
                self.render_finished.push(semaphore);
            }
        }
        Ok(())
    }

    /// Destroy everything except the VkSwapchainKHR, which recreation passes as old swapchain
    fn destroy_image_resources(&mut self, device: &ash::Device, allocator: &mut Allocator) {
        unsafe {
            for semaphore in self.render_finished.drain(..) {
                device.destroy_semaphore(semaphore, None);
            }
            for framebuffer in self.framebuffers.drain(..) {
                device.destroy_framebuffer(framebuffer, None);
            }
            if let Some(mut depth) = self.depth.take() {
                device.destroy_image_view(depth.view, None);
                device.destroy_image(depth.image, None);
                if let Some(allocation) = depth.allocation.take() {
                    allocator.free(allocation).ok();
                }
            }
            for view in self.views.drain(..) {
                device.destroy_image_view(view, None);
            }
        }
        self.images.clear();
    }

    /// # Safety
    ///
    /// The device must be idle.
    pub unsafe fn destroy(&mut self, device: &ash::Device, allocator: &mut Allocator) {
        self.destroy_image_resources(device, allocator);
        if self.swapchain != vk::SwapchainKHR::null() {
            self.loader.destroy_swapchain(self.swapchain, None);
            self.swapchain = vk::SwapchainKHR::null();
        }
    }
}

unsafe fn create_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });
    device.create_image_view(&create_info, None)
        .map_err(|e| engine_err!("prism::vulkan", "Failed to create image view: {:?}", e))
}

unsafe fn create_depth_buffer(
    device: &ash::Device,
    allocator: &mut Allocator,
    extent: vk::Extent2D,
) -> Result<DepthBuffer> {
    let image_info = vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .format(DEPTH_FORMAT)
        .extent(vk::Extent3D { width: extent.width, height: extent.height, depth: 1 })
        .mip_levels(1)
        .array_layers(1)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED);
    let image = device.create_image(&image_info, None)
        .map_err(|e| engine_err!("prism::vulkan", "Failed to create depth image: {:?}", e))?;

    let requirements = device.get_image_memory_requirements(image);
    let allocation = match allocator.allocate(&AllocationCreateDesc {
        name: "depth buffer",
        requirements,
        location: gpu_allocator::MemoryLocation::GpuOnly,
        linear: false,
        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
    }) {
        Ok(allocation) => allocation,
        Err(_) => {
            device.destroy_image(image, None);
            engine_error!("prism::vulkan", "Out of GPU memory for {}x{} depth buffer", extent.width, extent.height);
            return Err(Error::OutOfMemory);
        }
    };

    if let Err(e) = device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
        allocator.free(allocation).ok();
        device.destroy_image(image, None);
        engine_bail!("prism::vulkan", "Failed to bind depth image memory: {:?}", e);
    }

    match create_view(device, image, DEPTH_FORMAT, vk::ImageAspectFlags::DEPTH) {
        Ok(view) => Ok(DepthBuffer { image, view, allocation: Some(allocation) }),
        Err(e) => {
            allocator.free(allocation).ok();
            device.destroy_image(image, None);
            Err(e)
        }
    }
}
