/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Owns the GPU context, the allocator, every resource arena and the frame
/// machinery (swapchain, render pass, per-frame sync objects). Buffers,
/// pipelines and descriptor sets live in the shared resource table so command
/// lists can resolve their handles while recording; everything else is only
/// touched by the device itself.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use prism_engine::graphics_device::{
    BufferBarrier, BufferDesc, BufferHandle, CommandList as EngineCommandList,
    DescriptorSetHandle, DescriptorSetLayoutDesc, DescriptorSetLayoutHandle, DescriptorWrite,
    DeviceLimits, FrameInfo, FrameStatus, GraphicsDevice, PipelineDesc, PipelineHandle,
    ShaderDesc, ShaderHandle, ShaderModule, TextureDesc, TextureHandle,
};
use prism_engine::prism::render::RendererConfig;
use prism_engine::prism::{Error, Result};
use prism_engine::{engine_bail, engine_debug, engine_err, engine_error, engine_info, engine_warn};
use slotmap::SlotMap;
use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::sync::{Arc, RwLock};
use winit::window::Window;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::{read_resources, write_resources, GpuContext, ResourceTable, SharedResources};
use crate::vulkan_descriptor_set::{
    allocate_sets, create_descriptor_pool, validate_writes, write_set, DescriptorSet,
    DescriptorSetLayout, ResolvedWrite,
};
use crate::vulkan_format::shader_stage_to_vk;
use crate::vulkan_frame::FrameSync;
use crate::vulkan_pipeline::{Pipeline, StageModule};
use crate::vulkan_reflection::reflect_shader;
use crate::vulkan_render_pass::create_render_pass;
use crate::vulkan_sampler::{SamplerCache, SamplerKind};
use crate::vulkan_shader::Shader;
use crate::vulkan_swapchain::{query_surface_format, Acquired, Swapchain};
use crate::vulkan_texture::{Texture, UploadQueue};
use crate::vulkan_transfer::{OwnershipTransfer, TransferContext, TransferQueues};

/// Vulkan graphics device
///
/// Created for one window. Rendering goes through a single render pass whose
/// color attachment is the swapchain image and whose depth attachment is
/// owned by the swapchain.
pub struct VulkanGraphicsDevice {
    ctx: GpuContext,
    /// Dropped manually, before the logical device is destroyed
    allocator: ManuallyDrop<Allocator>,
    resources: SharedResources,

    textures: SlotMap<TextureHandle, Texture>,
    shaders: SlotMap<ShaderHandle, Shader>,
    set_layouts: SlotMap<DescriptorSetLayoutHandle, DescriptorSetLayout>,
    descriptor_pool: vk::DescriptorPool,
    sampler_cache: SamplerCache,

    render_pass: vk::RenderPass,
    swapchain: Swapchain,
    frames: Vec<FrameSync>,
    /// Fence of the frame currently rendering to each swapchain image
    images_in_flight: Vec<vk::Fence>,
    current_frame: usize,
    /// Image acquired by the frame being recorded
    current_image: Option<u32>,
    needs_recreate: bool,
    window_extent: (u32, u32),
    clear_color: [f32; 4],

    transfer: TransferContext,
    /// Graphics-family pool for texture uploads
    upload: UploadQueue,
}

impl VulkanGraphicsDevice {
    /// Create a device rendering to `window`
    pub fn new(window: &Window, config: &RendererConfig) -> Result<Self> {
        if config.max_frames_in_flight == 0 {
            engine_bail!("prism::vulkan" => Error::InitializationFailed,
                "max_frames_in_flight must be at least 1");
        }

        let ctx = GpuContext::new(window, config)?;

        let mut allocator = Allocator::new(&AllocatorCreateDesc {
            instance: ctx.instance.clone(),
            device: ctx.device.clone(),
            physical_device: ctx.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| {
            engine_error!("prism::vulkan", "Failed to create GPU allocator: {:?}", e);
            Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
        })?;

        let resources: SharedResources = Arc::new(RwLock::new(ResourceTable::default()));

        let surface_format = query_surface_format(&ctx)?;
        let render_pass = create_render_pass(&ctx.device, surface_format.format)?;

        let size = window.inner_size();
        let swapchain = Swapchain::new(
            &ctx,
            &mut allocator,
            render_pass,
            surface_format,
            config.vsync,
            size.width,
            size.height,
        )?;

        let frames = (0..config.max_frames_in_flight)
            .map(|_| FrameSync::new(&ctx.device, ctx.families.graphics, resources.clone()))
            .collect::<Result<Vec<_>>>()?;
        let images_in_flight = vec![vk::Fence::null(); swapchain.image_count() as usize];

        let transfer = TransferContext::new(&ctx.device, ctx.families, resources.clone())?;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::TRANSIENT)
            .queue_family_index(ctx.families.graphics);
        let upload_pool = unsafe {
            ctx.device.create_command_pool(&pool_info, None).map_err(|e| {
                engine_error!("prism::vulkan", "Failed to create upload command pool: {:?}", e);
                Error::InitializationFailed(format!("Failed to create upload command pool: {:?}", e))
            })?
        };

        let descriptor_pool = create_descriptor_pool(&ctx.device)?;
        let sampler_cache = SamplerCache::new(ctx.max_anisotropy);

        engine_info!("prism::vulkan", "Graphics device ready ({} frame(s) in flight, {} swapchain image(s))",
            frames.len(), swapchain.image_count());

        Ok(Self {
            upload: UploadQueue { queue: ctx.graphics_queue, command_pool: upload_pool },
            ctx,
            allocator: ManuallyDrop::new(allocator),
            resources,
            textures: SlotMap::with_key(),
            shaders: SlotMap::with_key(),
            set_layouts: SlotMap::with_key(),
            descriptor_pool,
            sampler_cache,
            render_pass,
            swapchain,
            frames,
            images_in_flight,
            current_frame: 0,
            current_image: None,
            needs_recreate: false,
            window_extent: (size.width, size.height),
            clear_color: config.clear_color,
            transfer,
        })
    }

    /// Rebuild the swapchain for the current window size
    ///
    /// Returns `false` while the surface has no area; recreation is retried
    /// on the next frame.
    fn recreate_swapchain(&mut self) -> Result<bool> {
        self.wait_idle()?;
        let (width, height) = self.window_extent;
        if !self.swapchain.recreate(&self.ctx, &mut self.allocator, self.render_pass, width, height)? {
            self.needs_recreate = true;
            return Ok(false);
        }
        self.images_in_flight.fill(vk::Fence::null());
        self.needs_recreate = false;
        Ok(true)
    }

    fn resolve_writes(&self, table: &ResourceTable, writes: &[DescriptorWrite]) -> Result<Vec<ResolvedWrite>> {
        writes
            .iter()
            .map(|write| match write {
                DescriptorWrite::UniformBuffer { binding, buffer, offset, range } => {
                    let resolved = table.buffers.get(*buffer).ok_or_else(|| {
                        engine_err!("prism::vulkan" => Error::InvalidResource,
                            "Descriptor write to binding {} references an unknown buffer", binding)
                    })?;
                    if offset + range > resolved.size {
                        engine_bail!("prism::vulkan" => Error::InvalidResource,
                            "Uniform range {}..{} exceeds buffer '{}' ({} bytes)",
                            offset, offset + range, resolved.name, resolved.size);
                    }
                    Ok(ResolvedWrite::UniformBuffer {
                        binding: *binding,
                        buffer: resolved.buffer,
                        offset: *offset,
                        range: *range,
                    })
                }
                DescriptorWrite::Textures { binding, first_element, textures } => {
                    let images = textures
                        .iter()
                        .map(|&handle| {
                            self.textures
                                .get(handle)
                                .map(|t| (t.view, t.sampler))
                                .ok_or_else(|| engine_err!("prism::vulkan" => Error::InvalidResource,
                                    "Descriptor write to binding {} references an unknown texture", binding))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Ok(ResolvedWrite::Images { binding: *binding, first_element: *first_element, images })
                }
            })
            .collect()
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn limits(&self) -> DeviceLimits {
        self.ctx.limits
    }

    fn swapchain_image_count(&self) -> u32 {
        self.swapchain.image_count()
    }

    fn swapchain_extent(&self) -> (u32, u32) {
        (self.swapchain.extent.width, self.swapchain.extent.height)
    }

    // ===== BUFFERS =====

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferHandle> {
        let buffer = Buffer::new(&self.ctx.device, &mut self.allocator, desc)?;
        let mut table = write_resources(&self.resources)?;
        Ok(table.buffers.insert(buffer))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> Result<()> {
        self.wait_idle()?;
        let removed = write_resources(&self.resources)?.buffers.remove(buffer);
        let Some(removed) = removed else {
            engine_bail!("prism::vulkan" => Error::InvalidResource, "destroy_buffer: unknown buffer handle");
        };
        unsafe { removed.destroy(&self.ctx.device, &mut self.allocator) };
        Ok(())
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let mut table = write_resources(&self.resources)?;
        table
            .buffers
            .get_mut(buffer)
            .ok_or_else(|| engine_err!("prism::vulkan" => Error::InvalidResource, "write_buffer: unknown buffer handle"))?
            .write(offset, data)
    }

    fn read_buffer(&self, buffer: BufferHandle, offset: u64, len: u64) -> Result<Vec<u8>> {
        let table = read_resources(&self.resources)?;
        table
            .buffers
            .get(buffer)
            .ok_or_else(|| engine_err!("prism::vulkan" => Error::InvalidResource, "read_buffer: unknown buffer handle"))?
            .read(offset, len)
    }

    // ===== SHADERS AND PIPELINES =====

    fn create_shader(&mut self, desc: &ShaderDesc) -> Result<ShaderModule> {
        let (shader, words) = Shader::new(&self.ctx.device, desc)?;
        let reflection = match reflect_shader(desc.name, &words, desc.entry_point) {
            Ok(reflection) => reflection,
            Err(e) => {
                unsafe { shader.destroy(&self.ctx.device) };
                return Err(e);
            }
        };
        let stage = shader.stage;
        let handle = self.shaders.insert(shader);

        engine_debug!("prism::vulkan", "Shader '{}' created ({:?}, {} uniform(s), {} sampler(s))",
            desc.name, stage, reflection.uniforms.len(), reflection.samplers.len());

        Ok(ShaderModule {
            handle,
            stage,
            name: desc.name.to_string(),
            entry_point: desc.entry_point.to_string(),
            reflection,
        })
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) -> Result<()> {
        let Some(removed) = self.shaders.remove(shader) else {
            engine_bail!("prism::vulkan" => Error::InvalidResource, "destroy_shader: unknown shader handle");
        };
        unsafe { removed.destroy(&self.ctx.device) };
        Ok(())
    }

    fn create_descriptor_set_layout(&mut self, desc: &DescriptorSetLayoutDesc) -> Result<DescriptorSetLayoutHandle> {
        let layout = DescriptorSetLayout::new(&self.ctx.device, desc)?;
        Ok(self.set_layouts.insert(layout))
    }

    fn destroy_descriptor_set_layout(&mut self, layout: DescriptorSetLayoutHandle) -> Result<()> {
        let Some(removed) = self.set_layouts.remove(layout) else {
            engine_bail!("prism::vulkan" => Error::InvalidResource,
                "destroy_descriptor_set_layout: unknown layout handle");
        };
        unsafe { self.ctx.device.destroy_descriptor_set_layout(removed.layout, None) };
        Ok(())
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<PipelineHandle> {
        let limits = self.ctx.limits;
        if desc.descriptor_set_layouts.len() as u32 > limits.max_bound_descriptor_sets {
            engine_bail!("prism::vulkan" => Error::InvalidResource,
                "Pipeline '{}' uses {} descriptor sets, the device binds at most {}",
                desc.name, desc.descriptor_set_layouts.len(), limits.max_bound_descriptor_sets);
        }
        if let Some(range) = desc.push_constant_ranges.iter().find(|r| r.end() > limits.max_push_constants_size) {
            engine_bail!("prism::vulkan" => Error::InvalidResource,
                "Pipeline '{}' push constants end at {}, the device allows {} bytes",
                desc.name, range.end(), limits.max_push_constants_size);
        }

        let mut entry_points = Vec::with_capacity(desc.stages.len());
        let mut modules = Vec::with_capacity(desc.stages.len());
        for (stage, handle, entry_point) in &desc.stages {
            let shader = self.shaders.get(*handle).ok_or_else(|| {
                engine_err!("prism::vulkan" => Error::InvalidResource,
                    "Pipeline '{}' references an unknown {:?} shader", desc.name, stage)
            })?;
            if shader.stage != *stage {
                engine_bail!("prism::vulkan" => Error::InvalidResource,
                    "Pipeline '{}': {:?} slot holds a {:?} shader", desc.name, stage, shader.stage);
            }
            // An empty entry point means the one the module was created with
            let name = if entry_point.is_empty() {
                shader.entry_point.clone()
            } else {
                CString::new(entry_point.as_str()).map_err(|_| {
                    engine_err!("prism::vulkan" => Error::InvalidResource,
                        "Pipeline '{}': entry point '{}' contains a NUL byte", desc.name, entry_point)
                })?
            };
            entry_points.push(name);
            modules.push((shader.module, shader_stage_to_vk(*stage)));
        }

        let stages: Vec<StageModule> = modules
            .iter()
            .zip(&entry_points)
            .map(|(&(module, stage), entry_point)| StageModule { module, stage, entry_point: entry_point.as_c_str() })
            .collect();

        let set_layouts = desc
            .descriptor_set_layouts
            .iter()
            .map(|&handle| {
                self.set_layouts.get(handle).map(|l| l.layout).ok_or_else(|| {
                    engine_err!("prism::vulkan" => Error::InvalidResource,
                        "Pipeline '{}' references an unknown descriptor set layout", desc.name)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let pipeline = Pipeline::new(&self.ctx.device, self.render_pass, desc, &stages, &set_layouts)?;
        engine_debug!("prism::vulkan", "Pipeline '{}' created ({} stage(s), {} set(s))",
            desc.name, stages.len(), set_layouts.len());

        let mut table = write_resources(&self.resources)?;
        Ok(table.pipelines.insert(pipeline))
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) -> Result<()> {
        self.wait_idle()?;
        let removed = write_resources(&self.resources)?.pipelines.remove(pipeline);
        let Some(removed) = removed else {
            engine_bail!("prism::vulkan" => Error::InvalidResource, "destroy_pipeline: unknown pipeline handle");
        };
        unsafe { removed.destroy(&self.ctx.device) };
        Ok(())
    }

    // ===== DESCRIPTOR SETS =====

    fn allocate_descriptor_sets(&mut self, layouts: &[DescriptorSetLayoutHandle]) -> Result<Vec<DescriptorSetHandle>> {
        if layouts.is_empty() {
            return Ok(Vec::new());
        }
        let resolved = layouts
            .iter()
            .map(|&handle| {
                self.set_layouts.get(handle).ok_or_else(|| {
                    engine_err!("prism::vulkan" => Error::InvalidResource,
                        "allocate_descriptor_sets: unknown layout handle")
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let sets = allocate_sets(&self.ctx.device, self.descriptor_pool, &resolved)?;

        let mut table = write_resources(&self.resources)?;
        Ok(sets
            .into_iter()
            .zip(&resolved)
            .map(|(set, layout)| {
                table.descriptor_sets.insert(DescriptorSet {
                    set,
                    bindings: layout.bindings.clone(),
                    update_after_bind: layout.update_after_bind,
                })
            })
            .collect())
    }

    fn free_descriptor_sets(&mut self, sets: &[DescriptorSetHandle]) -> Result<()> {
        if sets.is_empty() {
            return Ok(());
        }
        self.wait_idle()?;

        let mut table = write_resources(&self.resources)?;
        if let Some(i) = sets.iter().position(|&h| !table.descriptor_sets.contains_key(h)) {
            engine_bail!("prism::vulkan" => Error::InvalidResource,
                "free_descriptor_sets: handle #{} is unknown", i);
        }
        let raw: Vec<vk::DescriptorSet> = sets
            .iter()
            .filter_map(|&h| table.descriptor_sets.remove(h))
            .map(|s| s.set)
            .collect();
        drop(table);

        unsafe {
            self.ctx.device
                .free_descriptor_sets(self.descriptor_pool, &raw)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to free descriptor sets: {:?}", e))
        }
    }

    fn update_descriptor_set(&mut self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) -> Result<()> {
        let (raw, update_after_bind, resolved) = {
            let table = read_resources(&self.resources)?;
            let target = table.descriptor_sets.get(set).ok_or_else(|| {
                engine_err!("prism::vulkan" => Error::InvalidResource, "update_descriptor_set: unknown set handle")
            })?;
            validate_writes(&target.bindings, writes)?;
            (target.set, target.update_after_bind, self.resolve_writes(&table, writes)?)
        };

        if !update_after_bind {
            // The set may be bound by a frame still executing
            unsafe {
                self.ctx.device
                    .queue_wait_idle(self.ctx.graphics_queue)
                    .map_err(|e| engine_err!("prism::vulkan", "Failed to wait for graphics queue: {:?}", e))?;
            }
        }

        unsafe { write_set(&self.ctx.device, raw, &resolved) };
        Ok(())
    }

    // ===== TEXTURES =====

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle> {
        let sampler = self.sampler_cache.get(&self.ctx.device, SamplerKind::for_texture(desc.kind))?;
        let texture = Texture::new(&self.ctx.device, &mut self.allocator, &self.upload, desc, sampler)?;
        engine_debug!("prism::vulkan", "Texture '{}' created ({}x{}, {:?}, {:?})",
            desc.name, desc.width, desc.height, desc.format, desc.kind);
        Ok(self.textures.insert(texture))
    }

    fn destroy_texture(&mut self, texture: TextureHandle) -> Result<()> {
        if !self.textures.contains_key(texture) {
            engine_bail!("prism::vulkan" => Error::InvalidResource, "destroy_texture: unknown texture handle");
        }
        self.wait_idle()?;
        if let Some(removed) = self.textures.remove(texture) {
            unsafe { removed.destroy(&self.ctx.device, &mut self.allocator) };
        }
        Ok(())
    }

    // ===== TRANSFERS =====

    fn begin_transfer(&mut self) -> Result<&mut dyn EngineCommandList> {
        let commands = self.transfer.begin()?;
        Ok(commands)
    }

    fn submit_transfer(&mut self, barriers: &[BufferBarrier]) -> Result<()> {
        let transfers = {
            let table = read_resources(&self.resources)?;
            barriers
                .iter()
                .map(|b| {
                    table
                        .buffers
                        .get(b.buffer)
                        .map(|buffer| OwnershipTransfer { buffer: buffer.buffer, offset: b.offset, size: b.size })
                        .ok_or_else(|| engine_err!("prism::vulkan" => Error::InvalidResource,
                            "submit_transfer: barrier references an unknown buffer"))
                })
                .collect::<Result<Vec<_>>>()
        };
        let transfers = match transfers {
            Ok(transfers) => transfers,
            Err(e) => {
                self.transfer.abort();
                return Err(e);
            }
        };

        let queues = TransferQueues {
            families: self.ctx.families,
            transfer: self.ctx.transfer_queue,
            graphics: self.ctx.graphics_queue,
        };
        self.transfer.submit(&self.ctx.device, &queues, &transfers)
    }

    fn abort_transfer(&mut self) {
        self.transfer.abort();
    }

    // ===== FRAMES =====

    fn begin_frame(&mut self) -> Result<FrameStatus> {
        if self.current_image.is_some() {
            engine_bail!("prism::vulkan" => Error::InvalidState, "begin_frame called twice without end_frame");
        }
        let (width, height) = self.window_extent;
        if width == 0 || height == 0 {
            return Ok(FrameStatus::Skipped);
        }
        if self.needs_recreate && !self.recreate_swapchain()? {
            return Ok(FrameStatus::Skipped);
        }

        let device = &self.ctx.device;
        let frame = &self.frames[self.current_frame];
        unsafe {
            device
                .wait_for_fences(&[frame.in_flight], true, u64::MAX)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to wait for in-flight fence: {:?}", e))?;
        }

        let image_index = match self.swapchain.acquire(frame.image_available)? {
            Acquired::Image { index, suboptimal } => {
                if suboptimal {
                    self.needs_recreate = true;
                }
                index
            }
            Acquired::OutOfDate => {
                self.recreate_swapchain()?;
                return Ok(FrameStatus::Skipped);
            }
        };

        let image_fence = self.images_in_flight[image_index as usize];
        unsafe {
            if image_fence != vk::Fence::null() && image_fence != frame.in_flight {
                device
                    .wait_for_fences(&[image_fence], true, u64::MAX)
                    .map_err(|e| engine_err!("prism::vulkan", "Failed to wait for image fence: {:?}", e))?;
            }
            device
                .reset_fences(&[frame.in_flight])
                .map_err(|e| engine_err!("prism::vulkan", "Failed to reset in-flight fence: {:?}", e))?;
        }
        self.images_in_flight[image_index as usize] = frame.in_flight;

        let framebuffer = self.swapchain.framebuffers[image_index as usize];
        let extent = self.swapchain.extent;
        let frame = &mut self.frames[self.current_frame];
        frame.commands.begin()?;
        frame.commands.begin_render_pass(self.render_pass, framebuffer, extent, self.clear_color)?;

        self.current_image = Some(image_index);
        Ok(FrameStatus::Ready(FrameInfo { frame_index: self.current_frame as u32, image_index }))
    }

    fn frame_commands(&mut self) -> Result<&mut dyn EngineCommandList> {
        if self.current_image.is_none() {
            engine_bail!("prism::vulkan" => Error::InvalidState, "frame_commands called outside a frame");
        }
        Ok(&mut self.frames[self.current_frame].commands)
    }

    fn end_frame(&mut self) -> Result<()> {
        let Some(image_index) = self.current_image.take() else {
            engine_bail!("prism::vulkan" => Error::InvalidState, "end_frame called without begin_frame");
        };

        let frame = &mut self.frames[self.current_frame];
        frame.commands.end_render_pass()?;
        frame.commands.end()?;

        unsafe {
            let wait = [frame.image_available];
            let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
            let command_buffers = [frame.commands.command_buffer()];
            let signal = [self.swapchain.render_finished[image_index as usize]];
            let submit = vk::SubmitInfo::default()
                .wait_semaphores(&wait)
                .wait_dst_stage_mask(&wait_stages)
                .command_buffers(&command_buffers)
                .signal_semaphores(&signal);
            self.ctx.device
                .queue_submit(self.ctx.graphics_queue, &[submit], frame.in_flight)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to submit frame: {:?}", e))?;
        }

        if self.swapchain.present(self.ctx.present_queue, image_index)? {
            self.needs_recreate = true;
        }

        self.current_frame = (self.current_frame + 1) % self.frames.len();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if (width, height) == self.window_extent {
            return Ok(());
        }
        self.window_extent = (width, height);
        if width == 0 || height == 0 {
            engine_debug!("prism::vulkan", "Window minimized, rendering paused");
            return Ok(());
        }
        self.needs_recreate = true;
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.ctx.device
                .device_wait_idle()
                .map_err(|e| engine_err!("prism::vulkan", "Failed to wait for device idle: {:?}", e))
        }
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.ctx.device.device_wait_idle() {
                engine_warn!("prism::vulkan", "device_wait_idle failed during shutdown: {:?}", e);
            }

            let device = self.ctx.device.clone();

            // Resource table first: command lists no longer record
            {
                let mut table = match self.resources.write() {
                    Ok(table) => table,
                    Err(poisoned) => poisoned.into_inner(),
                };
                for (_, pipeline) in table.pipelines.drain() {
                    pipeline.destroy(&device);
                }
                for (_, buffer) in table.buffers.drain() {
                    buffer.destroy(&device, &mut self.allocator);
                }
                // Freed with the pool
                table.descriptor_sets.clear();
            }
            for (_, texture) in self.textures.drain() {
                texture.destroy(&device, &mut self.allocator);
            }
            for (_, shader) in self.shaders.drain() {
                shader.destroy(&device);
            }
            for (_, layout) in self.set_layouts.drain() {
                device.destroy_descriptor_set_layout(layout.layout, None);
            }
            self.sampler_cache.shutdown(&device);
            device.destroy_descriptor_pool(self.descriptor_pool, None);

            for frame in &self.frames {
                frame.destroy(&device);
            }
            self.transfer.destroy(&device);
            device.destroy_command_pool(self.upload.command_pool, None);

            self.swapchain.destroy(&device, &mut self.allocator);
            device.destroy_render_pass(self.render_pass, None);

            // Allocator pages must be freed before the device goes away
            ManuallyDrop::drop(&mut self.allocator);
            self.ctx.destroy();
        }
        engine_info!("prism::vulkan", "Graphics device destroyed");
    }
}
