/// Renderer - explicit context object owning the device and all render state
///
/// The application creates one `Renderer` per device and passes it around.
/// It owns the staging ring, the device-local geometry buffer, the shared
/// uniform buffer, the shader pipeline and material arenas and the command
/// queue of the scene being recorded.
///
/// A frame looks like:
///
/// ```text
/// new_frame -> begin_scene -> submit_* ... -> end_scene -> present_frame
/// ```
///
/// Uploads (`stage_mesh` + `flush_staged_data`) happen outside of scenes.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use slotmap::SlotMap;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BufferBarrier, FrameInfo, FrameStatus, GraphicsDevice, Rect2D, TextureHandle, Viewport,
};
use crate::memory::{DeviceBuffer, RingStageBuffer, UniformAllocation, UniformBuffer};
use crate::pipeline::{ShaderPipeline, ShaderPipelineDesc, ShaderPipelineKey};
use crate::render::{
    ExecutionStats, FrameExecutor, FrameResources, RenderCommand, RenderCommandQueue, RendererConfig,
};
use crate::resource::{
    Material, MaterialHandle, MaterialInstance, Mesh, MeshId, MeshRenderer, ModelInstance,
    PerspectiveCamera, Texture2D, TextureCubemap, WindowResizeEvent,
};
use crate::{engine_bail, engine_debug, engine_info, engine_trace, engine_warn};

// ============================================================================
// Public data types
// ============================================================================

/// Camera matrices captured by `begin_scene`, laid out for a std140 uniform block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneData {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    /// xyz = camera position, w = 1
    pub camera_position: Vec4,
}

impl Default for SceneData {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
            camera_position: Vec4::W,
        }
    }
}

/// Renderer statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendererStats {
    /// Draw calls replayed in the last scene
    pub draw_calls: u32,
    /// Commands replayed in the last scene
    pub commands: u32,
    /// Pipeline binds in the last scene
    pub pipeline_binds: u32,
    pub frames_presented: u64,
    /// Frames `begin_frame` skipped (out-of-date swapchain, minimized window)
    pub frames_skipped: u64,
    pub meshes_uploaded: u64,
    pub bytes_uploaded: u64,
}

/// What a uniform write addresses: a material's shared slot or one
/// instance's per-object slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformTarget {
    Material(MaterialHandle),
    Instance(MaterialInstance),
}

impl From<MaterialHandle> for UniformTarget {
    fn from(material: MaterialHandle) -> Self {
        UniformTarget::Material(material)
    }
}

impl From<MaterialInstance> for UniformTarget {
    fn from(instance: MaterialInstance) -> Self {
        UniformTarget::Instance(instance)
    }
}

// ============================================================================
// Renderer
// ============================================================================

pub struct Renderer {
    device: Box<dyn GraphicsDevice>,
    config: RendererConfig,
    ring: RingStageBuffer,
    device_buffer: DeviceBuffer,
    uniform_buffer: UniformBuffer,
    pipelines: SlotMap<ShaderPipelineKey, ShaderPipeline>,
    materials: SlotMap<MaterialHandle, Material>,
    queue: RenderCommandQueue,
    frame: Option<FrameInfo>,
    in_scene: bool,
    scene_data: SceneData,
    stats: RendererStats,
}

impl Renderer {
    /// Create the renderer and its three device buffers
    pub fn new(mut device: Box<dyn GraphicsDevice>, config: RendererConfig) -> Result<Self> {
        let mut ring = RingStageBuffer::new();
        ring.allocate(device.as_mut(), config.stage_buffer_size)?;
        let device_buffer = DeviceBuffer::new(device.as_mut(), config.device_buffer_size)?;
        let uniform_buffer = UniformBuffer::new(device.as_mut(), config.uniform_buffer_size)?;

        engine_info!("prism::Renderer", "Renderer created (stage {} B, device {} B, uniform {} B, {} images)",
            config.stage_buffer_size, config.device_buffer_size, config.uniform_buffer_size,
            device.swapchain_image_count());

        Ok(Self {
            device,
            config,
            ring,
            device_buffer,
            uniform_buffer,
            pipelines: SlotMap::with_key(),
            materials: SlotMap::with_key(),
            queue: RenderCommandQueue::with_capacity(256),
            frame: None,
            in_scene: false,
            scene_data: SceneData::default(),
            stats: RendererStats::default(),
        })
    }

    // ===== ACCESSORS =====

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn device(&self) -> &dyn GraphicsDevice {
        self.device.as_ref()
    }

    pub fn device_mut(&mut self) -> &mut dyn GraphicsDevice {
        self.device.as_mut()
    }

    pub fn pipeline(&self, key: ShaderPipelineKey) -> Option<&ShaderPipeline> {
        self.pipelines.get(key)
    }

    pub fn material(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(handle)
    }

    pub fn stage_buffer(&self) -> &RingStageBuffer {
        &self.ring
    }

    pub fn device_buffer(&self) -> &DeviceBuffer {
        &self.device_buffer
    }

    pub fn uniform_buffer(&self) -> &UniformBuffer {
        &self.uniform_buffer
    }

    /// Frame started by the last successful `new_frame`, if still open
    pub fn current_frame(&self) -> Option<FrameInfo> {
        self.frame
    }

    pub fn stats(&self) -> RendererStats {
        self.stats
    }

    pub fn scene_data(&self) -> &SceneData {
        &self.scene_data
    }

    // ===== SHADER PIPELINES =====

    pub fn create_shader_pipeline(&mut self, desc: ShaderPipelineDesc) -> Result<ShaderPipelineKey> {
        let pipeline = ShaderPipeline::new(self.device.as_mut(), desc)?;
        Ok(self.pipelines.insert(pipeline))
    }

    /// Destroy a pipeline that no material uses anymore
    pub fn destroy_shader_pipeline(&mut self, key: ShaderPipelineKey) -> Result<()> {
        if let Some(material) = self.materials.values().find(|m| m.pipeline() == key) {
            engine_bail!("prism::Renderer" => Error::InvalidState,
                "[Renderer] shader pipeline is still used by material '{}'", material.name());
        }
        let Some(pipeline) = self.pipelines.remove(key) else {
            engine_bail!("prism::Renderer" => Error::InvalidResource,
                "[Renderer] destroy_shader_pipeline: unknown shader pipeline");
        };
        self.device.wait_idle()?;
        pipeline.destroy(self.device.as_mut(), &mut self.uniform_buffer)
    }

    // ===== MATERIALS =====

    /// Create a material and attach it to `pipeline`
    pub fn create_material(&mut self, name: impl Into<String>, pipeline: ShaderPipelineKey) -> Result<MaterialHandle> {
        let name = name.into();
        let Some(shader_pipeline) = self.pipelines.get_mut(pipeline) else {
            engine_bail!("prism::Renderer" => Error::InvalidResource,
                "[Renderer] material '{}': unknown shader pipeline", name);
        };
        let handle = self.materials.insert_with_key(|handle| {
            let material_id = shader_pipeline.on_attach(handle);
            Material::new(name, pipeline, material_id)
        });
        engine_debug!("prism::Renderer", "material '{}' attached to '{}' as {}",
            self.materials[handle].name(), self.pipelines[pipeline].name(), self.materials[handle].material_id());
        Ok(handle)
    }

    /// Detach and drop a material; its ID becomes available to the next material
    pub fn destroy_material(&mut self, handle: MaterialHandle) -> Result<()> {
        let Some(material) = self.materials.remove(handle) else {
            engine_bail!("prism::Renderer" => Error::InvalidResource,
                "[Renderer] destroy_material: unknown material");
        };
        if let Some(pipeline) = self.pipelines.get_mut(material.pipeline()) {
            pipeline.on_detach(handle)?;
        }
        Ok(())
    }

    /// Reserve a per-object uniform slot of `material`
    ///
    /// Growing the material's instance capacity reallocates the pipeline's
    /// uniform storage before its next use. Values already written move with
    /// their material.
    pub fn create_material_instance(&mut self, material: MaterialHandle) -> Result<MaterialInstance> {
        let Some(entry) = self.materials.get_mut(material) else {
            engine_bail!("prism::Renderer" => Error::InvalidResource,
                "[Renderer] create_material_instance: unknown material");
        };
        let instance_id = entry.create_instance();
        let (key, material_id, capacity) = (entry.pipeline(), entry.material_id(), entry.instance_capacity());
        pipeline_mut(&mut self.pipelines, key)?.set_instance_capacity(material_id, capacity)?;
        Ok(MaterialInstance { material, instance_id })
    }

    pub fn destroy_material_instance(&mut self, instance: MaterialInstance) -> Result<()> {
        let Some(entry) = self.materials.get_mut(instance.material) else {
            engine_bail!("prism::Renderer" => Error::InvalidResource,
                "[Renderer] destroy_material_instance: unknown material");
        };
        entry.destroy_instance(instance.instance_id)?;
        let (key, material_id, capacity) = (entry.pipeline(), entry.material_id(), entry.instance_capacity());
        pipeline_mut(&mut self.pipelines, key)?.set_instance_capacity(material_id, capacity)
    }

    // ===== TEXTURES =====

    pub fn create_texture_2d(&mut self, texture: &Texture2D) -> Result<TextureHandle> {
        let (format, data) = texture.upload_data();
        self.device.create_texture(&texture.desc(format, &data))
    }

    pub fn create_cubemap(&mut self, cubemap: &TextureCubemap) -> Result<TextureHandle> {
        let (format, data) = cubemap.upload_data();
        self.device.create_texture(&cubemap.desc(format, &data))
    }

    pub fn destroy_texture(&mut self, texture: TextureHandle) -> Result<()> {
        self.device.destroy_texture(texture)
    }

    /// Append 2D textures to one of `pipeline`'s sampler bindings
    pub fn bind_textures_2d(
        &mut self,
        pipeline: ShaderPipelineKey,
        binding_name: &str,
        textures: &[TextureHandle],
    ) -> Result<Vec<u32>> {
        pipeline_mut(&mut self.pipelines, pipeline)?.bind_textures_2d(self.device.as_mut(), binding_name, textures)
    }

    pub fn bind_cubemaps(
        &mut self,
        pipeline: ShaderPipelineKey,
        binding_name: &str,
        cubemaps: &[TextureHandle],
    ) -> Result<Vec<u32>> {
        pipeline_mut(&mut self.pipelines, pipeline)?.bind_cubemaps(self.device.as_mut(), binding_name, cubemaps)
    }

    // ===== UNIFORMS =====

    /// Carve an application-owned slice out of the shared uniform buffer
    pub fn allocate_uniform_buffer(&mut self, size: u64) -> Result<UniformAllocation> {
        self.uniform_buffer.allocate(size)
    }

    pub fn free_uniform_buffer(&mut self, allocation: UniformAllocation) -> Result<()> {
        self.uniform_buffer.free(allocation)
    }

    /// Write into a slice returned by `allocate_uniform_buffer`
    pub fn write_uniform_buffer(&mut self, allocation: &UniformAllocation, offset: u64, data: &[u8]) -> Result<()> {
        self.uniform_buffer.write(self.device.as_mut(), allocation, offset, data)
    }

    /// Back a uniform binding of `pipeline` with an application-owned slice
    pub fn bind_uniform_buffer(
        &mut self,
        pipeline: ShaderPipelineKey,
        binding_name: &str,
        allocation: UniformAllocation,
    ) -> Result<()> {
        pipeline_mut(&mut self.pipelines, pipeline)?.bind_uniform_buffer(binding_name, allocation)
    }

    /// Write a whole uniform block
    ///
    /// Inside a frame only the current swapchain image's replica is written.
    /// Outside of one every replica is, after waiting for the frames still
    /// in flight to finish reading them.
    pub fn write_uniform(
        &mut self,
        target: impl Into<UniformTarget>,
        binding_name: &str,
        data: &[u8],
    ) -> Result<()> {
        self.write_uniform_data(target.into(), binding_name, None, data)
    }

    /// Write one member of a uniform block
    pub fn write_uniform_member(
        &mut self,
        target: impl Into<UniformTarget>,
        binding_name: &str,
        member_name: &str,
        data: &[u8],
    ) -> Result<()> {
        self.write_uniform_data(target.into(), binding_name, Some(member_name), data)
    }

    // ===== MESHES =====

    /// Copy a mesh into the staging ring
    ///
    /// Returns false when the mesh is already resident or already staged.
    /// An empty ring grows (doubling) to fit a larger mesh; with data pending
    /// an oversized mesh is rejected until `flush_staged_data` runs.
    pub fn stage_mesh(&mut self, mesh: &Mesh) -> Result<bool> {
        let id = mesh.id();
        if self.device_buffer.contains(id) || self.ring.pending().any(|info| info.resource_id == id) {
            engine_trace!("prism::Renderer", "mesh '{}' is already resident or staged", mesh.name());
            return Ok(false);
        }

        let size = mesh.byte_size();
        if size >= self.ring.free_space() {
            if !self.ring.is_empty() {
                engine_bail!("prism::Renderer" => Error::ResourceExhausted,
                    "[Renderer] mesh '{}' needs {} bytes but the stage buffer has {} free with {} bytes pending, flush first",
                    mesh.name(), size, self.ring.free_space(), self.ring.staged_bytes());
            }
            let mut capacity = self.ring.capacity().max(1);
            while capacity <= size {
                capacity *= 2;
            }
            self.ring.allocate(self.device.as_mut(), capacity)?;
        }

        self.ring.stage_mesh(self.device.as_mut(), mesh)?;
        Ok(true)
    }

    /// Upload everything staged to device memory on the transfer queue
    ///
    /// Blocks until the graphics queue owns the new ranges. Returns the number
    /// of meshes uploaded.
    pub fn flush_staged_data(&mut self) -> Result<u32> {
        if self.ring.is_empty() {
            return Ok(0);
        }
        let Some(staging) = self.ring.buffer() else {
            engine_bail!("prism::Renderer" => Error::InvalidState,
                "[Renderer] flush_staged_data: stage buffer was never allocated");
        };

        // Records leave the ring only once the transfer is submitted
        let cmd = self.device.begin_transfer()?;
        let mut records = Vec::new();
        let mut failure = None;
        for info in self.ring.pending() {
            match self.device_buffer.transfer_data(cmd, staging, info) {
                Ok(record) => records.push(record),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let barriers: Vec<BufferBarrier> = records.iter()
            .map(|record| BufferBarrier {
                buffer: record.allocation.buffer,
                offset: record.allocation.start_offset,
                size: record.allocation.size,
            })
            .collect();
        let submitted = match failure {
            Some(e) => Err(e),
            None => self.device.submit_transfer(&barriers),
        };
        if let Err(e) = submitted {
            self.device.abort_transfer();
            for record in &records {
                if let Err(release) = self.device_buffer.release(record.mesh_id) {
                    engine_warn!("prism::Renderer", "failed to roll back mesh {}: {}", record.mesh_id, release);
                }
            }
            engine_warn!("prism::Renderer", "flush aborted, {} meshes stay staged", self.ring.pending().count());
            return Err(e);
        }

        for _ in &records {
            self.ring.pop_metadata();
        }
        let count = records.len() as u32;
        let bytes: u64 = records.iter().map(|r| r.allocation.size).sum();
        self.stats.meshes_uploaded += count as u64;
        self.stats.bytes_uploaded += bytes;
        engine_debug!("prism::Renderer", "flushed {} meshes ({} bytes)", count, bytes);
        Ok(count)
    }

    /// Release a mesh's device memory once the GPU is done drawing from it
    pub fn unload_mesh(&mut self, mesh: MeshId) -> Result<()> {
        if !self.device_buffer.contains(mesh) {
            engine_bail!("prism::Renderer" => Error::InvalidResource,
                "[Renderer] unload_mesh: mesh {} is not resident", mesh);
        }
        self.device.wait_idle()?;
        self.device_buffer.release(mesh)
    }

    pub fn is_mesh_resident(&self, mesh: MeshId) -> bool {
        self.device_buffer.contains(mesh)
    }

    // ===== FRAMES =====

    /// Start a frame
    ///
    /// Pipelines whose material population changed get fresh uniform storage
    /// first (after the GPU goes idle). Returns false when the device skipped
    /// the frame; scenes recorded until the next `new_frame` are dropped.
    pub fn new_frame(&mut self) -> Result<bool> {
        if self.frame.is_some() {
            engine_bail!("prism::Renderer" => Error::InvalidState,
                "[Renderer] new_frame called before present_frame");
        }

        if self.pipelines.values().any(|p| p.needs_allocation()) {
            self.device.wait_idle()?;
            for pipeline in self.pipelines.values_mut().filter(|p| p.needs_allocation()) {
                pipeline.allocate_resources(self.device.as_mut(), &mut self.uniform_buffer)?;
            }
        }

        match self.device.begin_frame()? {
            FrameStatus::Ready(info) => {
                self.frame = Some(info);
                Ok(true)
            }
            FrameStatus::Skipped => {
                self.stats.frames_skipped += 1;
                engine_trace!("prism::Renderer", "frame skipped");
                Ok(false)
            }
        }
    }

    /// Capture the camera and start recording draw commands
    pub fn begin_scene(&mut self, camera: &PerspectiveCamera) -> Result<()> {
        if self.in_scene {
            engine_bail!("prism::Renderer" => Error::InvalidState,
                "[Renderer] begin_scene called twice without end_scene");
        }
        self.scene_data = SceneData {
            view: camera.view_matrix(),
            projection: camera.projection_matrix(),
            view_projection: camera.view_projection_matrix(),
            camera_position: camera.position().extend(1.0),
        };

        self.queue.clear();
        let (width, height) = self.device.swapchain_extent();
        self.queue.add_command(RenderCommand::SetViewport(Viewport::from_extent(width, height)));
        self.queue.add_command(RenderCommand::SetScissor(Rect2D::from_extent(width, height)));
        self.in_scene = true;
        Ok(())
    }

    /// Draw a mesh with its material's shared uniforms
    pub fn submit_mesh_renderer(&mut self, renderer: &MeshRenderer) -> Result<()> {
        self.require_scene("submit_mesh_renderer")?;
        if !self.materials.contains_key(renderer.material) {
            engine_bail!("prism::Renderer" => Error::InvalidResource,
                "[Renderer] submit_mesh_renderer: unknown material");
        }
        self.queue.add_command(RenderCommand::BindMaterial(renderer.material));
        self.queue.add_command(RenderCommand::BindMesh(renderer.mesh));
        self.queue.add_command(renderer.draw_command());
        Ok(())
    }

    /// Draw a mesh with its own per-object slot
    ///
    /// The transform is written to the per-object uniform member named by
    /// `RendererConfig::model_matrix_member`, when the pipeline has one.
    pub fn submit_model_instance(&mut self, model: &ModelInstance) -> Result<()> {
        self.require_scene("submit_model_instance")?;
        let (key, _, _) = self.resolve_target(UniformTarget::Instance(model.instance))?;

        let member = self.config.model_matrix_member.clone();
        let binding = pipeline_ref(&self.pipelines, key)?
            .uniform_bindings()
            .find(|b| b.per_object && b.member(&member).is_some())
            .map(|b| b.name.clone());
        if let Some(binding) = binding {
            self.write_uniform_member(model.instance, &binding, &member, bytemuck::bytes_of(&model.transform))?;
        }

        self.queue.add_command(RenderCommand::BindMaterialInstance(model.instance));
        self.queue.add_command(RenderCommand::BindMesh(model.mesh));
        self.queue.add_command(model.draw_command());
        Ok(())
    }

    /// Record a raw command into the current scene
    pub fn submit_command(&mut self, command: RenderCommand) -> Result<()> {
        self.require_scene("submit_command")?;
        self.queue.add_command(command);
        Ok(())
    }

    /// Replay the scene into the frame's command list
    pub fn end_scene(&mut self) -> Result<ExecutionStats> {
        self.require_scene("end_scene")?;
        self.in_scene = false;

        let Some(frame) = self.frame else {
            engine_trace!("prism::Renderer", "dropping {} commands of a skipped frame", self.queue.len());
            self.queue.clear();
            return Ok(ExecutionStats::default());
        };

        let cmd = self.device.frame_commands()?;
        let resources = FrameResources {
            pipelines: &self.pipelines,
            materials: &self.materials,
            device_buffer: &self.device_buffer,
            image_index: frame.image_index,
        };
        let result = FrameExecutor::new().execute(&resources, &mut self.queue, cmd);
        self.queue.clear();
        let stats = result?;

        self.stats.draw_calls = stats.draw_calls;
        self.stats.commands = stats.commands;
        self.stats.pipeline_binds = stats.pipeline_binds;
        Ok(stats)
    }

    /// Submit and present the current frame
    pub fn present_frame(&mut self) -> Result<()> {
        if self.in_scene {
            engine_bail!("prism::Renderer" => Error::InvalidState,
                "[Renderer] present_frame called inside a scene, end_scene first");
        }
        if self.frame.take().is_none() {
            return Ok(());
        }
        self.device.end_frame()?;
        self.stats.frames_presented += 1;
        Ok(())
    }

    /// Forward a window size change; a zero size pauses frames until the next resize
    pub fn on_window_resize(&mut self, event: WindowResizeEvent) -> Result<()> {
        if event.is_minimized() {
            engine_debug!("prism::Renderer", "window minimized, frames are skipped until it is restored");
        }
        self.device.resize(event.width, event.height)
    }

    /// Wait for the GPU and release every object the renderer created
    pub fn destroy(self) -> Result<()> {
        let Renderer { mut device, mut ring, device_buffer, mut uniform_buffer, pipelines, .. } = self;
        device.wait_idle()?;
        for (_, pipeline) in pipelines {
            pipeline.destroy(device.as_mut(), &mut uniform_buffer)?;
        }
        ring.destroy(device.as_mut())?;
        device_buffer.destroy(device.as_mut())?;
        uniform_buffer.destroy(device.as_mut())
    }

    // ===== INTERNAL =====

    fn require_scene(&self, operation: &str) -> Result<()> {
        if !self.in_scene {
            engine_bail!("prism::Renderer" => Error::InvalidState,
                "[Renderer] {} outside of begin_scene/end_scene", operation);
        }
        Ok(())
    }

    /// Pipeline, material ID and object slot addressed by `target`
    fn resolve_target(&self, target: UniformTarget) -> Result<(ShaderPipelineKey, u32, Option<u32>)> {
        let (handle, object) = match target {
            UniformTarget::Material(handle) => (handle, None),
            UniformTarget::Instance(instance) => (instance.material, Some(instance.instance_id)),
        };
        let Some(material) = self.materials.get(handle) else {
            engine_bail!("prism::Renderer" => Error::InvalidResource, "[Renderer] unknown material");
        };
        if let Some(instance_id) = object {
            if !material.has_instance(instance_id) {
                engine_bail!("prism::Renderer" => Error::InvalidResource,
                    "[Renderer] material '{}' has no instance {}", material.name(), instance_id);
            }
        }
        Ok((material.pipeline(), material.material_id(), object))
    }

    fn write_uniform_data(
        &mut self,
        target: UniformTarget,
        binding_name: &str,
        member_name: Option<&str>,
        data: &[u8],
    ) -> Result<()> {
        let (key, material_id, object) = self.resolve_target(target)?;

        let pipeline = pipeline_mut(&mut self.pipelines, key)?;
        if pipeline.needs_allocation() {
            self.device.wait_idle()?;
            pipeline.allocate_resources(self.device.as_mut(), &mut self.uniform_buffer)?;
        }

        let image = self.frame.map(|f| f.image_index);
        if image.is_none() {
            self.device.wait_idle()?;
        }
        match member_name {
            None => pipeline.write_uniform(
                self.device.as_mut(), &self.uniform_buffer, image, binding_name, material_id, object, data,
            ),
            Some(member) => pipeline.write_uniform_member(
                self.device.as_mut(), &self.uniform_buffer, image, binding_name, member, material_id, object, data,
            ),
        }
    }
}

fn pipeline_ref(
    pipelines: &SlotMap<ShaderPipelineKey, ShaderPipeline>,
    key: ShaderPipelineKey,
) -> Result<&ShaderPipeline> {
    match pipelines.get(key) {
        Some(pipeline) => Ok(pipeline),
        None => engine_bail!("prism::Renderer" => Error::InvalidResource,
            "[Renderer] shader pipeline was destroyed"),
    }
}

fn pipeline_mut(
    pipelines: &mut SlotMap<ShaderPipelineKey, ShaderPipeline>,
    key: ShaderPipelineKey,
) -> Result<&mut ShaderPipeline> {
    match pipelines.get_mut(key) {
        Some(pipeline) => Ok(pipeline),
        None => engine_bail!("prism::Renderer" => Error::InvalidResource,
            "[Renderer] shader pipeline was destroyed"),
    }
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
