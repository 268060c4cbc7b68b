/// Per frame-in-flight synchronization and command recording

use ash::vk;
use prism_engine::prism::Result;
use prism_engine::engine_err;

use crate::vulkan_command_list::CommandList;
use crate::vulkan_context::SharedResources;

/// Resources of one frame in flight
pub(crate) struct FrameSync {
    pub commands: CommandList,
    /// Signaled when the acquired swapchain image is ready to be rendered to
    pub image_available: vk::Semaphore,
    /// Signaled when this frame's submission completes; created signaled
    pub in_flight: vk::Fence,
}

impl FrameSync {
    pub fn new(device: &ash::Device, graphics_family: u32, resources: SharedResources) -> Result<Self> {
        let commands = CommandList::new(device.clone(), graphics_family, resources)?;
        unsafe {
            let image_available = match device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) {
                Ok(semaphore) => semaphore,
                Err(e) => {
                    commands.destroy();
                    return Err(engine_err!("prism::vulkan", "Failed to create image-available semaphore: {:?}", e));
                }
            };
            let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
            let in_flight = match device.create_fence(&fence_info, None) {
                Ok(fence) => fence,
                Err(e) => {
                    device.destroy_semaphore(image_available, None);
                    commands.destroy();
                    return Err(engine_err!("prism::vulkan", "Failed to create in-flight fence: {:?}", e));
                }
            };
            Ok(Self { commands, image_available, in_flight })
        }
    }

    /// # Safety
    ///
    /// The frame's submission must have completed.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_fence(self.in_flight, None);
        device.destroy_semaphore(self.image_available, None);
        self.commands.destroy();
    }
}
