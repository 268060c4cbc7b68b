/// Transfer queue upload path
///
/// Copies recorded between `begin` and `submit` run on the transfer queue.
/// When the GPU has a dedicated transfer family, each uploaded range is
/// released by the transfer queue and acquired by the graphics queue, the two
/// submissions chained by a semaphore. On a single family a plain memory
/// barrier makes the copies visible to vertex input. Either way the submit
/// waits for the queues to finish, so uploads are complete when it returns.

use ash::vk;
use prism_engine::prism::{Error, Result};
use prism_engine::{engine_bail, engine_err, engine_trace, engine_warn};

use crate::vulkan_command_list::CommandList;
use crate::vulkan_context::{QueueFamilies, SharedResources};

/// A buffer range handed from the transfer queue to the graphics queue
#[derive(Debug, Clone, Copy)]
pub(crate) struct OwnershipTransfer {
    pub buffer: vk::Buffer,
    pub offset: u64,
    pub size: u64,
}

/// Queues the upload path submits to
pub(crate) struct TransferQueues {
    pub families: QueueFamilies,
    pub transfer: vk::Queue,
    pub graphics: vk::Queue,
}

struct AcquireHalf {
    commands: CommandList,
    semaphore: vk::Semaphore,
}

pub(crate) struct TransferContext {
    commands: CommandList,
    /// Only present with a dedicated transfer family
    acquire: Option<AcquireHalf>,
}

/// Access of the consumers of uploaded geometry
fn geometry_read() -> vk::AccessFlags {
    vk::AccessFlags::VERTEX_ATTRIBUTE_READ | vk::AccessFlags::INDEX_READ
}

impl TransferContext {
    pub fn new(device: &ash::Device, families: QueueFamilies, resources: SharedResources) -> Result<Self> {
        let commands = CommandList::new(device.clone(), families.transfer, resources.clone())?;
        if !families.has_dedicated_transfer() {
            return Ok(Self { commands, acquire: None });
        }

        let acquire_commands = match CommandList::new(device.clone(), families.graphics, resources) {
            Ok(list) => list,
            Err(e) => {
                unsafe { commands.destroy() };
                return Err(e);
            }
        };
        let semaphore = unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) };
        match semaphore {
            Ok(semaphore) => Ok(Self {
                commands,
                acquire: Some(AcquireHalf { commands: acquire_commands, semaphore }),
            }),
            Err(e) => {
                unsafe {
                    acquire_commands.destroy();
                    commands.destroy();
                }
                Err(engine_err!("prism::vulkan", "Failed to create transfer semaphore: {:?}", e))
            }
        }
    }

    /// Start recording copies
    pub fn begin(&mut self) -> Result<&mut CommandList> {
        if self.commands.is_recording() {
            engine_bail!("prism::vulkan" => Error::InvalidState,
                "begin_transfer called while a transfer is already being recorded");
        }
        self.commands.begin()?;
        Ok(&mut self.commands)
    }

    /// Drop a recording that will never be submitted, so `begin` works again
    pub fn abort(&mut self) {
        let acquire = self.acquire.as_mut().map(|a| &mut a.commands);
        for commands in std::iter::once(&mut self.commands).chain(acquire) {
            if !commands.is_recording() {
                continue;
            }
            if let Err(e) = commands.end() {
                engine_warn!("prism::vulkan", "Failed to end aborted transfer: {}", e);
                commands.discard();
            }
        }
    }

    /// End recording, submit, hand `transfers` over to the graphics queue and wait
    pub fn submit(&mut self, device: &ash::Device, queues: &TransferQueues, transfers: &[OwnershipTransfer]) -> Result<()> {
        if !self.commands.is_recording() {
            engine_bail!("prism::vulkan" => Error::InvalidState,
                "submit_transfer called without begin_transfer");
        }

        match &mut self.acquire {
            Some(acquire) if !transfers.is_empty() => {
                let families = queues.families;
                let release: Vec<vk::BufferMemoryBarrier> = transfers
                    .iter()
                    .map(|t| ownership_barrier(t, families.transfer, families.graphics)
                        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                        .dst_access_mask(vk::AccessFlags::empty()))
                    .collect();
                self.commands.buffer_barriers(
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                    &release,
                )?;
                self.commands.end()?;

                acquire.commands.begin()?;
                let acquire_barriers: Vec<vk::BufferMemoryBarrier> = transfers
                    .iter()
                    .map(|t| ownership_barrier(t, families.transfer, families.graphics)
                        .src_access_mask(vk::AccessFlags::empty())
                        .dst_access_mask(geometry_read()))
                    .collect();
                acquire.commands.buffer_barriers(
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::VERTEX_INPUT,
                    &acquire_barriers,
                )?;
                acquire.commands.end()?;

                unsafe {
                    let transfer_buffers = [self.commands.command_buffer()];
                    let signal = [acquire.semaphore];
                    let transfer_submit = vk::SubmitInfo::default()
                        .command_buffers(&transfer_buffers)
                        .signal_semaphores(&signal);
                    device.queue_submit(queues.transfer, &[transfer_submit], vk::Fence::null())
                        .map_err(|e| engine_err!("prism::vulkan", "Failed to submit transfer: {:?}", e))?;

                    let acquire_buffers = [acquire.commands.command_buffer()];
                    let wait_stages = [vk::PipelineStageFlags::VERTEX_INPUT];
                    let acquire_submit = vk::SubmitInfo::default()
                        .wait_semaphores(&signal)
                        .wait_dst_stage_mask(&wait_stages)
                        .command_buffers(&acquire_buffers);
                    device.queue_submit(queues.graphics, &[acquire_submit], vk::Fence::null())
                        .map_err(|e| engine_err!("prism::vulkan", "Failed to submit ownership acquire: {:?}", e))?;

                    device.queue_wait_idle(queues.graphics)
                        .map_err(|e| engine_err!("prism::vulkan", "Failed to wait for graphics queue: {:?}", e))?;
                }
            }
            _ => {
                if !transfers.is_empty() {
                    let barriers: Vec<vk::BufferMemoryBarrier> = transfers
                        .iter()
                        .map(|t| ownership_barrier(t, vk::QUEUE_FAMILY_IGNORED, vk::QUEUE_FAMILY_IGNORED)
                            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                            .dst_access_mask(geometry_read()))
                        .collect();
                    self.commands.buffer_barriers(
                        vk::PipelineStageFlags::TRANSFER,
                        vk::PipelineStageFlags::VERTEX_INPUT,
                        &barriers,
                    )?;
                }
                self.commands.end()?;

                unsafe {
                    let buffers = [self.commands.command_buffer()];
                    let submit = vk::SubmitInfo::default().command_buffers(&buffers);
                    device.queue_submit(queues.transfer, &[submit], vk::Fence::null())
                        .map_err(|e| engine_err!("prism::vulkan", "Failed to submit transfer: {:?}", e))?;
                    device.queue_wait_idle(queues.transfer)
                        .map_err(|e| engine_err!("prism::vulkan", "Failed to wait for transfer queue: {:?}", e))?;
                }
            }
        }

        engine_trace!("prism::vulkan", "Transfer submitted ({} ownership range(s))", transfers.len());
        Ok(())
    }

    /// # Safety
    ///
    /// No transfer may be pending.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        if let Some(acquire) = &self.acquire {
            device.destroy_semaphore(acquire.semaphore, None);
            acquire.commands.destroy();
        }
        self.commands.destroy();
    }
}

fn ownership_barrier(transfer: &OwnershipTransfer, src_family: u32, dst_family: u32) -> vk::BufferMemoryBarrier<'static> {
    vk::BufferMemoryBarrier::default()
        .src_queue_family_index(src_family)
        .dst_queue_family_index(dst_family)
        .buffer(transfer.buffer)
        .offset(transfer.offset)
        .size(if transfer.size == 0 { vk::WHOLE_SIZE } else { transfer.size })
}
