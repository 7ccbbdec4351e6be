// Per-slot command recording
//
// One pool per frame slot, one primary buffer per pool. The whole pool is
// reset at frame start, which is only legal once the slot fence signaled.

use ash::vk;
use std::sync::Arc;

use super::VulkanDevice;
use crate::error::FrameResult;

pub struct CommandContext {
    pub pool: vk::CommandPool,
    pub buffer: vk::CommandBuffer,
    device: Arc<VulkanDevice>,
}

impl CommandContext {
    pub fn new(device: Arc<VulkanDevice>) -> FrameResult<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(device.graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let pool = unsafe { device.device.create_command_pool(&pool_info, None) }?;

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = match unsafe { device.device.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) => buffers,
            Err(e) => {
                unsafe { device.device.destroy_command_pool(pool, None) };
                return Err(e.into());
            }
        };

        Ok(Self {
            pool,
            buffer: buffers[0],
            device,
        })
    }

    pub fn begin(&mut self) -> FrameResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .device
                .reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty())?;
            self.device
                .device
                .begin_command_buffer(self.buffer, &begin_info)?;
        }
        Ok(())
    }

    pub fn end(&mut self) -> FrameResult<()> {
        unsafe { self.device.device.end_command_buffer(self.buffer) }?;
        Ok(())
    }
}

impl Drop for CommandContext {
    fn drop(&mut self) {
        // Frees the buffer with it
        unsafe {
            self.device.device.destroy_command_pool(self.pool, None);
        }
    }
}
