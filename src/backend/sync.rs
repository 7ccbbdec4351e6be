// Synchronization primitives
//
// Fences for GPU-CPU sync, binary semaphores for GPU-GPU sync.
// Each wrapper destroys its handle on drop.

use ash::vk;
use std::sync::Arc;
use std::time::Duration;

use super::VulkanDevice;
use crate::error::FrameResult;
use crate::frame::FenceWait;

pub struct Fence {
    pub fence: vk::Fence,
    device: Arc<VulkanDevice>,
}

impl Fence {
    pub fn new(device: Arc<VulkanDevice>, signaled: bool) -> FrameResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let fence_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { device.device.create_fence(&fence_info, None) }?;
        Ok(Self { fence, device })
    }

    pub fn wait(&self, timeout: Option<Duration>) -> FrameResult<FenceWait> {
        let timeout_ns = timeout
            .map(|t| u64::try_from(t.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(u64::MAX);

        let result = unsafe {
            self.device
                .device
                .wait_for_fences(std::slice::from_ref(&self.fence), true, timeout_ns)
        };

        match result {
            Ok(()) => Ok(FenceWait::Signaled),
            Err(vk::Result::TIMEOUT) => Ok(FenceWait::TimedOut),
            Err(e) => Err(e.into()),
        }
    }

    pub fn reset(&self) -> FrameResult<()> {
        unsafe {
            self.device
                .device
                .reset_fences(std::slice::from_ref(&self.fence))
        }?;
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_fence(self.fence, None);
        }
    }
}

pub struct Semaphore {
    pub semaphore: vk::Semaphore,
    device: Arc<VulkanDevice>,
}

impl Semaphore {
    pub fn new(device: Arc<VulkanDevice>) -> FrameResult<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { device.device.create_semaphore(&semaphore_info, None) }?;
        Ok(Self { semaphore, device })
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_semaphore(self.semaphore, None);
        }
    }
}
