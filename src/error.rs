// Frame-path errors
//
// Initialization still uses anyhow (any failure there aborts the program).
// Everything that can go wrong while frames are being produced is typed here
// so the render loop can tell device loss from a stuck fence.

use ash::vk;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    /// Any Vulkan call failure that is not device loss.
    #[error("Vulkan error: {0}")]
    Vulkan(vk::Result),

    #[error("GPU device lost")]
    DeviceLost,

    /// The fence of a frame slot did not signal within the configured timeout.
    #[error("Fence of frame slot {slot} not signaled after {timeout:?}")]
    FenceTimeout { slot: usize, timeout: Duration },

    #[error("Memory allocation failed: {0}")]
    Allocation(String),

    #[error("Invalid frame state: {0}")]
    InvalidState(String),
}

impl From<vk::Result> for FrameError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_DEVICE_LOST => FrameError::DeviceLost,
            other => FrameError::Vulkan(other),
        }
    }
}

impl From<gpu_allocator::AllocationError> for FrameError {
    fn from(err: gpu_allocator::AllocationError) -> Self {
        FrameError::Allocation(err.to_string())
    }
}

pub type FrameResult<T> = std::result::Result<T, FrameError>;
