// Backend module - Vulkan abstraction layer
//
// Thin RAII wrappers around ash plus the `FrameBackend` implementation the
// frame orchestrator drives.

pub mod attachment;
pub mod commands;
pub mod device;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod vulkan;

pub use device::VulkanDevice;
pub use surface::PresentSurface;
pub use vulkan::VulkanBackend;
