// Window-sized render targets
//
// Offscreen scene color and depth. Both live in device-local memory from
// gpu-allocator and are rebuilt with the swapchain on resize.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use super::VulkanDevice;
use crate::error::{FrameError, FrameResult};
use crate::frame::AttachmentKind;

pub const SCENE_COLOR_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Format, usage and aspect of each attachment kind.
pub fn attachment_desc(kind: AttachmentKind) -> (vk::Format, vk::ImageUsageFlags, vk::ImageAspectFlags) {
    match kind {
        AttachmentKind::SceneColor => (
            SCENE_COLOR_FORMAT,
            vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST,
            vk::ImageAspectFlags::COLOR,
        ),
        AttachmentKind::Depth => (
            DEPTH_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
            vk::ImageAspectFlags::DEPTH,
        ),
    }
}

pub struct Attachment {
    pub kind: AttachmentKind,
    pub image: vk::Image,
    pub view: vk::ImageView,
    allocation: Option<Allocation>,
    device: Arc<VulkanDevice>,
}

impl Attachment {
    pub fn new(device: Arc<VulkanDevice>, kind: AttachmentKind, extent: vk::Extent2D) -> FrameResult<Self> {
        if extent.width == 0 || extent.height == 0 {
            return Err(FrameError::InvalidState(format!(
                "{kind:?} attachment with zero extent {}x{}",
                extent.width, extent.height
            )));
        }

        let (format, usage, aspect_mask) = attachment_desc(kind);

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = unsafe { device.device.create_image(&image_info, None) }?;

        // Owned from here, so every early return below releases what exists
        let mut this = Self {
            kind,
            image,
            view: vk::ImageView::null(),
            allocation: None,
            device,
        };

        let requirements = unsafe { this.device.device.get_image_memory_requirements(image) };

        let allocation = {
            let mut guard = this.device.allocator.lock();
            let allocator = guard
                .as_mut()
                .ok_or_else(|| FrameError::Allocation("allocator already destroyed".to_string()))?;
            allocator.allocate(&AllocationCreateDesc {
                name: match kind {
                    AttachmentKind::SceneColor => "scene color",
                    AttachmentKind::Depth => "depth",
                },
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?
        };

        let (memory, offset) = unsafe { (allocation.memory(), allocation.offset()) };
        this.allocation = Some(allocation);

        unsafe { this.device.device.bind_image_memory(image, memory, offset) }?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        this.view = unsafe { this.device.device.create_image_view(&view_info, None) }?;

        log::debug!("Created {:?} attachment {}x{}", kind, extent.width, extent.height);

        Ok(this)
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.device.destroy_image_view(self.view, None);
            }
            self.device.device.destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            if let Some(allocator) = self.device.allocator.lock().as_mut() {
                if let Err(e) = allocator.free(allocation) {
                    log::error!("Failed to free {:?} attachment memory: {}", self.kind, e);
                }
            }
        }
    }
}
