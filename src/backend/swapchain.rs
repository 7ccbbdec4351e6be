// Swapchain - Window presentation
//
// Owns the presentable images and their views. Rebuilt wholesale on resize,
// never patched in place.

use ash::vk;
use std::sync::Arc;

use super::surface::PresentSurface;
use super::VulkanDevice;
use crate::error::{FrameError, FrameResult};
use crate::frame::{AcquireOutcome, PresentOutcome};

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub loader: ash::khr::swapchain::Device,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    device: Arc<VulkanDevice>,
}

impl Swapchain {
    pub fn new(
        device: Arc<VulkanDevice>,
        surface: &PresentSurface,
        desired_present_mode: vk::PresentModeKHR,
        drawable: vk::Extent2D,
    ) -> FrameResult<Self> {
        let surface_caps = surface.capabilities(device.physical_device)?;
        let formats = surface.formats(device.physical_device)?;
        let present_modes = surface.present_modes(device.physical_device)?;

        // Choose surface format (prefer SRGB)
        let surface_format = formats
            .iter()
            .find(|f| {
                f.format == vk::Format::B8G8R8A8_SRGB
                    && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
            .or_else(|| formats.first())
            .copied()
            .ok_or_else(|| FrameError::InvalidState("surface reports no formats".to_string()))?;

        // FIFO is always supported
        let present_mode = if present_modes.contains(&desired_present_mode) {
            desired_present_mode
        } else {
            log::warn!(
                "Present mode {:?} not supported, falling back to FIFO",
                desired_present_mode
            );
            vk::PresentModeKHR::FIFO
        };

        let extent = choose_extent(&surface_caps, drawable);

        let mut image_count = surface_caps.min_image_count + 1;
        if surface_caps.max_image_count > 0 && image_count > surface_caps.max_image_count {
            image_count = surface_caps.max_image_count;
        }

        let loader = ash::khr::swapchain::Device::new(&device.instance, &device.device);

        // A zero extent (minimized on platforms that report currentExtent)
        // cannot back a swapchain. Return an empty one and let the caller skip.
        if extent.width == 0 || extent.height == 0 {
            log::debug!("Surface extent is zero, no swapchain created");
            return Ok(Self {
                swapchain: vk::SwapchainKHR::null(),
                loader,
                images: Vec::new(),
                image_views: Vec::new(),
                format: surface_format.format,
                extent,
                device,
            });
        }

        log::info!(
            "Creating swapchain: {}x{}, {:?}",
            extent.width,
            extent.height,
            present_mode
        );

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }?;

        // From here on `Self` owns the handles, so an early return cleans up
        let mut this = Self {
            swapchain,
            loader,
            images: Vec::new(),
            image_views: Vec::new(),
            format: surface_format.format,
            extent,
            device,
        };

        this.images = unsafe { this.loader.get_swapchain_images(swapchain) }?;
        for &image in &this.images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(this.format)
                .subresource_range(color_subresource_range());
            let view = unsafe { this.device.device.create_image_view(&view_info, None) }?;
            this.image_views.push(view);
        }

        log::info!("Created swapchain with {} images", this.images.len());

        Ok(this)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Blocks until an image is available. The semaphore is signaled only
    /// when an image is actually handed out.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> FrameResult<AcquireOutcome> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        };

        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> FrameResult<PresentOutcome> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.loader.queue_present(queue, &present_info) };

        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::NeedsRecreate),
            Err(vk::Result::ERROR_DEVICE_LOST) => Err(FrameError::DeviceLost),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::NeedsRecreate),
            Err(e) => {
                // Surface lost and friends: a fresh swapchain is the only remedy
                log::warn!("Present failed with {:?}, scheduling swapchain recreation", e);
                Ok(PresentOutcome::NeedsRecreate)
            }
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.device.destroy_image_view(view, None);
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.swapchain, None);
            }
        }
    }
}

/// `currentExtent` wins when the platform reports one, otherwise the drawable
/// size clamped to what the surface allows.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, drawable: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: drawable
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: drawable
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

pub fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}
