// Vulkan implementation of the frame backend
//
// Scene pass: clear the offscreen color and depth targets.
// Post pass: blit scene color into the acquired swapchain image.
// Every image starts the frame in UNDEFINED; no contents are carried across frames.

use ash::vk;
use std::sync::Arc;
use std::time::Duration;

use super::attachment::Attachment;
use super::commands::CommandContext;
use super::surface::PresentSurface;
use super::swapchain::{color_subresource_range, Swapchain};
use super::sync::{Fence, Semaphore};
use super::VulkanDevice;
use crate::error::{FrameError, FrameResult};
use crate::frame::{
    AcquireOutcome, AttachmentKind, FenceWait, FrameBackend, FrameTarget, PresentOutcome,
};

/// Image + view pair the frame records against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBinding {
    pub image: vk::Image,
    pub view: vk::ImageView,
}

pub struct VulkanBackend {
    // Dropped before the device: the surface needs the instance
    surface: PresentSurface,
    device: Arc<VulkanDevice>,
    present_mode: vk::PresentModeKHR,
    clear_color: [f32; 4],
}

impl VulkanBackend {
    pub fn new(
        device: Arc<VulkanDevice>,
        surface: PresentSurface,
        present_mode: vk::PresentModeKHR,
        clear_color: [f32; 4],
    ) -> Self {
        Self {
            surface,
            device,
            present_mode,
            clear_color,
        }
    }

    fn barrier(
        &self,
        cmd: vk::CommandBuffer,
        image: vk::Image,
        aspect_mask: vk::ImageAspectFlags,
        (old_layout, new_layout): (vk::ImageLayout, vk::ImageLayout),
        (src_access, dst_access): (vk::AccessFlags, vk::AccessFlags),
        (src_stage, dst_stage): (vk::PipelineStageFlags, vk::PipelineStageFlags),
    ) {
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                ..color_subresource_range()
            });

        unsafe {
            self.device.device.cmd_pipeline_barrier(
                cmd,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                std::slice::from_ref(&barrier),
            );
        }
    }

    fn bound(&self, target: &FrameTarget<'_, Self>, kind: AttachmentKind) -> FrameResult<ImageBinding> {
        target
            .bindings
            .get(kind)
            .ok_or_else(|| FrameError::InvalidState(format!("{kind:?} attachment is not bound")))
    }
}

/// Source scope of the first barrier on an attachment each frame.
///
/// Attachments are shared by every frame slot and the previous frame's
/// submission may still be using them: its last access to scene color is the
/// blit read, to depth the clear write. Both happen in the transfer stage.
fn attachment_entry_scope(kind: AttachmentKind) -> (vk::AccessFlags, vk::PipelineStageFlags) {
    match kind {
        AttachmentKind::SceneColor => (vk::AccessFlags::TRANSFER_READ, vk::PipelineStageFlags::TRANSFER),
        AttachmentKind::Depth => (vk::AccessFlags::TRANSFER_WRITE, vk::PipelineStageFlags::TRANSFER),
    }
}

impl FrameBackend for VulkanBackend {
    type Fence = Fence;
    type Semaphore = Semaphore;
    type Commands = CommandContext;
    type Swapchain = Swapchain;
    type Attachment = Attachment;
    type Binding = ImageBinding;

    fn create_fence(&self, signaled: bool) -> FrameResult<Fence> {
        Fence::new(Arc::clone(&self.device), signaled)
    }

    fn create_semaphore(&self) -> FrameResult<Semaphore> {
        Semaphore::new(Arc::clone(&self.device))
    }

    fn create_commands(&self) -> FrameResult<CommandContext> {
        CommandContext::new(Arc::clone(&self.device))
    }

    fn wait_fence(&self, fence: &Fence, timeout: Option<Duration>) -> FrameResult<FenceWait> {
        fence.wait(timeout)
    }

    fn reset_fence(&self, fence: &Fence) -> FrameResult<()> {
        fence.reset()
    }

    fn begin_commands(&self, commands: &mut CommandContext) -> FrameResult<()> {
        commands.begin()
    }

    fn end_commands(&self, commands: &mut CommandContext) -> FrameResult<()> {
        commands.end()
    }

    fn create_swapchain(&self, extent: vk::Extent2D) -> FrameResult<Swapchain> {
        Swapchain::new(Arc::clone(&self.device), &self.surface, self.present_mode, extent)
    }

    fn swapchain_image_count(&self, swapchain: &Swapchain) -> usize {
        swapchain.image_count()
    }

    fn swapchain_extent(&self, swapchain: &Swapchain) -> vk::Extent2D {
        swapchain.extent
    }

    fn create_attachment(&self, kind: AttachmentKind, extent: vk::Extent2D) -> FrameResult<Attachment> {
        Attachment::new(Arc::clone(&self.device), kind, extent)
    }

    fn attachment_binding(&self, attachment: &Attachment) -> ImageBinding {
        ImageBinding {
            image: attachment.image,
            view: attachment.view,
        }
    }

    fn acquire_next_image(&self, swapchain: &Swapchain, signal: &Semaphore) -> FrameResult<AcquireOutcome> {
        swapchain.acquire_next_image(signal.semaphore)
    }

    fn record_frame(&self, commands: &mut CommandContext, target: &FrameTarget<'_, Self>) -> FrameResult<()> {
        let cmd = commands.buffer;
        let device = &self.device.device;
        let extent = target.viewport.extent;

        let scene = self.bound(target, AttachmentKind::SceneColor)?;
        let depth = self.bound(target, AttachmentKind::Depth)?;
        let present_image = *target
            .swapchain
            .images
            .get(target.image_index as usize)
            .ok_or_else(|| {
                FrameError::InvalidState(format!("image index {} out of range", target.image_index))
            })?;

        unsafe {
            device.cmd_set_viewport(cmd, 0, &[target.viewport.vk_viewport()]);
            device.cmd_set_scissor(cmd, 0, &[target.viewport.scissor()]);
        }

        log::trace!(
            "Recording frame {} (slot {}, image {})",
            target.frame_number,
            target.frame_index,
            target.image_index
        );

        // ─── SCENE ───────────────────────────────────────────────
        let (scene_src_access, scene_src_stage) = attachment_entry_scope(AttachmentKind::SceneColor);
        self.barrier(
            cmd,
            scene.image,
            vk::ImageAspectFlags::COLOR,
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            (scene_src_access, vk::AccessFlags::TRANSFER_WRITE),
            (scene_src_stage, vk::PipelineStageFlags::TRANSFER),
        );
        let (depth_src_access, depth_src_stage) = attachment_entry_scope(AttachmentKind::Depth);
        self.barrier(
            cmd,
            depth.image,
            vk::ImageAspectFlags::DEPTH,
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            (depth_src_access, vk::AccessFlags::TRANSFER_WRITE),
            (depth_src_stage, vk::PipelineStageFlags::TRANSFER),
        );

        let clear_color = vk::ClearColorValue {
            float32: self.clear_color,
        };
        let clear_depth = vk::ClearDepthStencilValue {
            depth: 1.0,
            stencil: 0,
        };
        unsafe {
            device.cmd_clear_color_image(
                cmd,
                scene.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &clear_color,
                &[color_subresource_range()],
            );
            device.cmd_clear_depth_stencil_image(
                cmd,
                depth.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &clear_depth,
                &[vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::DEPTH,
                    ..color_subresource_range()
                }],
            );
        }

        // ─── POST: scene color -> swapchain ──────────────────────
        self.barrier(
            cmd,
            scene.image,
            vk::ImageAspectFlags::COLOR,
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL),
            (vk::AccessFlags::TRANSFER_WRITE, vk::AccessFlags::TRANSFER_READ),
            (vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::TRANSFER),
        );
        // Acquire semaphore is waited at COLOR_ATTACHMENT_OUTPUT, so the
        // transition must not start before that stage
        self.barrier(
            cmd,
            present_image,
            vk::ImageAspectFlags::COLOR,
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            (vk::AccessFlags::empty(), vk::AccessFlags::TRANSFER_WRITE),
            (
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::PipelineStageFlags::TRANSFER,
            ),
        );

        let corner = vk::Offset3D {
            x: extent.width as i32,
            y: extent.height as i32,
            z: 1,
        };
        let layers = vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        };
        let blit = vk::ImageBlit {
            src_subresource: layers,
            src_offsets: [vk::Offset3D::default(), corner],
            dst_subresource: layers,
            dst_offsets: [vk::Offset3D::default(), corner],
        };
        unsafe {
            device.cmd_blit_image(
                cmd,
                scene.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                present_image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[blit],
                vk::Filter::NEAREST,
            );
        }

        self.barrier(
            cmd,
            present_image,
            vk::ImageAspectFlags::COLOR,
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::PRESENT_SRC_KHR),
            (vk::AccessFlags::TRANSFER_WRITE, vk::AccessFlags::empty()),
            (vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::BOTTOM_OF_PIPE),
        );

        Ok(())
    }

    fn submit(
        &self,
        commands: &CommandContext,
        wait: &Semaphore,
        signal: &Semaphore,
        fence: &Fence,
    ) -> FrameResult<()> {
        let wait_semaphores = [wait.semaphore];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [commands.buffer];
        let signal_semaphores = [signal.semaphore];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.device.queue_submit(
                self.device.graphics_queue,
                std::slice::from_ref(&submit_info),
                fence.fence,
            )
        }?;
        Ok(())
    }

    fn present(&self, swapchain: &Swapchain, image_index: u32, wait: &Semaphore) -> FrameResult<PresentOutcome> {
        swapchain.present(self.device.graphics_queue, image_index, wait.semaphore)
    }

    fn wait_idle(&self) -> FrameResult<()> {
        self.device.wait_idle()?;
        Ok(())
    }
}
