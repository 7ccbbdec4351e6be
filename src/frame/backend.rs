// GPU collaborator seen by the frame orchestrator
//
// The orchestrator never touches ash directly. Everything it needs from the
// device, swapchain and queues goes through this trait, so the same frame
// protocol drives the Vulkan backend and the test mock.

use ash::vk;
use std::fmt;
use std::time::Duration;

use super::bindings::AttachmentBindings;
use super::viewport::Viewport;
use crate::error::FrameResult;

/// Window-sized render targets that are not owned by the swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    /// Offscreen color target the scene pass renders into
    SceneColor,
    Depth,
}

impl AttachmentKind {
    pub const ALL: [AttachmentKind; 2] = [AttachmentKind::SceneColor, AttachmentKind::Depth];
    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Result of asking the presentation engine for the next image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired { image_index: u32, suboptimal: bool },
    /// No image was acquired and the semaphore will not be signaled.
    OutOfDate,
}

/// Result of queueing an image for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Presented (or not), but the swapchain no longer matches the surface.
    NeedsRecreate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceWait {
    Signaled,
    TimedOut,
}

/// Everything a backend needs to record one frame.
pub struct FrameTarget<'a, B: FrameBackend + ?Sized> {
    pub swapchain: &'a B::Swapchain,
    pub image_index: u32,
    pub frame_index: usize,
    pub frame_number: u64,
    pub bindings: &'a AttachmentBindings<B::Binding>,
    pub viewport: &'a Viewport,
}

/// Device/queue context driven by [`FrameOrchestrator`](super::FrameOrchestrator).
///
/// Every associated handle type owns its native object and releases it on
/// drop. The orchestrator relies on that to recreate swapchain-sized
/// resources by simply replacing them.
pub trait FrameBackend {
    type Fence;
    type Semaphore;
    /// Command pool plus the primary command buffer allocated from it
    type Commands;
    type Swapchain;
    type Attachment;
    /// Lightweight handle stored in the binding table (image + view, an id, ...)
    type Binding: Copy + PartialEq + fmt::Debug;

    fn create_fence(&self, signaled: bool) -> FrameResult<Self::Fence>;
    fn create_semaphore(&self) -> FrameResult<Self::Semaphore>;
    fn create_commands(&self) -> FrameResult<Self::Commands>;

    /// `None` waits without bound.
    fn wait_fence(&self, fence: &Self::Fence, timeout: Option<Duration>) -> FrameResult<FenceWait>;
    fn reset_fence(&self, fence: &Self::Fence) -> FrameResult<()>;

    /// Reset the command pool and begin the primary command buffer.
    fn begin_commands(&self, commands: &mut Self::Commands) -> FrameResult<()>;
    fn end_commands(&self, commands: &mut Self::Commands) -> FrameResult<()>;

    fn create_swapchain(&self, extent: vk::Extent2D) -> FrameResult<Self::Swapchain>;
    fn swapchain_image_count(&self, swapchain: &Self::Swapchain) -> usize;
    fn swapchain_extent(&self, swapchain: &Self::Swapchain) -> vk::Extent2D;

    fn create_attachment(
        &self,
        kind: AttachmentKind,
        extent: vk::Extent2D,
    ) -> FrameResult<Self::Attachment>;
    fn attachment_binding(&self, attachment: &Self::Attachment) -> Self::Binding;

    fn acquire_next_image(
        &self,
        swapchain: &Self::Swapchain,
        signal: &Self::Semaphore,
    ) -> FrameResult<AcquireOutcome>;

    /// Record the scene and post-processing passes, including every layout
    /// transition the target images go through.
    fn record_frame(
        &self,
        commands: &mut Self::Commands,
        target: &FrameTarget<'_, Self>,
    ) -> FrameResult<()>;

    /// Submit to the graphics queue. `wait` is waited at the color
    /// attachment output stage, `signal` and `fence` are signaled on completion.
    fn submit(
        &self,
        commands: &Self::Commands,
        wait: &Self::Semaphore,
        signal: &Self::Semaphore,
        fence: &Self::Fence,
    ) -> FrameResult<()>;

    fn present(
        &self,
        swapchain: &Self::Swapchain,
        image_index: u32,
        wait: &Self::Semaphore,
    ) -> FrameResult<PresentOutcome>;

    fn wait_idle(&self) -> FrameResult<()>;
}
