// Frame orchestrator
//
// Drives N frame slots against M swapchain images:
//
//   wait slot fence -> reset + begin commands -> acquire image
//     -> (out of date? abandon + recreate)
//     -> record -> reset fence + submit -> present -> next slot
//
// Render-complete semaphores are indexed by the acquired image, not by the
// slot. Presentation has no fence, so a semaphore tied to a slot could be
// reused while the presentation engine still waits on it.

use ash::vk;
use std::time::Duration;

use super::backend::{AcquireOutcome, AttachmentKind, FrameBackend, FrameTarget, PresentOutcome};
use super::bindings::AttachmentBindings;
use super::slot::{FrameSlot, SlotState};
use super::viewport::Viewport;
use crate::error::{FrameError, FrameResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub frames_in_flight: usize,
    /// `None` waits on fences without bound
    pub fence_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Rendered {
        frame_index: usize,
        image_index: u32,
        suboptimal: bool,
    },
    /// The frame was dropped and swapchain resources were rebuilt
    Recreated,
    /// Drawable area is zero, nothing was rendered or created
    Skipped,
}

/// Everything whose size or count follows the swapchain.
///
/// Field order is drop order: semaphores and attachments go before the
/// swapchain they were sized for.
struct SurfaceResources<B: FrameBackend> {
    render_complete: Vec<B::Semaphore>,
    /// Held for drop only. Passes reach the images through the binding table.
    #[cfg_attr(not(test), allow(dead_code))]
    attachments: Vec<(AttachmentKind, B::Attachment)>,
    swapchain: B::Swapchain,
    viewport: Viewport,
}

pub struct FrameOrchestrator<B: FrameBackend> {
    slots: Vec<FrameSlot<B>>,
    surface: Option<SurfaceResources<B>>,
    bindings: AttachmentBindings<B::Binding>,
    current_frame: usize,
    resize_pending: bool,
    fence_timeout: Option<Duration>,
    frame_number: u64,
    generation: u64,
}

impl<B: FrameBackend> FrameOrchestrator<B> {
    pub fn new(backend: &B, settings: OrchestratorSettings, drawable: vk::Extent2D) -> FrameResult<Self> {
        if settings.frames_in_flight == 0 {
            return Err(FrameError::InvalidState(
                "at least one frame in flight is required".to_string(),
            ));
        }

        let slots = (0..settings.frames_in_flight)
            .map(|index| FrameSlot::new(backend, index))
            .collect::<FrameResult<Vec<_>>>()?;

        log::info!(
            "Frame orchestrator: {} frames in flight, fence timeout {:?}",
            settings.frames_in_flight,
            settings.fence_timeout
        );

        let mut orchestrator = Self {
            slots,
            surface: None,
            bindings: AttachmentBindings::new(),
            current_frame: 0,
            resize_pending: true,
            fence_timeout: settings.fence_timeout,
            frame_number: 0,
            generation: 0,
        };
        orchestrator.recreate_surface(backend, drawable)?;

        Ok(orchestrator)
    }

    /// Window resized (or fullscreen toggled). Recreation happens at the
    /// start of the next frame, so bursts of events cost one rebuild.
    pub fn notify_resized(&mut self) {
        self.resize_pending = true;
    }

    /// Render one frame. `drawable` is the current size of the window's
    /// drawable area and is only used if swapchain resources are rebuilt.
    pub fn render_frame(&mut self, backend: &B, drawable: vk::Extent2D) -> FrameResult<FrameStatus> {
        if self.resize_pending || self.surface.is_none() {
            if !self.recreate_surface(backend, drawable)? {
                return Ok(FrameStatus::Skipped);
            }
        }

        let frame_index = self.current_frame;
        let fence_timeout = self.fence_timeout;

        // STEP 1 + 2: the fence is the only thing allowing the slot's
        // command buffer to be reset.
        let slot = &mut self.slots[frame_index];
        slot.wait(backend, fence_timeout)?;
        slot.begin(backend)?;

        // STEP 3: acquire
        let surface = self
            .surface
            .as_ref()
            .ok_or_else(|| FrameError::InvalidState("no swapchain to render to".to_string()))?;
        let acquired = backend.acquire_next_image(&surface.swapchain, slot.presentation_complete())?;

        // STEP 4: stale swapchain, drop the frame without submitting
        let (image_index, suboptimal) = match acquired {
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                log::debug!("Swapchain out of date on acquire, frame {} dropped", self.frame_number);
                slot.abandon(backend)?;
                self.resize_pending = true;
                let recreated = self.recreate_surface(backend, drawable)?;
                return Ok(if recreated {
                    FrameStatus::Recreated
                } else {
                    FrameStatus::Skipped
                });
            }
        };

        if suboptimal {
            log::debug!("Swapchain suboptimal, recreating after this frame");
            self.resize_pending = true;
        }

        let render_complete = surface.render_complete.get(image_index as usize).ok_or_else(|| {
            FrameError::InvalidState(format!(
                "acquired image {} but swapchain has {} images",
                image_index,
                surface.render_complete.len()
            ))
        })?;

        // STEP 5: record
        let target = FrameTarget {
            swapchain: &surface.swapchain,
            image_index,
            frame_index,
            frame_number: self.frame_number,
            bindings: &self.bindings,
            viewport: &surface.viewport,
        };
        backend.record_frame(slot.commands_mut(), &target)?;

        // STEP 6: submit, signaling the semaphore of the acquired image
        slot.submit(backend, render_complete)?;

        // STEP 7: present
        match backend.present(&surface.swapchain, image_index, render_complete)? {
            PresentOutcome::Presented => {}
            PresentOutcome::NeedsRecreate => {
                log::debug!("Present reported a stale swapchain, recreating next frame");
                self.resize_pending = true;
            }
        }

        // STEP 8
        self.current_frame = (self.current_frame + 1) % self.slots.len();
        self.frame_number += 1;

        Ok(FrameStatus::Rendered {
            frame_index,
            image_index,
            suboptimal,
        })
    }

    /// Rebuild everything sized to the swapchain. Returns `false` without
    /// touching anything when the drawable area is zero (minimized window);
    /// the resize stays pending and is retried next frame.
    fn recreate_surface(&mut self, backend: &B, drawable: vk::Extent2D) -> FrameResult<bool> {
        if is_zero_area(drawable) {
            log::debug!(
                "Drawable is {}x{}, postponing swapchain creation",
                drawable.width,
                drawable.height
            );
            self.resize_pending = true;
            return Ok(false);
        }

        backend.wait_idle()?;

        // Old owners go first; the surface may only back one swapchain.
        self.bindings.clear();
        self.surface = None;

        let swapchain = backend.create_swapchain(drawable)?;
        let extent = backend.swapchain_extent(&swapchain);
        if is_zero_area(extent) {
            log::debug!("Surface reports a zero extent, postponing swapchain creation");
            self.resize_pending = true;
            return Ok(false);
        }

        let image_count = backend.swapchain_image_count(&swapchain);
        let render_complete = (0..image_count)
            .map(|_| backend.create_semaphore())
            .collect::<FrameResult<Vec<_>>>()?;

        let attachments = AttachmentKind::ALL
            .iter()
            .map(|&kind| Ok((kind, backend.create_attachment(kind, extent)?)))
            .collect::<FrameResult<Vec<_>>>()?;
        for (kind, attachment) in &attachments {
            self.bindings.bind(*kind, backend.attachment_binding(attachment));
        }

        let viewport = Viewport::new(extent);
        let viewport_aspect = viewport.aspect_ratio;
        self.surface = Some(SurfaceResources {
            render_complete,
            attachments,
            swapchain,
            viewport,
        });
        self.resize_pending = false;
        self.generation += 1;

        log::info!(
            "Swapchain ready: {}x{} (aspect {:.3}), {} images (generation {})",
            extent.width,
            extent.height,
            viewport_aspect,
            image_count,
            self.generation
        );

        Ok(true)
    }

    /// Block until the GPU is done with every slot. Call before dropping the
    /// orchestrator.
    pub fn wait_idle(&mut self, backend: &B) -> FrameResult<()> {
        backend.wait_idle()?;
        for slot in &mut self.slots {
            if slot.state() != SlotState::Recording {
                slot.wait(backend, self.fence_timeout)?;
            }
        }
        Ok(())
    }
}

/// Inspection used by the protocol tests
#[cfg(test)]
impl<B: FrameBackend> FrameOrchestrator<B> {
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn resize_pending(&self) -> bool {
        self.resize_pending
    }

    /// Number of swapchain recreations so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn image_count(&self) -> Option<usize> {
        self.surface.as_ref().map(|s| s.render_complete.len())
    }

    pub fn render_complete_semaphore(&self, image_index: u32) -> Option<&B::Semaphore> {
        self.surface
            .as_ref()
            .and_then(|s| s.render_complete.get(image_index as usize))
    }

    pub fn attachment_count(&self) -> usize {
        self.surface.as_ref().map_or(0, |s| s.attachments.len())
    }

    pub fn swapchain(&self) -> Option<&B::Swapchain> {
        self.surface.as_ref().map(|s| &s.swapchain)
    }

    pub fn viewport(&self) -> Option<&Viewport> {
        self.surface.as_ref().map(|s| &s.viewport)
    }

    pub fn bindings(&self) -> &AttachmentBindings<B::Binding> {
        &self.bindings
    }

    pub fn slot(&self, index: usize) -> &FrameSlot<B> {
        &self.slots[index]
    }
}

fn is_zero_area(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}
