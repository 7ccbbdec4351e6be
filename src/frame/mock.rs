// Mock GPU backend for protocol tests
//
// Records every call as a `MockEvent`, counts live handles per resource kind
// and flags hazards a real driver would not report (reusing a command buffer
// the GPU still owns, submitting with a signaled fence, zero-sized images).
// The simulated GPU finishes a submission when its fence is waited on.

use ash::vk;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use super::backend::{
    AcquireOutcome, AttachmentKind, FenceWait, FrameBackend, FrameTarget, PresentOutcome,
};
use crate::error::{FrameError, FrameResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockResource {
    Fence,
    Semaphore,
    Commands,
    Swapchain,
    Attachment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    CreateSwapchain { id: u64, image_count: usize, extent: vk::Extent2D },
    CreateAttachment { kind: AttachmentKind, extent: vk::Extent2D },
    WaitFence { fence: u64 },
    ResetFence { fence: u64 },
    Begin { commands: u64 },
    End { commands: u64 },
    Acquire { semaphore: u64, outcome: AcquireOutcome },
    Record { commands: u64, image_index: u32, frame_index: usize },
    Submit { commands: u64, wait: u64, signal: u64, fence: u64 },
    Present { image_index: u32, wait: u64 },
    WaitIdle,
}

#[derive(Default)]
struct Ledger {
    next_id: u64,
    live: HashMap<MockResource, usize>,
    events: Vec<MockEvent>,
    violations: Vec<String>,
    signaled: HashMap<u64, bool>,
    /// fence id -> command context id the GPU is still executing
    pending: HashMap<u64, u64>,
    busy_commands: HashSet<u64>,
    image_count: usize,
    surface_extent: Option<vk::Extent2D>,
    acquire_script: VecDeque<AcquireOutcome>,
    present_script: VecDeque<PresentOutcome>,
    next_image: u32,
    gpu_hung: bool,
}

impl Ledger {
    fn allocate(&mut self, kind: MockResource) -> u64 {
        self.next_id += 1;
        *self.live.entry(kind).or_default() += 1;
        self.next_id
    }

    fn complete(&mut self, fence: u64) {
        if let Some(commands) = self.pending.remove(&fence) {
            self.busy_commands.remove(&commands);
        }
        self.signaled.insert(fence, true);
    }
}

pub struct MockHandle {
    id: u64,
    kind: MockResource,
    ledger: Rc<RefCell<Ledger>>,
}

impl MockHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        let mut ledger = self.ledger.borrow_mut();
        if let Some(count) = ledger.live.get_mut(&self.kind) {
            *count -= 1;
        }
    }
}

pub struct MockSwapchain {
    handle: MockHandle,
    image_count: usize,
    extent: vk::Extent2D,
}

impl MockSwapchain {
    pub fn id(&self) -> u64 {
        self.handle.id
    }
}

pub struct MockBackend {
    ledger: Rc<RefCell<Ledger>>,
}

impl MockBackend {
    pub fn new(image_count: usize) -> Self {
        let ledger = Ledger {
            image_count,
            ..Ledger::default()
        };
        Self {
            ledger: Rc::new(RefCell::new(ledger)),
        }
    }

    fn handle(&self, kind: MockResource) -> MockHandle {
        let id = self.ledger.borrow_mut().allocate(kind);
        MockHandle {
            id,
            kind,
            ledger: Rc::clone(&self.ledger),
        }
    }

    fn push(&self, event: MockEvent) {
        self.ledger.borrow_mut().events.push(event);
    }

    fn violation(&self, message: String) -> FrameError {
        self.ledger.borrow_mut().violations.push(message.clone());
        FrameError::InvalidState(message)
    }

    /// Image count of swapchains created from now on.
    pub fn set_image_count(&self, count: usize) {
        self.ledger.borrow_mut().image_count = count;
    }

    /// Extent the "surface" forces onto new swapchains, like
    /// `currentExtent` does on most platforms.
    pub fn set_surface_extent(&self, extent: Option<vk::Extent2D>) {
        self.ledger.borrow_mut().surface_extent = extent;
    }

    pub fn script_acquire(&self, outcomes: impl IntoIterator<Item = AcquireOutcome>) {
        self.ledger.borrow_mut().acquire_script.extend(outcomes);
    }

    pub fn script_present(&self, outcomes: impl IntoIterator<Item = PresentOutcome>) {
        self.ledger.borrow_mut().present_script.extend(outcomes);
    }

    /// While hung, no pending submission ever completes.
    pub fn set_gpu_hung(&self, hung: bool) {
        self.ledger.borrow_mut().gpu_hung = hung;
    }

    pub fn live(&self, kind: MockResource) -> usize {
        self.ledger.borrow().live.get(&kind).copied().unwrap_or(0)
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.ledger.borrow().events.clone()
    }

    pub fn take_events(&self) -> Vec<MockEvent> {
        std::mem::take(&mut self.ledger.borrow_mut().events)
    }

    pub fn violations(&self) -> Vec<String> {
        self.ledger.borrow().violations.clone()
    }
}

impl FrameBackend for MockBackend {
    type Fence = MockHandle;
    type Semaphore = MockHandle;
    type Commands = MockHandle;
    type Swapchain = MockSwapchain;
    type Attachment = MockHandle;
    type Binding = u64;

    fn create_fence(&self, signaled: bool) -> FrameResult<MockHandle> {
        let fence = self.handle(MockResource::Fence);
        self.ledger.borrow_mut().signaled.insert(fence.id, signaled);
        Ok(fence)
    }

    fn create_semaphore(&self) -> FrameResult<MockHandle> {
        Ok(self.handle(MockResource::Semaphore))
    }

    fn create_commands(&self) -> FrameResult<MockHandle> {
        Ok(self.handle(MockResource::Commands))
    }

    fn wait_fence(&self, fence: &MockHandle, timeout: Option<Duration>) -> FrameResult<FenceWait> {
        self.push(MockEvent::WaitFence { fence: fence.id });
        let mut ledger = self.ledger.borrow_mut();
        let signaled = ledger.signaled.get(&fence.id).copied().unwrap_or(false);
        if signaled {
            return Ok(FenceWait::Signaled);
        }
        if ledger.gpu_hung || !ledger.pending.contains_key(&fence.id) {
            // Nothing will ever signal it
            return match timeout {
                Some(_) => Ok(FenceWait::TimedOut),
                None => {
                    drop(ledger);
                    Err(self.violation(format!("unbounded wait on fence {} that never signals", fence.id)))
                }
            };
        }
        ledger.complete(fence.id);
        Ok(FenceWait::Signaled)
    }

    fn reset_fence(&self, fence: &MockHandle) -> FrameResult<()> {
        self.push(MockEvent::ResetFence { fence: fence.id });
        let pending = self.ledger.borrow().pending.contains_key(&fence.id);
        if pending {
            return Err(self.violation(format!("reset of fence {} with pending work", fence.id)));
        }
        self.ledger.borrow_mut().signaled.insert(fence.id, false);
        Ok(())
    }

    fn begin_commands(&self, commands: &mut MockHandle) -> FrameResult<()> {
        self.push(MockEvent::Begin { commands: commands.id });
        let busy = self.ledger.borrow().busy_commands.contains(&commands.id);
        if busy {
            return Err(self.violation(format!(
                "command context {} reset while the GPU still executes it",
                commands.id
            )));
        }
        Ok(())
    }

    fn end_commands(&self, commands: &mut MockHandle) -> FrameResult<()> {
        self.push(MockEvent::End { commands: commands.id });
        Ok(())
    }

    fn create_swapchain(&self, extent: vk::Extent2D) -> FrameResult<MockSwapchain> {
        let handle = self.handle(MockResource::Swapchain);
        let (image_count, extent) = {
            let ledger = self.ledger.borrow();
            (ledger.image_count, ledger.surface_extent.unwrap_or(extent))
        };
        self.push(MockEvent::CreateSwapchain {
            id: handle.id,
            image_count,
            extent,
        });
        Ok(MockSwapchain {
            handle,
            image_count,
            extent,
        })
    }

    fn swapchain_image_count(&self, swapchain: &MockSwapchain) -> usize {
        swapchain.image_count
    }

    fn swapchain_extent(&self, swapchain: &MockSwapchain) -> vk::Extent2D {
        swapchain.extent
    }

    fn create_attachment(&self, kind: AttachmentKind, extent: vk::Extent2D) -> FrameResult<MockHandle> {
        self.push(MockEvent::CreateAttachment { kind, extent });
        if extent.width == 0 || extent.height == 0 {
            return Err(self.violation(format!("zero-sized {kind:?} attachment")));
        }
        Ok(self.handle(MockResource::Attachment))
    }

    fn attachment_binding(&self, attachment: &MockHandle) -> u64 {
        attachment.id
    }

    fn acquire_next_image(
        &self,
        swapchain: &MockSwapchain,
        signal: &MockHandle,
    ) -> FrameResult<AcquireOutcome> {
        let outcome = {
            let mut ledger = self.ledger.borrow_mut();
            match ledger.acquire_script.pop_front() {
                Some(outcome) => outcome,
                None => {
                    let image_index = ledger.next_image % swapchain.image_count as u32;
                    ledger.next_image = image_index + 1;
                    AcquireOutcome::Acquired {
                        image_index,
                        suboptimal: false,
                    }
                }
            }
        };
        self.push(MockEvent::Acquire {
            semaphore: signal.id,
            outcome,
        });
        Ok(outcome)
    }

    fn record_frame(
        &self,
        commands: &mut MockHandle,
        target: &FrameTarget<'_, Self>,
    ) -> FrameResult<()> {
        if !target.bindings.is_complete() {
            return Err(self.violation("recording with unbound attachments".to_string()));
        }
        self.push(MockEvent::Record {
            commands: commands.id,
            image_index: target.image_index,
            frame_index: target.frame_index,
        });
        Ok(())
    }

    fn submit(
        &self,
        commands: &MockHandle,
        wait: &MockHandle,
        signal: &MockHandle,
        fence: &MockHandle,
    ) -> FrameResult<()> {
        self.push(MockEvent::Submit {
            commands: commands.id,
            wait: wait.id,
            signal: signal.id,
            fence: fence.id,
        });
        let signaled = self.ledger.borrow().signaled.get(&fence.id).copied().unwrap_or(false);
        if signaled {
            return Err(self.violation(format!("submit with already signaled fence {}", fence.id)));
        }
        let mut ledger = self.ledger.borrow_mut();
        ledger.pending.insert(fence.id, commands.id);
        ledger.busy_commands.insert(commands.id);
        Ok(())
    }

    fn present(
        &self,
        _swapchain: &MockSwapchain,
        image_index: u32,
        wait: &MockHandle,
    ) -> FrameResult<PresentOutcome> {
        self.push(MockEvent::Present {
            image_index,
            wait: wait.id,
        });
        let outcome = self.ledger.borrow_mut().present_script.pop_front();
        Ok(outcome.unwrap_or(PresentOutcome::Presented))
    }

    fn wait_idle(&self) -> FrameResult<()> {
        self.push(MockEvent::WaitIdle);
        let mut ledger = self.ledger.borrow_mut();
        if ledger.gpu_hung {
            return Ok(());
        }
        let fences: Vec<u64> = ledger.pending.keys().copied().collect();
        for fence in fences {
            ledger.complete(fence);
        }
        Ok(())
    }
}
