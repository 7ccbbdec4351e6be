// One frame-in-flight slot
//
// A slot owns everything the CPU touches while preparing a frame: a command
// pool + buffer, the fence the GPU signals when it is done with them, and the
// semaphore the presentation engine signals once the acquired image is ready.
// Nothing here is shared with other slots.

use std::time::Duration;

use super::backend::{FenceWait, FrameBackend};
use crate::error::{FrameError, FrameResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// GPU is done with the slot, CPU may record into it
    Idle,
    Recording,
    /// Handed to the GPU, fence not yet observed
    Submitted,
}

pub struct FrameSlot<B: FrameBackend> {
    index: usize,
    state: SlotState,
    commands: B::Commands,
    presentation_complete: B::Semaphore,
    in_flight: B::Fence,
}

impl<B: FrameBackend> FrameSlot<B> {
    pub fn new(backend: &B, index: usize) -> FrameResult<Self> {
        Ok(Self {
            index,
            state: SlotState::Idle,
            commands: backend.create_commands()?,
            presentation_complete: backend.create_semaphore()?,
            // Signaled so the first wait on this slot returns immediately
            in_flight: backend.create_fence(true)?,
        })
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn presentation_complete(&self) -> &B::Semaphore {
        &self.presentation_complete
    }

    pub fn commands_mut(&mut self) -> &mut B::Commands {
        &mut self.commands
    }

    /// Block until the GPU has finished the previous use of this slot.
    pub fn wait(&mut self, backend: &B, timeout: Option<Duration>) -> FrameResult<()> {
        if self.state == SlotState::Recording {
            return Err(self.invalid("wait while recording"));
        }

        match backend.wait_fence(&self.in_flight, timeout)? {
            FenceWait::Signaled => {
                self.state = SlotState::Idle;
                Ok(())
            }
            FenceWait::TimedOut => Err(FrameError::FenceTimeout {
                slot: self.index,
                timeout: timeout.unwrap_or(Duration::MAX),
            }),
        }
    }

    pub fn begin(&mut self, backend: &B) -> FrameResult<()> {
        if self.state != SlotState::Idle {
            return Err(self.invalid("begin recording"));
        }
        backend.begin_commands(&mut self.commands)?;
        self.state = SlotState::Recording;
        Ok(())
    }

    /// Close the command buffer without submitting it. The fence is left
    /// signaled, so the next wait on this slot does not block.
    pub fn abandon(&mut self, backend: &B) -> FrameResult<()> {
        if self.state != SlotState::Recording {
            return Err(self.invalid("abandon"));
        }
        backend.end_commands(&mut self.commands)?;
        self.state = SlotState::Idle;
        Ok(())
    }

    /// End recording and submit, signaling `render_complete` when done.
    pub fn submit(&mut self, backend: &B, render_complete: &B::Semaphore) -> FrameResult<()> {
        if self.state != SlotState::Recording {
            return Err(self.invalid("submit"));
        }
        backend.end_commands(&mut self.commands)?;
        backend.reset_fence(&self.in_flight)?;
        backend.submit(
            &self.commands,
            &self.presentation_complete,
            render_complete,
            &self.in_flight,
        )?;
        self.state = SlotState::Submitted;
        Ok(())
    }

    fn invalid(&self, action: &str) -> FrameError {
        FrameError::InvalidState(format!(
            "frame slot {}: cannot {} in state {:?}",
            self.index, action, self.state
        ))
    }
}
