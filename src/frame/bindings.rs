// Attachment binding table
//
// Passes look up the images they read or write by `AttachmentKind`. The
// table is refreshed every time the swapchain-sized attachments are
// recreated, so nothing keeps a handle to a destroyed image.

use super::backend::AttachmentKind;

#[derive(Debug, Clone)]
pub struct AttachmentBindings<H> {
    entries: [Option<H>; AttachmentKind::COUNT],
}

impl<H: Copy> AttachmentBindings<H> {
    pub fn new() -> Self {
        Self {
            entries: [None; AttachmentKind::COUNT],
        }
    }

    pub fn bind(&mut self, kind: AttachmentKind, handle: H) {
        self.entries[kind.index()] = Some(handle);
    }

    pub fn get(&self, kind: AttachmentKind) -> Option<H> {
        self.entries[kind.index()]
    }

    pub fn clear(&mut self) {
        self.entries = [None; AttachmentKind::COUNT];
    }

    /// True once every attachment kind has a handle.
    #[cfg(test)]
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(Option::is_some)
    }
}

impl<H: Copy> Default for AttachmentBindings<H> {
    fn default() -> Self {
        Self::new()
    }
}
