use std::ops::{Deref, DerefMut};

use log::warn;

use crate::{
    buffer::{buffer_pool_manager::BufferPoolManager, frame::FrameId},
    errors::BufferError,
    storage::{
        disk::FileId,
        page::page::{Page, PageNo},
    },
};

/// A pinned page with scoped release. Construction pins, drop unpins on
/// every exit path, and the dirty hint travels with the guard instead of
/// with the unpin call.
pub struct PinnedPage<'a> {
    bpm: &'a mut BufferPoolManager,
    file_id: FileId,
    page_no: PageNo,
    frame_id: FrameId,
    dirty: bool,
}

impl<'a> PinnedPage<'a> {
    pub(crate) fn acquire(
        bpm: &'a mut BufferPoolManager,
        file_id: FileId,
        page_no: PageNo,
    ) -> Result<Self, BufferError> {
        bpm.read_page(file_id, page_no)?;

        let frame_id = bpm
            .page_table
            .lookup(file_id, page_no)
            .ok_or(BufferError::NotFound { file_id, page_no })?;

        Ok(PinnedPage {
            bpm,
            file_id,
            page_no,
            frame_id,
            dirty: false,
        })
    }

    pub fn page_number(&self) -> PageNo {
        self.page_no
    }

    /// Records that the caller wrote through this pin; applied to the
    /// frame when the guard releases.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl Deref for PinnedPage<'_> {
    type Target = Page;

    fn deref(&self) -> &Page {
        &self.bpm.pool[self.frame_id as usize]
    }
}

impl DerefMut for PinnedPage<'_> {
    fn deref_mut(&mut self) -> &mut Page {
        &mut self.bpm.pool[self.frame_id as usize]
    }
}

impl Drop for PinnedPage<'_> {
    fn drop(&mut self) {
        if let Err(err) = self
            .bpm
            .unpin_page(self.file_id, self.page_no, self.dirty)
        {
            warn!(
                "releasing pin on page {} of file {} failed: {}",
                self.page_no, self.file_id, err
            );
        }
    }
}
