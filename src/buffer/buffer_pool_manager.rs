use std::{cell::RefCell, rc::Rc};

use log::{debug, error};

use crate::{
    buffer::{
        frame::{FrameHeader, FrameId},
        page_guard::PinnedPage,
        page_table::PageTable,
    },
    errors::BufferError,
    storage::{
        disk::{FileId, FileStore},
        page::page::{Page, PageNo},
    },
};

/// Fixed-size page cache over a file store. Each resident disk page has
/// exactly one authoritative in-memory copy; callers borrow it under a
/// pin, and unpinned frames are recycled by a clock sweep.
///
/// One instance is single-threaded; nothing here suspends except the
/// store calls themselves.
pub struct BufferPoolManager {
    store: Rc<RefCell<dyn FileStore>>,

    // pool[i] is the payload for frames[i]
    pub(crate) pool: Vec<Page>,
    pub(crate) frames: Vec<FrameHeader>,

    pub(crate) page_table: PageTable,
    pub(crate) clock_hand: usize,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, store: Rc<RefCell<dyn FileStore>>) -> Self {
        assert!(pool_size > 0, "pool must hold at least one frame");

        let mut pool = Vec::with_capacity(pool_size);
        pool.resize_with(pool_size, Page::default);

        let frames = (0..pool_size)
            .map(|i| FrameHeader::new(i as FrameId))
            .collect();

        BufferPoolManager {
            store,
            pool,
            frames,
            page_table: PageTable::new(pool_size),
            // the first advance lands on slot 0
            clock_hand: pool_size - 1,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    /// Returns the resident copy of the page, loading it from the store
    /// on a miss, and pins it. The pin holds until a matching
    /// `unpin_page`.
    pub fn read_page(
        &mut self,
        file_id: FileId,
        page_no: PageNo,
    ) -> Result<&mut Page, BufferError> {
        if let Some(frame_id) = self.page_table.lookup(file_id, page_no) {
            let slot = frame_id as usize;
            self.frames[slot].pin();
            return Ok(&mut self.pool[slot]);
        }

        let frame_id = self.alloc_frame()?;
        let slot = frame_id as usize;

        let page = self.store.borrow_mut().read_page(file_id, page_no)?;
        self.pool[slot] = page;
        self.page_table.insert(file_id, page_no, frame_id)?;
        self.frames[slot].set(file_id, page_no);

        debug!("loaded page {page_no} of file {file_id} into frame {frame_id}");
        Ok(&mut self.pool[slot])
    }

    /// Extends the file by one page, installs it in the pool, and pins
    /// it. Returns the number the store assigned.
    pub fn alloc_page(&mut self, file_id: FileId) -> Result<(PageNo, &mut Page), BufferError> {
        let page = self.store.borrow_mut().allocate_page(file_id)?;
        let page_no = page.page_number();

        let frame_id = self.alloc_frame()?;
        let slot = frame_id as usize;

        self.pool[slot] = page;
        self.page_table.insert(file_id, page_no, frame_id)?;
        self.frames[slot].set(file_id, page_no);

        debug!("allocated page {page_no} of file {file_id} into frame {frame_id}");
        Ok((page_no, &mut self.pool[slot]))
    }

    /// Releases one pin. A true `dirty` hint sticks to the frame until
    /// write-back; false never cleans an already-dirty frame. Unpinning a
    /// page that is not resident is a no-op.
    pub fn unpin_page(
        &mut self,
        file_id: FileId,
        page_no: PageNo,
        dirty: bool,
    ) -> Result<(), BufferError> {
        let Some(frame_id) = self.page_table.lookup(file_id, page_no) else {
            return Ok(());
        };
        let slot = frame_id as usize;

        if self.frames[slot].pin_count() == 0 {
            return Err(BufferError::PageNotPinned {
                file: self.filename(file_id),
                page_no,
            });
        }

        if dirty {
            self.frames[slot].mark_dirty();
        }
        self.frames[slot].unpin();

        Ok(())
    }

    /// Writes back and drops every resident page of the file. The whole
    /// file is prechecked before anything is written, so a failure here
    /// leaves the cache exactly as it was.
    pub fn flush_file(&mut self, file_id: FileId) -> Result<(), BufferError> {
        for frame in &self.frames {
            if frame.file_id() != Some(file_id) {
                continue;
            }
            if frame.pin_count() > 0 {
                return Err(BufferError::PagePinned {
                    file: self.filename(file_id),
                    page_no: frame.page_no(),
                    pin_count: frame.pin_count(),
                });
            }
            if !frame.is_valid() {
                return Err(BufferError::BadBuffer {
                    file: self.filename(file_id),
                    frame_id: frame.frame_id(),
                });
            }
        }

        for slot in 0..self.frames.len() {
            if self.frames[slot].file_id() != Some(file_id) {
                continue;
            }

            if self.frames[slot].is_dirty() {
                self.store
                    .borrow_mut()
                    .write_page(file_id, &self.pool[slot])?;
                self.frames[slot].mark_clean();
            }

            self.page_table.remove(file_id, self.frames[slot].page_no())?;
            self.frames[slot].clear();
        }

        Ok(())
    }

    /// Drops the page from the cache without write-back and deletes it
    /// from the store. A page that is not resident is simply deleted.
    pub fn dispose_page(&mut self, file_id: FileId, page_no: PageNo) -> Result<(), BufferError> {
        if let Some(frame_id) = self.page_table.lookup(file_id, page_no) {
            self.page_table.remove(file_id, page_no)?;
            self.frames[frame_id as usize].clear();
            debug!("dropped page {page_no} of file {file_id} from frame {frame_id}");
        }

        self.store.borrow_mut().delete_page(file_id, page_no)?;
        Ok(())
    }

    /// Scoped alternative to the read_page/unpin_page pair: the returned
    /// guard holds the pin and releases it on every exit path.
    pub fn fetch_page(
        &mut self,
        file_id: FileId,
        page_no: PageNo,
    ) -> Result<PinnedPage<'_>, BufferError> {
        PinnedPage::acquire(self, file_id, page_no)
    }

    /// Dumps every frame and the count of valid ones.
    pub fn print_self(&self) {
        let mut valid_frames = 0;
        for frame in &self.frames {
            println!("{}", frame);
            if frame.is_valid() {
                valid_frames += 1;
            }
        }
        println!("total valid frames: {}", valid_frames);
    }

    /// Clock sweep. Finds a slot to install a new page into, evicting a
    /// resident page (written back first when dirty) if no slot is free.
    ///
    /// The all-pinned case is rejected before the sweep starts, so the
    /// sweep always terminates: a first visit clears a frame's ref bit
    /// and the second visit takes it, which bounds the walk at two laps.
    fn alloc_frame(&mut self) -> Result<FrameId, BufferError> {
        if self.frames.iter().all(|frame| frame.pin_count() > 0) {
            return Err(BufferError::BufferExceeded {
                pool_size: self.frames.len(),
            });
        }

        loop {
            self.advance_clock();
            let hand = self.clock_hand;

            if !self.frames[hand].is_valid() {
                break;
            }
            if self.frames[hand].ref_bit() {
                // second chance
                self.frames[hand].clear_ref_bit();
                continue;
            }
            if self.frames[hand].pin_count() > 0 {
                continue;
            }

            if self.frames[hand].is_dirty() {
                let Some(file_id) = self.frames[hand].file_id() else {
                    break;
                };
                // A failed write-back propagates with the frame still
                // valid, dirty, and mapped, so the caller can retry
                self.store
                    .borrow_mut()
                    .write_page(file_id, &self.pool[hand])?;
                self.frames[hand].mark_clean();
                debug!(
                    "wrote back page {} of file {} before evicting frame {}",
                    self.frames[hand].page_no(),
                    file_id,
                    hand
                );
            }
            break;
        }

        let hand = self.clock_hand;
        if self.frames[hand].is_valid() {
            if let Some(file_id) = self.frames[hand].file_id() {
                debug!(
                    "evicting page {} of file {} from frame {}",
                    self.frames[hand].page_no(),
                    file_id,
                    hand
                );
                self.page_table.remove(file_id, self.frames[hand].page_no())?;
            }
            self.frames[hand].clear();
        }

        Ok(hand as FrameId)
    }

    fn advance_clock(&mut self) {
        self.clock_hand = (self.clock_hand + 1) % self.frames.len();
    }

    fn filename(&self, file_id: FileId) -> String {
        self.store.borrow().filename(file_id)
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        // Best effort: a failed write-back is reported and the remaining
        // frames are still flushed
        for slot in 0..self.frames.len() {
            let frame = &self.frames[slot];
            if !frame.is_valid() || !frame.is_dirty() {
                continue;
            }
            let Some(file_id) = frame.file_id() else {
                continue;
            };
            if let Err(err) = self.store.borrow_mut().write_page(file_id, &self.pool[slot]) {
                error!(
                    "shutdown write-back of page {} (file {}) failed: {}",
                    frame.page_no(),
                    file_id,
                    err
                );
            }
        }
    }
}
