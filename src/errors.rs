use crate::buffer::frame::FrameId;
use crate::storage::disk::StoreError;
use crate::storage::page::page::PageNo;

/// Everything the page cache can fail with. Lookup misses on the resident
/// index are not here: absence is an `Option`, reserved error variants
/// mean a genuine fault.
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("buffer pool exceeded: all {pool_size} frames are pinned")]
    BufferExceeded { pool_size: usize },

    #[error("page {page_no} of {file} is not pinned")]
    PageNotPinned { file: String, page_no: PageNo },

    #[error("page {page_no} of {file} is pinned (pin count {pin_count})")]
    PagePinned {
        file: String,
        page_no: PageNo,
        pin_count: u32,
    },

    #[error("frame {frame_id} claimed by {file} holds no valid page")]
    BadBuffer { file: String, frame_id: FrameId },

    #[error("page {page_no} of file {file_id} already resident in frame {frame_id}")]
    DuplicateKey {
        file_id: u64,
        page_no: PageNo,
        frame_id: FrameId,
    },

    #[error("page {page_no} of file {file_id} is not resident")]
    NotFound { file_id: u64, page_no: PageNo },

    #[error(transparent)]
    Io(#[from] StoreError),
}
