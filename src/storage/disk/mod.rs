pub mod manager;

use crate::storage::page::page::{Page, PageNo};

pub type FileId = u64;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("file {0} is not registered with the store")]
    UnknownFile(FileId),

    #[error("page {page_no} of {file} has not been allocated")]
    PageNotAllocated { file: String, page_no: PageNo },

    #[error("page {page_no} of {file} has been deallocated")]
    PageDeallocated { file: String, page_no: PageNo },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The one external dependency of the page cache: a store that hands out
/// page-addressable files. Pages carry their own number, so `write_page`
/// takes the page alone.
pub trait FileStore {
    /// Extends the file by one page and returns its initial contents,
    /// number already assigned.
    fn allocate_page(&mut self, file_id: FileId) -> Result<Page, StoreError>;

    fn read_page(&mut self, file_id: FileId, page_no: PageNo) -> Result<Page, StoreError>;

    fn write_page(&mut self, file_id: FileId, page: &Page) -> Result<(), StoreError>;

    fn delete_page(&mut self, file_id: FileId, page_no: PageNo) -> Result<(), StoreError>;

    /// Diagnostic identity used in error messages.
    fn filename(&self, file_id: FileId) -> String;
}
