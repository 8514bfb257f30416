use std::{
    collections::{HashMap, VecDeque},
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use hashlink::LinkedHashMap;

use crate::storage::{
    disk::{FileId, FileStore, StoreError},
    page::page::{page_constants::PAGE_SIZE, Page, PageNo},
};

struct FileMetadata {
    // Per-file mapping from page number to its offset on disk.
    // Deleted pages are marked None; their slot is recycled through
    // free_slots before the file is extended again.
    pages: LinkedHashMap<PageNo, Option<u64>>,

    free_slots: VecDeque<(PageNo, u64)>,
}

impl FileMetadata {
    fn new() -> Self {
        FileMetadata {
            pages: LinkedHashMap::new(),
            free_slots: VecDeque::new(),
        }
    }
}

struct OpenFile {
    io: File,
    path: PathBuf,
    meta: FileMetadata,
}

/// File-backed page store. Files are addressed by a stable integer handle
/// handed out at create/open time; page offsets are tracked per file so a
/// deleted page's slot can be reused.
pub struct DiskManager {
    files: HashMap<FileId, OpenFile>,
    next_file_id: FileId,
}

impl DiskManager {
    pub fn new() -> Self {
        DiskManager {
            files: HashMap::new(),
            next_file_id: 0,
        }
    }

    pub fn create_file(&mut self, path: &Path) -> Result<FileId, StoreError> {
        let io = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(self.register(io, path.to_path_buf(), FileMetadata::new()))
    }

    /// Opens an existing page file and rebuilds the offset map from the
    /// page headers, which carry their own numbers.
    pub fn open_file(&mut self, path: &Path) -> Result<FileId, StoreError> {
        let mut io = OpenOptions::new().read(true).write(true).open(path)?;

        let len = io.metadata()?.len();
        let mut meta = FileMetadata::new();

        let mut header = Page::default();
        for slot in 0..len / PAGE_SIZE as u64 {
            let offset = slot * PAGE_SIZE as u64;
            io.seek(SeekFrom::Start(offset))?;
            io.read_exact(header.as_bytes_mut())?;
            meta.pages.insert(header.page_number(), Some(offset));
        }

        Ok(self.register(io, path.to_path_buf(), meta))
    }

    pub fn close_file(&mut self, file_id: FileId) -> Result<(), StoreError> {
        match self.files.remove(&file_id) {
            Some(open) => {
                open.io.sync_all()?;
                Ok(())
            }
            None => Err(StoreError::UnknownFile(file_id)),
        }
    }

    fn register(&mut self, io: File, path: PathBuf, meta: FileMetadata) -> FileId {
        let file_id = self.next_file_id;
        self.next_file_id += 1;

        self.files.insert(file_id, OpenFile { io, path, meta });
        file_id
    }

    fn open(&mut self, file_id: FileId) -> Result<&mut OpenFile, StoreError> {
        self.files
            .get_mut(&file_id)
            .ok_or(StoreError::UnknownFile(file_id))
    }

    fn offset_of(open: &OpenFile, page_no: PageNo) -> Result<u64, StoreError> {
        match open.meta.pages.get(&page_no) {
            Some(Some(offset)) => Ok(*offset),
            Some(None) => Err(StoreError::PageDeallocated {
                file: open.path.display().to_string(),
                page_no,
            }),
            None => Err(StoreError::PageNotAllocated {
                file: open.path.display().to_string(),
                page_no,
            }),
        }
    }
}

impl FileStore for DiskManager {
    fn allocate_page(&mut self, file_id: FileId) -> Result<Page, StoreError> {
        let open = self.open(file_id)?;

        // Reuse a deallocated slot before extending the file
        let (page_no, offset) = match open.meta.free_slots.pop_front() {
            Some((page_no, offset)) => {
                open.meta.pages.replace(page_no, Some(offset));
                (page_no, offset)
            }
            None => {
                let page_no = open.meta.pages.len() as PageNo;
                let offset = page_no as u64 * PAGE_SIZE as u64;
                open.meta.pages.insert(page_no, Some(offset));
                (page_no, offset)
            }
        };

        let page = Page::new(page_no);
        open.io.seek(SeekFrom::Start(offset))?;
        open.io.write_all(page.as_bytes())?;
        open.io.flush()?;

        Ok(page)
    }

    fn read_page(&mut self, file_id: FileId, page_no: PageNo) -> Result<Page, StoreError> {
        let open = self.open(file_id)?;
        let offset = Self::offset_of(open, page_no)?;

        let mut page = Page::default();
        open.io.seek(SeekFrom::Start(offset))?;
        open.io.read_exact(page.as_bytes_mut())?;

        Ok(page)
    }

    fn write_page(&mut self, file_id: FileId, page: &Page) -> Result<(), StoreError> {
        let open = self.open(file_id)?;
        let offset = Self::offset_of(open, page.page_number())?;

        open.io.seek(SeekFrom::Start(offset))?;
        open.io.write_all(page.as_bytes())?;
        open.io.flush()?;

        Ok(())
    }

    fn delete_page(&mut self, file_id: FileId, page_no: PageNo) -> Result<(), StoreError> {
        let open = self.open(file_id)?;
        let offset = Self::offset_of(open, page_no)?;

        open.meta.pages.replace(page_no, None);
        open.meta.free_slots.push_front((page_no, offset));

        Ok(())
    }

    fn filename(&self, file_id: FileId) -> String {
        match self.files.get(&file_id) {
            Some(open) => open.path.display().to_string(),
            None => format!("<unknown file {}>", file_id),
        }
    }
}

impl Default for DiskManager {
    fn default() -> Self {
        DiskManager::new()
    }
}
