use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::storage::disk::{FileId, FileStore, StoreError};
use crate::storage::page::page::{Page, PageNo};

/// In-memory store that records every call, so tests can assert on what
/// the cache actually asked of it.
pub struct MemStore {
    files: HashMap<FileId, HashMap<PageNo, Page>>,
    next_page: HashMap<FileId, PageNo>,
    next_file: FileId,

    pub reads: Vec<(FileId, PageNo)>,
    pub writes: Vec<(FileId, PageNo, Vec<u8>)>,
    pub deletes: Vec<(FileId, PageNo)>,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore {
            files: HashMap::new(),
            next_page: HashMap::new(),
            next_file: 0,
            reads: Vec::new(),
            writes: Vec::new(),
            deletes: Vec::new(),
        }
    }

    pub fn create_file(&mut self) -> FileId {
        let file_id = self.next_file;
        self.next_file += 1;
        self.files.insert(file_id, HashMap::new());
        self.next_page.insert(file_id, 0);
        file_id
    }

    pub fn reads_of(&self, file_id: FileId, page_no: PageNo) -> usize {
        self.reads
            .iter()
            .filter(|call| **call == (file_id, page_no))
            .count()
    }

    pub fn writes_of(&self, file_id: FileId, page_no: PageNo) -> usize {
        self.writes
            .iter()
            .filter(|(f, p, _)| (*f, *p) == (file_id, page_no))
            .count()
    }

    pub fn last_write(&self, file_id: FileId, page_no: PageNo) -> Option<&[u8]> {
        self.writes
            .iter()
            .rev()
            .find(|(f, p, _)| (*f, *p) == (file_id, page_no))
            .map(|(_, _, bytes)| bytes.as_slice())
    }

    pub fn stored_contents(&self, file_id: FileId, page_no: PageNo) -> Option<Vec<u8>> {
        self.files
            .get(&file_id)
            .and_then(|pages| pages.get(&page_no))
            .map(|page| page.contents().to_vec())
    }

    fn pages_mut(&mut self, file_id: FileId) -> Result<&mut HashMap<PageNo, Page>, StoreError> {
        self.files
            .get_mut(&file_id)
            .ok_or(StoreError::UnknownFile(file_id))
    }
}

impl FileStore for MemStore {
    fn allocate_page(&mut self, file_id: FileId) -> Result<Page, StoreError> {
        if !self.files.contains_key(&file_id) {
            return Err(StoreError::UnknownFile(file_id));
        }

        let counter = self.next_page.entry(file_id).or_insert(0);
        let page_no = *counter;
        *counter += 1;

        let page = Page::new(page_no);
        self.pages_mut(file_id)?.insert(page_no, page.clone());
        Ok(page)
    }

    fn read_page(&mut self, file_id: FileId, page_no: PageNo) -> Result<Page, StoreError> {
        self.reads.push((file_id, page_no));

        let name = self.filename(file_id);
        self.files
            .get(&file_id)
            .ok_or(StoreError::UnknownFile(file_id))?
            .get(&page_no)
            .cloned()
            .ok_or(StoreError::PageNotAllocated {
                file: name,
                page_no,
            })
    }

    fn write_page(&mut self, file_id: FileId, page: &Page) -> Result<(), StoreError> {
        let page_no = page.page_number();
        self.writes
            .push((file_id, page_no, page.as_bytes().to_vec()));

        let name = self.filename(file_id);
        let pages = self.pages_mut(file_id)?;
        if !pages.contains_key(&page_no) {
            return Err(StoreError::PageNotAllocated {
                file: name,
                page_no,
            });
        }
        pages.insert(page_no, page.clone());
        Ok(())
    }

    fn delete_page(&mut self, file_id: FileId, page_no: PageNo) -> Result<(), StoreError> {
        self.deletes.push((file_id, page_no));

        let name = self.filename(file_id);
        match self.pages_mut(file_id)?.remove(&page_no) {
            Some(_) => Ok(()),
            None => Err(StoreError::PageNotAllocated {
                file: name,
                page_no,
            }),
        }
    }

    fn filename(&self, file_id: FileId) -> String {
        format!("memfile-{}", file_id)
    }
}

/// A pool over a fresh MemStore with one file, keeping the typed store
/// handle around for inspection.
pub fn pool_with(pool_size: usize) -> (Rc<RefCell<MemStore>>, BufferPoolManager, FileId) {
    let store = Rc::new(RefCell::new(MemStore::new()));
    let file_id = store.borrow_mut().create_file();
    let bpm = BufferPoolManager::new(pool_size, store.clone());
    (store, bpm, file_id)
}

/// Extends the file with `count` pages directly in the store, bypassing
/// the cache, and returns their numbers.
pub fn seed_pages(
    store: &Rc<RefCell<MemStore>>,
    file_id: FileId,
    count: usize,
) -> Vec<PageNo> {
    let mut store = store.borrow_mut();
    (0..count)
        .map(|_| {
            store
                .allocate_page(file_id)
                .expect("seeding page")
                .page_number()
        })
        .collect()
}
