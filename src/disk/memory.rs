use std::collections::HashMap;

use super::DiskManager;
use crate::buffer::page::{PageId, PAGE_SIZE};
use crate::error::Result;

/// An in-memory disk manager backed by a hash map, one entry per page.
/// Useful for tests and ephemeral databases.
#[derive(Debug)]
pub struct MemoryDiskManager {
    pages: HashMap<PageId, Box<[u8; PAGE_SIZE]>>,
}

impl MemoryDiskManager {
    pub fn new() -> MemoryDiskManager {
        MemoryDiskManager { pages: HashMap::new() }
    }
}

impl Default for MemoryDiskManager {
    fn default() -> Self {
        MemoryDiskManager::new()
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        match self.pages.get(&page_id) {
            Some(data) => buf.copy_from_slice(&data[..]),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        self.pages.insert(page_id, Box::new(*data));
        Ok(())
    }

    fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        self.pages.remove(&page_id);
        Ok(())
    }
}
