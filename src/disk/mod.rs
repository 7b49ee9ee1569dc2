use std::fmt::Debug;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::buffer::page::{PageId, PAGE_SIZE};
use crate::error::Result;

pub mod file;
pub mod memory;

/// A disk manager moves whole pages between the buffer pool and stable
/// storage. Pages are addressed by id; the layout of the bytes inside a
/// page is opaque at this layer.
///
/// The trait is designed as `trait object` compatible so the buffer pool
/// can hold any implementation behind a Box.
pub trait DiskManager: Debug + Send + Sync {
    /// Fill the buffer with the content of the given page. A page that has
    /// never been written reads back as all zeroes.
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()>;

    /// Durably write a full page. The write may be buffered internally.
    fn write_page(&mut self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()>;

    /// Mark a page as free on stable storage. Advisory; an implementation
    /// may treat this as a no-op.
    fn deallocate_page(&mut self, page_id: PageId) -> Result<()>;
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskType {
    Memory,
    File,
}

pub fn new_disk_manager(typ: DiskType, path: &Path) -> Result<Box<dyn DiskManager>> {
    match typ {
        DiskType::Memory => Ok(Box::new(memory::MemoryDiskManager::new())),
        DiskType::File => Ok(Box::new(file::FileDiskManager::open(path)?)),
    }
}
