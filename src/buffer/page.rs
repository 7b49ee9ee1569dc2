use std::ops::Deref;
use std::sync::RwLock;

pub type PageId = i64;

/// Frames are identified by their index in the buffer pool's frame array,
/// i.e., a FrameId is in range [0, pool_size).
pub type FrameId = usize;

/// Size of a data page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Invalid page id, marks a frame that holds no page.
pub const INVALID_PAGE_ID: PageId = -1;

/// The actual page data that include in-memory metadata
/// like dirty bit and pin count etc. and the bytes on storage.
pub struct PageData {
    pub id: PageId,
    pub data: [u8; PAGE_SIZE],
    pub is_dirty: bool,
    pub pin_count: u32,
}

impl PageData {
    fn new() -> Self {
        Self {
            id: INVALID_PAGE_ID,
            data: [0; PAGE_SIZE],
            is_dirty: false,
            pin_count: 0,
        }
    }

    /// Reset the frame to its initial state: no page, no pins, not dirty,
    /// all bytes zeroed.
    pub fn clear(&mut self) {
        self.id = INVALID_PAGE_ID;
        self.is_dirty = false;
        self.pin_count = 0;
        self.data.fill(0);
    }
}

/// Page act as the container of the actual page data for
/// providing concurrent access protection.
pub struct Page {
    inner: RwLock<PageData>,
}

impl Page {
    /// Allocate a page frame in memory with PAGE_SIZE zeroed bytes and
    /// init the metadata accordingly.
    pub fn new() -> Self {
        Page { inner: RwLock::new(PageData::new()) }
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new()
    }
}

impl Deref for Page {
    type Target = RwLock<PageData>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
