use std::sync::{Arc, Mutex};

use log::debug;

use crate::container::hash::SyncExtendibleHashTable;
use crate::disk::DiskManager;
use crate::error::{Error, Result};

use super::page::{FrameId, Page, PageId};
use super::replacer::Replacer;
use super::replacer::SyncLRUKReplacer;

/// The buffer pool is responsible for moving physical pages back and forth
/// from main memory to disk. It allows a DBMS to support databases that are
/// larger than the amount of memory available to the system.
///
/// The buffer pool's operations are transparent to other parts in the system.
/// For example, the system asks the buffer pool for a page using its unique
/// identifier (page_id) and it does not know whether that page is already in
/// memory or whether the system has to retrieve it from disk.
struct BufferPool {
    pool_size: usize,
    /// The disk collaborator pages are read from and written back to.
    disk: Box<dyn DiskManager>,
    /// array of buffer pool pages. use the array index as
    /// FrameId, i.e., the FrameId is in range: [0, pool_size).
    pages: Vec<Arc<Page>>,
    /// page table for keeping track of buffer pool pages.
    page_table: SyncExtendibleHashTable<PageId, FrameId>,
    /// list of free frames that don't have any pages on them.
    free_list: Vec<FrameId>,
    /// Replacer to find unpinned pages for replacement.
    replacer: Arc<dyn Replacer>,
    /// The next page id to be allocated.
    next_page_id: PageId,
}

impl BufferPool {
    fn new(
        disk: Box<dyn DiskManager>,
        pool_size: usize,
        replacer_k: usize,
        bucket_capacity: usize,
    ) -> Self {
        let mut pages = Vec::with_capacity(pool_size);
        let mut free_list = Vec::with_capacity(pool_size);
        let page_table = SyncExtendibleHashTable::new(bucket_capacity);
        let replacer: Arc<dyn Replacer> = Arc::new(SyncLRUKReplacer::new(replacer_k, pool_size));
        for i in 0..pool_size {
            pages.push(Arc::new(Page::new()));
            // initially, every frame is in the free list
            free_list.push(i);
        }
        BufferPool { pool_size, disk, pages, page_table, free_list, replacer, next_page_id: 0 }
    }

    /// Pick a frame for a new resident page: from the free list when one is
    /// available, otherwise by evicting a victim. A dirty victim is written
    /// back to disk before its frame is handed out, and the victim page is
    /// unlinked from the page table.
    fn acquire_frame(&mut self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.pop() {
            return Ok(frame_id);
        }
        let frame_id = match self.replacer.evict() {
            Some(frame_id) => frame_id,
            None => return Err(Error::PoolExhausted),
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        if guard.is_dirty {
            debug!("writing back dirty page {} evicted from frame {}", guard.id, frame_id);
            self.disk.write_page(guard.id, &guard.data)?;
            guard.is_dirty = false;
        }
        self.page_table.remove(&guard.id);
        Ok(frame_id)
    }

    /// Create a new page in the buffer pool, return the newly created page or
    /// Error::PoolExhausted if all frames are currently in use and not
    /// evictable (in other words, pinned).
    ///
    /// The new page id comes from the pool-owned counter. The frame is zeroed,
    /// pinned with an initial count of 1, and registered with the replacer as
    /// accessed and non-evictable.
    fn new_page(&mut self) -> Result<Arc<Page>> {
        let frame_id = self.acquire_frame()?;
        let page_id = self.allocate_page();
        // link the new page with the frame into the page table. if the
        // table cannot take the key, put the frame back on the free list
        // so the pool does not leak it.
        if let Err(err) = self.page_table.insert(page_id, frame_id) {
            self.free_list.push(frame_id);
            return Err(err);
        }

        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        // clean page frame first
        guard.clear();
        guard.id = page_id;
        // pin the new page with initial value 1
        guard.pin_count = 1;
        // record frame access
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);

        drop(guard);
        Ok(page)
    }

    /// Fetch the requested page with the given page id from the buffer pool.
    /// Return Error::PoolExhausted if the page needs to be fetched from disk
    /// but all frames are currently in use and not evictable.
    ///
    /// First search for page_id in the page table. if not found, pick a
    /// replacement frame with acquire_frame, read the page from disk into the
    /// frame and link it into the page table.
    fn fetch_page(&mut self, page_id: PageId) -> Result<Arc<Page>> {
        // check if the page table has the page id
        if let Some(frame_id) = self.page_table.find(&page_id) {
            // we have the page frame in the buffer pool already,
            // increase pin count, record frame access then return it.
            let page = Arc::clone(&self.pages[frame_id]);
            let mut guard = page.write()?;
            guard.pin_count += 1;
            self.replacer.record_access(frame_id);
            self.replacer.set_evictable(frame_id, false);

            drop(guard);
            return Ok(page);
        }

        let frame_id = self.acquire_frame()?;
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        // clean page frame first, then fetch the page from disk
        guard.clear();
        if let Err(err) = self.disk.read_page(page_id, &mut guard.data) {
            self.free_list.push(frame_id);
            return Err(err);
        }
        // link the new page with the frame into the page table before
        // marking the frame resident. if the table cannot take the key,
        // put the frame back on the free list so the pool does not leak
        // it.
        if let Err(err) = self.page_table.insert(page_id, frame_id) {
            guard.clear();
            self.free_list.push(frame_id);
            return Err(err);
        }
        guard.id = page_id;
        guard.pin_count = 1;
        // record frame access
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);

        drop(guard);
        Ok(page)
    }

    /// Unpin the target page from the buffer pool. If page_id is not in the
    /// buffer pool or its pin count is already 0, return false.
    ///
    /// Decrement the pin count of the page. If the pin count reaches 0, the
    /// frame becomes evictable by the replacer. The dirty flag is sticky: an
    /// unpin with is_dirty = false leaves a previously set flag alone, only
    /// flush_page clears it.
    fn unpin_page(&mut self, page_id: PageId, is_dirty: bool) -> bool {
        let frame_id = match self.page_table.find(&page_id) {
            Some(frame_id) => frame_id,
            None => return false,
        };
        let page = &self.pages[frame_id];
        let mut guard = page.write().unwrap();
        if guard.pin_count == 0 {
            return false;
        }
        guard.pin_count -= 1;
        if guard.pin_count == 0 {
            self.replacer.set_evictable(frame_id, true);
        }
        if is_dirty {
            guard.is_dirty = true;
        }
        true
    }

    /// Flush the target page to disk regardless of the dirty flag.
    /// unset the dirty flag of the page after flushing.
    ///
    /// Return false if the page cannot be found in the page table,
    /// true otherwise.
    fn flush_page(&mut self, page_id: PageId) -> Result<bool> {
        let frame_id = match self.page_table.find(&page_id) {
            Some(frame_id) => frame_id,
            None => return Ok(false),
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;

        self.disk.write_page(guard.id, &guard.data)?;
        guard.is_dirty = false;

        Ok(true)
    }

    /// Flush all the pages resident in the buffer pool to disk.
    fn flush_all_pages(&mut self) -> Result<()> {
        for (_, frame_id) in self.page_table.entries() {
            let page = Arc::clone(&self.pages[frame_id]);
            let mut guard = page.write()?;

            self.disk.write_page(guard.id, &guard.data)?;
            guard.is_dirty = false;
        }
        Ok(())
    }

    /// Delete a page from the buffer pool. if the page is not in the buffer
    /// pool, do nothing and return true. if the page is pinned and cannot be
    /// deleted, return false immediately.
    ///
    /// After deleting the page from the page table, stop tracking the frame
    /// in the replacer and add the frame back to the free list. Also reset
    /// the frame's memory and metadata, and tell the disk layer the page can
    /// be reclaimed.
    fn delete_page(&mut self, page_id: PageId) -> Result<bool> {
        let frame_id = match self.page_table.find(&page_id) {
            Some(frame_id) => frame_id,
            None => return Ok(true),
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        if guard.pin_count > 0 {
            return Ok(false);
        }
        // an unpinned resident frame is always tracked as evictable
        assert!(self.replacer.is_evictable(frame_id));
        // unlink the page from the page table
        self.page_table.remove(&page_id);
        // remove the frame access history from the replacer
        self.replacer.remove(frame_id);
        // add the frame back to the free list
        self.free_list.push(frame_id);
        // clean the page frame
        guard.clear();
        self.disk.deallocate_page(page_id)?;

        Ok(true)
    }

    fn allocate_page(&mut self) -> PageId {
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        page_id
    }
}

/// Buffer pool manager wraps the buffer pool with a mutex for concurrent
/// access, basically all the heavy lifting happens in the buffer pool.
pub struct BufferPoolManager {
    /// hold the actual buffer pool protected by a mutex latch.
    inner: Arc<Mutex<BufferPool>>,
}

impl BufferPoolManager {
    pub fn new(
        disk: Box<dyn DiskManager>,
        pool_size: usize,
        replacer_k: usize,
        bucket_capacity: usize,
    ) -> Self {
        let inner = BufferPool::new(disk, pool_size, replacer_k, bucket_capacity);
        BufferPoolManager { inner: Arc::new(Mutex::new(inner)) }
    }

    /// Number of frames the pool was created with.
    pub fn pool_size(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.pool_size
    }

    /// Create a new page in the buffer pool.
    pub fn new_page(&self) -> Result<Arc<Page>> {
        let mut inner = self.inner.lock()?;
        inner.new_page()
    }

    /// Fetch the requested page with the given page id from the buffer pool.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Arc<Page>> {
        let mut inner = self.inner.lock()?;
        inner.fetch_page(page_id)
    }

    /// Unpin the target page from the buffer pool. If page_id is not in the
    /// buffer pool or its pin count is already 0, return false.
    ///
    /// Decrement the pin count of the page. If the pin count reaches 0, the
    /// frame becomes evictable by the replacer. Passing is_dirty = true marks
    /// the page dirty; passing false leaves the flag as it was.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.unpin_page(page_id, is_dirty)
    }

    /// Flush the target page to disk regardless of the dirty flag.
    /// unset the dirty flag of the page after flushing.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.flush_page(page_id)
    }

    /// Flush all the pages resident in the buffer pool to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.flush_all_pages()
    }

    /// Delete a page from the buffer pool. if the page is not in the buffer
    /// pool, do nothing and return true. if the page is pinned and cannot be
    /// deleted, return false immediately.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.delete_page(page_id)
    }
}
