use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use log::debug;

use super::DiskManager;
use crate::buffer::page::{PageId, PAGE_SIZE};
use crate::error::{Error, Result};

/// A disk manager over a single database file. Page `p` lives at byte
/// offset `p * PAGE_SIZE`.
#[derive(Debug)]
pub struct FileDiskManager {
    path: PathBuf,
    file: File,
}

impl FileDiskManager {
    /// Open the database file at the given path, creating it if missing.
    pub fn open(path: &Path) -> Result<FileDiskManager> {
        let file = OpenOptions::new().read(true).write(true).create(true).open(path)?;
        debug!("opened database file {}", path.display());
        Ok(FileDiskManager { path: path.to_path_buf(), file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn offset(page_id: PageId) -> Result<u64> {
        if page_id < 0 {
            return Err(Error::internal(format!("invalid page id {}", page_id)));
        }
        Ok(page_id as u64 * PAGE_SIZE as u64)
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        self.file.seek(SeekFrom::Start(Self::offset(page_id)?))?;
        let mut filled = 0;
        while filled < PAGE_SIZE {
            let n = self.file.read(&mut buf[filled..])?;
            if n == 0 {
                // past the end of the file, the rest reads as zeroes
                break;
            }
            filled += n;
        }
        buf[filled..].fill(0);
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        self.file.seek(SeekFrom::Start(Self::offset(page_id)?))?;
        self.file.write_all(data)?;
        self.file.flush()?;
        Ok(())
    }

    fn deallocate_page(&mut self, _page_id: PageId) -> Result<()> {
        // the file layer does not reclaim page slots
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use rand::Rng;

    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(name)
    }

    fn random_page() -> [u8; PAGE_SIZE] {
        let mut data = [0u8; PAGE_SIZE];
        rand::thread_rng().fill(&mut data[..]);
        data
    }

    #[test]
    fn test_read_past_eof() -> Result<()> {
        let path = temp_path("pagepool_disk_read_past_eof.db");
        let mut disk = FileDiskManager::open(&path)?;

        let mut buf = [1u8; PAGE_SIZE];
        disk.read_page(5, &mut buf)?;
        assert_eq!([0u8; PAGE_SIZE], buf);

        fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn test_read_write() -> Result<()> {
        let path = temp_path("pagepool_disk_read_write.db");
        let mut disk = FileDiskManager::open(&path)?;

        let data = random_page();
        disk.write_page(1, &data)?;

        let mut buf = [0u8; PAGE_SIZE];
        disk.read_page(1, &mut buf)?;
        assert_eq!(data, buf);

        fs::remove_file(disk.path())?;
        Ok(())
    }

    #[test]
    fn test_pages_do_not_overlap() -> Result<()> {
        let path = temp_path("pagepool_disk_pages_do_not_overlap.db");
        let mut disk = FileDiskManager::open(&path)?;

        let two = random_page();
        let three = random_page();
        disk.write_page(2, &two)?;
        disk.write_page(3, &three)?;

        let mut buf = [0u8; PAGE_SIZE];
        disk.read_page(2, &mut buf)?;
        assert_eq!(two, buf);
        disk.read_page(3, &mut buf)?;
        assert_eq!(three, buf);

        // the gap before page 2 reads back zeroed.
        disk.read_page(1, &mut buf)?;
        assert_eq!([0u8; PAGE_SIZE], buf);

        fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn test_negative_page_id() {
        let path = temp_path("pagepool_disk_negative_page_id.db");
        let mut disk = FileDiskManager::open(&path).unwrap();

        let mut buf = [0u8; PAGE_SIZE];
        assert!(disk.read_page(-1, &mut buf).is_err());

        fs::remove_file(&path).unwrap();
    }
}
