use super::{ByteOrder, ByteStore, HEADER_BYTES, HEADER_SLOT_COUNT};
use crate::error::Result;
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A file-backed [`ByteStore`] using a mutable memory map.
///
/// The backing file's layout is `[header: HEADER_BYTES][body: capacity() bytes]`.
/// Growth closes and remaps the file after extending it with
/// [`File::set_len`]; callers who care about remap cost should prefer
/// `inc_capacity` calls that request generous headroom (see
/// [`ByteStore::set_segment_size`]).
pub struct MmapByteStore {
    path: PathBuf,
    file: Option<File>,
    mmap: Option<MmapMut>,
    segment_size_hint: u64,
}

impl MmapByteStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            mmap: None,
            segment_size_hint: 0,
        }
    }

    fn body_len(&self) -> u64 {
        self.mmap
            .as_ref()
            .map_or(0, |m| (m.len() as u64).saturating_sub(HEADER_BYTES))
    }

    fn remap(&mut self, total_len: u64) -> Result<()> {
        let file = self.file.as_ref().expect("file must be open before remap");
        file.set_len(total_len)?;
        // SAFETY: the file is exclusively owned by this store for the
        // lifetime of the mapping (single-writer contract, §5), so there
        // is no concurrent modification for the mmap to race with.
        let mmap = unsafe { MmapMut::map_mut(file)? };
        self.mmap = Some(mmap);
        Ok(())
    }

    fn open_file(path: &Path) -> Result<File> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?)
    }

    fn header_slice(&self) -> &[u8] {
        &self.mmap.as_ref().expect("not open")[..HEADER_BYTES as usize]
    }

    fn header_slice_mut(&mut self) -> &mut [u8] {
        &mut self.mmap.as_mut().expect("not open")[..HEADER_BYTES as usize]
    }

    fn body_slice(&self) -> &[u8] {
        &self.mmap.as_ref().expect("not open")[HEADER_BYTES as usize..]
    }

    fn body_slice_mut(&mut self) -> &mut [u8] {
        &mut self.mmap.as_mut().expect("not open")[HEADER_BYTES as usize..]
    }
}

impl ByteStore for MmapByteStore {
    fn create(&mut self, initial_bytes: u64) -> Result<()> {
        let file = Self::open_file(&self.path)?;
        self.file = Some(file);
        self.remap(HEADER_BYTES + initial_bytes)?;
        self.header_slice_mut().fill(0);
        debug!(path = %self.path.display(), bytes = initial_bytes, "created mmap byte store");
        Ok(())
    }

    fn load_existing(&mut self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        let file = Self::open_file(&self.path)?;
        let len = file.metadata()?.len();
        if len < HEADER_BYTES {
            return Ok(false);
        }
        self.file = Some(file);
        // SAFETY: see the comment in `remap`.
        let mmap = unsafe { MmapMut::map_mut(self.file.as_ref().unwrap())? };
        self.mmap = Some(mmap);
        debug!(path = %self.path.display(), bytes = len, "loaded existing mmap byte store");
        Ok(true)
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(mmap) = &self.mmap {
            mmap.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.mmap = None;
        self.file = None;
        Ok(())
    }

    fn capacity(&self) -> u64 {
        self.body_len()
    }

    fn inc_capacity(&mut self, new_bytes: u64) -> Result<bool> {
        if new_bytes <= self.capacity() {
            return Ok(false);
        }
        let increment = self.segment_size_hint.max(new_bytes - self.capacity());
        let target_body = (self.capacity() + increment).max(new_bytes);
        self.remap(HEADER_BYTES + target_body)?;
        debug!(new_capacity = target_body, "grew mmap byte store");
        Ok(true)
    }

    fn trim_to(&mut self, bytes: u64) -> Result<()> {
        self.remap(HEADER_BYTES + bytes)
    }

    fn get_int(&self, offset: u64) -> i32 {
        let o = offset as usize;
        i32::from_le_bytes(self.body_slice()[o..o + 4].try_into().expect("4-byte slice"))
    }

    fn set_int(&mut self, offset: u64, value: i32) {
        let o = offset as usize;
        self.body_slice_mut()[o..o + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn get_bytes(&self, offset: u64, buf: &mut [u8]) {
        let o = offset as usize;
        buf.copy_from_slice(&self.body_slice()[o..o + buf.len()]);
    }

    fn set_bytes(&mut self, offset: u64, buf: &[u8]) {
        let o = offset as usize;
        self.body_slice_mut()[o..o + buf.len()].copy_from_slice(buf);
    }

    fn get_header(&self, slot_offset: u64) -> i32 {
        let o = slot_offset as usize;
        i32::from_le_bytes(self.header_slice()[o..o + 4].try_into().expect("4-byte slice"))
    }

    fn set_header(&mut self, slot_offset: u64, value: i32) {
        let o = slot_offset as usize;
        self.header_slice_mut()[o..o + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn set_segment_size(&mut self, bytes: u64) {
        self.segment_size_hint = bytes;
    }

    fn byte_order(&self) -> ByteOrder {
        ByteOrder::Little
    }
}

const _: () = assert!(HEADER_SLOT_COUNT * 4 == HEADER_BYTES as usize);

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nodes.dat");

        {
            let mut store = MmapByteStore::new(&path);
            store.create(32).unwrap();
            store.set_int(0, 1234);
            store.set_header(8, 77);
            store.flush().unwrap();
            store.close().unwrap();
        }

        let mut store = MmapByteStore::new(&path);
        assert!(store.load_existing().unwrap());
        assert_eq!(store.get_int(0), 1234);
        assert_eq!(store.get_header(8), 77);
    }

    #[test]
    fn grows_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("edges.dat");
        let mut store = MmapByteStore::new(&path);
        store.create(8).unwrap();
        store.set_int(4, 99);
        assert!(store.inc_capacity(256).unwrap());
        assert_eq!(store.get_int(4), 99);
    }
}
