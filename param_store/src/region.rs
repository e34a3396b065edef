use std::cell::UnsafeCell;
use std::fs::OpenOptions;
use std::mem::size_of;
use std::path::Path;

use memmap2::MmapMut;

use crate::error::{Result, StoreErr};

/// A file-backed `f32` buffer shared between processes without locks.
///
/// It embraces race conditions: every mapped process reads and writes the
/// same pages simultaneously, and lost or torn updates are accepted. The
/// only consistency point is process exit, when the pages hold whatever
/// interleaving of writes won.
pub struct SharedRegion {
    len: usize,
    map: UnsafeCell<MmapMut>,
}

// SAFETY: the mapping is pinned for the region's life and all access runs
//         through `with`/`update`, which hand out short-lived views. Racing
//         views are the point of this type, not an accident.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Creates the backing file and maps it, zero-filled.
    ///
    /// # Arguments
    /// * `path` - Backing file location; must not exist yet.
    /// * `len` - Number of `f32` parameters the region holds.
    ///
    /// # Returns
    /// An error if the file already exists or the mapping fails.
    pub fn create(path: &Path, len: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.set_len((len * size_of::<f32>()) as u64)?;

        // SAFETY: the file was just created with the mapped size and stays
        //         alive through the mapping; concurrent mutation is accepted.
        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self {
            len,
            map: UnsafeCell::new(map),
        })
    }

    /// Maps an existing backing file another process created.
    ///
    /// # Returns
    /// `StoreErr::SizeMismatch` when the file length disagrees with `len`,
    /// so mapped slices can never run past the file.
    pub fn open(path: &Path, len: usize) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let bytes = file.metadata()?.len() as usize;
        if bytes != len * size_of::<f32>() {
            return Err(StoreErr::SizeMismatch {
                got: bytes / size_of::<f32>(),
                expected: len,
            });
        }

        // SAFETY: length was validated just above; shared mutation between
        //         processes is the contract of this type.
        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self {
            len,
            map: UnsafeCell::new(map),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Runs `f` over the live parameter slice.
    ///
    /// The values may change under `f` when other processes are training;
    /// callers treat what they read as a best-effort snapshot.
    pub fn with<T>(&self, f: impl FnOnce(&[f32]) -> T) -> T {
        // SAFETY: the mapping is valid for the region's life. The mmap base
        //         is page-aligned and the length is a multiple of 4 bytes,
        //         so the cast cannot fail.
        let map = unsafe { &*self.map.get() };
        f(bytemuck::cast_slice(&map[..]))
    }

    /// Runs `f` over the live parameter slice, mutably.
    ///
    /// No lock is taken; concurrent `update` calls from other processes
    /// interleave at whatever granularity the hardware provides.
    pub fn update<T>(&self, f: impl FnOnce(&mut [f32]) -> T) -> T {
        // SAFETY: as in `with`; overlapping writers are accepted.
        let map = unsafe { &mut *self.map.get() };
        f(bytemuck::cast_slice_mut(&mut map[..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("param-region-{}-{}", std::process::id(), name));
        fs::remove_file(&path).ok();
        path
    }

    #[test]
    fn create_zero_fills() {
        let path = scratch("zeroed");
        let region = SharedRegion::create(&path, 16).unwrap();

        assert_eq!(region.len(), 16);
        region.with(|p| assert!(p.iter().all(|&v| v == 0.0)));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn create_refuses_an_existing_file() {
        let path = scratch("exclusive");
        let _region = SharedRegion::create(&path, 4).unwrap();

        let err = SharedRegion::create(&path, 4).unwrap_err();
        assert!(matches!(err, StoreErr::Io(_)));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn open_validates_the_length() {
        let path = scratch("length");
        let _region = SharedRegion::create(&path, 8).unwrap();

        let err = SharedRegion::open(&path, 9).unwrap_err();
        assert!(matches!(
            err,
            StoreErr::SizeMismatch {
                got: 8,
                expected: 9
            }
        ));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn writes_are_visible_through_another_mapping() {
        let path = scratch("visible");
        let writer = SharedRegion::create(&path, 4).unwrap();
        let reader = SharedRegion::open(&path, 4).unwrap();

        writer.update(|p| p[2] = 42.5);

        assert_eq!(reader.with(|p| p[2]), 42.5);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = SharedRegion::open(Path::new("/nonexistent/params.bin"), 4).unwrap_err();
        assert!(matches!(err, StoreErr::Io(_)));
    }
}
