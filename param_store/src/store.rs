use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::region::SharedRegion;

/// The shared parameter buffer one training run revolves around.
///
/// The owning process calls [`SharedParams::share`] once to seed the file
/// with initial parameters; every worker then [`SharedParams::attach`]es to
/// the same path and trains straight into it. Nothing coordinates the
/// writers, which is exactly the training scheme: dense gradients race,
/// some updates get lost, and the model converges anyway.
pub struct SharedParams {
    region: SharedRegion,
    path: PathBuf,
}

impl SharedParams {
    /// Creates the backing file and seeds it with `initial`.
    ///
    /// Fails if the file already exists, so a run can only share one
    /// parameter buffer per path.
    pub fn share(path: &Path, initial: &[f32]) -> Result<Self> {
        let region = SharedRegion::create(path, initial.len())?;
        region.update(|params| params.copy_from_slice(initial));
        Ok(Self {
            region,
            path: path.to_path_buf(),
        })
    }

    /// Maps a buffer some other process already shared.
    ///
    /// # Arguments
    /// * `path` - The backing file the owning process created.
    /// * `len` - Expected parameter count; mismatches are rejected.
    pub fn attach(path: &Path, len: usize) -> Result<Self> {
        let region = SharedRegion::open(path, len)?;
        Ok(Self {
            region,
            path: path.to_path_buf(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.region.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `f` over the live parameters.
    pub fn with<T>(&self, f: impl FnOnce(&[f32]) -> T) -> T {
        self.region.with(f)
    }

    /// Runs `f` over the live parameters, mutably and without locking.
    pub fn update<T>(&self, f: impl FnOnce(&mut [f32]) -> T) -> T {
        self.region.update(f)
    }

    /// Copies the current parameters out of the mapping.
    ///
    /// Concurrent writers may still be running; the copy is a best-effort
    /// snapshot, not a consistent one.
    pub fn snapshot(&self) -> Vec<f32> {
        self.region.with(|params| params.to_vec())
    }

    /// Unmaps the buffer and deletes the backing file.
    pub fn remove(self) -> Result<()> {
        let Self { region, path } = self;
        drop(region);
        fs::remove_file(&path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreErr;

    fn scratch(name: &str) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("param-store-{}-{}", std::process::id(), name));
        fs::remove_file(&path).ok();
        path
    }

    #[test]
    fn share_seeds_the_file() {
        let path = scratch("seed");
        let initial = vec![1.0, 2.0, 3.0, 4.0];
        let store = SharedParams::share(&path, &initial).unwrap();

        assert_eq!(store.len(), 4);
        assert_eq!(store.snapshot(), initial);
        store.remove().unwrap();
    }

    #[test]
    fn share_twice_on_one_path_fails() {
        let path = scratch("once");
        let store = SharedParams::share(&path, &[0.0; 8]).unwrap();

        let err = SharedParams::share(&path, &[0.0; 8]).unwrap_err();
        assert!(matches!(err, StoreErr::Io(_)));
        store.remove().unwrap();
    }

    #[test]
    fn attached_handles_see_each_other() {
        let path = scratch("peers");
        let owner = SharedParams::share(&path, &[0.0; 4]).unwrap();
        let peer = SharedParams::attach(&path, 4).unwrap();

        peer.update(|params| params[1] = -7.25);

        assert_eq!(owner.with(|params| params[1]), -7.25);
        owner.remove().unwrap();
    }

    #[test]
    fn attach_rejects_a_wrong_length() {
        let path = scratch("reject");
        let store = SharedParams::share(&path, &[0.0; 6]).unwrap();

        let err = SharedParams::attach(&path, 7).unwrap_err();
        assert!(matches!(
            err,
            StoreErr::SizeMismatch {
                got: 6,
                expected: 7
            }
        ));
        store.remove().unwrap();
    }

    #[test]
    fn remove_deletes_the_backing_file() {
        let path = scratch("cleanup");
        let store = SharedParams::share(&path, &[0.0; 4]).unwrap();
        assert!(path.exists());

        store.remove().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn snapshot_is_detached_from_the_mapping() {
        let path = scratch("detach");
        let store = SharedParams::share(&path, &[5.0; 3]).unwrap();

        let copy = store.snapshot();
        store.update(|params| params[0] = 9.0);

        assert_eq!(copy, vec![5.0; 3]);
        assert_eq!(store.with(|params| params[0]), 9.0);
        store.remove().unwrap();
    }
}
