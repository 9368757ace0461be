//! Advisory lock (fs2 flock) that keeps two interactive sessions of the same
//! user from writing the profile at once.

use anyhow::Result;
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::paths::Paths;

#[derive(Debug, Clone)]
pub struct ProfileLock {
    path: PathBuf,
}

/// Held for the life of a chat session; the lock is released on drop.
#[derive(Debug)]
pub struct ProfileLockGuard {
    file: File,
    path: PathBuf,
}

impl ProfileLockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProfileLockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!("Released profile lock {}", self.path.display());
    }
}

impl ProfileLock {
    /// Lock file lives in the runtime directory, or the state directory
    /// when there is none.
    pub fn for_user(paths: &Paths, user_id: &str) -> Result<Self> {
        Self::at(paths.profile_lock(user_id))
    }

    pub fn at(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Returns `None` when another process already holds the lock.
    pub fn try_acquire(&self) -> Result<Option<ProfileLockGuard>> {
        let file = File::create(&self.path)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired profile lock {}", self.path.display());
                Ok(Some(ProfileLockGuard {
                    file,
                    path: self.path.clone(),
                }))
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            #[cfg(unix)]
            Err(ref e) if e.raw_os_error() == Some(libc::EWOULDBLOCK) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_holder_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let lock = ProfileLock::at(tmp.path().join("run/profile-alice.lock")).unwrap();

        let guard = lock.try_acquire().unwrap();
        assert!(guard.is_some());

        let other = ProfileLock::at(tmp.path().join("run/profile-alice.lock")).unwrap();
        assert!(other.try_acquire().unwrap().is_none());

        drop(guard);
        assert!(other.try_acquire().unwrap().is_some());
    }

    #[test]
    fn users_do_not_contend() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::rooted_at(tmp.path());

        let alice = ProfileLock::for_user(&paths, "alice").unwrap();
        let bob = ProfileLock::for_user(&paths, "bob").unwrap();
        let _a = alice.try_acquire().unwrap().unwrap();
        let b = bob.try_acquire().unwrap().unwrap();
        assert!(b.path().ends_with("profile-bob.lock"));
    }

    #[test]
    fn lock_held_by_raw_file_is_respected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("held.lock");
        let file = File::create(&path).unwrap();
        file.lock_exclusive().unwrap();

        let lock = ProfileLock::at(path).unwrap();
        assert!(lock.try_acquire().unwrap().is_none());

        file.unlock().unwrap();
        assert!(lock.try_acquire().unwrap().is_some());
    }
}
