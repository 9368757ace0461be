//! Cross-process coordination.

mod profile_lock;

pub use profile_lock::{ProfileLock, ProfileLockGuard};
