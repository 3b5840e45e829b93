use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

/// Acquires a read guard, recovering the inner value if a panicking writer
/// poisoned the lock. Cache contents are always safe to reuse.
pub(crate) fn rw_read<'a, T>(lock: &'a RwLock<T>, label: &'static str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(lock = label, "rwlock poisoned, recovering read guard");
            poisoned.into_inner()
        }
    }
}

pub(crate) fn rw_write<'a, T>(lock: &'a RwLock<T>, label: &'static str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(lock = label, "rwlock poisoned, recovering write guard");
            poisoned.into_inner()
        }
    }
}
