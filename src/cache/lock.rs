//! Lock acquisition that survives poisoning.
//!
//! Guarded state is only ever replaced as whole entries, so a poisoned lock
//! is logged and its inner value reused.

use std::sync::{LockResult, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

fn recover<G>(result: LockResult<G>, owner: &'static str, op: &'static str, kind: &str) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(
            target = "quay::lock",
            owner,
            op,
            lock_kind = kind,
            "recovered poisoned lock"
        );
        poisoned.into_inner()
    })
}

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    owner: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    recover(lock.read(), owner, op, "rwlock.read")
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    owner: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    recover(lock.write(), owner, op, "rwlock.write")
}

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    owner: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    recover(lock.lock(), owner, op, "mutex.lock")
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[test]
    fn write_after_poison_still_succeeds() {
        let lock = RwLock::new(Vec::<u8>::new());
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = lock.write().expect("first acquisition");
            panic!("poison the lock");
        }));
        assert!(lock.is_poisoned());

        rw_write(&lock, "test", "push").push(7);
        assert_eq!(*rw_read(&lock, "test", "read"), vec![7]);
    }

    #[test]
    fn mutex_after_poison_still_succeeds() {
        let lock = Mutex::new(0_u32);
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = lock.lock().expect("first acquisition");
            panic!("poison the mutex");
        }));

        *mutex_lock(&lock, "test", "incr") += 1;
        assert_eq!(*mutex_lock(&lock, "test", "read"), 1);
    }
}
