//! Advisory file locks shared by the JSONL stores.
//!
//! Every process opening the same store root takes the lock on one `.lock`
//! file, so check-then-write sequences stay atomic across instances and
//! processes. The lock is released when the guard drops.

use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Held advisory lock on a lock file.
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Block until no other holder has the lock.
    pub fn exclusive(path: &Path) -> io::Result<Self> {
        let file = open_lock_file(path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { file })
    }

    /// Block until no exclusive holder remains. Shared holders coexist.
    pub fn shared(path: &Path) -> io::Result<Self> {
        let file = open_lock_file(path)?;
        FileExt::lock_shared(&file)?;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
}

#[cfg(test)]
mod tests {
    use super::FileLock;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn exclusive_lock_blocks_other_handles() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("store.lock");
        let released = Arc::new(AtomicBool::new(false));

        let guard = FileLock::exclusive(&path).expect("first lock");
        let waiter = {
            let path = path.clone();
            let released = released.clone();
            thread::spawn(move || {
                let _second = FileLock::exclusive(&path).expect("second lock");
                released.load(Ordering::SeqCst)
            })
        };
        thread::sleep(Duration::from_millis(100));
        released.store(true, Ordering::SeqCst);
        drop(guard);
        assert!(waiter.join().expect("join"));
    }

    #[test]
    fn shared_locks_coexist() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("store.lock");
        let _a = FileLock::shared(&path).expect("a");
        let _b = FileLock::shared(&path).expect("b");
    }
}
