//! Process-wide cap on simultaneously open batch file handles.

use std::sync::Mutex;

use crate::{CliError, CliResult};

pub const DEFAULT_MAX_OPEN_FILES: usize = 500;

/// A `Mutex<usize>` counter bounding how many `Batch` files may be open for
/// reading or writing at once. Batches cooperate with it: opening blocks on
/// the lock, never on I/O, and a batch that wants to keep its handle past
/// the cap must close and reopen later (see `Batch::open_for_read`).
#[derive(Debug)]
pub struct FileHandleArbiter {
    cap: usize,
    count: Mutex<usize>,
}

impl FileHandleArbiter {
    pub fn new(cap: usize) -> Self {
        FileHandleArbiter {
            cap: cap.max(1),
            count: Mutex::new(0),
        }
    }

    /// Reserves one handle slot. Fails rather than blocking indefinitely:
    /// callers are expected to close other handles first when the cap is
    /// tight, not to wait on this arbiter to free one up on its own.
    pub fn acquire(&self) -> CliResult<()> {
        let mut count = self.count.lock().unwrap();
        if *count >= self.cap {
            return Err(CliError::Other(format!(
                "open file handle cap ({}) would be exceeded",
                self.cap
            )));
        }
        *count += 1;
        assert!(
            *count <= self.cap,
            "file handle arbiter exceeded its cap of {}",
            self.cap
        );
        Ok(())
    }

    pub fn release(&self) {
        let mut count = self.count.lock().unwrap();
        assert!(
            *count > 0,
            "file handle arbiter released a handle it never granted"
        );
        *count -= 1;
    }

    pub fn is_full(&self) -> bool {
        *self.count.lock().unwrap() >= self.cap
    }

    pub fn current(&self) -> usize {
        *self.count.lock().unwrap()
    }
}
