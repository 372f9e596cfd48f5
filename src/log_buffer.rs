//! Shared append-only log buffer for running jobs.
//!
//! Every job owns a [`LogBuffer`]; the action writes into it while
//! inspectors snapshot it from other tasks mid-flight. Appends and
//! snapshots go through one internal mutex, so a reader never observes a
//! torn write. Once the job terminates the final snapshot is persisted and
//! later readers consume the stored blob instead.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

/// Concurrency-safe growable byte buffer.
///
/// Cloning is cheap and produces a handle to the same underlying bytes.
///
/// # Examples
///
/// ```
/// use publisher_tasks::LogBuffer;
///
/// let buffer = LogBuffer::new();
/// buffer.append(b"hello ");
/// buffer.append(b"world");
/// assert_eq!(buffer.snapshot(), b"hello world");
/// ```
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl LogBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` to the buffer.
    pub fn append(&self, bytes: &[u8]) {
        self.lock().extend_from_slice(bytes);
    }

    /// Appends a string slice to the buffer.
    pub fn append_str(&self, text: &str) {
        self.append(text.as_bytes());
    }

    /// Returns a copy of everything appended so far.
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Returns the number of bytes appended so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns an [`io::Write`] adapter over this buffer, for actions that
    /// feed writer-shaped sinks.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::Write;
    /// use publisher_tasks::LogBuffer;
    ///
    /// let buffer = LogBuffer::new();
    /// writeln!(buffer.writer(), "step {} done", 1).unwrap();
    /// assert_eq!(buffer.snapshot(), b"step 1 done\n");
    /// ```
    pub fn writer(&self) -> LogWriter {
        LogWriter {
            buffer: self.clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        // The guarded section never panics, but a poisoned buffer is still
        // readable bytes.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// [`io::Write`] adapter produced by [`LogBuffer::writer`].
#[derive(Debug)]
pub struct LogWriter {
    buffer: LogBuffer,
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.append(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
