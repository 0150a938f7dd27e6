//! # Cyclic Buffer Module
//!
//! Fixed-capacity ring of raw bytes bridging the variable-sized chunks
//! delivered by the audio callback to the fixed-size frames the pitch
//! estimator wants.
//!
//! The buffer does no locking of its own. The worker wraps it in a mutex
//! that is held only for the duration of a single `append` or
//! `copy_last_bytes` call.

/// Byte ring buffer with an append-only write cursor.
///
/// Readable history is `capacity` bytes once the cursor has wrapped at least
/// once, and `cursor` bytes before that.
#[derive(Debug, Clone)]
pub struct CyclicBuffer {
    buffer: Box<[u8]>,
    /// Index of the next byte to write.
    cursor: usize,
    /// Set once every byte of `buffer` holds written data.
    filled_once: bool,
}

impl CyclicBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            cursor: 0,
            filled_once: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of valid bytes of history currently held.
    pub fn len(&self) -> usize {
        if self.filled_once {
            self.capacity()
        } else {
            self.cursor
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `src`, overwriting the oldest bytes once full.
    ///
    /// Writing `capacity` bytes or more keeps only the trailing `capacity`
    /// bytes of `src`.
    pub fn append(&mut self, src: &[u8]) {
        let capacity = self.capacity();

        if src.len() >= capacity {
            let offset = src.len() - capacity;
            self.buffer.copy_from_slice(&src[offset..]);
            self.cursor = 0;
            self.filled_once = true;
            return;
        }

        let right_len = capacity - self.cursor;
        if src.len() < right_len {
            self.buffer[self.cursor..self.cursor + src.len()].copy_from_slice(src);
            self.cursor += src.len();
        } else {
            // Fill up to the end, then wrap.
            let (right, remaining) = src.split_at(right_len);
            self.buffer[self.cursor..].copy_from_slice(right);
            self.buffer[..remaining.len()].copy_from_slice(remaining);
            self.cursor = remaining.len();
            self.filled_once = true;
        }
    }

    /// Copies the most recently written bytes into `dst`, oldest first.
    ///
    /// At most `min(dst.len(), self.len())` bytes are copied; the rest of
    /// `dst` is left untouched.
    ///
    /// # Returns
    /// * The number of bytes actually copied
    pub fn copy_last_bytes(&self, dst: &mut [u8]) -> usize {
        let copied = dst.len().min(self.len());

        if copied <= self.cursor {
            dst[..copied].copy_from_slice(&self.buffer[self.cursor - copied..self.cursor]);
        } else {
            // More than `cursor` bytes of history means the buffer has wrapped.
            debug_assert!(self.filled_once);
            let right_len = copied - self.cursor;
            let right_start = self.capacity() - right_len;
            dst[..right_len].copy_from_slice(&self.buffer[right_start..]);
            dst[right_len..copied].copy_from_slice(&self.buffer[..self.cursor]);
        }

        copied
    }
}
