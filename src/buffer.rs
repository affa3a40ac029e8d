//! Receive buffer for a single response frame

use log::warn;

use crate::frame::{END, HEADER};

const INITIAL_CAPACITY: usize = 32;

/// Collects the bytes of one frame as they arrive from the module.
///
/// Bytes seen before the 0xBB start marker are dropped. Appending the 0x7E
/// end marker closes the accumulator; later bytes are refused until `reset`.
#[derive(Debug)]
pub struct ByteAccumulator {
    data: Vec<u8>,
    closed: bool,
}

impl ByteAccumulator {
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(INITIAL_CAPACITY),
            closed: false,
        }
    }

    /// Append one byte. Returns `false` if the frame is already closed.
    pub fn append(&mut self, byte: u8) -> bool {
        if self.closed {
            return false;
        }

        if self.data.is_empty() && byte != HEADER {
            warn!("Dropping 0x{:02X} received before start marker", byte);
            return true;
        }

        if self.data.len() == self.data.capacity() {
            // Doubling keeps appends amortized O(1)
            let grow_by = self.data.capacity().max(INITIAL_CAPACITY);
            self.data.reserve_exact(grow_by);
        }
        self.data.push(byte);

        if byte == END {
            self.closed = true;
        }
        true
    }

    /// Forget the current frame, keeping the allocation for the next request.
    pub fn reset(&mut self) {
        self.data.clear();
        self.closed = false;
    }

    /// Accept more bytes after an end marker that turned out to be payload.
    pub(crate) fn reopen(&mut self) {
        self.closed = false;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }
}

impl Default for ByteAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
