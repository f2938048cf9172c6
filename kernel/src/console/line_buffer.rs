//! Bounded circular byte buffer backing each terminal's cooked-mode input.
//!
//! Grounded on the teacher's fixed-size ring-buffer pattern in
//! `drivers/keyboard.rs` (`KeyBuffer`), generalized from a lock-free
//! single-producer/single-consumer byte queue into the richer
//! put/get/peek-tail/pop-tail/find shape the line discipline needs; this
//! buffer is always accessed with interrupts disabled, so it carries no
//! atomics of its own.

use crate::config::LINE_BUFFER_CAPACITY;

/// A fixed-capacity circular buffer. Owns its backing bytes; never
/// allocates. Invariant: `0 <= len <= CAP`.
pub struct LineBuffer {
    bytes: [u8; LINE_BUFFER_CAPACITY],
    head: usize,
    len: usize,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0; LINE_BUFFER_CAPACITY],
            head: 0,
            len: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        LINE_BUFFER_CAPACITY
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    fn index_of(&self, offset: usize) -> usize {
        (self.head + offset) % self.capacity()
    }

    /// Append `byte` at the tail. Fails (returns `false`, buffer
    /// unchanged) if the buffer is already at capacity.
    pub fn put_byte(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        let idx = self.index_of(self.len);
        self.bytes[idx] = byte;
        self.len += 1;
        true
    }

    /// Append as many bytes of `data` as fit; returns the count actually
    /// written.
    pub fn put(&mut self, data: &[u8]) -> usize {
        let mut written = 0;
        for &b in data {
            if !self.put_byte(b) {
                break;
            }
            written += 1;
        }
        written
    }

    /// Remove and return the byte at the head (FIFO order).
    pub fn get_byte(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.bytes[self.head];
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        Some(byte)
    }

    /// Remove and copy up to `out.len()` bytes from the head into `out`;
    /// returns the count copied.
    pub fn get(&mut self, out: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < out.len() {
            match self.get_byte() {
                Some(b) => {
                    out[copied] = b;
                    copied += 1;
                }
                None => break,
            }
        }
        copied
    }

    /// The most recently appended byte, without removing it.
    pub fn peek_tail(&self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        Some(self.bytes[self.index_of(self.len - 1)])
    }

    /// Remove and return the most recently appended byte.
    pub fn pop_tail(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.bytes[self.index_of(self.len - 1)];
        self.len -= 1;
        Some(byte)
    }

    /// Offset of the first occurrence of `needle` from the head, if any.
    pub fn find(&self, needle: u8) -> Option<usize> {
        for offset in 0..self.len {
            if self.bytes[self.index_of(offset)] == needle {
                return Some(offset);
            }
        }
        None
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Copy the buffer's current contents, head to tail, into `out`
    /// without consuming them. Used for Ctrl+L replay.
    pub fn copy_unconsumed(&self, out: &mut [u8]) -> usize {
        let n = self.len.min(out.len());
        for i in 0..n {
            out[i] = self.bytes[self.index_of(i)];
        }
        n
    }
}

/// Writes formatted text into a caller-owned byte slice, truncating
/// silently past its end. Used where a one-line message needs building
/// with `core::fmt::write` but there is no heap to collect it into.
pub struct SliceWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> SliceWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

impl core::fmt::Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let remaining = self.buf.len() - self.len;
        let n = remaining.min(s.len());
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_round_trip() {
        let mut buf = LineBuffer::new();
        assert!(buf.put_byte(b'h'));
        assert!(buf.put_byte(b'i'));
        assert_eq!(buf.len(), 2);
        let mut out = [0u8; 2];
        assert_eq!(buf.get(&mut out), 2);
        assert_eq!(&out, b"hi");
        assert!(buf.is_empty());
    }

    #[test]
    fn put_fails_when_full() {
        let mut buf = LineBuffer::new();
        for _ in 0..buf.capacity() {
            assert!(buf.put_byte(b'x'));
        }
        assert!(!buf.put_byte(b'y'));
        assert_eq!(buf.len(), buf.capacity());
    }

    #[test]
    fn pop_tail_is_lifo() {
        let mut buf = LineBuffer::new();
        buf.put(b"abc");
        assert_eq!(buf.pop_tail(), Some(b'c'));
        assert_eq!(buf.peek_tail(), Some(b'b'));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn pop_tail_on_empty_is_noop() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.pop_tail(), None);
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn find_locates_newline() {
        let mut buf = LineBuffer::new();
        buf.put(b"ls\n");
        assert_eq!(buf.find(b'\n'), Some(2));
        assert_eq!(buf.find(b'x'), None);
    }

    #[test]
    fn wraps_around_backing_array() {
        let mut buf = LineBuffer::new();
        let cap = buf.capacity();
        for _ in 0..cap {
            buf.put_byte(b'a');
        }
        let mut tmp = [0u8; 4];
        buf.get(&mut tmp);
        for _ in 0..4 {
            assert!(buf.put_byte(b'b'));
        }
        assert_eq!(buf.len(), cap);
    }
}
