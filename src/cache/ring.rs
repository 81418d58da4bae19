//! Ring Buffer Module
//!
//! Byte arena addressed by integer cursors. Every copy wraps at the capacity,
//! so a single read or write touches at most two segments.

// == Ring ==
/// Fixed-capacity byte arena treated as logically circular.
#[derive(Debug)]
pub(crate) struct Ring {
    buf: Box<[u8]>,
}

impl Ring {
    /// Allocates a zeroed ring of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    // == Skip ==
    /// Advances `pos` by `n` bytes, wrapping at the capacity.
    pub fn skip(&self, pos: usize, n: usize) -> usize {
        (pos + n) % self.buf.len()
    }

    // == Read ==
    /// Copies `dst.len()` bytes starting at `pos` and returns the cursor after them.
    pub fn read(&self, pos: usize, dst: &mut [u8]) -> usize {
        let first = dst.len().min(self.buf.len() - pos);
        dst[..first].copy_from_slice(&self.buf[pos..pos + first]);
        let rest = dst.len() - first;
        dst[first..].copy_from_slice(&self.buf[..rest]);
        self.skip(pos, dst.len())
    }

    // == Write ==
    /// Copies `src` to `pos` and returns the cursor after it.
    pub fn write(&mut self, pos: usize, src: &[u8]) -> usize {
        let first = src.len().min(self.buf.len() - pos);
        self.buf[pos..pos + first].copy_from_slice(&src[..first]);
        let rest = src.len() - first;
        self.buf[..rest].copy_from_slice(&src[first..]);
        self.skip(pos, src.len())
    }

    /// Writes a single byte at `pos`.
    pub fn write_byte(&mut self, pos: usize, byte: u8) {
        self.buf[pos] = byte;
    }

    // == Copy Within ==
    /// Copies `len` bytes from `src` to `dst` inside the ring.
    ///
    /// `dst` must lie at least `len` bytes ahead of `src`, as when the head
    /// record moves to the tail; overlapping bytes are then overwritten only
    /// after they were copied.
    pub fn copy_within(&mut self, src: usize, dst: usize, len: usize) {
        let capacity = self.buf.len();
        let (mut src, mut dst, mut remaining) = (src, dst, len);
        while remaining > 0 {
            let n = remaining.min(capacity - src).min(capacity - dst);
            self.buf.copy_within(src..src + n, dst);
            src = (src + n) % capacity;
            dst = (dst + n) % capacity;
            remaining -= n;
        }
    }

    // == Matches ==
    /// Compares the bytes at `pos` against `expected` without copying.
    pub fn matches(&self, pos: usize, expected: &[u8]) -> bool {
        let first = expected.len().min(self.buf.len() - pos);
        let rest = expected.len() - first;
        self.buf[pos..pos + first] == expected[..first] && self.buf[..rest] == expected[first..]
    }
}
