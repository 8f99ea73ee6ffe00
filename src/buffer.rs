use std::ops::Deref;
use std::sync::Arc;

use memchr::memchr;

/// An owned byte buffer holding whole lines only.
///
/// The backing storage is shared, so [`RawBuffer::split_lines`] hands out
/// windows into the same allocation instead of copying; the allocation is
/// freed once the last window drops.
#[derive(Debug, Clone)]
pub struct RawBuffer {
    data: Arc<Vec<u8>>,
    start: usize,
    end: usize,
}

impl RawBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        let end = data.len();
        RawBuffer {
            data: Arc::new(data),
            start: 0,
            end,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Splits into up to `count` pieces, cutting only at line terminators.
    ///
    /// Each piece targets `len / count` bytes; the cut scans from one byte
    /// before the target so a piece already ending on a terminator stays
    /// as-is. Pieces concatenate back to exactly this buffer.
    pub fn split_lines(self, count: usize) -> Vec<RawBuffer> {
        let len = self.len();
        if count <= 1 || len == 0 {
            return vec![self];
        }
        let target = len / count;
        if target == 0 {
            return vec![self];
        }

        let mut pieces = Vec::with_capacity(count);
        let mut start = self.start;
        while start < self.end {
            let mut end = start + target;
            if end >= self.end {
                end = self.end;
            } else {
                end = match memchr(b'\n', &self.data[end - 1..self.end]) {
                    Some(pos) => end - 1 + pos + 1,
                    None => self.end,
                };
            }
            pieces.push(RawBuffer {
                data: Arc::clone(&self.data),
                start,
                end,
            });
            start = end;
        }
        pieces
    }
}

impl Deref for RawBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }
}
