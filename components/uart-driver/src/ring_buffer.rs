//! Fixed-capacity byte ring used by the data path

/// Ring buffer for bytes
pub struct RingBuffer<const N: usize> {
    buffer: [u8; N],
    head: usize,  // Write position
    tail: usize,  // Read position
    count: usize, // Number of items
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<N> {
    pub const fn new() -> Self {
        Self {
            buffer: [0; N],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == N
    }

    pub fn len(&self) -> usize {
        self.count
    }

    /// Free slots
    pub fn free(&self) -> usize {
        N - self.count
    }

    /// Push a byte
    ///
    /// Returns the byte back if the ring is full.
    pub fn push(&mut self, byte: u8) -> Result<(), u8> {
        if self.is_full() {
            return Err(byte);
        }

        self.buffer[self.head] = byte;
        self.head = (self.head + 1) % N;
        self.count += 1;
        Ok(())
    }

    /// Push as much of `bytes` as fits, returning how many were taken
    pub fn push_slice(&mut self, bytes: &[u8]) -> usize {
        let taken = bytes.len().min(self.free());
        for &byte in &bytes[..taken] {
            self.buffer[self.head] = byte;
            self.head = (self.head + 1) % N;
        }
        self.count += taken;
        taken
    }

    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }

        let byte = self.buffer[self.tail];
        self.tail = (self.tail + 1) % N;
        self.count -= 1;
        Some(byte)
    }

    /// Pop into `out`, returning how many bytes were copied
    pub fn pop_slice(&mut self, out: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < out.len() {
            match self.pop() {
                Some(byte) => {
                    out[copied] = byte;
                    copied += 1;
                }
                None => break,
            }
        }
        copied
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full_hands_byte_back() {
        let mut ring: RingBuffer<4> = RingBuffer::new();
        for b in 0..4 {
            ring.push(b).unwrap();
        }
        assert!(ring.is_full());
        assert_eq!(ring.push(9), Err(9));
        assert_eq!(ring.pop(), Some(0));
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let mut ring: RingBuffer<4> = RingBuffer::new();
        assert_eq!(ring.push_slice(&[1, 2, 3]), 3);
        assert_eq!(ring.pop(), Some(1));
        assert_eq!(ring.pop(), Some(2));
        assert_eq!(ring.push_slice(&[4, 5, 6, 7]), 3);
        assert_eq!(ring.free(), 0);

        let mut out = [0u8; 8];
        assert_eq!(ring.pop_slice(&mut out), 4);
        assert_eq!(&out[..4], &[3, 4, 5, 6]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut ring: RingBuffer<8> = RingBuffer::new();
        ring.push_slice(b"abc");
        ring.clear();
        assert_eq!(ring.len(), 0);
        assert_eq!(ring.pop(), None);
        assert_eq!(ring.free(), 8);
    }
}
