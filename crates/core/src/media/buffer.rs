use crate::error::{PackError, Result};

/// Scratch capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 10 * 1024;

/// Reusable scratch region that every RTP packet is assembled in.
///
/// The capacity is a hard limit. A packet that would exceed it is rejected
/// up front with [`PackError::BufferOverflow`], never truncated.
#[derive(Debug)]
pub struct OutputBuffer {
    buf: Vec<u8>,
    capacity: usize,
}

impl OutputBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ensure_fits(&self, size: usize) -> Result<()> {
        if size > self.capacity {
            return Err(PackError::BufferOverflow {
                size,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Clear the region and fill it with `header`, `prefix`, then `payload`.
    ///
    /// Callers check the total with [`ensure_fits`](Self::ensure_fits) first.
    pub fn assemble(&mut self, header: &[u8], prefix: &[u8], payload: &[u8]) -> &[u8] {
        debug_assert!(header.len() + prefix.len() + payload.len() <= self.capacity);
        self.buf.clear();
        self.buf.extend_from_slice(header);
        self.buf.extend_from_slice(prefix);
        self.buf.extend_from_slice(payload);
        &self.buf
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_packet() {
        let out = OutputBuffer::with_capacity(16);
        assert!(out.ensure_fits(16).is_ok());
        match out.ensure_fits(17) {
            Err(PackError::BufferOverflow { size, capacity }) => {
                assert_eq!(size, 17);
                assert_eq!(capacity, 16);
            }
            other => panic!("expected overflow, got {:?}", other),
        }
    }

    #[test]
    fn assemble_replaces_previous_contents() {
        let mut out = OutputBuffer::default();
        assert_eq!(out.capacity(), 10 * 1024);
        assert_eq!(out.assemble(&[1, 2], &[3], &[4, 5, 6]), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(out.assemble(&[9], &[], &[8]), &[9, 8]);
    }
}
