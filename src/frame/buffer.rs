//! Padded send buffers.
//!
//! Layout: `[pre][body][post]`. The transport may scribble over both guard
//! regions (the pre region usually receives the frame header); the caller
//! only ever fills the body.

use crate::error::WriteError;

/// Guard region sizes required by a transport around every body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Padding {
    pub pre: usize,
    pub post: usize,
}

impl Padding {
    /// Room for the largest RFC 6455 header (14 bytes), aligned to 16.
    pub const DEFAULT: Padding = Padding { pre: 16, post: 0 };

    /// Guard regions of `pre` and `post` bytes.
    pub const fn new(pre: usize, post: usize) -> Self {
        Self { pre, post }
    }

    /// Total allocation size for a body of `len` bytes.
    pub fn total(&self, len: usize) -> Option<usize> {
        self.pre.checked_add(len)?.checked_add(self.post)
    }
}

impl Default for Padding {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Source of send buffers. Every buffer handed out is given back via
/// [`release`](BufferAlloc::release) when the owning [`PaddedBuffer`] drops.
pub trait BufferAlloc: Send + Sync {
    /// Returns a zeroed buffer of exactly `size` bytes, or `None` if it
    /// cannot be obtained.
    fn alloc(&self, size: usize) -> Option<Vec<u8>>;

    fn release(&self, buf: Vec<u8>) {
        drop(buf);
    }
}

/// Global-heap allocator. Reports failure instead of aborting.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapAlloc;

impl BufferAlloc for HeapAlloc {
    fn alloc(&self, size: usize) -> Option<Vec<u8>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(size).ok()?;
        buf.resize(size, 0);
        Some(buf)
    }
}

/// One send buffer, owned by a single write call.
pub struct PaddedBuffer<'a> {
    buf: Vec<u8>,
    padding: Padding,
    len: usize,
    alloc: &'a dyn BufferAlloc,
}

impl<'a> PaddedBuffer<'a> {
    /// Allocate guard regions plus a `len` byte body.
    pub fn allocate(
        alloc: &'a dyn BufferAlloc,
        padding: Padding,
        len: usize,
    ) -> Result<Self, WriteError> {
        let size = padding
            .total(len)
            .ok_or(WriteError::AllocationFailed { size: usize::MAX })?;
        let buf = alloc
            .alloc(size)
            .ok_or(WriteError::AllocationFailed { size })?;
        if buf.len() != size {
            alloc.release(buf);
            return Err(WriteError::AllocationFailed { size });
        }
        Ok(Self {
            buf,
            padding,
            len,
            alloc,
        })
    }

    /// Allocate and fill the body from `payload`.
    pub fn from_payload(
        alloc: &'a dyn BufferAlloc,
        padding: Padding,
        payload: &[u8],
    ) -> Result<Self, WriteError> {
        let mut buf = Self::allocate(alloc, padding, payload.len())?;
        buf.body_mut().copy_from_slice(payload);
        Ok(buf)
    }

    /// Body length.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the body is zero bytes long.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Guard regions this buffer was allocated with.
    pub fn padding(&self) -> Padding {
        self.padding
    }

    /// Payload region between the guards.
    pub fn body(&self) -> &[u8] {
        &self.buf[self.padding.pre..self.padding.pre + self.len]
    }

    /// Mutable payload region; the transport may mask it in place.
    pub fn body_mut(&mut self) -> &mut [u8] {
        let pre = self.padding.pre;
        &mut self.buf[pre..pre + self.len]
    }

    /// Whole buffer including both guard regions.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Write `header` into the tail of the pre region and return the
    /// contiguous `header + body` slice. `None` if the header does not fit.
    pub fn with_header(&mut self, header: &[u8]) -> Option<&[u8]> {
        let pre = self.padding.pre;
        let start = pre.checked_sub(header.len())?;
        self.buf[start..pre].copy_from_slice(header);
        Some(&self.buf[start..pre + self.len])
    }
}

impl Drop for PaddedBuffer<'_> {
    fn drop(&mut self) {
        self.alloc.release(std::mem::take(&mut self.buf));
    }
}

impl std::fmt::Debug for PaddedBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaddedBuffer")
            .field("padding", &self.padding)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        outstanding: AtomicUsize,
    }

    impl BufferAlloc for Counting {
        fn alloc(&self, size: usize) -> Option<Vec<u8>> {
            self.outstanding.fetch_add(1, Ordering::SeqCst);
            Some(vec![0; size])
        }

        fn release(&self, _buf: Vec<u8>) {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
        }
    }

    struct Undersized;

    impl BufferAlloc for Undersized {
        fn alloc(&self, size: usize) -> Option<Vec<u8>> {
            Some(vec![0; size.saturating_sub(1)])
        }
    }

    #[test]
    fn layout_places_body_between_guards() {
        let padding = Padding::new(4, 2);
        let buf = PaddedBuffer::from_payload(&HeapAlloc, padding, b"abc").unwrap();
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.body(), b"abc");
        assert_eq!(buf.as_bytes(), &[0, 0, 0, 0, b'a', b'b', b'c', 0, 0]);
    }

    #[test]
    fn empty_body_keeps_guards() {
        let buf = PaddedBuffer::allocate(&HeapAlloc, Padding::DEFAULT, 0).unwrap();
        assert!(buf.is_empty());
        assert!(buf.body().is_empty());
        assert_eq!(buf.as_bytes().len(), Padding::DEFAULT.pre);
    }

    #[test]
    fn header_lands_right_before_body() {
        let mut buf = PaddedBuffer::from_payload(&HeapAlloc, Padding::new(4, 0), b"hi").unwrap();
        let frame = buf.with_header(&[0x81, 0x02]).unwrap();
        assert_eq!(frame, &[0x81, 0x02, b'h', b'i']);
        assert!(buf.with_header(&[0; 5]).is_none());
    }

    #[test]
    fn drop_releases_to_allocator() {
        let alloc = Counting::default();
        {
            let _buf = PaddedBuffer::allocate(&alloc, Padding::DEFAULT, 32).unwrap();
            assert_eq!(alloc.outstanding.load(Ordering::SeqCst), 1);
        }
        assert_eq!(alloc.outstanding.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn wrong_sized_allocation_is_rejected() {
        let err = PaddedBuffer::allocate(&Undersized, Padding::new(2, 2), 4).unwrap_err();
        assert!(matches!(err, WriteError::AllocationFailed { size: 8 }));
    }

    #[test]
    fn overflowing_size_is_rejected() {
        let err = PaddedBuffer::allocate(&HeapAlloc, Padding::new(16, 0), usize::MAX).unwrap_err();
        assert!(matches!(err, WriteError::AllocationFailed { .. }));
    }
}
