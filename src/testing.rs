//! Test doubles shared by the unit tests.

use crate::frame::{BufferAlloc, Padding, PaddedBuffer, WriteFlags};
use crate::transport::Transport;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Arguments of one recorded transport write.
#[derive(Clone, Debug)]
pub(crate) struct Recorded {
    pub flags: WriteFlags,
    pub body: Vec<u8>,
    /// Whole padded buffer as the transport saw it.
    pub raw: Vec<u8>,
    pub padding: Padding,
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum Accept {
    All,
    AtMost(usize),
    Fail,
}

/// Transport that records every write and answers per `accept`.
pub(crate) struct RecordingTransport {
    padding: Padding,
    accept: Mutex<Accept>,
    calls: Mutex<Vec<Recorded>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::with_padding(Padding::DEFAULT)
    }

    pub fn with_padding(padding: Padding) -> Self {
        Self {
            padding,
            accept: Mutex::new(Accept::All),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn accept(self, accept: Accept) -> Self {
        self.set_accept(accept);
        self
    }

    pub fn set_accept(&self, accept: Accept) {
        *self.accept.lock().unwrap() = accept;
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn padding(&self) -> Padding {
        self.padding
    }

    async fn write(&self, buf: &mut PaddedBuffer<'_>, flags: WriteFlags) -> std::io::Result<usize> {
        self.calls.lock().unwrap().push(Recorded {
            flags,
            body: buf.body().to_vec(),
            raw: buf.as_bytes().to_vec(),
            padding: buf.padding(),
        });
        let accept = *self.accept.lock().unwrap();
        match accept {
            Accept::All => Ok(buf.len()),
            Accept::AtMost(n) => Ok(buf.len().min(n)),
            Accept::Fail => Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe)),
        }
    }
}

/// Allocator that tracks outstanding buffers and can be told to fail.
#[derive(Default)]
pub(crate) struct CountingAlloc {
    outstanding: AtomicUsize,
    allocations: AtomicUsize,
    fail: AtomicBool,
}

impl CountingAlloc {
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl BufferAlloc for CountingAlloc {
    fn alloc(&self, size: usize) -> Option<Vec<u8>> {
        if self.fail.load(Ordering::SeqCst) {
            return None;
        }
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        self.allocations.fetch_add(1, Ordering::SeqCst);
        Some(vec![0; size])
    }

    fn release(&self, _buf: Vec<u8>) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}
