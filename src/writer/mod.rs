//! Padded frame writer.
//!
//! Every call allocates one padded buffer, copies the payload into its
//! body, issues exactly one transport write and releases the buffer on
//! every path. No retries and no state between calls.

mod observer;

pub use observer::{DigestObserver, DigestReport, SendObserver};

use crate::error::WriteError;
use crate::frame::{BufferAlloc, FrameKind, HeapAlloc, PaddedBuffer, WriteFlags};
use crate::sequence::fragments;
use crate::transport::Transport;
use std::sync::Arc;

/// Writes data and control frames through a [`Transport`].
#[derive(Clone)]
pub struct FrameWriter {
    alloc: Arc<dyn BufferAlloc>,
    observer: Option<Arc<dyn SendObserver>>,
}

impl FrameWriter {
    /// Writer backed by the global heap, with no observer.
    pub fn new() -> Self {
        Self::with_allocator(Arc::new(HeapAlloc))
    }

    /// Writer drawing buffers from `alloc`, with no observer.
    pub fn with_allocator(alloc: Arc<dyn BufferAlloc>) -> Self {
        Self {
            alloc,
            observer: None,
        }
    }

    /// Attach a side-effect-only hook called around data frame writes.
    pub fn with_observer(mut self, observer: Arc<dyn SendObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Write one data frame.
    ///
    /// `is_start`/`is_fin` give the fragment's position in its message; a
    /// single-frame message sets both. Succeeds only if the transport
    /// accepted the whole body.
    pub async fn write_data<T>(
        &self,
        conn: &T,
        payload: &[u8],
        kind: FrameKind,
        is_start: bool,
        is_fin: bool,
    ) -> Result<(), WriteError>
    where
        T: Transport + ?Sized,
    {
        if let Some(observer) = &self.observer {
            observer.before_send(kind, payload);
        }
        let flags = WriteFlags::data(kind, is_start, is_fin);
        let result = self.send_data(conn, payload, flags).await;
        if let Some(observer) = &self.observer {
            observer.after_send(kind, payload.len(), &result);
        }
        result
    }

    async fn send_data<T>(
        &self,
        conn: &T,
        payload: &[u8],
        flags: WriteFlags,
    ) -> Result<(), WriteError>
    where
        T: Transport + ?Sized,
    {
        let requested = payload.len();
        let mut buf = PaddedBuffer::from_payload(self.alloc.as_ref(), conn.padding(), payload)?;
        let result = match conn.write(&mut buf, flags).await {
            Ok(accepted) if accepted >= requested => Ok(()),
            Ok(accepted) => Err(WriteError::ShortWrite {
                requested,
                accepted,
                source: None,
            }),
            Err(e) => Err(WriteError::ShortWrite {
                requested,
                accepted: 0,
                source: Some(e),
            }),
        };
        drop(buf);

        match &result {
            Ok(()) => tracing::trace!(len = requested, flags = flags.bits(), "data frame written"),
            Err(e) => tracing::debug!(len = requested, flags = flags.bits(), error = %e, "data frame write failed"),
        }
        result
    }

    /// Write a complete single-frame binary message.
    pub async fn write_binary<T>(&self, conn: &T, payload: &[u8]) -> Result<(), WriteError>
    where
        T: Transport + ?Sized,
    {
        self.write_data(conn, payload, FrameKind::Binary, true, true)
            .await
    }

    /// Write a complete single-frame text message.
    pub async fn write_text<T>(&self, conn: &T, text: &str) -> Result<(), WriteError>
    where
        T: Transport + ?Sized,
    {
        self.write_data(conn, text.as_bytes(), FrameKind::Text, true, true)
            .await
    }

    /// Split `payload` into frames of at most `max_frame` bytes and write
    /// them in order. Stops at the first failure. Returns the number of
    /// frames written.
    pub async fn write_fragmented<T>(
        &self,
        conn: &T,
        payload: &[u8],
        kind: FrameKind,
        max_frame: usize,
    ) -> Result<usize, WriteError>
    where
        T: Transport + ?Sized,
    {
        let mut written = 0;
        for fragment in fragments(payload, kind, max_frame) {
            self.write_data(conn, fragment.data, kind, fragment.is_start, fragment.is_fin)
                .await?;
            written += 1;
        }
        Ok(written)
    }

    /// Write an empty ping. Only a transport error status fails it.
    pub async fn write_ping<T>(&self, conn: &T) -> Result<(), WriteError>
    where
        T: Transport + ?Sized,
    {
        self.write_control(conn, WriteFlags::ping()).await
    }

    /// Write an empty pong. Only a transport error status fails it.
    pub async fn write_pong<T>(&self, conn: &T) -> Result<(), WriteError>
    where
        T: Transport + ?Sized,
    {
        self.write_control(conn, WriteFlags::pong()).await
    }

    async fn write_control<T>(&self, conn: &T, flags: WriteFlags) -> Result<(), WriteError>
    where
        T: Transport + ?Sized,
    {
        let mut buf = PaddedBuffer::allocate(self.alloc.as_ref(), conn.padding(), 0)?;
        let result = conn.write(&mut buf, flags).await;
        drop(buf);
        result.map(|_| ()).map_err(|e| {
            tracing::debug!(flags = flags.bits(), error = %e, "control frame write failed");
            WriteError::ShortWrite {
                requested: 0,
                accepted: 0,
                source: Some(e),
            }
        })
    }
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameWriter")
            .field("observer", &self.observer.is_some())
            .finish()
    }
}
