//! Transport abstraction for the write primitive.
//!
//! Implement this trait to plug in the protocol engine's raw frame write.
//! The frame writer hands over a padded buffer whose guard regions are
//! sized by [`Transport::padding`]; the transport may use them for the
//! frame header and trailer.

use crate::frame::{Padding, PaddedBuffer, WriteFlags};
use async_trait::async_trait;

/// Async trait for the underlying frame write (e.g. a WebSocket engine).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Guard regions this transport requires around every body.
    fn padding(&self) -> Padding {
        Padding::DEFAULT
    }

    /// Write one frame. Returns the number of body bytes accepted, or an
    /// error status.
    async fn write(&self, buf: &mut PaddedBuffer<'_>, flags: WriteFlags) -> std::io::Result<usize>;
}
