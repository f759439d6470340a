//! # ws-sendpath
//!
//! Outbound write path for a WebSocket engine that expects padded buffers.
//!
//! ## Features
//!
//! - Padded frame buffers with reserved header space ([`frame`])
//! - Binary, text, fragmented and control frame writes ([`writer`])
//! - Message fragmentation and reassembly ([`sequence`])
//! - RFC 6455 framing over any `AsyncWrite` ([`socket`])
//! - Queued sends with completion handles ([`connection`])
//! - Optional payload digests through an external program ([`digest`])
//!
//! ## Example
//!
//! ```ignore
//! use ws_sendpath::{FrameWriter, socket::WireTransport};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let conn = WireTransport::server(Vec::<u8>::new());
//!     FrameWriter::new().write_text(&conn, "hello").await?;
//!     let wire = conn.into_inner();
//!     assert_eq!(&wire[..2], &[0x81, 0x05]);
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod digest;
pub mod error;
pub mod frame;
pub mod sequence;
pub mod socket;
pub mod transport;
pub mod writer;

#[cfg(test)]
mod testing;

pub use connection::{Connection, ConnectionState, Opcode, Writable};
pub use digest::{DigestConfig, DigestOutput, ExternalDigest};
pub use error::{DigestError, Error, Result, SequenceError, WriteError};
pub use frame::{FrameKind, Padding, WriteFlags};
pub use sequence::{fragments, Message, Reassembler};
pub use transport::Transport;
pub use writer::{DigestObserver, DigestReport, FrameWriter, SendObserver};
