//! Engine-side connection shell.
//!
//! Holds the transport, the open/close state, an opaque user-data slot and
//! the outbound queue. The host engine calls [`Connection::on_writable`]
//! whenever the socket can take another frame.

mod queue;

pub use queue::{Opcode, SendCompletion, SendQueue};

use crate::error::Error;
use crate::transport::Transport;
use crate::writer::FrameWriter;
use crate::Result;
use bytes::Bytes;
use std::any::Any;
use std::sync::{Arc, PoisonError, RwLock};

/// Opaque application context attached to a connection.
pub type UserData = Arc<dyn Any + Send + Sync>;

/// Lifecycle state as reported by the host engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Result of one writable callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Writable {
    /// Nothing was queued.
    Idle,
    Written,
    /// The write failed; the engine decides whether that is fatal.
    Failed,
}

/// A connection wrapping transport `T`.
pub struct Connection<T> {
    transport: T,
    state: RwLock<ConnectionState>,
    user_data: RwLock<Option<UserData>>,
    queue: SendQueue,
}

impl<T: Transport> Connection<T> {
    /// New connection in the `Connecting` state.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: RwLock::new(ConnectionState::Connecting),
            user_data: RwLock::new(None),
            queue: SendQueue::new(),
        }
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Consume the connection and return its transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a state change reported by the engine.
    pub fn set_state(&self, state: ConnectionState) {
        let mut current = self.state.write().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(from = ?*current, to = ?state, "connection state");
        *current = state;
    }

    /// True unless the connection is open. It may still open later.
    pub fn is_closed(&self) -> bool {
        self.state() != ConnectionState::Open
    }

    /// True once the connection can never be used again.
    pub fn is_closed_forever(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Closing | ConnectionState::Closed
        )
    }

    /// Attached user data, if any.
    pub fn user_data(&self) -> Option<UserData> {
        self.user_data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Attach user data, replacing any previous value.
    pub fn set_user_data(&self, data: UserData) {
        *self
            .user_data
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(data);
    }

    /// Detach and return the user data.
    pub fn clear_user_data(&self) -> Option<UserData> {
        self.user_data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Queue a message. It is written on a later [`on_writable`](Self::on_writable)
    /// call; the returned completion resolves with the write result.
    pub fn send(&self, data: impl Into<Bytes>, opcode: Opcode, fin: bool) -> Result<SendCompletion> {
        if self.is_closed_forever() {
            return Err(Error::Closed);
        }
        if self.is_closed() {
            return Err(Error::NotYetOpen);
        }
        Ok(self.queue.push(data.into(), opcode, fin))
    }

    /// Number of messages waiting for a writable callback.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Write the next queued message, if any.
    pub async fn on_writable(&self, writer: &FrameWriter) -> Writable {
        let Some(item) = self.queue.pop() else {
            return Writable::Idle;
        };
        let opcode = item.opcode();
        match item.write(writer, &self.transport).await {
            Ok(()) => {
                item.complete(Ok(()));
                Writable::Written
            }
            Err(e) => {
                tracing::warn!(?opcode, error = %e, "queued write failed");
                item.complete(Err(e));
                Writable::Failed
            }
        }
    }

    /// Mark the connection closed and fail every queued message.
    pub fn close(&self) {
        self.set_state(ConnectionState::Closed);
        let failed = self.queue.fail_all();
        if failed > 0 {
            tracing::debug!(failed, "dropped queued messages on close");
        }
    }
}

impl<T> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("queue", &self.queue)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WriteError;
    use crate::frame::{WriteFlags, WriteProtocol};
    use crate::testing::{Accept, RecordingTransport};

    fn open() -> Connection<RecordingTransport> {
        let conn = Connection::new(RecordingTransport::new());
        conn.set_state(ConnectionState::Open);
        conn
    }

    #[test]
    fn send_before_open_fails() {
        let conn = Connection::new(RecordingTransport::new());
        assert!(matches!(
            conn.send(&b"x"[..], Opcode::Binary, true),
            Err(Error::NotYetOpen)
        ));
    }

    #[test]
    fn send_after_close_fails() {
        let conn = open();
        conn.close();
        assert!(matches!(
            conn.send(&b"x"[..], Opcode::Binary, true),
            Err(Error::Closed)
        ));
        assert!(conn.is_closed_forever());
    }

    #[tokio::test]
    async fn queued_message_written_on_writable() {
        let conn = open();
        let writer = FrameWriter::new();
        let done = conn.send(&b"hello"[..], Opcode::Binary, true).unwrap();
        assert_eq!(conn.pending(), 1);
        assert!(conn.transport().calls().is_empty());

        assert_eq!(conn.on_writable(&writer).await, Writable::Written);
        assert!(done.await.unwrap().is_ok());
        assert_eq!(conn.transport().calls()[0].body, b"hello");
        assert_eq!(conn.on_writable(&writer).await, Writable::Idle);
    }

    #[tokio::test]
    async fn failed_write_resolves_completion_with_error() {
        let conn = open();
        conn.transport().set_accept(Accept::AtMost(1));
        let done = conn.send(&b"hello"[..], Opcode::Text, true).unwrap();
        assert_eq!(conn.on_writable(&FrameWriter::new()).await, Writable::Failed);
        assert!(matches!(
            done.await.unwrap(),
            Err(Error::Write(WriteError::ShortWrite { .. }))
        ));
    }

    #[tokio::test]
    async fn invalid_utf8_text_is_rejected_before_the_transport() {
        let conn = open();
        let done = conn.send(Bytes::from_static(&[0xff, 0xfe]), Opcode::Text, true).unwrap();
        assert_eq!(conn.on_writable(&FrameWriter::new()).await, Writable::Failed);
        assert!(matches!(
            done.await.unwrap(),
            Err(Error::Sequence(crate::error::SequenceError::InvalidUtf8))
        ));
        assert!(conn.transport().calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_utf8_binary_is_written_as_is() {
        let conn = open();
        let done = conn.send(Bytes::from_static(&[0xff, 0xfe]), Opcode::Binary, true).unwrap();
        assert_eq!(conn.on_writable(&FrameWriter::new()).await, Writable::Written);
        assert!(done.await.unwrap().is_ok());
        assert_eq!(conn.transport().calls()[0].body, [0xff, 0xfe]);
    }

    #[tokio::test]
    async fn opcodes_map_to_write_flags() {
        let conn = open();
        let writer = FrameWriter::new();
        let _a = conn.send(&b"ab"[..], Opcode::Binary, false).unwrap();
        let _b = conn.send(&b"cd"[..], Opcode::Continuation, true).unwrap();
        let _c = conn.send(&b"hi"[..], Opcode::Text, true).unwrap();
        let _d = conn.send(Bytes::new(), Opcode::Ping, true).unwrap();
        let _e = conn.send(Bytes::new(), Opcode::Pong, true).unwrap();
        while conn.pending() > 0 {
            conn.on_writable(&writer).await;
        }
        let flags: Vec<WriteFlags> = conn.transport().calls().iter().map(|c| c.flags).collect();
        assert_eq!(
            flags,
            vec![
                WriteFlags::data(crate::frame::FrameKind::Binary, true, false),
                WriteFlags {
                    protocol: WriteProtocol::Continuation,
                    fin: true
                },
                WriteFlags::data(crate::frame::FrameKind::Text, true, true),
                WriteFlags::ping(),
                WriteFlags::pong(),
            ]
        );
    }

    #[tokio::test]
    async fn close_fails_pending_messages() {
        let conn = open();
        let done = conn.send(&b"late"[..], Opcode::Binary, true).unwrap();
        conn.close();
        assert!(matches!(done.await.unwrap(), Err(Error::Closed)));
        assert_eq!(conn.pending(), 0);
    }

    #[test]
    fn user_data_round_trip_and_clear() {
        let conn = open();
        assert!(conn.user_data().is_none());
        conn.set_user_data(Arc::new(42u32));
        let data = conn.user_data().unwrap();
        assert_eq!(data.downcast_ref::<u32>(), Some(&42));
        assert!(conn.clear_user_data().is_some());
        assert!(conn.user_data().is_none());
    }
}
