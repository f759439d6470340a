//! Outbound message queue, drained one message per writable callback.

use crate::error::{Error, SequenceError, WriteError};
use crate::frame::FrameKind;
use crate::transport::Transport;
use crate::writer::FrameWriter;
use crate::Result;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tokio::sync::oneshot;

/// Opcode requested by the application for a queued message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    Binary,
    Text,
    /// Follows an earlier unfinished Binary or Text message.
    Continuation,
    Ping,
    Pong,
}

/// Completion handle for a queued message.
pub type SendCompletion = oneshot::Receiver<Result<()>>;

pub(crate) struct Outbound {
    data: Bytes,
    opcode: Opcode,
    fin: bool,
    done: oneshot::Sender<Result<()>>,
}

impl Outbound {
    pub(crate) fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Issue the frame write for this message. Text is always sent as a
    /// message start; continuation kind is irrelevant on the wire. Text
    /// that is not valid UTF-8 is rejected without touching the transport.
    pub(crate) async fn write<T>(&self, writer: &FrameWriter, conn: &T) -> Result<()>
    where
        T: Transport + ?Sized,
    {
        if self.opcode == Opcode::Text && std::str::from_utf8(&self.data).is_err() {
            return Err(SequenceError::InvalidUtf8.into());
        }
        self.write_frame(writer, conn).await.map_err(Error::from)
    }

    async fn write_frame<T>(&self, writer: &FrameWriter, conn: &T) -> std::result::Result<(), WriteError>
    where
        T: Transport + ?Sized,
    {
        match self.opcode {
            Opcode::Binary => {
                writer
                    .write_data(conn, &self.data, FrameKind::Binary, true, self.fin)
                    .await
            }
            Opcode::Continuation => {
                writer
                    .write_data(conn, &self.data, FrameKind::Binary, false, self.fin)
                    .await
            }
            Opcode::Text => {
                writer
                    .write_data(conn, &self.data, FrameKind::Text, true, self.fin)
                    .await
            }
            Opcode::Ping => writer.write_ping(conn).await,
            Opcode::Pong => writer.write_pong(conn).await,
        }
    }

    pub(crate) fn complete(self, result: Result<()>) {
        // The application may have dropped its completion handle.
        let _ = self.done.send(result);
    }
}

/// FIFO of messages waiting for the connection to become writable.
#[derive(Default)]
pub struct SendQueue {
    items: Mutex<VecDeque<Outbound>>,
}

impl SendQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, data: Bytes, opcode: Opcode, fin: bool) -> SendCompletion {
        let (done, rx) = oneshot::channel();
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Outbound {
                data,
                opcode,
                fin,
                done,
            });
        rx
    }

    pub(crate) fn pop(&self) -> Option<Outbound> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no message is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fail every queued message with `Error::Closed`.
    pub(crate) fn fail_all(&self) -> usize {
        let drained: Vec<_> = self
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let count = drained.len();
        for item in drained {
            item.complete(Err(Error::Closed));
        }
        count
    }
}

impl std::fmt::Debug for SendQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendQueue").field("len", &self.len()).finish()
    }
}
