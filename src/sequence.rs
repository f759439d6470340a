//! Message fragmentation and reassembly.
//!
//! A message split into frames has exactly one start fragment and exactly
//! one fin fragment (possibly the same); every later fragment is a
//! continuation of the first fragment's kind.

use crate::error::SequenceError;
use crate::frame::{FrameKind, WriteFlags, WriteProtocol};
use bytes::{Bytes, BytesMut};

/// One chunk of a message, ready for `FrameWriter::write_data`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub data: &'a [u8],
    pub kind: FrameKind,
    pub is_start: bool,
    pub is_fin: bool,
}

impl Fragment<'_> {
    /// Write flags for this fragment's position.
    pub fn flags(&self) -> WriteFlags {
        WriteFlags::data(self.kind, self.is_start, self.is_fin)
    }
}

/// Split `payload` into fragments of at most `max_frame` bytes.
///
/// An empty payload yields a single empty frame. A `max_frame` of zero is
/// treated as one.
pub fn fragments(payload: &[u8], kind: FrameKind, max_frame: usize) -> Fragments<'_> {
    Fragments {
        rest: payload,
        kind,
        max_frame: max_frame.max(1),
        started: false,
        done: false,
    }
}

/// Iterator returned by [`fragments`].
#[derive(Clone, Debug)]
pub struct Fragments<'a> {
    rest: &'a [u8],
    kind: FrameKind,
    max_frame: usize,
    started: bool,
    done: bool,
}

impl<'a> Iterator for Fragments<'a> {
    type Item = Fragment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let take = self.rest.len().min(self.max_frame);
        let (data, rest) = self.rest.split_at(take);
        self.rest = rest;
        let is_start = !self.started;
        self.started = true;
        let is_fin = rest.is_empty();
        self.done = is_fin;
        Some(Fragment {
            data,
            kind: self.kind,
            is_start,
            is_fin,
        })
    }
}

/// A fully reassembled message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Binary(Bytes),
    Text(String),
}

/// Accumulated fragments of one message.
#[derive(Debug)]
pub struct FrameSequence {
    kind: FrameKind,
    buffer: BytesMut,
}

impl FrameSequence {
    /// Empty sequence for a message of `kind`.
    pub fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            buffer: BytesMut::new(),
        }
    }

    /// Kind given by the start frame.
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// Append one frame's payload.
    pub fn append(&mut self, frame: &[u8]) {
        self.buffer.extend_from_slice(frame);
    }

    /// Bytes accumulated so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Complete the message; text must be valid UTF-8.
    pub fn finish(self) -> Result<Message, SequenceError> {
        let data = self.buffer.freeze();
        match self.kind {
            FrameKind::Binary => Ok(Message::Binary(data)),
            FrameKind::Text => String::from_utf8(data.to_vec())
                .map(Message::Text)
                .map_err(|_| SequenceError::InvalidUtf8),
        }
    }
}

/// Rebuilds messages from a stream of written data frames.
#[derive(Debug, Default)]
pub struct Reassembler {
    current: Option<FrameSequence>,
}

impl Reassembler {
    /// Reassembler with no message in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a message is open (started, not finished).
    pub fn in_progress(&self) -> bool {
        self.current.is_some()
    }

    /// Feed one frame. Returns the message once its fin frame arrives.
    pub fn push(&mut self, flags: WriteFlags, data: &[u8]) -> Result<Option<Message>, SequenceError> {
        let kind = match flags.protocol {
            WriteProtocol::Binary => Some(FrameKind::Binary),
            WriteProtocol::Text => Some(FrameKind::Text),
            WriteProtocol::Continuation => None,
            WriteProtocol::Ping | WriteProtocol::Pong => return Err(SequenceError::ControlFrame),
        };

        let mut sequence = match (kind, self.current.take()) {
            (Some(_), Some(open)) => {
                self.current = Some(open);
                return Err(SequenceError::InterleavedStart);
            }
            (Some(kind), None) => FrameSequence::new(kind),
            (None, Some(open)) => open,
            (None, None) => return Err(SequenceError::UnexpectedContinuation),
        };
        sequence.append(data);

        if flags.fin {
            sequence.finish().map(Some)
        } else {
            self.current = Some(sequence);
            Ok(None)
        }
    }
}
