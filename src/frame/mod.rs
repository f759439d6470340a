//! Frame kinds and the transport's write flag word.
//!
//! The flag word follows the published transport constants: a write
//! protocol in the low bits, `NO_FIN` (0x40) when more fragments follow.

mod buffer;

pub use buffer::{BufferAlloc, HeapAlloc, Padding, PaddedBuffer};

/// Flag bit marking a fragment that is not the last of its message.
pub const NO_FIN: u32 = 0x40;

/// Payload interpretation of a data frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Binary,
    Text,
}

/// Write protocol selected for one transport write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum WriteProtocol {
    Text = 0,
    Binary = 1,
    Continuation = 2,
    Ping = 5,
    Pong = 6,
}

impl WriteProtocol {
    /// Parse a bare protocol value; flag bits must already be masked off.
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(Self::Text),
            1 => Some(Self::Binary),
            2 => Some(Self::Continuation),
            5 => Some(Self::Ping),
            6 => Some(Self::Pong),
            _ => None,
        }
    }

    /// RFC 6455 opcode carried in the frame header.
    pub fn opcode(self) -> u8 {
        match self {
            Self::Continuation => 0x0,
            Self::Text => 0x1,
            Self::Binary => 0x2,
            Self::Ping => 0x9,
            Self::Pong => 0xA,
        }
    }

    /// Ping and pong.
    pub fn is_control(self) -> bool {
        matches!(self, Self::Ping | Self::Pong)
    }
}

impl From<FrameKind> for WriteProtocol {
    fn from(kind: FrameKind) -> Self {
        match kind {
            FrameKind::Binary => Self::Binary,
            FrameKind::Text => Self::Text,
        }
    }
}

/// Protocol plus fragmentation state passed with every transport write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteFlags {
    pub protocol: WriteProtocol,
    pub fin: bool,
}

impl WriteFlags {
    /// Flags for a data frame at the given fragmentation position.
    ///
    /// Only the first fragment carries the message kind; later ones are
    /// continuations. Every fragment but the last has `NO_FIN` set.
    pub fn data(kind: FrameKind, is_start: bool, is_fin: bool) -> Self {
        let protocol = if is_start {
            kind.into()
        } else {
            WriteProtocol::Continuation
        };
        Self {
            protocol,
            fin: is_fin,
        }
    }

    /// Flags for a final ping frame.
    pub fn ping() -> Self {
        Self {
            protocol: WriteProtocol::Ping,
            fin: true,
        }
    }

    /// Flags for a final pong frame.
    pub fn pong() -> Self {
        Self {
            protocol: WriteProtocol::Pong,
            fin: true,
        }
    }

    /// Packed flag word as the transport's C-style API expects it.
    pub fn bits(self) -> u32 {
        let fin = if self.fin { 0 } else { NO_FIN };
        self.protocol as u32 | fin
    }

    /// Parse a packed flag word.
    pub fn from_bits(bits: u32) -> Option<Self> {
        let protocol = WriteProtocol::from_bits(bits & !NO_FIN)?;
        Some(Self {
            protocol,
            fin: bits & NO_FIN == 0,
        })
    }
}
