//! RFC 6455 frame header encoding and a stream-backed transport.
//!
//! The header is written into the tail of the buffer's pre-padding so that
//! header and body go out as one contiguous write.

mod wire;

pub use wire::{Role, WireTransport};

use crate::frame::WriteFlags;

/// Largest header: 2 bytes + 8 byte extended length + 4 byte mask.
pub const MAX_HEADER_LEN: usize = 14;

/// Encodes a frame header into `out` and returns its length.
///
/// ```txt
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// ```
pub fn encode_header(
    out: &mut [u8; MAX_HEADER_LEN],
    flags: WriteFlags,
    len: usize,
    mask: Option<[u8; 4]>,
) -> usize {
    let mask_bit = if mask.is_some() { 0x80 } else { 0 };
    out[0] = ((flags.fin as u8) << 7) | flags.protocol.opcode();

    let mut n = if len < 126 {
        out[1] = mask_bit | len as u8;
        2
    } else if len < 65536 {
        out[1] = mask_bit | 126;
        out[2..4].copy_from_slice(&(len as u16).to_be_bytes());
        4
    } else {
        out[1] = mask_bit | 127;
        out[2..10].copy_from_slice(&(len as u64).to_be_bytes());
        10
    };

    if let Some(key) = mask {
        out[n..n + 4].copy_from_slice(&key);
        n += 4;
    }
    n
}

/// XOR `data` with the 4-byte masking key.
pub fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}
