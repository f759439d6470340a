//! Transport writing RFC 6455 frames to an async byte stream.

use super::{apply_mask, encode_header, MAX_HEADER_LEN};
use crate::frame::{Padding, PaddedBuffer, WriteFlags};
use crate::transport::Transport;
use async_trait::async_trait;
use std::io::{Error, ErrorKind};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Which end of the connection this transport writes for. Clients mask
/// every frame; servers never do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Send half of a WebSocket over any `AsyncWrite`.
pub struct WireTransport<W> {
    stream: Mutex<W>,
    role: Role,
    padding: Padding,
}

impl<W> WireTransport<W> {
    /// Transport writing to `stream` for `role`.
    pub fn new(stream: W, role: Role) -> Self {
        Self {
            stream: Mutex::new(stream),
            role,
            padding: Padding::DEFAULT,
        }
    }

    /// Client transport; every frame is masked.
    pub fn client(stream: W) -> Self {
        Self::new(stream, Role::Client)
    }

    /// Server transport; frames are sent unmasked.
    pub fn server(stream: W) -> Self {
        Self::new(stream, Role::Server)
    }

    /// Role this transport writes for.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Give back the underlying stream.
    pub fn into_inner(self) -> W {
        self.stream.into_inner()
    }
}

#[async_trait]
impl<W> Transport for WireTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn padding(&self) -> Padding {
        self.padding
    }

    async fn write(&self, buf: &mut PaddedBuffer<'_>, flags: WriteFlags) -> std::io::Result<usize> {
        let len = buf.len();
        let mask = match self.role {
            Role::Client => Some(rand::random::<[u8; 4]>()),
            Role::Server => None,
        };
        let mut header = [0u8; MAX_HEADER_LEN];
        let header_len = encode_header(&mut header, flags, len, mask);
        if let Some(key) = mask {
            apply_mask(buf.body_mut(), key);
        }
        let frame = buf.with_header(&header[..header_len]).ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidInput,
                "pre-padding too small for frame header",
            )
        })?;

        let mut stream = self.stream.lock().await;
        stream.write_all(frame).await?;
        stream.flush().await?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameKind, WriteProtocol};
    use crate::sequence::{Message, Reassembler};
    use crate::writer::FrameWriter;

    /// Parses one frame off the front of `bytes`: (fin, opcode, payload, rest).
    fn parse(bytes: &[u8]) -> (bool, u8, Vec<u8>, &[u8]) {
        let fin = bytes[0] & 0x80 != 0;
        let opcode = bytes[0] & 0x0f;
        let masked = bytes[1] & 0x80 != 0;
        let (len, mut at) = match bytes[1] & 0x7f {
            126 => (u16::from_be_bytes([bytes[2], bytes[3]]) as usize, 4),
            127 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(&bytes[2..10]);
                (u64::from_be_bytes(b) as usize, 10)
            }
            n => (n as usize, 2),
        };
        let key = if masked {
            let k = [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]];
            at += 4;
            Some(k)
        } else {
            None
        };
        let mut payload = bytes[at..at + len].to_vec();
        if let Some(k) = key {
            apply_mask(&mut payload, k);
        }
        (fin, opcode, payload, &bytes[at + len..])
    }

    fn flags_of(fin: bool, opcode: u8) -> WriteFlags {
        let protocol = match opcode {
            0 => WriteProtocol::Continuation,
            1 => WriteProtocol::Text,
            2 => WriteProtocol::Binary,
            9 => WriteProtocol::Ping,
            _ => WriteProtocol::Pong,
        };
        WriteFlags { protocol, fin }
    }

    #[tokio::test]
    async fn server_text_frame_is_one_write() {
        let stream = tokio_test::io::Builder::new()
            .write(&[0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f])
            .build();
        let conn = WireTransport::server(stream);
        FrameWriter::new().write_text(&conn, "Hello").await.unwrap();
    }

    #[tokio::test]
    async fn server_fragmented_text() {
        let conn = WireTransport::server(Vec::<u8>::new());
        let writer = FrameWriter::new();
        writer
            .write_data(&conn, b"Hel", FrameKind::Text, true, false)
            .await
            .unwrap();
        writer
            .write_data(&conn, b"lo", FrameKind::Text, false, true)
            .await
            .unwrap();
        assert_eq!(
            conn.into_inner(),
            [
                0x01, 0x03, 0x48, 0x65, 0x6c, // first fragment
                0x80, 0x02, 0x6c, 0x6f, // final fragment
            ]
        );
    }

    #[tokio::test]
    async fn server_ping_and_pong_are_empty() {
        let conn = WireTransport::server(Vec::<u8>::new());
        let writer = FrameWriter::new();
        writer.write_ping(&conn).await.unwrap();
        writer.write_pong(&conn).await.unwrap();
        assert_eq!(conn.into_inner(), [0x89, 0x00, 0x8a, 0x00]);
    }

    #[tokio::test]
    async fn client_frames_are_masked_and_recoverable() {
        let conn = WireTransport::client(Vec::<u8>::new());
        let payload: Vec<u8> = (0..300u32).map(|i| (i % 256) as u8).collect();
        FrameWriter::new()
            .write_fragmented(&conn, &payload, FrameKind::Binary, 128)
            .await
            .unwrap();

        let bytes = conn.into_inner();
        let mut rest = &bytes[..];
        let mut r = Reassembler::new();
        let mut out = None;
        while !rest.is_empty() {
            assert!(rest[1] & 0x80 != 0, "client frame must be masked");
            let (fin, opcode, data, tail) = parse(rest);
            out = r.push(flags_of(fin, opcode), &data).unwrap();
            rest = tail;
        }
        assert_eq!(out, Some(Message::Binary(payload.into())));
    }

    #[tokio::test]
    async fn large_binary_uses_64_bit_length() {
        let conn = WireTransport::server(Vec::<u8>::new());
        let payload = vec![0xabu8; 70_000];
        FrameWriter::new()
            .write_binary(&conn, &payload)
            .await
            .unwrap();
        let bytes = conn.into_inner();
        let (fin, opcode, data, rest) = parse(&bytes);
        assert!(fin);
        assert_eq!(opcode, 2);
        assert_eq!(data, payload);
        assert!(rest.is_empty());
    }

    struct Tight;

    #[async_trait]
    impl Transport for Tight {
        fn padding(&self) -> Padding {
            Padding::new(1, 0)
        }

        async fn write(&self, buf: &mut PaddedBuffer<'_>, flags: WriteFlags) -> std::io::Result<usize> {
            WireTransport::server(Vec::<u8>::new()).write(buf, flags).await
        }
    }

    #[tokio::test]
    async fn header_larger_than_padding_is_rejected() {
        let err = FrameWriter::new()
            .write_binary(&Tight, b"abc")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::WriteError::ShortWrite { source: Some(ref e), .. } if e.kind() == ErrorKind::InvalidInput
        ));
    }
}
