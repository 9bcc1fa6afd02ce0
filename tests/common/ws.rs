use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const OPCODE_TEXT: u8 = 0x1;
pub const OPCODE_CLOSE: u8 = 0x8;

const MASK: [u8; 4] = [0x12, 0x34, 0x56, 0x78];

/// Bare RFC 6455 client: handshake, masked text frames, unmasked server frames.
pub struct WsClient {
    stream: TcpStream,
}

impl WsClient {
    pub async fn connect(addr: SocketAddr, path: &str) -> WsClient {
        match Self::try_connect(addr, path).await {
            Ok(client) => client,
            Err(head) => panic!("upgrade refused: {head}"),
        }
    }

    /// Returns the response head when the server refuses the upgrade.
    pub async fn try_connect(addr: SocketAddr, path: &str) -> Result<WsClient, String> {
        let mut stream = TcpStream::connect(addr).await.expect("tcp connect");
        let handshake = format!(
            "GET {path} HTTP/1.1\r\n\
             Host: {addr}\r\n\
             Connection: Upgrade\r\n\
             Upgrade: websocket\r\n\
             Sec-WebSocket-Version: 13\r\n\
             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"
        );
        stream
            .write_all(handshake.as_bytes())
            .await
            .expect("send handshake");

        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            stream.read_exact(&mut byte).await.expect("read handshake");
            head.push(byte[0]);
        }
        let head = String::from_utf8_lossy(&head).to_string();
        if !head.starts_with("HTTP/1.1 101") {
            return Err(head);
        }

        Ok(WsClient { stream })
    }

    pub async fn send_text(&mut self, payload: &str) {
        let payload = payload.as_bytes();
        let len = payload.len();
        let mut frame = vec![0x80 | OPCODE_TEXT];
        if len < 126 {
            frame.push(0x80 | len as u8);
        } else if len <= usize::from(u16::MAX) {
            frame.push(0x80 | 126);
            frame.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            frame.push(0x80 | 127);
            frame.extend_from_slice(&(len as u64).to_be_bytes());
        }
        frame.extend_from_slice(&MASK);
        frame.extend(payload.iter().enumerate().map(|(i, b)| b ^ MASK[i % 4]));
        self.stream.write_all(&frame).await.expect("send frame");
    }

    /// Next server frame as `(opcode, payload)`; `None` once the connection is gone.
    pub async fn next_frame(&mut self) -> Option<(u8, Vec<u8>)> {
        let mut head = [0u8; 2];
        self.stream.read_exact(&mut head).await.ok()?;
        let opcode = head[0] & 0x0f;
        let len = match head[1] & 0x7f {
            126 => {
                let mut ext = [0u8; 2];
                self.stream.read_exact(&mut ext).await.ok()?;
                usize::from(u16::from_be_bytes(ext))
            }
            127 => {
                let mut ext = [0u8; 8];
                self.stream.read_exact(&mut ext).await.ok()?;
                u64::from_be_bytes(ext) as usize
            }
            n => usize::from(n),
        };
        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload).await.ok()?;
        Some((opcode, payload))
    }

    pub async fn next_json(&mut self) -> serde_json::Value {
        let (opcode, payload) = self.next_frame().await.expect("server frame");
        assert_eq!(opcode, OPCODE_TEXT);
        serde_json::from_slice(&payload).expect("reply json")
    }
}
