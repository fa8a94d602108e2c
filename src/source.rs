//! Packet sources.
//!
//! `PacketSource` is the single abstraction the ingest loop reads through,
//! so the same loop drives a file replay or a live UDP multicast feed
//! without caring which. Grounded on the teacher's `Demuxer`/`Muxer`
//! `#[async_trait]` traits in `format::mod`, reworked from a packet-level
//! contract to a raw byte-buffer one since this crate parses TS packets
//! itself rather than delegating to a container demuxer.

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::UdpSocket;

use crate::error::{Result, TsPcrError};

/// Outcome of one [`PacketSource::read`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were written into the caller's buffer.
    Bytes(usize),
    /// No data is currently available; the caller should retry after a
    /// short backoff rather than treat this as an error or EOF.
    WouldBlock,
    /// The source is exhausted and will never yield more data.
    Eof,
}

/// A source of raw transport-stream bytes.
#[async_trait]
pub trait PacketSource: Send {
    /// Reads into `buf`, returning how much (if any) data arrived.
    async fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome>;
}

/// Reads a TS file from disk in chunks aligned to the 188-byte packet size.
pub struct FileSource {
    file: tokio::fs::File,
}

impl FileSource {
    /// Opens `path` for sequential reading.
    pub async fn open(path: &std::path::Path) -> Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self { file })
    }
}

#[async_trait]
impl PacketSource for FileSource {
    async fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        let aligned_len = buf.len() - (buf.len() % crate::ts::packet::PACKET_SIZE);
        if aligned_len == 0 {
            return Err(TsPcrError::Config(
                "read buffer too small to hold one TS packet".into(),
            ));
        }
        let n = self.file.read(&mut buf[..aligned_len]).await?;
        if n == 0 {
            Ok(ReadOutcome::Eof)
        } else {
            Ok(ReadOutcome::Bytes(n))
        }
    }
}

/// Reads TS packets carried in UDP/RTP-less multicast datagrams.
pub struct UdpSource {
    socket: UdpSocket,
}

impl UdpSource {
    /// Binds `port` on all interfaces, joining the IPv4 multicast group at
    /// `host` if it parses as one.
    pub async fn bind(host: &str, port: u16) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
        if let Ok(addr) = host.parse::<std::net::Ipv4Addr>() {
            if addr.is_multicast() {
                socket.join_multicast_v4(addr, std::net::Ipv4Addr::UNSPECIFIED)?;
            }
        }
        Ok(Self { socket })
    }
}

#[async_trait]
impl PacketSource for UdpSource {
    async fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        match self.socket.try_recv(buf) {
            Ok(0) => Ok(ReadOutcome::Eof),
            Ok(n) => Ok(ReadOutcome::Bytes(n)),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(ReadOutcome::WouldBlock),
            Err(e) => Err(TsPcrError::Io(e)),
        }
    }
}
