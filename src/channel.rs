//! Blocking byte channels between protocol peers.
//!
//! The half-gates byte stream has no framing of its own, just blocks and
//! single bytes in a fixed, program-determined order, so the channel
//! interface is deliberately small: send bytes, receive bytes, flush.
//! Buffering lives below the [`Channel`] trait; protocol code decides when
//! a flush is required for progress.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::TcpStream;
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use thiserror::Error;

use crate::block::Block;

/// Errors raised while moving bytes to or from the peer.
#[derive(Debug, Error)]
pub enum Error {
    /// The peer closed the connection in the middle of the stream.
    #[error("peer closed the connection mid-stream")]
    Disconnected,
    /// The underlying stream failed.
    #[error("channel i/o failed: {0}")]
    Io(#[from] io::Error),
}

/// A reliable ordered byte channel to a single peer.
pub trait Channel {
    /// Queues `bytes` for the peer. May buffer; [`Channel::flush`] forces
    /// delivery.
    fn send(&mut self, bytes: &[u8]) -> Result<(), Error>;

    /// Fills `bytes` from the peer, blocking until all of them arrived.
    fn recv(&mut self, bytes: &mut [u8]) -> Result<(), Error>;

    /// Flushes everything queued by [`Channel::send`].
    fn flush(&mut self) -> Result<(), Error>;

    /// Sends one block as its 16 little-endian bytes.
    fn send_block(&mut self, block: Block) -> Result<(), Error> {
        self.send(&block.to_bytes())
    }

    /// Receives one block.
    fn recv_block(&mut self) -> Result<Block, Error> {
        let mut bytes = [0u8; Block::BYTES];
        self.recv(&mut bytes)?;
        Ok(Block::new(bytes))
    }

    /// Sends a single byte.
    fn send_byte(&mut self, byte: u8) -> Result<(), Error> {
        self.send(&[byte])
    }

    /// Receives a single byte.
    fn recv_byte(&mut self) -> Result<u8, Error> {
        let mut byte = [0u8; 1];
        self.recv(&mut byte)?;
        Ok(byte[0])
    }
}

/// Buffered [`Channel`] over a pair of byte streams (usually the two
/// directions of one socket).
pub struct StreamChannel<R: Read, W: Write> {
    reader: BufReader<R>,
    writer: BufWriter<W>,
}

/// Channel over a TCP socket.
pub type TcpChannel = StreamChannel<TcpStream, TcpStream>;

impl TcpChannel {
    /// Wraps a connected socket, cloning it for the read direction.
    pub fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        let reader = stream.try_clone()?;
        Ok(Self::new(reader, stream))
    }
}

impl<R: Read, W: Write> StreamChannel<R, W> {
    /// Wraps a reader/writer pair.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
        }
    }
}

impl<R: Read, W: Write> Channel for StreamChannel<R, W> {
    fn send(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    fn recv(&mut self, bytes: &mut [u8]) -> Result<(), Error> {
        self.reader.read_exact(bytes).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::Disconnected
            } else {
                Error::Io(e)
            }
        })
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Channel over one end of a Unix socket pair, used by in-process tests.
#[cfg(unix)]
pub type UnixChannel = StreamChannel<UnixStream, UnixStream>;

/// Creates two connected in-process channels.
#[cfg(unix)]
pub fn unix_pair() -> io::Result<(UnixChannel, UnixChannel)> {
    let (left, right) = UnixStream::pair()?;
    let left = StreamChannel::new(left.try_clone()?, left);
    let right = StreamChannel::new(right.try_clone()?, right);
    Ok((left, right))
}
