//! One-bit-per-byte input and output streams.
//!
//! Secret inputs and decoded outputs live in flat files holding one bit per
//! byte (only the least significant bit of each byte is meaningful). The
//! readers and writers here are generic over any byte stream so tests can
//! run against in-memory buffers.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Buffered reader yielding one bit per underlying byte.
pub struct BitReader<R: Read> {
    inner: BufReader<R>,
}

/// Bit reader over a file.
pub type BitFileReader = BitReader<File>;

impl BitFileReader {
    /// Opens a bit file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read> BitReader<R> {
    /// Wraps a byte stream.
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
        }
    }

    /// Reads the next bit, the LSB of the next byte.
    pub fn read_bit(&mut self) -> io::Result<bool> {
        let mut byte = [0u8; 1];
        self.inner.read_exact(&mut byte)?;
        Ok(byte[0] & 1 == 1)
    }
}

/// Buffered writer emitting one byte per bit.
pub struct BitWriter<W: Write> {
    inner: BufWriter<W>,
}

/// Bit writer over a file.
pub type BitFileWriter = BitWriter<File>;

impl BitFileWriter {
    /// Creates (or truncates) a bit file for writing.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> BitWriter<W> {
    /// Wraps a byte sink.
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::new(inner),
        }
    }

    /// Appends one bit as a 0x00 or 0x01 byte.
    pub fn write_bit(&mut self, bit: bool) -> io::Result<()> {
        self.inner.write_all(&[u8::from(bit)])
    }

    /// Flushes and returns the underlying sink.
    pub fn into_inner(self) -> io::Result<W> {
        self.inner.into_inner().map_err(|e| e.into_error())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn bits_round_trip_in_memory() {
        let mut writer = BitWriter::new(Vec::new());
        for bit in [true, false, true, true] {
            writer.write_bit(bit).unwrap();
        }
        let bytes = writer.into_inner().unwrap();
        assert_eq!(vec![1, 0, 1, 1], bytes);

        let mut reader = BitReader::new(Cursor::new(bytes));
        assert!(reader.read_bit().unwrap());
        assert!(!reader.read_bit().unwrap());
        assert!(reader.read_bit().unwrap());
        assert!(reader.read_bit().unwrap());
        assert!(reader.read_bit().is_err());
    }

    #[test]
    fn only_lsb_matters() {
        let mut reader = BitReader::new(Cursor::new(vec![0xfe, 0xff]));
        assert!(!reader.read_bit().unwrap());
        assert!(reader.read_bit().unwrap());
    }

    #[test]
    fn bits_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.bits");
        let mut writer = BitFileWriter::create(&path).unwrap();
        for bit in [false, true, false] {
            writer.write_bit(bit).unwrap();
        }
        writer.into_inner().unwrap();

        let mut reader = BitFileReader::open(&path).unwrap();
        assert!(!reader.read_bit().unwrap());
        assert!(reader.read_bit().unwrap());
        assert!(!reader.read_bit().unwrap());
    }
}
