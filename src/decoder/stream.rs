//! All IO functionality needed for TIFF decoding

use std::io::{self, Read, Seek};

/// Byte order of the TIFF file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ByteOrder {
  /// little endian byte order
  LittleEndian,
  /// big endian byte order
  BigEndian,
}

impl ByteOrder {
  /// The two bytes opening a TIFF header, `II` or `MM`.
  pub const fn magic(self) -> [u8; 2] {
    match self {
      ByteOrder::LittleEndian => *b"II",
      ByteOrder::BigEndian => *b"MM",
    }
  }

  pub fn from_magic(magic: &[u8]) -> Option<ByteOrder> {
    match magic {
      b"II" => Some(ByteOrder::LittleEndian),
      b"MM" => Some(ByteOrder::BigEndian),
      _ => None,
    }
  }
}

/// Reader that is aware of the byte order.
pub trait EndianReader: Read {
  /// Byte order that should be adhered to
  fn byte_order(&self) -> ByteOrder;

  /// Reads an u8
  #[inline(always)]
  fn read_u8(&mut self) -> Result<u8, io::Error> {
    let mut n = [0u8; 1];
    self.read_exact(&mut n)?;
    Ok(n[0])
  }

  /// Reads an u16
  #[inline(always)]
  fn read_u16(&mut self) -> Result<u16, io::Error> {
    let mut n = [0u8; 2];
    self.read_exact(&mut n)?;
    Ok(match self.byte_order() {
      ByteOrder::LittleEndian => u16::from_le_bytes(n),
      ByteOrder::BigEndian => u16::from_be_bytes(n),
    })
  }

  /// Reads an u32
  #[inline(always)]
  fn read_u32(&mut self) -> Result<u32, io::Error> {
    let mut n = [0u8; 4];
    self.read_exact(&mut n)?;
    Ok(match self.byte_order() {
      ByteOrder::LittleEndian => u32::from_le_bytes(n),
      ByteOrder::BigEndian => u32::from_be_bytes(n),
    })
  }
}

/// Reader that is aware of the byte order.
#[derive(Debug)]
pub struct SmartReader<R> {
  reader: R,
  pub byte_order: ByteOrder,
}

impl<R> SmartReader<R>
where
  R: Read,
{
  /// Wraps a reader
  pub fn wrap(reader: R, byte_order: ByteOrder) -> SmartReader<R> {
    SmartReader { reader, byte_order }
  }

  pub fn into_inner(self) -> R {
    self.reader
  }
}

impl<R: Read + Seek> SmartReader<R> {
  pub fn goto_offset(&mut self, offset: u64) -> io::Result<()> {
    self.seek(io::SeekFrom::Start(offset)).map(|_| ())
  }

  /// Total length of the underlying stream. The cursor position is preserved.
  pub fn stream_len(&mut self) -> io::Result<u64> {
    let current = self.stream_position()?;
    let end = self.seek(io::SeekFrom::End(0))?;
    self.goto_offset(current)?;
    Ok(end)
  }
}

impl<R> EndianReader for SmartReader<R>
where
  R: Read,
{
  #[inline(always)]
  fn byte_order(&self) -> ByteOrder {
    self.byte_order
  }
}

impl<R: Read> Read for SmartReader<R> {
  #[inline]
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.reader.read(buf)
  }
}

impl<R: Read + Seek> Seek for SmartReader<R> {
  #[inline]
  fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
    self.reader.seek(pos)
  }
}
