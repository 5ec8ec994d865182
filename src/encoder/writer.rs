use std::io::{self, Seek, SeekFrom, Write};

use crate::{bytecast, decoder::ByteOrder, TiffResult};

/// Byte-order aware sink that tracks its own write cursor.
///
/// Everything is appended at the cursor; the only backwards writes are [`TiffWriter::patch`]
/// calls, which restore the cursor afterwards.
pub struct TiffWriter<W> {
  writer: W,
  byte_order: ByteOrder,
  offset: u64,
}

impl<W: Write + Seek> TiffWriter<W> {
  pub fn new(writer: W, byte_order: ByteOrder) -> Self {
    TiffWriter { writer, byte_order, offset: 0 }
  }

  pub fn byte_order(&self) -> ByteOrder {
    self.byte_order
  }

  pub fn offset(&self) -> u64 {
    self.offset
  }

  /// The cursor as a 32-bit stream offset.
  pub fn offset_u32(&self) -> TiffResult<u32> {
    Ok(u32::try_from(self.offset)?)
  }

  pub fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
    self.writer.write_all(bytes)?;
    self.offset += bytes.len() as u64;
    Ok(())
  }

  pub fn write_u16(&mut self, n: u16) -> io::Result<()> {
    self.write_bytes(&bytecast::u16_into_bytes(&[n], self.byte_order))
  }

  pub fn write_u32(&mut self, n: u32) -> io::Result<()> {
    self.write_bytes(&bytecast::u32_into_bytes(&[n], self.byte_order))
  }

  /// Pads to an even offset; directories and values must start on a word boundary.
  pub fn pad_word_boundary(&mut self) -> io::Result<()> {
    if self.offset % 2 != 0 {
      self.write_bytes(&[0])?;
    }
    Ok(())
  }

  /// Overwrites four already written bytes at `position`.
  pub fn patch(&mut self, position: u64, bytes: [u8; 4]) -> io::Result<()> {
    debug_assert!(position + 4 <= self.offset);
    self.writer.seek(SeekFrom::Start(position))?;
    self.writer.write_all(&bytes)?;
    self.writer.seek(SeekFrom::Start(self.offset))?;
    Ok(())
  }

  pub fn flush(&mut self) -> io::Result<()> {
    self.writer.flush()
  }

  pub fn into_inner(self) -> W {
    self.writer
  }
}
