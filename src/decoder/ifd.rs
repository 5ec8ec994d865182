//! Raw directory entries as they sit in the stream, before their values are resolved.

use std::io::{Read, Seek};

use super::{
  stream::{ByteOrder, SmartReader},
  Limits,
};
use crate::{ifd::Value, tags::Type, TiffError, TiffResult};

/// One 12-byte directory entry.
// An IFD entry has four fields:
//
// Tag   2 bytes
// Type  2 bytes
// Count 4 bytes
// Value 4 bytes either a pointer the value itself
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
  type_: Type,
  count: u32,
  offset: [u8; 4],
}

impl Entry {
  pub fn new(type_: Type, count: u32, offset: [u8; 4]) -> Entry {
    Entry { type_, count, offset }
  }

  pub fn field_type(&self) -> Type {
    self.type_
  }

  pub fn count(&self) -> u32 {
    self.count
  }

  fn byte_len(&self) -> Option<usize> {
    usize::try_from(self.count).ok()?.checked_mul(self.type_.size())
  }

  /// The value slot read as an offset, meaningful only for out-of-line values.
  pub fn value_offset(&self, byte_order: ByteOrder) -> u32 {
    match byte_order {
      ByteOrder::LittleEndian => u32::from_le_bytes(self.offset),
      ByteOrder::BigEndian => u32::from_be_bytes(self.offset),
    }
  }

  /// Resolves the value, reading out-of-line data from the stream when it does not fit the slot.
  pub fn val<R: Read + Seek>(&self, limits: &Limits, reader: &mut SmartReader<R>) -> TiffResult<Value> {
    let byte_len = self.byte_len().ok_or(TiffError::LimitsExceeded)?;
    if byte_len > limits.ifd_value_size {
      return Err(TiffError::LimitsExceeded);
    }

    let byte_order = reader.byte_order;
    if byte_len <= 4 {
      return Ok(Value::from_bytes(self.type_, &self.offset[..byte_len], byte_order));
    }

    reader.goto_offset(u64::from(self.value_offset(byte_order)))?;
    let mut data = vec![0; byte_len];
    reader.read_exact(&mut data)?;
    Ok(Value::from_bytes(self.type_, &data, byte_order))
  }
}
