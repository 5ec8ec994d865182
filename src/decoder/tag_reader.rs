use std::convert::TryFrom;

use crate::{
  ifd::{Ifd, Value},
  tags::Tag,
  TiffFormatError, TiffResult,
};

/// Typed access to the fields of a resolved directory.
pub(crate) struct TagReader<'a> {
  pub ifd: &'a Ifd,
}

impl<'a> TagReader<'a> {
  pub(crate) fn find_tag(&self, tag: Tag) -> Option<&'a Value> {
    self.ifd.value(tag)
  }

  pub(crate) fn find_u16(&self, tag: Tag) -> TiffResult<Option<u16>> {
    self
      .find_tag(tag)
      .map(|v| v.to_u16().map_err(|_| TiffFormatError::InvalidTagValueType(tag).into()))
      .transpose()
  }

  pub(crate) fn find_u32(&self, tag: Tag) -> TiffResult<Option<u32>> {
    self
      .find_tag(tag)
      .map(|v| v.to_u32().map_err(|_| TiffFormatError::InvalidTagValueType(tag).into()))
      .transpose()
  }

  pub(crate) fn require_u32(&self, tag: Tag) -> TiffResult<u32> {
    self.find_u32(tag)?.ok_or_else(|| TiffFormatError::RequiredTagNotFound(tag).into())
  }

  pub fn find_tag_uint_vec<T: TryFrom<u32>>(&self, tag: Tag) -> TiffResult<Option<Vec<T>>> {
    self
      .find_tag(tag)
      .map(Value::to_u32_vec)
      .transpose()?
      .map(|v| {
        v.into_iter()
          .map(|u| T::try_from(u).map_err(|_| TiffFormatError::InvalidTagValueType(tag).into()))
          .collect()
      })
      .transpose()
  }

  /// Rational fields as floating point values.
  pub(crate) fn find_rationals(&self, tag: Tag) -> TiffResult<Option<Vec<f32>>> {
    match self.find_tag(tag) {
      None => Ok(None),
      Some(Value::Rational(v)) => {
        Ok(Some(v.iter().map(|r| if r.d == 0 { 0.0 } else { r.n as f32 / r.d as f32 }).collect()))
      }
      Some(_) => Err(TiffFormatError::InvalidTagValueType(tag).into()),
    }
  }
}
