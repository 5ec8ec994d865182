//! Horizontal differencing.
//!
//! Sample values are differenced in their typed domain, so multi-byte samples are converted from
//! the stream byte order first and written back in it afterwards. Every row starts fresh.

use crate::{bytecast, decoder::ByteOrder, TiffResult, TiffUnsupportedError};

trait Wrapping: Copy {
  fn wrapping_add(self, other: Self) -> Self;
  fn wrapping_sub(self, other: Self) -> Self;
}

macro_rules! wrapping {
  ($($ty:ty),*) => {$(
    impl Wrapping for $ty {
      fn wrapping_add(self, other: Self) -> Self {
        <$ty>::wrapping_add(self, other)
      }

      fn wrapping_sub(self, other: Self) -> Self {
        <$ty>::wrapping_sub(self, other)
      }
    }
  )*};
}

wrapping!(u8, u16, u32);

fn rev_hpredict_nsamp<T: Wrapping>(row: &mut [T], samples: usize) {
  for col in samples..row.len() {
    row[col] = row[col].wrapping_add(row[col - samples]);
  }
}

fn hpredict_nsamp<T: Wrapping>(row: &mut [T], samples: usize) {
  for col in (samples..row.len()).rev() {
    row[col] = row[col].wrapping_sub(row[col - samples]);
  }
}

/// Shape of the buffer being (de)predicted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowLayout {
  pub bits_per_sample: u16,
  /// Distance between consecutive samples of one channel: samples per pixel for chunky data,
  /// one for a single plane
  pub stride: usize,
  /// Samples in one row
  pub row_samples: usize,
  pub byte_order: ByteOrder,
}

fn apply(buf: &mut [u8], layout: RowLayout, forward: bool) -> TiffResult<()> {
  let RowLayout { bits_per_sample, stride, row_samples, byte_order } = layout;
  if row_samples == 0 || stride == 0 {
    return Ok(());
  }

  macro_rules! typed {
    ($from:path, $into:path, $width:expr) => {{
      let row_bytes = row_samples * $width;
      for row in buf.chunks_exact_mut(row_bytes) {
        let mut values = $from(row, byte_order);
        if forward {
          hpredict_nsamp(&mut values, stride);
        } else {
          rev_hpredict_nsamp(&mut values, stride);
        }
        row.copy_from_slice(&$into(&values, byte_order));
      }
    }};
  }

  match bits_per_sample {
    8 => {
      for row in buf.chunks_exact_mut(row_samples) {
        if forward {
          hpredict_nsamp(row, stride);
        } else {
          rev_hpredict_nsamp(row, stride);
        }
      }
    }
    16 => typed!(bytecast::u16_from_bytes, bytecast::u16_into_bytes, 2),
    32 => typed!(bytecast::u32_from_bytes, bytecast::u32_into_bytes, 4),
    bits => return Err(TiffUnsupportedError::HorizontalPredictor(bits).into()),
  }
  Ok(())
}

/// Replaces every sample with its difference to the previous sample of the same channel.
pub fn predict(buf: &mut [u8], layout: RowLayout) -> TiffResult<()> {
  apply(buf, layout, true)
}

/// Undoes [`predict`], accumulating differences along each row.
pub fn unpredict(buf: &mut [u8], layout: RowLayout) -> TiffResult<()> {
  apply(buf, layout, false)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::TiffError;

  fn layout(bits: u16, stride: usize, row_samples: usize, byte_order: ByteOrder) -> RowLayout {
    RowLayout { bits_per_sample: bits, stride, row_samples, byte_order }
  }

  #[test]
  fn bytes_per_row() {
    let mut buf = vec![1, 2, 4, 7, 10, 10, 9, 12];
    predict(&mut buf, layout(8, 1, 4, ByteOrder::LittleEndian)).unwrap();
    assert_eq!(buf, vec![1, 1, 2, 3, 10, 0, 255, 3]);
    unpredict(&mut buf, layout(8, 1, 4, ByteOrder::LittleEndian)).unwrap();
    assert_eq!(buf, vec![1, 2, 4, 7, 10, 10, 9, 12]);
  }

  #[test]
  fn chunky_channels_are_independent() {
    // two RGB pixels
    let original = vec![10, 20, 30, 11, 19, 35];
    let mut buf = original.clone();
    predict(&mut buf, layout(8, 3, 6, ByteOrder::BigEndian)).unwrap();
    assert_eq!(buf, vec![10, 20, 30, 1, 255, 5]);
    unpredict(&mut buf, layout(8, 3, 6, ByteOrder::BigEndian)).unwrap();
    assert_eq!(buf, original);
  }

  #[test]
  fn shorts_in_both_byte_orders() {
    let values = [1000u16, 1001, 999, 65535, 0, 42];
    for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
      for stride in [1, 3] {
        let original = bytecast::u16_into_bytes(&values, order);
        let mut buf = original.clone();
        predict(&mut buf, layout(16, stride, 6, order)).unwrap();
        assert_ne!(buf, original);
        unpredict(&mut buf, layout(16, stride, 6, order)).unwrap();
        assert_eq!(buf, original);
      }
    }
  }

  #[test]
  fn shorts_are_differenced_as_values() {
    let mut buf = bytecast::u16_into_bytes(&[0x00ff, 0x0100], ByteOrder::BigEndian);
    predict(&mut buf, layout(16, 1, 2, ByteOrder::BigEndian)).unwrap();
    assert_eq!(bytecast::u16_from_bytes(&buf, ByteOrder::BigEndian), vec![0x00ff, 1]);
  }

  #[test]
  fn unsupported_depths() {
    let mut buf = vec![0u8; 4];
    assert!(matches!(
      unpredict(&mut buf, layout(4, 1, 8, ByteOrder::BigEndian)),
      Err(TiffError::UnsupportedError(TiffUnsupportedError::HorizontalPredictor(4)))
    ));
  }
}
