//! Conversions between raw sample bytes in a stream byte order and typed sample values.
//!
//! These are the only places where sample data changes representation, everything upstream of
//! them works on byte buffers in the byte order of the file.

use crate::decoder::ByteOrder;

macro_rules! integral_conversions {
  ($from_name:ident, $into_name:ident, $ty:ty, $len:expr) => {
    pub(crate) fn $from_name(bytes: &[u8], byte_order: ByteOrder) -> Vec<$ty> {
      bytes
        .chunks_exact($len)
        .map(|c| {
          let mut n = [0u8; $len];
          n.copy_from_slice(c);
          match byte_order {
            ByteOrder::LittleEndian => <$ty>::from_le_bytes(n),
            ByteOrder::BigEndian => <$ty>::from_be_bytes(n),
          }
        })
        .collect()
    }

    pub(crate) fn $into_name(values: &[$ty], byte_order: ByteOrder) -> Vec<u8> {
      let mut out = Vec::with_capacity(values.len() * $len);
      for v in values {
        match byte_order {
          ByteOrder::LittleEndian => out.extend_from_slice(&v.to_le_bytes()),
          ByteOrder::BigEndian => out.extend_from_slice(&v.to_be_bytes()),
        }
      }
      out
    }
  };
}

integral_conversions!(u16_from_bytes, u16_into_bytes, u16, 2);
integral_conversions!(u32_from_bytes, u32_into_bytes, u32, 4);
integral_conversions!(u64_from_bytes, u64_into_bytes, u64, 8);

pub(crate) fn f32_from_bytes(bytes: &[u8], byte_order: ByteOrder) -> Vec<f32> {
  u32_from_bytes(bytes, byte_order).into_iter().map(f32::from_bits).collect()
}

pub(crate) fn f32_into_bytes(values: &[f32], byte_order: ByteOrder) -> Vec<u8> {
  let bits: Vec<u32> = values.iter().map(|v| v.to_bits()).collect();
  u32_into_bytes(&bits, byte_order)
}

pub(crate) fn f64_from_bytes(bytes: &[u8], byte_order: ByteOrder) -> Vec<f64> {
  u64_from_bytes(bytes, byte_order).into_iter().map(f64::from_bits).collect()
}

pub(crate) fn f64_into_bytes(values: &[f64], byte_order: ByteOrder) -> Vec<u8> {
  let bits: Vec<u64> = values.iter().map(|v| v.to_bits()).collect();
  u64_into_bytes(&bits, byte_order)
}

/// Reverses the byte order of every `width`-byte sample in place.
pub(crate) fn swap_sample_bytes(buf: &mut [u8], width: usize) {
  if width < 2 {
    return;
  }
  buf.chunks_exact_mut(width).for_each(|sample| sample.reverse());
}

/// Mirrors the bit order of every byte, converting between the two `FillOrder`s.
pub(crate) fn reverse_bits(buf: &mut [u8]) {
  buf.iter_mut().for_each(|b| *b = b.reverse_bits());
}

/// Copies `bit_len` bits starting at bit `src_bit` of `src` to bit `dst_bit` of `dst`, MSB first.
/// Bits of `dst` outside the target range are left untouched.
pub(crate) fn copy_bits(src: &[u8], src_bit: usize, dst: &mut [u8], dst_bit: usize, bit_len: usize) {
  if src_bit % 8 == 0 && dst_bit % 8 == 0 && bit_len % 8 == 0 {
    let (from, to, len) = (src_bit / 8, dst_bit / 8, bit_len / 8);
    dst[to..to + len].copy_from_slice(&src[from..from + len]);
    return;
  }
  for i in 0..bit_len {
    let (source, target) = (src_bit + i, dst_bit + i);
    let bit = (src[source / 8] >> (7 - source % 8)) & 1;
    let mask = 0x80 >> (target % 8);
    if bit == 1 {
      dst[target / 8] |= mask;
    } else {
      dst[target / 8] &= !mask;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn u16_respects_byte_order() {
    let bytes = [0x12, 0x34, 0xab, 0xcd];
    assert_eq!(u16_from_bytes(&bytes, ByteOrder::BigEndian), vec![0x1234, 0xabcd]);
    assert_eq!(u16_from_bytes(&bytes, ByteOrder::LittleEndian), vec![0x3412, 0xcdab]);
    assert_eq!(u16_into_bytes(&[0x1234, 0xabcd], ByteOrder::BigEndian), bytes.to_vec());
  }

  #[test]
  fn floats_survive_conversion() {
    let values = [1.5f32, -0.25, f32::MAX];
    let bytes = f32_into_bytes(&values, ByteOrder::BigEndian);
    assert_eq!(f32_from_bytes(&bytes, ByteOrder::BigEndian), values.to_vec());
  }

  #[test]
  fn swapping_flips_each_sample() {
    let mut buf = [1, 2, 3, 4, 5, 6];
    swap_sample_bytes(&mut buf, 2);
    assert_eq!(buf, [2, 1, 4, 3, 6, 5]);
    swap_sample_bytes(&mut buf, 1);
    assert_eq!(buf, [2, 1, 4, 3, 6, 5]);
  }

  #[test]
  fn aligned_bit_copy() {
    let mut dst = [0u8; 4];
    copy_bits(&[9, 1, 2], 8, &mut dst, 8, 16);
    assert_eq!(dst, [0, 1, 2, 0]);
  }

  #[test]
  fn unaligned_bit_copy_keeps_neighbours() {
    let mut dst = [0b1000_0001];
    copy_bits(&[0b0011_1100], 2, &mut dst, 2, 4);
    assert_eq!(dst, [0b1011_1101]);
  }

  #[test]
  fn bit_reversal() {
    let mut buf = [0b1000_0000, 0b0000_0110];
    reverse_bits(&mut buf);
    assert_eq!(buf, [0b0000_0001, 0b0110_0000]);
  }
}
