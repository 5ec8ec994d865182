//! Strip and tile codecs.
//!
//! Every chunk is compressed independently, so a codec only ever sees one chunk and keeps no
//! state between calls.

use log::warn;

use crate::{
  bytecast,
  tags::{CompressionMethod, FillOrder},
  TiffResult, TiffUnsupportedError,
};

mod deflate;
mod fax;
mod lzw;
mod packbits;

pub use self::{deflate::Deflate, fax::Fax, lzw::Lzw, packbits::PackBits};

/// Chunk geometry and tag values some codecs depend on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodecParams {
  /// Pixels per row
  pub width: usize,
  /// Bytes per decoded row
  pub row_bytes: usize,
  pub fill_order: FillOrder,
  pub t4_options: u32,
  pub t6_options: u32,
  /// zlib level used when encoding Deflate, 0 to 9
  pub deflate_level: u32,
}

impl Default for CodecParams {
  fn default() -> Self {
    CodecParams {
      width: 0,
      row_bytes: 0,
      fill_order: FillOrder::MsbToLsb,
      t4_options: 0,
      t6_options: 0,
      deflate_level: 6,
    }
  }
}

pub trait Codec {
  /// Decompresses one chunk. `expected_len` is the decoded size the chunk should have; codecs
  /// use it as a capacity hint and stop once they reach it.
  fn decode(&self, compressed: &[u8], expected_len: usize) -> TiffResult<Vec<u8>>;

  /// Compresses one chunk of raw sample bytes.
  fn encode(&self, raw: &[u8]) -> TiffResult<Vec<u8>>;

  /// Decodes to exactly `expected_len` bytes, zero-filling short output.
  fn decode_exact(&self, compressed: &[u8], expected_len: usize) -> TiffResult<Vec<u8>> {
    let mut decoded = self.decode(compressed, expected_len)?;
    if decoded.len() < expected_len {
      warn!("chunk decoded to {} of {expected_len} bytes, padding with zeros", decoded.len());
      decoded.resize(expected_len, 0);
    }
    decoded.truncate(expected_len);
    Ok(decoded)
  }
}

/// Raw samples, stored as-is apart from an optional bit-order reversal.
#[derive(Clone, Copy, Debug)]
pub struct Uncompressed {
  fill_order: FillOrder,
}

impl Codec for Uncompressed {
  fn decode(&self, compressed: &[u8], expected_len: usize) -> TiffResult<Vec<u8>> {
    let mut decoded = compressed[..compressed.len().min(expected_len)].to_vec();
    if self.fill_order == FillOrder::LsbToMsb {
      bytecast::reverse_bits(&mut decoded);
    }
    Ok(decoded)
  }

  fn encode(&self, raw: &[u8]) -> TiffResult<Vec<u8>> {
    let mut encoded = raw.to_vec();
    if self.fill_order == FillOrder::LsbToMsb {
      bytecast::reverse_bits(&mut encoded);
    }
    Ok(encoded)
  }
}

/// Selects the codec for a compression method.
pub fn codec_for(method: CompressionMethod, params: &CodecParams) -> TiffResult<Box<dyn Codec>> {
  Ok(match method {
    CompressionMethod::None => Box::new(Uncompressed { fill_order: params.fill_order }),
    CompressionMethod::PackBits => Box::new(PackBits::new(params.row_bytes)),
    CompressionMethod::LZW => Box::new(Lzw),
    CompressionMethod::Deflate | CompressionMethod::OldDeflate => {
      Box::new(Deflate::new(params.deflate_level))
    }
    CompressionMethod::Huffman | CompressionMethod::Fax3 | CompressionMethod::Fax4 => {
      Box::new(Fax::new(method, params))
    }
    method => {
      return Err(TiffUnsupportedError::UnsupportedCompressionMethod(method).into());
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::TiffError;

  #[test]
  fn lossless_codecs_round_trip() {
    let raw: Vec<u8> = (0..600u32).map(|i| (i * i / 7 % 251) as u8).collect();
    let params = CodecParams { width: 100, row_bytes: 100, ..CodecParams::default() };
    for method in [
      CompressionMethod::None,
      CompressionMethod::PackBits,
      CompressionMethod::LZW,
      CompressionMethod::Deflate,
      CompressionMethod::OldDeflate,
    ] {
      let codec = codec_for(method, &params).unwrap();
      let encoded = codec.encode(&raw).unwrap();
      assert_eq!(codec.decode_exact(&encoded, raw.len()).unwrap(), raw, "{method:?}");
    }
  }

  #[test]
  fn short_output_is_padded() {
    let codec = codec_for(CompressionMethod::None, &CodecParams::default()).unwrap();
    assert_eq!(codec.decode_exact(&[1, 2], 4).unwrap(), vec![1, 2, 0, 0]);
    assert_eq!(codec.decode_exact(&[1, 2, 3], 2).unwrap(), vec![1, 2]);
  }

  #[test]
  fn fill_order_reverses_raw_bits() {
    let params = CodecParams { fill_order: FillOrder::LsbToMsb, ..CodecParams::default() };
    let codec = codec_for(CompressionMethod::None, &params).unwrap();
    assert_eq!(codec.decode(&[0b0000_0001], 1).unwrap(), vec![0b1000_0000]);
  }

  #[test]
  fn jpeg_is_unsupported() {
    assert!(matches!(
      codec_for(CompressionMethod::JPEG, &CodecParams::default()),
      Err(TiffError::UnsupportedError(TiffUnsupportedError::UnsupportedCompressionMethod(
        CompressionMethod::JPEG
      )))
    ));
  }
}
