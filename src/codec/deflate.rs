use std::io::{Read, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};

use super::Codec;
use crate::{TiffFormatError, TiffResult};

/// zlib streams, shared by compression 8 and the older Adobe code 32946.
#[derive(Clone, Copy, Debug)]
pub struct Deflate {
  level: u32,
}

impl Deflate {
  pub fn new(level: u32) -> Deflate {
    Deflate { level: level.min(9) }
  }
}

impl Codec for Deflate {
  fn decode(&self, compressed: &[u8], expected_len: usize) -> TiffResult<Vec<u8>> {
    let mut decoded = Vec::with_capacity(expected_len);
    let mut decoder = ZlibDecoder::new(compressed).take(expected_len as u64);
    if let Err(err) = decoder.read_to_end(&mut decoded) {
      // A truncated stream still yields the rows that made it.
      if decoded.is_empty() {
        return Err(TiffFormatError::CompressedDataCorrupt(format!("Deflate: {err}")).into());
      }
    }
    Ok(decoded)
  }

  fn encode(&self, raw: &[u8]) -> TiffResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(self.level));
    encoder.write_all(raw)?;
    Ok(encoder.finish()?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trip_at_every_level() {
    let raw: Vec<u8> = (0..4096u32).map(|i| (i % 17) as u8).collect();
    for level in [0, 1, 6, 9] {
      let codec = Deflate::new(level);
      let encoded = codec.encode(&raw).unwrap();
      assert_eq!(codec.decode(&encoded, raw.len()).unwrap(), raw);
    }
  }

  #[test]
  fn not_a_zlib_stream() {
    assert!(Deflate::new(6).decode(&[1, 2, 3, 4], 16).is_err());
  }
}
