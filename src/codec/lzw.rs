use weezl::{decode::Decoder, encode::Encoder, BitOrder, LzwStatus};

use super::Codec;
use crate::{TiffFormatError, TiffResult};

/// TIFF flavoured LZW: MSB-first codes with the early code size switch.
///
/// Streams written by pre-6.0 producers use LSB-first codes without the early switch; they are
/// recognised by their first byte and decoded as well.
#[derive(Clone, Copy, Debug)]
pub struct Lzw;

fn is_old_style(compressed: &[u8]) -> bool {
  // New-style streams open with a 9-bit clear code, 0x80 in MSB order
  compressed.len() >= 2 && compressed[0] == 0x00 && compressed[1] & 0x01 == 0x01
}

fn drain(mut decoder: Decoder, compressed: &[u8], expected_len: usize) -> TiffResult<Vec<u8>> {
  let mut output = vec![0u8; expected_len.max(1)];
  let mut consumed_in = 0;
  let mut written = 0;
  loop {
    if written == output.len() {
      if written >= expected_len {
        break;
      }
      output.resize(output.len() * 2, 0);
    }
    let result = decoder.decode_bytes(&compressed[consumed_in..], &mut output[written..]);
    consumed_in += result.consumed_in;
    written += result.consumed_out;
    match result.status {
      Ok(LzwStatus::Ok) => continue,
      Ok(LzwStatus::NoProgress) | Ok(LzwStatus::Done) => break,
      Err(err) => {
        // Data up to the error is kept; producers commonly omit the end code.
        if written == 0 {
          return Err(TiffFormatError::CompressedDataCorrupt(format!("LZW: {err}")).into());
        }
        break;
      }
    }
  }
  output.truncate(written);
  Ok(output)
}

impl Codec for Lzw {
  fn decode(&self, compressed: &[u8], expected_len: usize) -> TiffResult<Vec<u8>> {
    let decoder = if is_old_style(compressed) {
      Decoder::new(BitOrder::Lsb, 8)
    } else {
      Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    };
    drain(decoder, compressed, expected_len)
  }

  fn encode(&self, raw: &[u8]) -> TiffResult<Vec<u8>> {
    Encoder::with_tiff_size_switch(BitOrder::Msb, 8)
      .encode(raw)
      .map_err(|err| TiffFormatError::CompressedDataCorrupt(format!("LZW: {err}")).into())
  }
}
