use super::Codec;
use crate::{TiffFormatError, TiffResult};

/// Apple PackBits run-length encoding.
///
/// Encoded runs never cross row boundaries, as the format requires.
#[derive(Clone, Copy, Debug)]
pub struct PackBits {
  row_bytes: usize,
}

impl PackBits {
  pub fn new(row_bytes: usize) -> PackBits {
    PackBits { row_bytes }
  }
}

const MAX_RUN: usize = 128;

fn corrupt(message: &str) -> crate::TiffError {
  TiffFormatError::CompressedDataCorrupt(format!("PackBits: {message}")).into()
}

impl Codec for PackBits {
  fn decode(&self, compressed: &[u8], expected_len: usize) -> TiffResult<Vec<u8>> {
    let mut output = Vec::with_capacity(expected_len);
    let mut i = 0;

    while i < compressed.len() && output.len() < expected_len {
      let header = compressed[i] as i8;
      i += 1;

      if header >= 0 {
        // literal run of header + 1 bytes
        let count = header as usize + 1;
        let literal = compressed.get(i..i + count).ok_or_else(|| corrupt("truncated literal"))?;
        output.extend_from_slice(literal);
        i += count;
      } else if header != -128 {
        // next byte repeated 1 - header times
        let count = 1 - header as isize;
        let value = *compressed.get(i).ok_or_else(|| corrupt("truncated run"))?;
        i += 1;
        output.resize(output.len() + count as usize, value);
      }
    }

    Ok(output)
  }

  fn encode(&self, raw: &[u8]) -> TiffResult<Vec<u8>> {
    let mut output = Vec::with_capacity(raw.len() + raw.len() / MAX_RUN + 1);
    let row_bytes = if self.row_bytes == 0 { raw.len().max(1) } else { self.row_bytes };
    for row in raw.chunks(row_bytes) {
      encode_row(row, &mut output);
    }
    Ok(output)
  }
}

fn encode_row(data: &[u8], output: &mut Vec<u8>) {
  let mut i = 0;

  while i < data.len() {
    let mut run_length = 1;
    while i + run_length < data.len() && run_length < MAX_RUN && data[i + run_length] == data[i] {
      run_length += 1;
    }

    if run_length > 1 {
      output.push((1 - run_length as isize) as u8);
      output.push(data[i]);
      i += run_length;
    } else {
      let start = i;
      let mut literal_len = 1;
      i += 1;

      while i < data.len() && literal_len < MAX_RUN {
        if i + 1 < data.len() && data[i] == data[i + 1] {
          break;
        }
        literal_len += 1;
        i += 1;
      }

      output.push((literal_len - 1) as u8);
      output.extend_from_slice(&data[start..start + literal_len]);
    }
  }
}
