//! CCITT bilevel decoding: Modified Huffman (compression 2), Group 3 1-D and 2-D (compression 3)
//! and Group 4 (compression 4).
//!
//! Decoded rows are packed MSB first with black pixels as 1 bits, the natural layout for the
//! `WhiteIsZero` interpretation fax producers write. Encoding is not provided.
//!
//! Group 4 and 1-D Group 3 streams are decoded by the `fax` crate. Modified Huffman rows, 2-D
//! Group 3 rows and the uncompressed-mode extension are not covered by it and are decoded here.

use std::borrow::Cow;

use log::warn;

use super::{Codec, CodecParams};
use crate::{
  bytecast,
  tags::{CompressionMethod, FillOrder},
  TiffError, TiffFormatError, TiffResult, TiffUnsupportedError,
};

#[derive(Clone, Copy, Debug)]
struct Code {
  len: u8,
  bits: u16,
  run: u16,
}

const fn c(pattern: &str, run: u16) -> Code {
  let bytes = pattern.as_bytes();
  let mut bits = 0u16;
  let mut i = 0;
  while i < bytes.len() {
    bits = (bits << 1) | (bytes[i] - b'0') as u16;
    i += 1;
  }
  Code { len: bytes.len() as u8, bits, run }
}

#[rustfmt::skip]
static WHITE: &[Code] = &[
  c("00110101", 0), c("000111", 1), c("0111", 2), c("1000", 3), c("1011", 4), c("1100", 5),
  c("1110", 6), c("1111", 7), c("10011", 8), c("10100", 9), c("00111", 10), c("01000", 11),
  c("001000", 12), c("000011", 13), c("110100", 14), c("110101", 15), c("101010", 16),
  c("101011", 17), c("0100111", 18), c("0001100", 19), c("0001000", 20), c("0010111", 21),
  c("0000011", 22), c("0000100", 23), c("0101000", 24), c("0101011", 25), c("0010011", 26),
  c("0100100", 27), c("0011000", 28), c("00000010", 29), c("00000011", 30), c("00011010", 31),
  c("00011011", 32), c("00010010", 33), c("00010011", 34), c("00010100", 35), c("00010101", 36),
  c("00010110", 37), c("00010111", 38), c("00101000", 39), c("00101001", 40), c("00101010", 41),
  c("00101011", 42), c("00101100", 43), c("00101101", 44), c("00000100", 45), c("00000101", 46),
  c("00001010", 47), c("00001011", 48), c("01010010", 49), c("01010011", 50), c("01010100", 51),
  c("01010101", 52), c("00100100", 53), c("00100101", 54), c("01011000", 55), c("01011001", 56),
  c("01011010", 57), c("01011011", 58), c("01001010", 59), c("01001011", 60), c("00110010", 61),
  c("00110011", 62), c("00110100", 63),
  // make-up codes
  c("11011", 64), c("10010", 128), c("010111", 192), c("0110111", 256), c("00110110", 320),
  c("00110111", 384), c("01100100", 448), c("01100101", 512), c("01101000", 576),
  c("01100111", 640), c("011001100", 704), c("011001101", 768), c("011010010", 832),
  c("011010011", 896), c("011010100", 960), c("011010101", 1024), c("011010110", 1088),
  c("011010111", 1152), c("011011000", 1216), c("011011001", 1280), c("011011010", 1344),
  c("011011011", 1408), c("010011000", 1472), c("010011001", 1536), c("010011010", 1600),
  c("011000", 1664), c("010011011", 1728),
];

#[rustfmt::skip]
static BLACK: &[Code] = &[
  c("0000110111", 0), c("010", 1), c("11", 2), c("10", 3), c("011", 4), c("0011", 5),
  c("0010", 6), c("00011", 7), c("000101", 8), c("000100", 9), c("0000100", 10),
  c("0000101", 11), c("0000111", 12), c("00000100", 13), c("00000111", 14),
  c("000011000", 15), c("0000010111", 16), c("0000011000", 17), c("0000001000", 18),
  c("00001100111", 19), c("00001101000", 20), c("00001101100", 21), c("00000110111", 22),
  c("00000101000", 23), c("00000010111", 24), c("00000011000", 25), c("000011001010", 26),
  c("000011001011", 27), c("000011001100", 28), c("000011001101", 29), c("000001101000", 30),
  c("000001101001", 31), c("000001101010", 32), c("000001101011", 33), c("000011010010", 34),
  c("000011010011", 35), c("000011010100", 36), c("000011010101", 37), c("000011010110", 38),
  c("000011010111", 39), c("000001101100", 40), c("000001101101", 41), c("000011011010", 42),
  c("000011011011", 43), c("000001010100", 44), c("000001010101", 45), c("000001010110", 46),
  c("000001010111", 47), c("000001100100", 48), c("000001100101", 49), c("000001010010", 50),
  c("000001010011", 51), c("000000100100", 52), c("000000110111", 53), c("000000111000", 54),
  c("000000100111", 55), c("000000101000", 56), c("000001011000", 57), c("000001011001", 58),
  c("000000101011", 59), c("000000101100", 60), c("000001011010", 61), c("000001100110", 62),
  c("000001100111", 63),
  // make-up codes
  c("0000001111", 64), c("000011001000", 128), c("000011001001", 192), c("000001011011", 256),
  c("000000110011", 320), c("000000110100", 384), c("000000110101", 448),
  c("0000001101100", 512), c("0000001101101", 576), c("0000001001010", 640),
  c("0000001001011", 704), c("0000001001100", 768), c("0000001001101", 832),
  c("0000001110010", 896), c("0000001110011", 960), c("0000001110100", 1024),
  c("0000001110101", 1088), c("0000001110110", 1152), c("0000001110111", 1216),
  c("0000001010010", 1280), c("0000001010011", 1344), c("0000001010100", 1408),
  c("0000001010101", 1472), c("0000001011010", 1536), c("0000001011011", 1600),
  c("0000001100100", 1664), c("0000001100101", 1728),
];

/// Make-up codes shared by both colours.
#[rustfmt::skip]
static EXTENDED: &[Code] = &[
  c("00000001000", 1792), c("00000001100", 1856), c("00000001101", 1920),
  c("000000010010", 1984), c("000000010011", 2048), c("000000010100", 2112),
  c("000000010101", 2176), c("000000010110", 2240), c("000000010111", 2304),
  c("000000011100", 2368), c("000000011101", 2432), c("000000011110", 2496),
  c("000000011111", 2560),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
  Pass,
  Horizontal,
  Vertical(i8),
  Uncompressed,
}

#[rustfmt::skip]
static MODES: &[(Code, Mode)] = &[
  (c("1", 0), Mode::Vertical(0)),
  (c("011", 0), Mode::Vertical(1)),
  (c("010", 0), Mode::Vertical(-1)),
  (c("001", 0), Mode::Horizontal),
  (c("0001", 0), Mode::Pass),
  (c("000011", 0), Mode::Vertical(2)),
  (c("000010", 0), Mode::Vertical(-2)),
  (c("0000011", 0), Mode::Vertical(3)),
  (c("0000010", 0), Mode::Vertical(-3)),
  (c("0000001111", 0), Mode::Uncompressed),
];

/// Extension code entering uncompressed mode from a 1-D coded row.
const UNCOMPRESSED_1D: Code = c("000000001111", 0);

const EOL_ZEROS: usize = 11;

/// MSB-first bit cursor. Reads past the end yield zero bits.
struct BitReader<'a> {
  data: &'a [u8],
  pos: usize,
}

impl<'a> BitReader<'a> {
  fn new(data: &'a [u8]) -> Self {
    BitReader { data, pos: 0 }
  }

  fn bit_at(&self, pos: usize) -> u16 {
    self.data.get(pos / 8).map_or(0, |&byte| u16::from((byte >> (7 - pos % 8)) & 1))
  }

  fn peek(&self, len: u8) -> u16 {
    (0..usize::from(len)).fold(0, |acc, i| (acc << 1) | self.bit_at(self.pos + i))
  }

  fn consume(&mut self, len: usize) {
    self.pos += len;
  }

  fn read_bit(&mut self) -> u16 {
    let bit = self.bit_at(self.pos);
    self.pos += 1;
    bit
  }

  fn matches(&self, code: &Code) -> bool {
    self.peek(code.len) == code.bits
  }

  fn leading_zeros(&self, limit: usize) -> usize {
    (0..limit).take_while(|i| self.bit_at(self.pos + i) == 0).count()
  }

  fn remaining(&self) -> usize {
    (self.data.len() * 8).saturating_sub(self.pos)
  }

  fn align(&mut self) {
    self.pos = (self.pos + 7) / 8 * 8;
  }
}

fn corrupt(message: &str) -> TiffError {
  TiffFormatError::CompressedDataCorrupt(format!("CCITT: {message}")).into()
}

#[derive(Clone, Copy, Debug)]
pub struct Fax {
  method: CompressionMethod,
  width: usize,
  fill_order: FillOrder,
  two_dimensional: bool,
  uncompressed_mode: bool,
}

impl Fax {
  pub fn new(method: CompressionMethod, params: &CodecParams) -> Fax {
    let (two_dimensional, uncompressed_mode) = match method {
      CompressionMethod::Fax3 => (params.t4_options & 1 != 0, params.t4_options & 2 != 0),
      CompressionMethod::Fax4 => (true, params.t6_options & 2 != 0),
      _ => (false, false),
    };
    Fax { method, width: params.width, fill_order: params.fill_order, two_dimensional, uncompressed_mode }
  }

  /// Skips an end-of-line code and any fill bits before it.
  fn skip_eol(&self, reader: &mut BitReader) -> bool {
    let zeros = reader.leading_zeros(reader.remaining());
    if zeros >= EOL_ZEROS && reader.bit_at(reader.pos + zeros) == 1 {
      reader.consume(zeros + 1);
      true
    } else {
      false
    }
  }

  fn read_run(&self, reader: &mut BitReader, black: bool) -> TiffResult<usize> {
    let table = if black { BLACK } else { WHITE };
    let mut total = 0;
    loop {
      let code = table
        .iter()
        .chain(EXTENDED)
        .find(|code| reader.matches(code))
        .ok_or_else(|| corrupt("invalid run length code"))?;
      reader.consume(usize::from(code.len));
      total += usize::from(code.run);
      if code.run < 64 {
        return Ok(total);
      }
    }
  }

  fn decode_1d(&self, reader: &mut BitReader) -> TiffResult<Vec<usize>> {
    let mut row = Row::new(self.width);
    while row.pos < self.width {
      if self.uncompressed_mode && reader.matches(&UNCOMPRESSED_1D) {
        reader.consume(usize::from(UNCOMPRESSED_1D.len));
        self.uncompressed(reader, &mut row)?;
        continue;
      }
      let run = self.read_run(reader, row.black)?;
      row.pos += run;
      row.toggle();
    }
    Ok(row.changes)
  }

  fn decode_2d(&self, reader: &mut BitReader, reference: &[usize]) -> TiffResult<Vec<usize>> {
    let width = self.width;
    let mut row = Row::new(width);
    // a0 sits on an imaginary white pixel before the row until the first code is read
    let mut started = false;
    while row.pos < width {
      let a0 = if started { Some(row.pos) } else { None };
      let (b1, b2) = reference_changes(reference, a0, row.black, width);
      let mode = MODES
        .iter()
        .find(|(code, _)| reader.matches(code))
        .map(|(code, mode)| {
          reader.consume(usize::from(code.len));
          *mode
        })
        .ok_or_else(|| corrupt("invalid mode code"))?;
      started = true;

      match mode {
        Mode::Pass => row.pos = b2,
        Mode::Horizontal => {
          let first = self.read_run(reader, row.black)?;
          let second = self.read_run(reader, !row.black)?;
          row.pos += first;
          row.toggle();
          row.pos += second;
          row.toggle();
        }
        Mode::Vertical(offset) => {
          let a1 = b1 as isize + isize::from(offset);
          if a1 < row.pos as isize || a1 > width as isize {
            return Err(corrupt("vertical mode leaves the row"));
          }
          row.pos = a1 as usize;
          row.toggle();
        }
        Mode::Uncompressed if self.uncompressed_mode => self.uncompressed(reader, &mut row)?,
        Mode::Uncompressed => return Err(corrupt("uncompressed mode is not enabled")),
      }
    }
    Ok(row.changes)
  }

  /// Reads literal pixels until an exit code, which also names the colour that follows.
  fn uncompressed(&self, reader: &mut BitReader, row: &mut Row) -> TiffResult<()> {
    loop {
      let zeros = reader.leading_zeros(EOL_ZEROS);
      match zeros {
        0..=4 => {
          reader.consume(zeros + 1);
          (0..zeros).for_each(|_| row.pixel(false));
          row.pixel(true);
        }
        5 => {
          reader.consume(6);
          (0..5).for_each(|_| row.pixel(false));
        }
        6..=10 => {
          reader.consume(zeros + 1);
          (0..zeros - 6).for_each(|_| row.pixel(false));
          let black = reader.read_bit() == 1;
          if black != row.black {
            row.toggle();
          }
          return Ok(());
        }
        _ => return Err(corrupt("unterminated uncompressed mode")),
      }
    }
  }
}

/// Changing elements of the row being decoded.
struct Row {
  width: usize,
  pos: usize,
  black: bool,
  changes: Vec<usize>,
}

impl Row {
  fn new(width: usize) -> Row {
    Row { width, pos: 0, black: false, changes: Vec::new() }
  }

  /// Switches colour at the current position.
  fn toggle(&mut self) {
    if self.pos < self.width {
      self.changes.push(self.pos);
    }
    self.black = !self.black;
  }

  fn pixel(&mut self, black: bool) {
    if black != self.black {
      self.toggle();
    }
    self.pos += 1;
  }
}

/// `b1` and `b2`: the first changing element on the reference row right of `a0` with the colour
/// opposite to the current one, and the change after it.
fn reference_changes(
  reference: &[usize], a0: Option<usize>, black: bool, width: usize,
) -> (usize, usize) {
  let mut i = match a0 {
    Some(a0) => reference.partition_point(|&change| change <= a0),
    None => 0,
  };
  // even entries turn white to black
  if (i % 2 == 1) != black {
    i += 1;
  }
  let b1 = reference.get(i).copied().unwrap_or(width);
  let b2 = reference.get(i + 1).copied().unwrap_or(width);
  (b1, b2)
}

/// Packs one row given the positions where its colour changes, starting with white.
fn render(changes: impl IntoIterator<Item = usize>, width: usize, out: &mut Vec<u8>) {
  let start_len = out.len();
  out.resize(start_len + (width + 7) / 8, 0);
  let row = &mut out[start_len..];
  let mut black = false;
  let mut start = 0;
  for change in changes.into_iter().chain(std::iter::once(width)) {
    let end = change.min(width).max(start);
    if black {
      for x in start..end {
        row[x / 8] |= 0x80 >> (x % 8);
      }
    }
    start = end;
    black = !black;
  }
}

impl Fax {
  /// Whether the stream only uses codes the `fax` crate understands.
  fn handled_by_fax_crate(&self) -> bool {
    match self.method {
      CompressionMethod::Fax4 => !self.uncompressed_mode,
      CompressionMethod::Fax3 => !self.two_dimensional && !self.uncompressed_mode,
      _ => false,
    }
  }

  fn decode_transitions(&self, data: &[u8], rows: usize) -> TiffResult<Vec<u8>> {
    let width = u16::try_from(self.width)?;
    let mut output = Vec::with_capacity(rows * ((self.width + 7) / 8));
    let mut decoded = 0;
    let mut push_row = |transitions: &[u16]| {
      if decoded < rows {
        render(transitions.iter().map(|&t| usize::from(t)), self.width, &mut output);
        decoded += 1;
      }
    };
    let input = data.iter().copied();
    let finished = match self.method {
      CompressionMethod::Fax4 => {
        fax::decoder::decode_g4(input, width, u16::try_from(rows).ok(), &mut push_row)
      }
      _ => fax::decoder::decode_g3(input, &mut push_row),
    };
    if decoded == 0 && rows > 0 {
      return Err(corrupt("no row could be decoded"));
    }
    if decoded < rows {
      let state = if finished.is_some() { "ends" } else { "is corrupt" };
      warn!("CCITT data {state} after {decoded} of {rows} rows");
    }
    Ok(output)
  }

  fn decode_rows(&self, data: &[u8], rows: usize) -> TiffResult<Vec<u8>> {
    let row_bytes = (self.width + 7) / 8;
    let mut reader = BitReader::new(data);
    let mut reference: Vec<usize> = Vec::new();
    let mut output = Vec::with_capacity(rows * row_bytes);

    for row in 0..rows {
      if reader.remaining() == 0 {
        warn!("CCITT data ends after {row} of {rows} rows");
        break;
      }
      let changes = match self.method {
        CompressionMethod::Huffman => {
          reader.align();
          self.decode_1d(&mut reader)
        }
        CompressionMethod::Fax3 => {
          self.skip_eol(&mut reader);
          if !self.two_dimensional || reader.read_bit() == 1 {
            self.decode_1d(&mut reader)
          } else {
            self.decode_2d(&mut reader, &reference)
          }
        }
        _ => self.decode_2d(&mut reader, &reference),
      };
      match changes {
        Ok(changes) => {
          render(changes.iter().copied(), self.width, &mut output);
          reference = changes;
        }
        Err(err) if row == 0 => return Err(err),
        Err(err) => {
          warn!("CCITT decoding stopped at row {row}: {err}");
          break;
        }
      }
    }
    Ok(output)
  }
}

impl Codec for Fax {
  fn decode(&self, compressed: &[u8], expected_len: usize) -> TiffResult<Vec<u8>> {
    if self.width == 0 {
      return Err(TiffFormatError::InconsistentSizesEncountered.into());
    }
    let rows = expected_len / ((self.width + 7) / 8);

    let data: Cow<[u8]> = match self.fill_order {
      FillOrder::MsbToLsb => Cow::Borrowed(compressed),
      FillOrder::LsbToMsb => {
        let mut reversed = compressed.to_vec();
        bytecast::reverse_bits(&mut reversed);
        Cow::Owned(reversed)
      }
    };
    if self.handled_by_fax_crate() {
      self.decode_transitions(&data, rows)
    } else {
      self.decode_rows(&data, rows)
    }
  }

  fn encode(&self, _raw: &[u8]) -> TiffResult<Vec<u8>> {
    Err(TiffUnsupportedError::UnsupportedEncoding(self.method).into())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fax(method: CompressionMethod, width: usize, t4: u32, t6: u32) -> Fax {
    let params = CodecParams { width, t4_options: t4, t6_options: t6, ..CodecParams::default() };
    Fax::new(method, &params)
  }

  #[test]
  fn code_tables_are_prefix_free() {
    for table in [WHITE, BLACK] {
      let codes: Vec<&Code> = table.iter().chain(EXTENDED).collect();
      for a in &codes {
        for b in &codes {
          if std::ptr::eq(*a, *b) || a.len > b.len {
            continue;
          }
          assert_ne!(b.bits >> (b.len - a.len), a.bits, "{a:?} prefixes {b:?}");
        }
      }
    }
  }

  #[test]
  fn modified_huffman_rows_are_byte_aligned() {
    // 2 white, 4 black, 2 white; then an all white row
    let decoded = fax(CompressionMethod::Huffman, 8, 0, 0).decode(&[0x76, 0xe0, 0x98], 2).unwrap();
    assert_eq!(decoded, vec![0x3c, 0x00]);
  }

  #[test]
  fn make_up_codes() {
    // white 64 + white 16
    let decoded = fax(CompressionMethod::Huffman, 80, 0, 0).decode(&[0xdd, 0x40], 10).unwrap();
    assert_eq!(decoded, vec![0; 10]);
    // white 0, black 16
    let decoded = fax(CompressionMethod::Huffman, 16, 0, 0).decode(&[0x35, 0x05, 0xc0], 2).unwrap();
    assert_eq!(decoded, vec![0xff, 0xff]);
  }

  #[test]
  fn group3_rows_follow_eols() {
    let data = [0x00, 0x17, 0x6e, 0x00, 0x20];
    let decoded = fax(CompressionMethod::Fax3, 8, 0, 0).decode(&data, 1).unwrap();
    assert_eq!(decoded, vec![0x3c]);
  }

  #[test]
  fn group3_page_ends_with_rtc() {
    // EOL, 2 white 4 black 2 white, EOL, 8 white, six EOLs
    let data = [0x00, 0x17, 0x6e, 0x00, 0x33, 0x00, 0x10, 0x01, 0x00, 0x10, 0x01, 0x00, 0x10, 0x01];
    let decoded = fax(CompressionMethod::Fax3, 8, 0, 0).decode(&data, 2).unwrap();
    assert_eq!(decoded, vec![0x3c, 0x00]);
  }

  #[test]
  fn rows_wider_than_the_fax_decoder_are_rejected() {
    let result = fax(CompressionMethod::Fax4, 70_000, 0, 0).decode(&[0x2e, 0xfc], 8750);
    assert!(matches!(result, Err(TiffError::IntSizeError)));
  }

  #[test]
  fn group3_two_dimensional_rows() {
    let data = [0x00, 0x1b, 0xb7, 0x00, 0x17];
    let decoded = fax(CompressionMethod::Fax3, 8, 1, 0).decode(&data, 2).unwrap();
    assert_eq!(decoded, vec![0x3c, 0x3c]);
  }

  #[test]
  fn group4_vertical_and_horizontal_modes() {
    let decoded = fax(CompressionMethod::Fax4, 8, 0, 0).decode(&[0x2e, 0xfc], 2).unwrap();
    assert_eq!(decoded, vec![0x3c, 0x3c]);
  }

  #[test]
  fn group4_uncompressed_mode() {
    let data = [0x03, 0xcf, 0x00, 0x80];
    let decoded = fax(CompressionMethod::Fax4, 8, 0, 2).decode(&data, 1).unwrap();
    assert_eq!(decoded, vec![0x3c]);
    assert!(fax(CompressionMethod::Fax4, 8, 0, 0).decode(&data, 1).is_err());
  }

  #[test]
  fn reversed_fill_order() {
    let params = CodecParams { width: 8, fill_order: FillOrder::LsbToMsb, ..CodecParams::default() };
    let decoded = Fax::new(CompressionMethod::Huffman, &params).decode(&[0x6e, 0x07], 1).unwrap();
    assert_eq!(decoded, vec![0x3c]);
  }

  #[test]
  fn truncated_data_keeps_decoded_rows() {
    let decoded = fax(CompressionMethod::Huffman, 8, 0, 0).decode(&[0x76, 0xe0], 3).unwrap();
    assert_eq!(decoded, vec![0x3c]);
  }

  #[test]
  fn encoding_is_unsupported() {
    assert!(matches!(
      fax(CompressionMethod::Fax4, 8, 0, 0).encode(&[0]),
      Err(TiffError::UnsupportedError(TiffUnsupportedError::UnsupportedEncoding(_)))
    ));
  }
}
