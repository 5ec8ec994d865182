extern crate tiff_pages;

use std::io::Cursor;

use tiff_pages::{
  decoder::Limits,
  tags::{PhotometricInterpretation, Tag},
  ByteOrder, Document, SampleData, TiffError, TiffFormatError,
};

const BYTE: u16 = 1;
const ASCII: u16 = 2;
const SHORT: u16 = 3;
const LONG: u16 = 4;
const UNDEFINED: u16 = 7;

/// A little-endian stream assembled entry by entry.
struct RawTiff {
  bytes: Vec<u8>,
}

impl RawTiff {
  fn new() -> RawTiff {
    RawTiff { bytes: vec![b'I', b'I', 42, 0, 0, 0, 0, 0] }
  }

  fn pad(&mut self) {
    if self.bytes.len() % 2 != 0 {
      self.bytes.push(0);
    }
  }

  fn data(&mut self, data: &[u8]) -> u32 {
    self.pad();
    let offset = self.bytes.len() as u32;
    self.bytes.extend_from_slice(data);
    offset
  }

  /// Appends a directory and returns its offset together with the position of its next link.
  fn ifd(&mut self, entries: &[(u16, u16, Vec<u32>)]) -> (u32, usize) {
    let mut slots = Vec::new();
    for (tag, type_, values) in entries {
      let bytes: Vec<u8> = match *type_ {
        BYTE | ASCII | UNDEFINED => values.iter().map(|&v| v as u8).collect(),
        SHORT => values.iter().flat_map(|&v| (v as u16).to_le_bytes()).collect(),
        _ => values.iter().flat_map(|&v| v.to_le_bytes()).collect(),
      };
      let slot = if bytes.len() <= 4 {
        let mut slot = [0; 4];
        slot[..bytes.len()].copy_from_slice(&bytes);
        slot
      } else {
        self.data(&bytes).to_le_bytes()
      };
      slots.push((*tag, *type_, values.len() as u32, slot));
    }
    self.pad();
    let offset = self.bytes.len() as u32;
    self.bytes.extend_from_slice(&(slots.len() as u16).to_le_bytes());
    for (tag, type_, count, slot) in slots {
      self.bytes.extend_from_slice(&tag.to_le_bytes());
      self.bytes.extend_from_slice(&type_.to_le_bytes());
      self.bytes.extend_from_slice(&count.to_le_bytes());
      self.bytes.extend_from_slice(&slot);
    }
    let next = self.bytes.len();
    self.bytes.extend_from_slice(&[0; 4]);
    (offset, next)
  }

  fn link(&mut self, slot: usize, target: u32) {
    self.bytes[slot..slot + 4].copy_from_slice(&target.to_le_bytes());
  }
}

fn gray_page(raw: &mut RawTiff, width: u32, height: u32, pixels: &[u8]) -> (u32, usize) {
  let strip = raw.data(pixels);
  raw.ifd(&[
    (256, LONG, vec![width]),
    (257, LONG, vec![height]),
    (258, SHORT, vec![8]),
    (262, SHORT, vec![1]),
    (273, LONG, vec![strip]),
    (278, LONG, vec![height]),
    (279, LONG, vec![pixels.len() as u32]),
  ])
}

fn gray_data(document: &Document, index: usize) -> Vec<u8> {
  match document.decode_page(index).unwrap().data {
    SampleData::U8(data) => data,
    other => panic!("unexpected samples {other:?}"),
  }
}

#[test]
fn reads_a_chain_of_pages() {
  let mut raw = RawTiff::new();
  let (first, next) = gray_page(&mut raw, 2, 2, &[1, 2, 3, 4]);
  let (second, _) = gray_page(&mut raw, 1, 3, &[5, 6, 7]);
  raw.link(4, first);
  raw.link(next, second);

  let document = Document::from_bytes(&raw.bytes).unwrap();
  assert_eq!(document.byte_order(), ByteOrder::LittleEndian);
  assert_eq!(document.page_count(), 2);
  assert!(document.skipped().is_empty());
  assert_eq!(gray_data(&document, 0), vec![1, 2, 3, 4]);
  assert_eq!(gray_data(&document, 1), vec![5, 6, 7]);
  assert_eq!(document.decode_page(1).unwrap().dimensions(), (1, 3));
}

#[test]
fn reading_respects_limits() {
  let mut raw = RawTiff::new();
  let (first, next) = gray_page(&mut raw, 2, 2, &[1, 2, 3, 4]);
  let (second, _) = gray_page(&mut raw, 2, 2, &[5, 6, 7, 8]);
  raw.link(4, first);
  raw.link(next, second);

  let mut limits = Limits::default();
  limits.decoding_buffer_size = 3;
  let document = Document::read_with_limits(Cursor::new(&raw.bytes), limits).unwrap();
  assert_eq!(document.page_count(), 0);
  assert!(matches!(document.skipped()[0].error, TiffError::LimitsExceeded));

  let mut limits = Limits::default();
  limits.payload_buffer_size = 6;
  let document = Document::read_with_limits(Cursor::new(&raw.bytes), limits).unwrap();
  assert_eq!(document.page_count(), 1);
  assert_eq!(document.skipped().len(), 1);
  assert_eq!(document.skipped()[0].index, 1);
  assert!(matches!(document.skipped()[0].error, TiffError::LimitsExceeded));

  let unlimited = Limits::unlimited();
  let document = Document::read_with_limits(Cursor::new(&raw.bytes), unlimited).unwrap();
  assert_eq!(gray_data(&document, 1), vec![5, 6, 7, 8]);
}

#[test]
fn aliased_strips_count_towards_the_page_limit() {
  let mut raw = RawTiff::new();
  let row: Vec<u8> = (0..16).collect();
  let strip = raw.data(&row);
  let (first, _) = raw.ifd(&[
    (256, LONG, vec![16]),
    (257, LONG, vec![64]),
    (258, SHORT, vec![8]),
    (262, SHORT, vec![1]),
    (273, LONG, vec![strip; 64]),
    (278, LONG, vec![1]),
    (279, LONG, vec![16; 64]),
  ]);
  raw.link(4, first);

  let document = Document::from_bytes(&raw.bytes).unwrap();
  assert_eq!(gray_data(&document, 0), row.repeat(64));

  let mut limits = Limits::default();
  limits.decoding_buffer_size = 512;
  let document = Document::read_with_limits(Cursor::new(&raw.bytes), limits).unwrap();
  assert_eq!(document.page_count(), 0);
  assert!(matches!(document.skipped()[0].error, TiffError::LimitsExceeded));
}

#[test]
fn bogus_single_strip_count_is_recomputed() {
  let mut raw = RawTiff::new();
  let strip = raw.data(&[9, 8, 7, 6, 5, 4]);
  let (first, _) = raw.ifd(&[
    (256, LONG, vec![3]),
    (257, LONG, vec![2]),
    (258, SHORT, vec![8]),
    (273, LONG, vec![strip]),
    (279, LONG, vec![1]),
  ]);
  raw.link(4, first);

  let document = Document::from_bytes(&raw.bytes).unwrap();
  assert_eq!(gray_data(&document, 0), vec![9, 8, 7, 6, 5, 4]);
}

#[test]
fn missing_strip_counts_are_computed_for_raw_strips() {
  let mut raw = RawTiff::new();
  let top = raw.data(&[1, 2, 3, 4]);
  let bottom = raw.data(&[5, 6]);
  let (first, _) = raw.ifd(&[
    (256, LONG, vec![2]),
    (257, LONG, vec![3]),
    (258, SHORT, vec![8]),
    (273, LONG, vec![top, bottom]),
    (278, SHORT, vec![2]),
  ]);
  raw.link(4, first);

  let document = Document::from_bytes(&raw.bytes).unwrap();
  assert_eq!(gray_data(&document, 0), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn compressed_pages_need_strip_counts() {
  let mut raw = RawTiff::new();
  let strip = raw.data(&[0x80, 0x00]);
  let (first, _) = raw.ifd(&[
    (256, LONG, vec![2]),
    (257, LONG, vec![1]),
    (258, SHORT, vec![8]),
    (259, SHORT, vec![5]),
    (273, LONG, vec![strip]),
  ]);
  raw.link(4, first);

  let document = Document::from_bytes(&raw.bytes).unwrap();
  assert_eq!(document.page_count(), 0);
  assert!(matches!(
    document.skipped()[0].error,
    TiffError::FormatError(TiffFormatError::RequiredTagNotFound(Tag::StripByteCounts))
  ));
}

#[test]
fn broken_page_is_skipped() {
  let mut raw = RawTiff::new();
  let (first, first_next) = gray_page(&mut raw, 1, 1, &[10]);
  // no StripOffsets
  let (broken, broken_next) = raw.ifd(&[(256, LONG, vec![1]), (257, LONG, vec![1])]);
  let (last, _) = gray_page(&mut raw, 1, 1, &[30]);
  raw.link(4, first);
  raw.link(first_next, broken);
  raw.link(broken_next, last);

  let document = Document::from_bytes(&raw.bytes).unwrap();
  assert_eq!(document.page_count(), 2);
  assert_eq!(gray_data(&document, 1), vec![30]);
  let skipped = &document.skipped()[0];
  assert_eq!((skipped.index, skipped.offset), (1, u64::from(broken)));
}

#[test]
fn cyclic_chain_ends_the_walk() {
  let mut raw = RawTiff::new();
  let (first, first_next) = gray_page(&mut raw, 1, 1, &[10]);
  let (second, second_next) = gray_page(&mut raw, 1, 1, &[20]);
  raw.link(4, first);
  raw.link(first_next, second);
  raw.link(second_next, first);

  let document = Document::from_bytes(&raw.bytes).unwrap();
  assert_eq!(document.page_count(), 2);
  assert!(matches!(
    document.skipped()[0].error,
    TiffError::FormatError(TiffFormatError::CycleInOffsets)
  ));
}

#[test]
fn ycbcr_420_is_cropped_to_the_image() {
  let mut raw = RawTiff::new();
  // 2x2 data units of four Y samples, Cb and Cr
  let units: Vec<u8> = [100, 100, 100, 100, 128, 128].repeat(4);
  let strip = raw.data(&units);
  let (first, _) = raw.ifd(&[
    (256, LONG, vec![3]),
    (257, LONG, vec![3]),
    (258, SHORT, vec![8, 8, 8]),
    (262, SHORT, vec![6]),
    (273, LONG, vec![strip]),
    (277, SHORT, vec![3]),
    (278, LONG, vec![3]),
    (279, LONG, vec![24]),
    (530, SHORT, vec![2, 2]),
  ]);
  raw.link(4, first);

  let document = Document::from_bytes(&raw.bytes).unwrap();
  let pixels = document.decode_page(0).unwrap();
  assert_eq!(pixels.dimensions(), (3, 3));
  assert_eq!(pixels.photometric, PhotometricInterpretation::RGB);
  assert_eq!(pixels.data, SampleData::U8(vec![100; 27]));
}

#[test]
fn group4_fax_page() {
  let mut raw = RawTiff::new();
  let strip = raw.data(&[0x2e, 0xfc]);
  let (first, _) = raw.ifd(&[
    (256, LONG, vec![8]),
    (257, LONG, vec![2]),
    (259, SHORT, vec![4]),
    (273, LONG, vec![strip]),
    (279, LONG, vec![2]),
  ]);
  raw.link(4, first);

  let document = Document::from_bytes(&raw.bytes).unwrap();
  let pixels = document.decode_page(0).unwrap();
  assert_eq!(pixels.photometric, PhotometricInterpretation::WhiteIsZero);
  assert_eq!(pixels.bits_per_sample, 1);
  assert_eq!(pixels.data, SampleData::U8(vec![0x3c, 0x3c]));
}

fn fax_page(compression: u32, t4_options: u32, strip: &[u8]) -> Vec<u8> {
  let mut raw = RawTiff::new();
  let strip_offset = raw.data(strip);
  let (first, _) = raw.ifd(&[
    (256, LONG, vec![8]),
    (257, LONG, vec![2]),
    (259, SHORT, vec![compression]),
    (273, LONG, vec![strip_offset]),
    (279, LONG, vec![strip.len() as u32]),
    (292, LONG, vec![t4_options]),
  ]);
  raw.link(4, first);
  raw.bytes
}

#[test]
fn group3_one_dimensional_page() {
  // EOL, 2 white 4 black 2 white, EOL, 8 white, then the six EOLs closing the page
  let strip = [0x00, 0x17, 0x6e, 0x00, 0x33, 0x00, 0x10, 0x01, 0x00, 0x10, 0x01, 0x00, 0x10, 0x01];
  let document = Document::from_bytes(&fax_page(3, 0, &strip)).unwrap();
  let pixels = document.decode_page(0).unwrap();
  assert_eq!(pixels.photometric, PhotometricInterpretation::WhiteIsZero);
  assert_eq!(pixels.data, SampleData::U8(vec![0x3c, 0x00]));
}

#[test]
fn group3_two_dimensional_page() {
  // a 1-D row, then a 2-D row repeating it with vertical mode codes
  let strip = [0x00, 0x1b, 0xb7, 0x00, 0x17];
  let document = Document::from_bytes(&fax_page(3, 1, &strip)).unwrap();
  assert_eq!(document.decode_page(0).unwrap().data, SampleData::U8(vec![0x3c, 0x3c]));
}

#[test]
fn big_endian_16_bit_samples() {
  let bytes = vec![
    b'M', b'M', 0, 42, 0, 0, 0, 8, // header
    0, 5, // five entries
    1, 0, 0, 4, 0, 0, 0, 1, 0, 0, 0, 2, // ImageWidth 2
    1, 1, 0, 4, 0, 0, 0, 1, 0, 0, 0, 1, // ImageLength 1
    1, 2, 0, 3, 0, 0, 0, 1, 0, 16, 0, 0, // BitsPerSample 16
    1, 17, 0, 4, 0, 0, 0, 1, 0, 0, 0, 74, // StripOffsets 74
    1, 23, 0, 4, 0, 0, 0, 1, 0, 0, 0, 4, // StripByteCounts 4
    0, 0, 0, 0, // no next page
    0x12, 0x34, 0xab, 0xcd,
  ];
  let document = Document::from_bytes(&bytes).unwrap();
  assert_eq!(document.byte_order(), ByteOrder::BigEndian);
  assert_eq!(document.decode_page(0).unwrap().data, SampleData::U16(vec![0x1234, 0xabcd]));
}

#[test]
fn exif_directory_is_kept_on_rewrite() {
  let mut raw = RawTiff::new();
  let (exif, _) = raw.ifd(&[(0x9000, UNDEFINED, vec![0x30, 0x32, 0x33, 0x30])]);
  let strip = raw.data(&[42]);
  let (first, _) = raw.ifd(&[
    (256, LONG, vec![1]),
    (257, LONG, vec![1]),
    (273, LONG, vec![strip]),
    (279, LONG, vec![1]),
    (34665, LONG, vec![exif]),
  ]);
  raw.link(4, first);

  let document = Document::from_bytes(&raw.bytes).unwrap();
  let rewritten = Document::from_bytes(&document.to_bytes().unwrap()).unwrap();
  let page = rewritten.page(0).unwrap();
  let exif: Vec<_> = page.children(Tag::ExifIfd).collect();
  assert_eq!(exif.len(), 1);
  assert_eq!(exif[0].value(0x9000u16).and_then(|v| v.as_bytes()), Some(&b"0230"[..]));
}

#[test]
fn gps_and_interop_directories_are_kept_on_rewrite() {
  let mut raw = RawTiff::new();
  let (gps, _) = raw.ifd(&[(0, BYTE, vec![2, 3, 0, 0]), (1, ASCII, vec![b'N' as u32, 0])]);
  let (interop, _) = raw.ifd(&[(1, ASCII, b"R98\0".iter().map(|&b| u32::from(b)).collect())]);
  let strip = raw.data(&[42]);
  let (first, _) = raw.ifd(&[
    (256, LONG, vec![1]),
    (257, LONG, vec![1]),
    (273, LONG, vec![strip]),
    (279, LONG, vec![1]),
    (34853, LONG, vec![gps]),
    (40965, LONG, vec![interop]),
  ]);
  raw.link(4, first);

  let document = Document::from_bytes(&raw.bytes).unwrap();
  assert_eq!(document.page(0).unwrap().children(Tag::InteropIfd).count(), 1);
  let bytes = document.to_bytes().unwrap();
  let rewritten = Document::from_bytes(&bytes).unwrap();
  let page = rewritten.page(0).unwrap();

  let gps: Vec<_> = page.children(Tag::GpsIfd).collect();
  assert_eq!(gps.len(), 1);
  assert_eq!(gps[0].value(0u16).and_then(|v| v.as_bytes()), Some(&[2, 3, 0, 0][..]));
  assert_eq!(gps[0].value(1u16).and_then(|v| v.as_str()), Some("N"));

  let interop: Vec<_> = page.children(Tag::InteropIfd).collect();
  assert_eq!(interop.len(), 1);
  assert_eq!(interop[0].value(1u16).and_then(|v| v.as_str()), Some("R98"));
  // the rewritten pointer lands on the directory that was just read back
  let pointer = page.field(Tag::InteropIfd).unwrap().value.to_u32().unwrap() as usize;
  assert!(pointer + 2 < bytes.len());
  assert_eq!(u16::from_le_bytes([bytes[pointer], bytes[pointer + 1]]), 1);
}

#[test]
fn non_utf8_text_is_rewritten_verbatim() {
  let artist = b"\xa9 Foto\0";
  let mut raw = RawTiff::new();
  let strip = raw.data(&[42]);
  let (first, _) = raw.ifd(&[
    (256, LONG, vec![1]),
    (257, LONG, vec![1]),
    (273, LONG, vec![strip]),
    (279, LONG, vec![1]),
    (315, ASCII, artist.iter().map(|&b| u32::from(b)).collect()),
  ]);
  raw.link(4, first);

  let document = Document::from_bytes(&raw.bytes).unwrap();
  let rewritten = Document::from_bytes(&document.to_bytes().unwrap()).unwrap();
  let field = rewritten.page(0).unwrap().field(Tag::Artist).unwrap();
  assert_eq!(field.count(), 7);
  assert_eq!(field.value.to_bytes(ByteOrder::LittleEndian), artist.to_vec());
}

#[test]
fn not_a_tiff() {
  assert!(matches!(
    Document::from_bytes(b"GIF89a"),
    Err(TiffError::FormatError(TiffFormatError::TiffSignatureNotFound))
  ));
  assert!(Document::from_bytes(b"II*\0").is_err());
}

/// Malformed streams must fail or skip pages, never panic or allocate without bound.
fn survives(image: &[u8]) {
  if let Ok(document) = Document::from_bytes(image) {
    let _ = document.decode_pages();
  }
}

#[test]
fn fuzzer_testcase1() {
  survives(&[
    73, 73, 42, 0, 8, 0, 0, 0, 8, 0, 0, 1, 4, 0, 1, 0, 0, 0, 99, 255, 255, 254, 1, 1, 4, 0, 1, 0,
    0, 0, 158, 0, 0, 251, 3, 1, 3, 255, 254, 255, 255, 0, 1, 0, 0, 0, 6, 1, 3, 0, 1, 0, 0, 0, 0, 0,
    0, 0, 17, 1, 4, 0, 9, 0, 0, 0, 0, 0, 0, 0, 2, 1, 3, 0, 2, 0, 0, 0, 63, 0, 0, 0, 22, 1, 4, 0, 1,
    0, 0, 0, 44, 0, 0, 0, 23, 1, 4, 0, 0, 0, 0, 0, 0, 0, 2, 1, 3, 1, 0, 178, 178,
  ]);
}

#[test]
fn fuzzer_testcase2() {
  survives(&[
    73, 73, 42, 0, 8, 0, 0, 0, 15, 0, 0, 254, 44, 1, 0, 0, 0, 0, 0, 32, 0, 0, 0, 1, 4, 0, 1, 0, 0,
    0, 0, 1, 0, 0, 91, 1, 1, 0, 0, 0, 0, 0, 242, 4, 0, 0, 0, 22, 0, 56, 77, 0, 77, 1, 0, 0, 73, 42,
    0, 1, 4, 0, 1, 0, 0, 0, 4, 0, 8, 0, 0, 1, 4, 0, 1, 0, 0, 0, 158, 0, 0, 251, 3, 1, 3, 0, 1, 0,
    0, 0, 7, 0, 0, 0, 6, 1, 3, 0, 1, 0, 0, 0, 2, 0, 0, 0, 17, 1, 4, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1,
    1, 3, 0, 1, 0, 0, 0, 0, 0, 0, 4, 61, 1, 18, 0, 1, 0, 0, 0, 202, 0, 0, 0, 17, 1, 100, 0, 129, 0,
    0, 0, 0, 0, 0, 0, 232, 254, 252, 255, 254, 255, 255, 255, 1, 29, 0, 0, 22, 1, 3, 0, 1, 0, 0, 0,
    16, 0, 0, 0, 23, 1, 1, 0, 1, 0, 0, 0, 0, 0, 0, 123, 73, 254, 0, 73,
  ]);
}

#[test]
fn fuzzer_testcase3() {
  survives(&[
    73, 73, 42, 0, 8, 0, 0, 0, 8, 0, 0, 1, 4, 0, 1, 0, 0, 0, 2, 0, 0, 0, 61, 1, 9, 0, 46, 22, 128,
    0, 0, 0, 0, 1, 6, 1, 3, 0, 1, 0, 0, 0, 0, 0, 0, 0, 17, 1, 4, 0, 27, 0, 0, 0, 0, 0, 0, 0, 1, 1,
    3, 0, 1, 0, 0, 0, 17, 1, 0, 231, 22, 1, 1, 0, 1, 0, 0, 0, 130, 0, 0, 0, 23, 1, 4, 0, 14, 0, 0,
    0, 0, 0, 0, 0, 133, 133, 133, 77, 77, 77, 0, 0, 22, 128, 0, 255, 255, 255, 255, 255,
  ]);
}

#[test]
fn oom() {
  survives(&[
    73, 73, 42, 0, 8, 0, 0, 0, 8, 0, 0, 1, 4, 0, 1, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 40, 1, 0, 0, 0,
    158, 0, 0, 251, 3, 1, 3, 0, 1, 0, 0, 0, 7, 0, 0, 0, 6, 1, 3, 0, 1, 0, 0, 0, 2, 0, 0, 0, 17, 1,
    4, 0, 1, 0, 0, 0, 3, 77, 0, 0, 1, 1, 3, 0, 1, 0, 0, 0, 3, 128, 0, 0, 22, 1, 4, 0, 1, 0, 0, 0,
    40, 0, 0, 0, 23, 1, 4, 0, 1, 0, 0, 0, 178, 48, 178, 178, 178, 178, 162, 178,
  ]);
}

#[test]
fn timeout() {
  survives(&[
    73, 73, 42, 0, 8, 0, 0, 0, 16, 0, 254, 0, 4, 0, 1, 68, 0, 0, 0, 2, 0, 32, 254, 252, 0, 109, 0,
    129, 0, 0, 0, 32, 0, 58, 0, 1, 4, 0, 1, 0, 6, 0, 0, 0, 8, 0, 0, 1, 73, 73, 42, 0, 8, 0, 0, 0,
    8, 0, 0, 1, 4, 0, 1, 0, 0, 0, 21, 0, 0, 0, 61, 1, 255, 128, 9, 0, 0, 8, 0, 1, 113, 2, 3, 1, 3,
    0, 1, 0, 0, 0, 5, 0, 65, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 8, 112, 0, 0, 36, 0, 0, 0, 112, 56,
    200, 0, 5, 0, 0, 64, 0, 0, 1, 0, 4, 0, 0, 0, 2, 0, 6, 1, 3, 0, 1, 0, 0, 0, 0, 0, 0, 4, 17, 1,
    1, 0, 93, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 0, 1, 0, 0, 0, 3, 6, 0, 231, 22, 1, 1, 0, 1, 0, 0, 0,
    2, 64, 118, 36, 23, 1, 1, 0, 43, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 4, 0, 8, 0, 0, 73, 73, 42, 0, 8,
    0, 0, 0, 0, 0, 32,
  ]);
}
